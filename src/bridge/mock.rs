//! Mock engine session for testing
//!
//! This session implements [`Session`] without an external engine. It provides:
//! - An in-memory variable store
//! - Simulated call latency
//! - Controllable failure injection
//! - Call logging for test verification

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

use crate::bridge::Session;
use crate::error::{ProbeError, ProbeResult};
use crate::utils::helpers::validate_identifier;

/// One recorded call against a [`MockSession`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Eval(String),
    Push { name: String, len: usize },
    Pull(String),
    Close,
}

/// Mock engine session
///
/// # Example
///
/// ```
/// use scilab_speed_check::bridge::{MockCall, MockSession, Session};
///
/// # tokio_test::block_on(async {
/// let mut session = MockSession::new();
/// session.push("x", &[1, 2, 3]).await.unwrap();
/// assert_eq!(session.pull("x").await.unwrap(), vec![1.0, 2.0, 3.0]);
/// assert_eq!(session.calls()[0], MockCall::Push { name: "x".into(), len: 3 });
/// # })
/// ```
pub struct MockSession {
    closed: bool,
    latency: Duration,
    variables: HashMap<String, Vec<f64>>,
    should_fail_next: AtomicBool,
    fail_push_len: Option<usize>,
    call_log: Arc<Mutex<Vec<MockCall>>>,
}

impl MockSession {
    /// Create a new mock session with no latency
    pub fn new() -> Self {
        Self {
            closed: false,
            latency: Duration::ZERO,
            variables: HashMap::new(),
            should_fail_next: AtomicBool::new(false),
            fail_push_len: None,
            call_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Set simulated latency applied to every call
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Reject every push whose payload has exactly `len` elements
    pub fn fail_push_with_len(mut self, len: usize) -> Self {
        self.fail_push_len = Some(len);
        self
    }

    /// Trigger a failure on the next eval, push or pull
    pub fn trigger_failure(&self) {
        self.should_fail_next.store(true, Ordering::SeqCst);
    }

    /// Shared handle to the call log, usable after the session is moved into a probe
    pub fn call_log(&self) -> Arc<Mutex<Vec<MockCall>>> {
        Arc::clone(&self.call_log)
    }

    /// Get a copy of the call log for verification
    pub fn calls(&self) -> Vec<MockCall> {
        lock_log(&self.call_log).clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn log_call(&self, call: MockCall) {
        lock_log(&self.call_log).push(call);
    }

    async fn enter(&self, call: MockCall) -> ProbeResult<()> {
        self.log_call(call);
        if self.closed {
            return Err(ProbeError::SessionClosed);
        }
        if self.should_fail_next.swap(false, Ordering::SeqCst) {
            return Err(ProbeError::Connection("mock engine failure".to_string()));
        }
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        Ok(())
    }
}

impl Default for MockSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Lock the shared call log, recovering it if a test thread panicked mid-push.
pub fn lock_log(log: &Mutex<Vec<MockCall>>) -> MutexGuard<'_, Vec<MockCall>> {
    log.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Parse `name = number`, the only command shape the mock evaluates.
fn parse_assignment(command: &str) -> Option<(&str, f64)> {
    let (name, value) = command.trim().trim_end_matches(';').split_once('=')?;
    let name = name.trim();
    let value = value.trim().parse().ok()?;
    crate::utils::helpers::is_valid_identifier(name).then_some((name, value))
}

#[async_trait]
impl Session for MockSession {
    fn name(&self) -> &str {
        "Mock"
    }

    async fn eval(&mut self, command: &str) -> ProbeResult<String> {
        self.enter(MockCall::Eval(command.to_string())).await?;
        if let Some((name, value)) = parse_assignment(command) {
            self.variables.insert(name.to_string(), vec![value]);
        }
        Ok(String::new())
    }

    async fn push(&mut self, name: &str, values: &[i64]) -> ProbeResult<()> {
        self.enter(MockCall::Push { name: name.to_string(), len: values.len() })
            .await
            .map_err(ProbeError::into_transfer)?;
        validate_identifier(name)?;
        if self.fail_push_len == Some(values.len()) {
            return Err(ProbeError::Transfer(format!(
                "mock engine rejected a payload of {} elements",
                values.len()
            )));
        }
        self.variables
            .insert(name.to_string(), values.iter().map(|&v| v as f64).collect());
        Ok(())
    }

    async fn pull(&mut self, name: &str) -> ProbeResult<Vec<f64>> {
        self.enter(MockCall::Pull(name.to_string()))
            .await
            .map_err(ProbeError::into_transfer)?;
        self.variables
            .get(name)
            .cloned()
            .ok_or_else(|| ProbeError::Transfer(format!("undefined variable '{}'", name)))
    }

    async fn close(&mut self) -> ProbeResult<()> {
        self.log_call(MockCall::Close);
        if !self.closed {
            self.closed = true;
            self.variables.clear();
            debug!("MockSession closed");
        }
        Ok(())
    }
}
