//! Bridge to the external numeric engine
//!
//! The probe talks to the engine only through the [`Session`] capability, so
//! a real engine process and the in-memory [`MockSession`] are interchangeable.

use async_trait::async_trait;

use crate::error::ProbeResult;

pub mod mock;
pub mod scilab;

pub use mock::{MockCall, MockSession};
pub use scilab::{ScilabOptions, ScilabSession};

/// Logical connection to a separate numeric-engine process.
///
/// Every call blocks the caller until the engine answers. No timeout is
/// applied to `eval`, `push` or `pull`.
#[async_trait]
pub trait Session: Send {
    /// Bridge name shown in the report banner.
    fn name(&self) -> &str;

    /// Evaluate a command in the engine and return whatever it printed.
    async fn eval(&mut self, command: &str) -> ProbeResult<String>;

    /// Store `values` in the engine under `name` as a row vector.
    async fn push(&mut self, name: &str, values: &[i64]) -> ProbeResult<()>;

    /// Fetch the named value from the engine, flattened column-major.
    async fn pull(&mut self, name: &str) -> ProbeResult<Vec<f64>>;

    /// Shut the engine down. Closing an already closed session is a no-op.
    async fn close(&mut self) -> ProbeResult<()>;
}

#[async_trait]
impl<S: Session + ?Sized> Session for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn eval(&mut self, command: &str) -> ProbeResult<String> {
        (**self).eval(command).await
    }

    async fn push(&mut self, name: &str, values: &[i64]) -> ProbeResult<()> {
        (**self).push(name, values).await
    }

    async fn pull(&mut self, name: &str) -> ProbeResult<Vec<f64>> {
        (**self).pull(name).await
    }

    async fn close(&mut self) -> ProbeResult<()> {
        (**self).close().await
    }
}
