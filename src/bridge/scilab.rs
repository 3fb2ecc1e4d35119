//! Scilab engine session over a child process
//!
//! Commands travel line by line on the engine's stdin. Each one is wrapped in
//! a `try`/`catch` block followed by a sentinel print, and the reply is every
//! stdout line up to that sentinel. Array payloads do not go through the pipe:
//! they are written as little-endian doubles to a scratch file that the
//! engine reads with `mget` (push) or writes with `mput` (pull).

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::bridge::Session;
use crate::error::{ProbeError, ProbeResult};
use crate::utils::helpers::{
    decode_f64_le, encode_f64_le, parse_element_count, scilab_string_literal, validate_identifier,
};

const DONE_MARKER: &str = "__SPEED_CHECK_DONE__";
const ERROR_MARKER: &str = "__SPEED_CHECK_ERR__";
const FD_VARIABLE: &str = "speedcheck_fd";

/// How to launch the engine process
#[derive(Debug, Clone)]
pub struct ScilabOptions {
    pub executable: PathBuf,
    pub args: Vec<String>,
    /// Time allowed for the engine to answer its first command
    pub startup_timeout: Duration,
    /// Time allowed for the engine to exit after `exit` before it is killed
    pub shutdown_timeout: Duration,
}

impl Default for ScilabOptions {
    fn default() -> Self {
        Self {
            executable: PathBuf::from("scilab-cli"),
            args: vec!["-nb".to_string()],
            startup_timeout: Duration::from_secs(30),
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

struct Engine {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    scratch: TempDir,
}

/// Session backed by a running Scilab process
pub struct ScilabSession {
    engine: Option<Engine>,
    shutdown_timeout: Duration,
}

impl ScilabSession {
    /// Spawn the engine and wait for it to answer a first sentinel.
    ///
    /// Fails with [`ProbeError::Connection`] when the process cannot be
    /// spawned or stays silent past the startup timeout.
    pub async fn start(options: &ScilabOptions) -> ProbeResult<Self> {
        info!(executable = %options.executable.display(), args = ?options.args, "Starting engine");

        let mut child = Command::new(&options.executable)
            .args(&options.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ProbeError::Connection(format!(
                    "failed to start {}: {}",
                    options.executable.display(),
                    e
                ))
            })?;

        let stdin = child.stdin.take()
            .ok_or_else(|| ProbeError::Connection("engine stdin was not captured".to_string()))?;
        let stdout = child.stdout.take()
            .ok_or_else(|| ProbeError::Connection("engine stdout was not captured".to_string()))?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(drain_stderr(stderr));
        }

        let scratch = tempfile::Builder::new()
            .prefix("scilab-speed-check")
            .tempdir()
            .map_err(|e| ProbeError::Connection(format!("failed to create scratch directory: {}", e)))?;

        let mut session = Self {
            engine: Some(Engine {
                child,
                stdin,
                stdout: BufReader::new(stdout),
                scratch,
            }),
            shutdown_timeout: options.shutdown_timeout,
        };

        let handshake = handshake_line();
        let answered = timeout(options.startup_timeout, session.exchange(&handshake)).await;
        match answered {
            Ok(Ok(_)) => {
                info!("Engine ready");
                Ok(session)
            }
            Ok(Err(e)) => Err(ProbeError::Connection(format!("engine did not start: {}", e))),
            Err(_) => Err(ProbeError::Connection(format!(
                "engine did not answer within {:?}",
                options.startup_timeout
            ))),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.engine.is_none()
    }

    fn scratch_path(&self, file: &str) -> ProbeResult<PathBuf> {
        let engine = self.engine.as_ref().ok_or(ProbeError::SessionClosed)?;
        Ok(engine.scratch.path().join(file))
    }

    /// Send one line and collect the reply up to the sentinel.
    async fn exchange(&mut self, line: &str) -> ProbeResult<Vec<String>> {
        let engine = self.engine.as_mut().ok_or(ProbeError::SessionClosed)?;

        engine.stdin.write_all(line.as_bytes()).await
            .map_err(|e| ProbeError::Connection(format!("failed to write to engine: {}", e)))?;
        engine.stdin.flush().await
            .map_err(|e| ProbeError::Connection(format!("failed to write to engine: {}", e)))?;

        let mut reply = Vec::new();
        let mut buffer = String::new();
        loop {
            buffer.clear();
            let read = engine.stdout.read_line(&mut buffer).await
                .map_err(|e| ProbeError::Connection(format!("failed to read from engine: {}", e)))?;
            if read == 0 {
                return Err(ProbeError::Connection("engine closed its output".to_string()));
            }
            if is_sentinel(&buffer) {
                return Ok(reply);
            }
            reply.push(buffer.trim_end().to_string());
        }
    }
}

#[async_trait]
impl Session for ScilabSession {
    fn name(&self) -> &str {
        "Scilab"
    }

    async fn eval(&mut self, command: &str) -> ProbeResult<String> {
        let command = command.trim();
        if command.contains('\n') {
            return Err(ProbeError::Eval {
                command: command.to_string(),
                message: "command spans multiple lines".to_string(),
            });
        }
        debug!(command, "eval");
        let reply = self.exchange(&frame_command(command)).await?;
        interpret_reply(command, reply)
    }

    async fn push(&mut self, name: &str, values: &[i64]) -> ProbeResult<()> {
        validate_identifier(name)?;
        let path = self.scratch_path("push.bin").map_err(ProbeError::into_transfer)?;
        tokio::fs::write(&path, encode_f64_le(values)).await
            .map_err(|e| ProbeError::Transfer(format!("failed to write payload: {}", e)))?;
        self.eval(&push_command(name, values.len(), &path))
            .await
            .map_err(ProbeError::into_transfer)?;
        Ok(())
    }

    async fn pull(&mut self, name: &str) -> ProbeResult<Vec<f64>> {
        validate_identifier(name)?;
        let path = self.scratch_path("pull.bin").map_err(ProbeError::into_transfer)?;
        let output = self.eval(&pull_command(name, &path))
            .await
            .map_err(ProbeError::into_transfer)?;
        let count = parse_element_count(&output)?;
        let bytes = tokio::fs::read(&path).await
            .map_err(|e| ProbeError::Transfer(format!("failed to read payload: {}", e)))?;
        decode_f64_le(&bytes, count)
    }

    async fn close(&mut self) -> ProbeResult<()> {
        let Some(engine) = self.engine.take() else {
            return Ok(());
        };
        let Engine { mut child, mut stdin, stdout, scratch } = engine;

        if let Err(e) = stdin.write_all(b"exit\n").await {
            debug!("Engine stdin already closed: {}", e);
        }
        drop(stdin);
        drop(stdout);

        match timeout(self.shutdown_timeout, child.wait()).await {
            Ok(Ok(status)) => info!(%status, "Engine exited"),
            Ok(Err(e)) => return Err(ProbeError::Connection(format!("failed to wait for engine: {}", e))),
            Err(_) => {
                warn!("Engine did not exit within {:?}, killing it", self.shutdown_timeout);
                child.kill().await?;
            }
        }

        scratch.close()?;
        Ok(())
    }
}

async fn drain_stderr(stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(target: "scilab", "{}", line);
    }
}

fn handshake_line() -> String {
    format!("mprintf(\"\\n{}\\n\");\n", DONE_MARKER)
}

/// Wrap a command so that errors are reported and the reply is terminated.
fn frame_command(command: &str) -> String {
    format!(
        "try, {}, catch, mprintf(\"{}%s\\n\", strcat(lasterror(), \" \")), end; mprintf(\"\\n{}\\n\");\n",
        command, ERROR_MARKER, DONE_MARKER
    )
}

fn push_command(name: &str, len: usize, path: &Path) -> String {
    let file = scilab_string_literal(&path.to_string_lossy());
    format!(
        "{fd} = mopen({file}, \"rb\"); {name} = mget({len}, \"dl\", {fd}); mclose({fd});",
        fd = FD_VARIABLE,
    )
}

fn pull_command(name: &str, path: &Path) -> String {
    let file = scilab_string_literal(&path.to_string_lossy());
    format!(
        "{fd} = mopen({file}, \"wb\"); mput(double({name}(:))', \"dl\", {fd}); mclose({fd}); mprintf(\"%d\\n\", size({name}, \"*\"));",
        fd = FD_VARIABLE,
    )
}

/// Strip the interactive prompt the engine may prefix to its output.
fn strip_prompt(line: &str) -> &str {
    line.trim().trim_start_matches("-->").trim()
}

fn is_sentinel(line: &str) -> bool {
    strip_prompt(line) == DONE_MARKER
}

fn interpret_reply(command: &str, reply: Vec<String>) -> ProbeResult<String> {
    if let Some(message) = reply.iter().find_map(|line| strip_prompt(line).strip_prefix(ERROR_MARKER)) {
        return Err(ProbeError::Eval {
            command: command.to_string(),
            message: message.trim().to_string(),
        });
    }
    Ok(reply.join("\n"))
}
