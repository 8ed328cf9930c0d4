use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::time::timeout;

use crate::{MiError, Result};

type Input = Box<dyn AsyncWrite + Send + Unpin>;

/// Output pipes of a freshly spawned debugger, handed to the line readers.
pub struct ProcessOutput {
    pub stdout: ChildStdout,
    pub stderr: ChildStderr,
}

/// The debugger's input pipe. Kept apart from the process handle so a write
/// blocked on a full pipe never stands in the way of a kill.
pub struct CommandInput {
    input: Option<Input>,
}

impl CommandInput {
    pub fn new<W>(input: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            input: Some(Box::new(input)),
        }
    }

    pub fn is_open(&self) -> bool {
        self.input.is_some()
    }

    pub async fn write_line(&mut self, text: &str) -> Result<()> {
        let input = self.input.as_mut().ok_or(MiError::NotRunning)?;
        let mut line = Vec::with_capacity(text.len() + 1);
        line.extend_from_slice(text.as_bytes());
        line.push(b'\n');
        input.write_all(&line).await?;
        input.flush().await?;
        Ok(())
    }

    /// Closes the pipe. Safe to call more than once.
    pub async fn close(&mut self) {
        if let Some(mut input) = self.input.take() {
            let _ = input.shutdown().await;
        }
    }
}

/// Sole owner of the debugger process handle.
pub struct ProcessSupervisor {
    child: Option<Child>,
}

impl ProcessSupervisor {
    pub fn start(path: &str, args: &[String]) -> Result<(Self, CommandInput, ProcessOutput)> {
        let mut child = Command::new(path)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| MiError::ProcessSpawn {
                path: path.to_string(),
                source,
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| missing_pipe("stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| missing_pipe("stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| missing_pipe("stderr"))?;

        tracing::info!("Spawned debugger '{}' (pid {:?})", path, child.id());

        Ok((
            Self { child: Some(child) },
            CommandInput::new(stdin),
            ProcessOutput { stdout, stderr },
        ))
    }

    /// A supervisor for a session that talks to an arbitrary transport and
    /// owns no process.
    pub fn without_process() -> Self {
        Self { child: None }
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }

    /// Waits up to `grace` for the process to exit, then kills it. Safe to
    /// call more than once.
    pub async fn stop(&mut self, grace: Duration) -> Option<ExitStatus> {
        let mut child = self.child.take()?;
        match timeout(grace, child.wait()).await {
            Ok(Ok(status)) => {
                tracing::info!("Debugger exited with {}", status);
                Some(status)
            }
            Ok(Err(e)) => {
                tracing::warn!("Failed to wait for debugger exit: {}", e);
                let _ = child.kill().await;
                None
            }
            Err(_) => {
                tracing::warn!("Debugger did not exit within {:?}; killing it", grace);
                if let Err(e) = child.kill().await {
                    tracing::warn!("Failed to kill debugger: {}", e);
                }
                child.wait().await.ok()
            }
        }
    }
}

fn missing_pipe(name: &str) -> MiError {
    MiError::Io(std::io::Error::other(format!(
        "debugger spawn failed: missing {name} pipe"
    )))
}
