//! Scripted stand-in for a GDB process, wired to a controller through
//! in-memory pipes.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines};
use tokio::time::{sleep, timeout};

use crate::{GdbController, MiConfig};

const PIPE_CAPACITY: usize = 64 * 1024;
const WAIT_LIMIT: Duration = Duration::from_secs(5);

pub(crate) struct FakeGdb {
    commands: Lines<BufReader<DuplexStream>>,
    output: Option<DuplexStream>,
}

impl FakeGdb {
    /// Next line the controller wrote, split into its token and command.
    pub async fn next_command(&mut self) -> (Option<u64>, String) {
        let line = timeout(WAIT_LIMIT, self.commands.next_line())
            .await
            .expect("timed out waiting for a command")
            .expect("command pipe failed")
            .expect("command pipe closed");
        let digits = line.chars().take_while(char::is_ascii_digit).count();
        let token = line[..digits].parse().ok();
        (token, line[digits..].to_string())
    }

    /// Asserts the next command and returns its token.
    pub async fn expect(&mut self, command: &str) -> u64 {
        let (token, received) = self.next_command().await;
        assert_eq!(received, command);
        token.expect("command was sent without a token")
    }

    pub async fn emit(&mut self, line: &str) {
        let output = self.output.as_mut().expect("output already closed");
        output.write_all(line.as_bytes()).await.unwrap();
        output.write_all(b"\n").await.unwrap();
        output.flush().await.unwrap();
    }

    pub async fn reply(&mut self, token: u64, record: &str) {
        self.emit(&format!("{token}{record}")).await;
    }

    /// Simulates the debugger dying: its output stream reaches end of file.
    pub fn close_output(&mut self) {
        self.output = None;
    }
}

pub(crate) fn test_config(command_timeout: Duration) -> MiConfig {
    MiConfig::new("gdb", command_timeout).with_shutdown_grace(Duration::from_millis(200))
}

/// A controller with a session already started against a fresh fake.
pub(crate) async fn connect(command_timeout: Duration) -> (Arc<GdbController>, FakeGdb) {
    let controller = Arc::new(GdbController::new(test_config(command_timeout)));
    let gdb = attach_fake(&controller).await;
    (controller, gdb)
}

/// Starts a new session on `controller` backed by a new fake.
pub(crate) async fn attach_fake(controller: &GdbController) -> FakeGdb {
    let (gdb_stdout, fake_stdout) = tokio::io::duplex(PIPE_CAPACITY);
    let (gdb_stdin, fake_stdin) = tokio::io::duplex(PIPE_CAPACITY);
    controller
        .start_with_transport(gdb_stdout, gdb_stdin)
        .await
        .expect("session starts over transport");
    FakeGdb {
        commands: BufReader::new(fake_stdin).lines(),
        output: Some(fake_stdout),
    }
}

/// Polls `check` until it returns true.
pub(crate) async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + WAIT_LIMIT;
    while !check().await {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached in time"
        );
        sleep(Duration::from_millis(10)).await;
    }
}
