use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{timeout, timeout_at, Instant};

use crate::dispatcher::{CommandReply, Correlator, Outcome};
use crate::events::{self, HitQueue, SideLog};
use crate::mi::{parse_line, Record};
use crate::process::{CommandInput, ProcessSupervisor};
use crate::reader::{spawn_line_reader, LineEvent, LineSource};
use crate::state::{BreakpointTable, SessionState};
use crate::{MiConfig, MiError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Termination {
    Stopped,
    Exited,
}

/// Everything the router task and the callers both touch. Guarded by one
/// mutex; nothing in here awaits.
#[derive(Debug)]
pub(crate) struct SessionShared {
    pub state: SessionState,
    pub termination: Option<Termination>,
    pub attached_pid: Option<u32>,
    /// Bumped on every stop record, filed or not.
    pub stop_seq: u64,
    pub correlator: Correlator,
    pub breakpoints: BreakpointTable,
    pub hits: HitQueue,
    pub side_log: SideLog,
}

impl SessionShared {
    pub fn new() -> Self {
        Self {
            state: SessionState::Started,
            termination: None,
            attached_pid: None,
            stop_seq: 0,
            correlator: Correlator::default(),
            breakpoints: BreakpointTable::default(),
            hits: HitQueue::default(),
            side_log: SideLog::default(),
        }
    }

    pub fn ensure_accepting(&self) -> Result<()> {
        match self.termination {
            None => Ok(()),
            Some(Termination::Stopped) => Err(MiError::SessionStopped),
            Some(Termination::Exited) => Err(MiError::ProcessExited { status: None }),
        }
    }

    pub fn require_inferior(&self) -> Result<()> {
        self.ensure_accepting()?;
        if self.state.has_inferior() {
            Ok(())
        } else {
            Err(MiError::NotAttached { state: self.state })
        }
    }

    fn route(&mut self, record: Record) {
        match record {
            Record::Result(result) => self.correlator.resolve(result),
            Record::Async(async_record) => events::route_async(self, async_record),
            Record::Stream(stream) => {
                if !self.correlator.capture_stream(&stream.text) {
                    events::log_stream(self, &stream);
                }
            }
            Record::Prompt => {}
        }
    }

    fn output_closed(&mut self) {
        if self.termination.is_some() {
            return;
        }
        self.termination = Some(Termination::Exited);
        self.state = SessionState::NotStarted;
        self.attached_pid = None;
        let failed = self
            .correlator
            .fail_all(|| MiError::ProcessExited { status: None });
        tracing::warn!(
            "Debugger output closed unexpectedly; failed {} outstanding command(s)",
            failed
        );
    }
}

/// One live debugger: its process, the reader and router tasks, and the
/// shared state they feed.
pub(crate) struct Session {
    shared: Arc<Mutex<SessionShared>>,
    input: Mutex<CommandInput>,
    supervisor: Mutex<ProcessSupervisor>,
    raw_lock: Mutex<()>,
    debugger_pid: Option<u32>,
    command_timeout: Duration,
    shutdown_grace: Duration,
    tasks: Vec<JoinHandle<()>>,
}

impl Session {
    pub fn launch(config: &MiConfig) -> Result<Self> {
        let (supervisor, input, output) =
            ProcessSupervisor::start(&config.gdb_path, &config.gdb_args)?;
        let (tx, rx) = mpsc::unbounded_channel();
        let readers = vec![
            spawn_line_reader(output.stdout, tx.clone(), LineSource::Primary),
            spawn_line_reader(output.stderr, tx, LineSource::Secondary),
        ];
        Ok(Self::assemble(config, supervisor, input, rx, readers))
    }

    pub fn over_transport<R, W>(config: &MiConfig, output: R, input: W) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let readers = vec![spawn_line_reader(output, tx, LineSource::Primary)];
        Self::assemble(
            config,
            ProcessSupervisor::without_process(),
            CommandInput::new(input),
            rx,
            readers,
        )
    }

    fn assemble(
        config: &MiConfig,
        supervisor: ProcessSupervisor,
        input: CommandInput,
        lines: mpsc::UnboundedReceiver<LineEvent>,
        mut tasks: Vec<JoinHandle<()>>,
    ) -> Self {
        let shared = Arc::new(Mutex::new(SessionShared::new()));
        tasks.push(tokio::spawn(route_lines(lines, shared.clone())));
        Self {
            shared,
            debugger_pid: supervisor.pid(),
            supervisor: Mutex::new(supervisor),
            input: Mutex::new(input),
            raw_lock: Mutex::new(()),
            command_timeout: config.command_timeout,
            shutdown_grace: config.shutdown_grace,
            tasks,
        }
    }

    pub fn debugger_pid(&self) -> Option<u32> {
        self.debugger_pid
    }

    pub async fn is_live(&self) -> bool {
        self.shared.lock().await.termination.is_none()
    }

    /// Runs `f` under the session lock. `f` must not block.
    pub async fn with_shared<T>(&self, f: impl FnOnce(&mut SessionShared) -> T) -> T {
        let mut shared = self.shared.lock().await;
        f(&mut shared)
    }

    /// Sends a token-correlated command and waits for its result record.
    pub async fn execute(&self, command: &str) -> Result<CommandReply> {
        let (token, rx) = {
            let mut shared = self.shared.lock().await;
            shared.ensure_accepting()?;
            shared.correlator.register(command)
        };
        self.round_trip(command, &format!("{token}{command}"), rx, Some(token))
            .await
    }

    /// Sends an untokenized command; only one may be in flight at a time.
    pub async fn execute_raw(&self, command: &str) -> Result<CommandReply> {
        let _in_flight = self.raw_lock.lock().await;
        let rx = {
            let mut shared = self.shared.lock().await;
            shared.ensure_accepting()?;
            shared.correlator.register_untokenized(command)
        };
        self.round_trip(command, command, rx, None).await
    }

    /// Writes `line` and waits for its result. The write and the wait share
    /// one deadline, and a write stuck on a full pipe is abandoned as soon as
    /// the waiter is resolved (e.g. by `shutdown`).
    async fn round_trip(
        &self,
        command: &str,
        line: &str,
        mut rx: oneshot::Receiver<Outcome>,
        token: Option<u64>,
    ) -> Result<CommandReply> {
        let deadline = Instant::now() + self.command_timeout;
        tracing::debug!("-> {}", line);

        let write = async { self.input.lock().await.write_line(line).await };
        let written = tokio::select! {
            written = timeout_at(deadline, write) => written,
            outcome = &mut rx => return outcome.unwrap_or(Err(MiError::SessionStopped)),
        };
        match written {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                let mut shared = self.shared.lock().await;
                match token {
                    Some(token) => {
                        shared.correlator.expire(token);
                    }
                    None => shared.correlator.cancel_untokenized(),
                }
                shared.ensure_accepting()?;
                return Err(err);
            }
            Err(_) => return self.expire(command, &mut rx, token).await,
        }

        match timeout_at(deadline, &mut rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(MiError::SessionStopped),
            Err(_) => self.expire(command, &mut rx, token).await,
        }
    }

    async fn expire(
        &self,
        command: &str,
        rx: &mut oneshot::Receiver<Outcome>,
        token: Option<u64>,
    ) -> Result<CommandReply> {
        let expired = {
            let mut shared = self.shared.lock().await;
            match token {
                Some(token) => shared.correlator.expire(token),
                None => shared.correlator.expire_untokenized(),
            }
        };
        if !expired {
            // Resolved (or failed by teardown) before the timer fired.
            if let Ok(outcome) = rx.try_recv() {
                return outcome;
            }
        }
        tracing::warn!(
            "Command '{}' timed out after {:?}",
            command,
            self.command_timeout
        );
        Err(MiError::CommandTimeout {
            command: command.to_string(),
            timeout: self.command_timeout,
        })
    }

    /// Fails outstanding commands, asks the debugger to exit, and tears the
    /// process and tasks down. Every step is bounded by the shutdown grace.
    pub async fn shutdown(&self) -> Option<ExitStatus> {
        let was_live = {
            let mut shared = self.shared.lock().await;
            let was_live = shared.termination.is_none();
            shared.termination = Some(Termination::Stopped);
            shared.state = SessionState::NotStarted;
            shared.attached_pid = None;
            let failed = shared.correlator.fail_all(|| MiError::SessionStopped);
            if failed > 0 {
                tracing::info!("Cancelled {} outstanding command(s) on stop", failed);
            }
            was_live
        };

        // Every waiter is failed by now, so a stuck writer lets go of the
        // input; the lock wait is still bounded in case it has not yet.
        match timeout(self.shutdown_grace, self.input.lock()).await {
            Ok(mut input) => {
                if was_live && input.is_open() {
                    let _ = timeout(self.shutdown_grace, input.write_line("-gdb-exit")).await;
                }
                let _ = timeout(self.shutdown_grace, input.close()).await;
            }
            Err(_) => tracing::warn!("Debugger input is blocked; skipping -gdb-exit"),
        }

        let status = self.supervisor.lock().await.stop(self.shutdown_grace).await;

        for task in &self.tasks {
            task.abort();
        }
        status
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Router task: the single consumer of the line channel.
async fn route_lines(
    mut lines: mpsc::UnboundedReceiver<LineEvent>,
    shared: Arc<Mutex<SessionShared>>,
) {
    while let Some(event) = lines.recv().await {
        match event {
            LineEvent::Line(line) => {
                tracing::trace!("<- {}", line);
                let record = parse_line(&line);
                shared.lock().await.route(record);
            }
            LineEvent::Closed => shared.lock().await.output_closed(),
        }
    }
}
