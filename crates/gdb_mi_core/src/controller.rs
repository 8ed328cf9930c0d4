use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex;

use crate::session::Session;
use crate::state::SessionState;
use crate::types::{StartResponse, StopResponse};
use crate::{MiConfig, MiError, Result};

/// Owns at most one debugger session at a time.
///
/// The lifecycle lock only guards swapping the current session; commands run
/// against a cloned `Arc<Session>` so a slow command never blocks `stop`.
pub struct GdbController {
    config: MiConfig,
    current: Mutex<Option<Arc<Session>>>,
}

impl GdbController {
    pub fn new(config: MiConfig) -> Self {
        Self {
            config,
            current: Mutex::new(None),
        }
    }

    pub fn from_env() -> Self {
        Self::new(MiConfig::from_env())
    }

    pub fn config(&self) -> &MiConfig {
        &self.config
    }

    /// Spawns the configured debugger.
    pub async fn start(&self) -> Result<StartResponse> {
        let mut current = self.current.lock().await;
        self.reap(&mut current).await?;

        let session = Session::launch(&self.config)?;
        let response = StartResponse {
            state: SessionState::Started,
            debugger_pid: session.debugger_pid(),
            gdb_path: self.config.gdb_path.clone(),
        };
        *current = Some(Arc::new(session));
        tracing::info!("Debugger session started (pid {:?})", response.debugger_pid);
        Ok(response)
    }

    /// Starts a session over an already-connected MI transport instead of a
    /// spawned process.
    pub async fn start_with_transport<R, W>(&self, output: R, input: W) -> Result<StartResponse>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let mut current = self.current.lock().await;
        self.reap(&mut current).await?;

        *current = Some(Arc::new(Session::over_transport(&self.config, output, input)));
        tracing::info!("Debugger session started over transport");
        Ok(StartResponse {
            state: SessionState::Started,
            debugger_pid: None,
            gdb_path: self.config.gdb_path.clone(),
        })
    }

    /// Refuses while a live session exists; clears out a dead one.
    async fn reap(&self, current: &mut Option<Arc<Session>>) -> Result<()> {
        if let Some(session) = current.as_ref() {
            if session.is_live().await {
                return Err(MiError::AlreadyRunning {
                    pid: session.debugger_pid(),
                });
            }
        }
        if let Some(dead) = current.take() {
            tracing::debug!("Reaping exited debugger session");
            dead.shutdown().await;
        }
        Ok(())
    }

    /// Tears the current session down. Calling it with nothing running is
    /// not an error.
    pub async fn stop(&self) -> Result<StopResponse> {
        let session = self.current.lock().await.take();
        let Some(session) = session else {
            return Ok(StopResponse {
                state: SessionState::NotStarted,
                was_running: false,
                exit_status: None,
            });
        };

        let was_running = session.is_live().await;
        let status = session.shutdown().await;
        tracing::info!("Debugger session stopped");
        Ok(StopResponse {
            state: SessionState::NotStarted,
            was_running,
            exit_status: status.map(|s| s.to_string()),
        })
    }

    /// The live session, or `NotRunning`.
    pub(crate) async fn session(&self) -> Result<Arc<Session>> {
        let session = self.current.lock().await.clone();
        match session {
            Some(session) if session.is_live().await => Ok(session),
            Some(session) => {
                // Report how it died rather than a bare NotRunning.
                session.with_shared(|shared| shared.ensure_accepting()).await?;
                Err(MiError::NotRunning)
            }
            None => Err(MiError::NotRunning),
        }
    }

    /// The current session whether or not it is still live.
    pub(crate) async fn any_session(&self) -> Option<Arc<Session>> {
        self.current.lock().await.clone()
    }
}

impl Default for GdbController {
    fn default() -> Self {
        Self::new(MiConfig::default())
    }
}
