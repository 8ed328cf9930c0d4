use crate::state::SessionState;
use crate::types::{AttachResponse, DetachResponse};
use crate::{GdbController, MiError, Result};

pub async fn attach(controller: &GdbController, pid: u32) -> Result<AttachResponse> {
    let session = controller.session().await?;
    session
        .with_shared(|shared| {
            shared.ensure_accepting()?;
            if shared.state.can_attach() {
                Ok(())
            } else {
                Err(MiError::AlreadyAttached {
                    pid: shared.attached_pid,
                })
            }
        })
        .await?;

    let reply = session.execute(&format!("-target-attach {pid}")).await?;

    let state = session
        .with_shared(|shared| {
            // The initial *stopped may already have moved us to Stopped.
            if !shared.state.has_inferior() {
                shared.state = SessionState::Attached;
            }
            shared.attached_pid = Some(pid);
            shared.state
        })
        .await;
    tracing::info!("Attached to pid {}", pid);

    Ok(AttachResponse {
        state,
        pid,
        details: reply.payload.to_json(),
    })
}

/// Detaches from the inferior. Once the debugger confirms, every other
/// command still waiting on it is failed with `SessionStopped`; a rejected
/// detach leaves them in flight.
pub async fn detach(controller: &GdbController) -> Result<DetachResponse> {
    let session = controller.session().await?;
    session
        .with_shared(|shared| shared.require_inferior())
        .await?;

    session.execute("-target-detach").await?;

    let (cancelled, detached_pid) = session
        .with_shared(|shared| {
            let cancelled = shared.correlator.fail_all(|| MiError::SessionStopped);
            shared.state = SessionState::Detached;
            (cancelled, shared.attached_pid.take())
        })
        .await;
    if cancelled > 0 {
        tracing::info!("Cancelled {} outstanding command(s) on detach", cancelled);
    }
    tracing::info!("Detached from pid {:?}", detached_pid);

    Ok(DetachResponse {
        state: SessionState::Detached,
        detached_pid,
    })
}
