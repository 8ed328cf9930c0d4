use crate::state::SessionState;
use crate::types::ExecResponse;
use crate::{GdbController, MiError, Result};

/// Resumes the inferior. If a stop is routed before `^running` comes back,
/// the session stays stopped.
pub async fn resume(controller: &GdbController) -> Result<ExecResponse> {
    let session = controller.session().await?;
    let stops_before = session
        .with_shared(|shared| {
            shared.require_inferior()?;
            Ok::<_, MiError>(shared.stop_seq)
        })
        .await?;

    let reply = session.execute("-exec-continue").await?;

    let state = session
        .with_shared(|shared| {
            if shared.stop_seq == stops_before && shared.state.has_inferior() {
                shared.state = SessionState::Running;
            }
            shared.state
        })
        .await;

    Ok(ExecResponse {
        state,
        result_class: reply.class.as_str().to_string(),
    })
}

/// Asks the debugger to stop the inferior. The resulting `*stopped` record
/// is filed like any other stop.
pub async fn interrupt(controller: &GdbController) -> Result<ExecResponse> {
    let session = controller.session().await?;
    session
        .with_shared(|shared| shared.require_inferior())
        .await?;

    let reply = session.execute("-exec-interrupt").await?;
    let state = session.with_shared(|shared| shared.state).await;

    Ok(ExecResponse {
        state,
        result_class: reply.class.as_str().to_string(),
    })
}
