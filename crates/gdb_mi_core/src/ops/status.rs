use crate::state::SessionState;
use crate::types::{HitsResponse, StatusResponse};
use crate::{GdbController, Result};

const RECENT_EVENTS_IN_STATUS: usize = 20;

/// Drains every stop filed since the last call. Never fails; with no
/// session there is simply nothing to drain.
pub async fn get_hits(controller: &GdbController) -> Result<HitsResponse> {
    let hits = match controller.any_session().await {
        Some(session) => session.with_shared(|shared| shared.hits.drain()).await,
        None => Vec::new(),
    };
    Ok(HitsResponse {
        count: hits.len(),
        hits,
    })
}

pub async fn status(controller: &GdbController) -> Result<StatusResponse> {
    let Some(session) = controller.any_session().await else {
        return Ok(StatusResponse {
            state: SessionState::NotStarted,
            running: false,
            debugger_pid: None,
            attached_pid: None,
            breakpoints: Vec::new(),
            pending_hits: 0,
            dropped_hits: 0,
            outstanding_commands: 0,
            recent_events: Vec::new(),
        });
    };

    let debugger_pid = session.debugger_pid();
    let status = session
        .with_shared(|shared| {
            let live = shared.termination.is_none();
            StatusResponse {
                state: shared.state,
                running: live,
                debugger_pid: debugger_pid.filter(|_| live),
                attached_pid: shared.attached_pid,
                breakpoints: shared.breakpoints.list(),
                pending_hits: shared.hits.len(),
                dropped_hits: shared.hits.dropped(),
                outstanding_commands: shared.correlator.outstanding(),
                recent_events: shared.side_log.recent(RECENT_EVENTS_IN_STATUS),
            }
        })
        .await;
    Ok(status)
}
