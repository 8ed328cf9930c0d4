use crate::ops::validate_address;
use crate::state::Breakpoint;
use crate::types::BreakpointDeleted;
use crate::{GdbController, MiError, Result};

/// Inserts a software or hardware breakpoint at an absolute address.
/// Running out of hardware slots comes back as a plain `Command` error.
pub async fn insert(controller: &GdbController, address: &str, hardware: bool) -> Result<Breakpoint> {
    let address = validate_address(address)?;
    let session = controller.session().await?;

    let command = if hardware {
        format!("-break-insert -h *{address}")
    } else {
        format!("-break-insert *{address}")
    };
    let reply = session.execute(&command).await?;

    let breakpoint = reply
        .payload
        .get("bkpt")
        .and_then(|bkpt| Breakpoint::from_mi(bkpt, Some(address)))
        .ok_or_else(|| MiError::unexpected(&command, "reply has no usable bkpt tuple"))?;

    session
        .with_shared(|shared| shared.breakpoints.insert(breakpoint.clone()))
        .await;
    tracing::info!(
        "Breakpoint {} set at {} ({:?})",
        breakpoint.number,
        breakpoint.address,
        breakpoint.kind
    );
    Ok(breakpoint)
}

pub async fn delete(controller: &GdbController, number: u32) -> Result<BreakpointDeleted> {
    let session = controller.session().await?;
    session.execute(&format!("-break-delete {number}")).await?;
    session
        .with_shared(|shared| shared.breakpoints.remove(number))
        .await;
    Ok(BreakpointDeleted {
        number,
        deleted: true,
    })
}
