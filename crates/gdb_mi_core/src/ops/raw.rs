use crate::types::RawCommandResponse;
use crate::{GdbController, MiError, Result};

/// Sends an arbitrary MI or CLI command without a token and returns the
/// result along with any stream output printed before it.
pub async fn raw(controller: &GdbController, command: &str) -> Result<RawCommandResponse> {
    let command = normalize(command)?;
    let session = controller.session().await?;
    let reply = session.execute_raw(command).await?;

    Ok(RawCommandResponse {
        command: command.to_string(),
        result_class: reply.class.as_str().to_string(),
        payload: reply.payload.to_json(),
        output: reply.output,
    })
}

/// Trims the command and strips a caller-supplied token, which would
/// otherwise collide with the correlator's own.
fn normalize(command: &str) -> Result<&str> {
    if command.contains(['\n', '\r']) {
        return Err(MiError::InvalidCommand(
            "Command must be a single line".to_string(),
        ));
    }
    let command = command
        .trim()
        .trim_start_matches(|c: char| c.is_ascii_digit())
        .trim_start();
    if command.is_empty() {
        return Err(MiError::InvalidCommand("Command is empty".to_string()));
    }
    Ok(command)
}
