use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::mi::MiValue;
use crate::ops::validate_address;
use crate::types::{MemoryBlock, RegisterValue};
use crate::{GdbController, MiError, Result};

/// Largest memory read accepted in one call.
pub const MAX_MEMORY_READ: u64 = 4096;

pub async fn read_register(controller: &GdbController, register: &str) -> Result<RegisterValue> {
    let name = validate_register(register)?;
    let session = controller.session().await?;
    session
        .with_shared(|shared| shared.require_inferior())
        .await?;

    let command = format!("-data-evaluate-expression ${name}");
    let reply = session.execute(&command).await?;
    let value = reply
        .payload
        .get_str("value")
        .ok_or_else(|| MiError::unexpected(&command, "reply has no value field"))?;

    Ok(RegisterValue {
        register: name.to_string(),
        value: value.to_string(),
    })
}

/// Reads `size` bytes at `address`. The size is checked before anything
/// else, so an oversized request never reaches the debugger.
pub async fn read_memory(controller: &GdbController, address: &str, size: u64) -> Result<MemoryBlock> {
    if size == 0 || size > MAX_MEMORY_READ {
        return Err(MiError::SizeLimit {
            requested: size,
            max: MAX_MEMORY_READ,
        });
    }
    let address = validate_address(address)?;
    let session = controller.session().await?;
    session
        .with_shared(|shared| shared.require_inferior())
        .await?;

    let command = format!("-data-read-memory-bytes {address} {size}");
    let reply = session.execute(&command).await?;

    let contents = memory_contents(&reply.payload)
        .ok_or_else(|| MiError::unexpected(&command, "reply has no memory contents"))?;
    let bytes = hex::decode(&contents).map_err(|e| {
        MiError::unexpected(&command, format!("memory contents are not valid hex: {e}"))
    })?;

    Ok(MemoryBlock {
        address: address.to_string(),
        size: bytes.len() as u64,
        data_base64: STANDARD.encode(&bytes),
        contents,
    })
}

fn validate_register(register: &str) -> Result<&str> {
    let trimmed = register.trim();
    let name = trimmed.strip_prefix('$').unwrap_or(trimmed);
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
    if valid {
        Ok(name)
    } else {
        Err(MiError::InvalidCommand(format!(
            "Invalid register name '{register}'"
        )))
    }
}

/// Joins the `contents` of every block in `memory=[{...},...]`.
fn memory_contents(payload: &MiValue) -> Option<String> {
    let blocks = payload.get("memory")?.as_list()?;
    let mut contents = String::new();
    for block in blocks {
        contents.push_str(block.get_str("contents")?);
    }
    if contents.is_empty() {
        None
    } else {
        Some(contents)
    }
}
