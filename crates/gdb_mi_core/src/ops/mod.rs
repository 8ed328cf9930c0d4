//! One module per group of debugger operations. Each operation is a free
//! async function over a [`GdbController`](crate::GdbController).

pub mod breakpoint;
pub mod data;
pub mod exec;
pub mod raw;
pub mod status;
pub mod target;

use crate::{MiError, Result};

const MAX_ADDRESS_DIGITS: usize = 16;

/// Accepts `0x`-prefixed hex (optionally written `*0x...`) and returns the
/// bare address.
pub(crate) fn validate_address(address: &str) -> Result<&str> {
    let trimmed = address.trim();
    let bare = trimmed.strip_prefix('*').unwrap_or(trimmed).trim_start();
    let digits = bare
        .strip_prefix("0x")
        .or_else(|| bare.strip_prefix("0X"))
        .ok_or_else(|| MiError::InvalidAddressFormat(address.to_string()))?;

    if digits.is_empty()
        || digits.len() > MAX_ADDRESS_DIGITS
        || !digits.chars().all(|c| c.is_ascii_hexdigit())
    {
        return Err(MiError::InvalidAddressFormat(address.to_string()));
    }
    Ok(bare)
}
