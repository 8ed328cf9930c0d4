use std::time::Duration;

use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::state::SessionState;

#[derive(Error, Debug)]
pub enum MiError {
    #[error("Failed to spawn debugger at '{path}': {source}")]
    ProcessSpawn {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Debugger is not running. Call gdb_start first.")]
    NotRunning,

    #[error("Debugger is already running. Call gdb_stop first.")]
    AlreadyRunning { pid: Option<u32> },

    #[error("No process attached (session is {state}). Call gdb_attach first.")]
    NotAttached { state: SessionState },

    #[error("Already attached to a process. Detach before attaching again.")]
    AlreadyAttached { pid: Option<u32> },

    #[error("Command '{command}' timed out after {timeout:?}")]
    CommandTimeout { command: String, timeout: Duration },

    #[error("{message}")]
    Command {
        command: String,
        message: String,
        code: Option<String>,
    },

    #[error("Requested {requested} bytes; size must be between 1 and {max} bytes")]
    SizeLimit { requested: u64, max: u64 },

    #[error("Invalid address format: '{0}' (expected a hex literal such as 0x401000)")]
    InvalidAddressFormat(String),

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Debugger session was stopped while the command was outstanding")]
    SessionStopped,

    #[error("Debugger process exited unexpectedly{}", .status.as_ref().map(|s| format!(" ({s})")).unwrap_or_default())]
    ProcessExited { status: Option<String> },

    #[error("Unexpected response to '{command}': {reason}")]
    UnexpectedResponse { command: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Structured failure value handed to the tool-call layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorPayload {
    pub error_kind: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl MiError {
    pub fn command(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Command {
            command: command.into(),
            message: message.into(),
            code: None,
        }
    }

    pub fn unexpected(command: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnexpectedResponse {
            command: command.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::ProcessSpawn { .. } => "ProcessSpawnError",
            Self::NotRunning => "NotRunningError",
            Self::AlreadyRunning { .. } => "AlreadyRunningError",
            Self::NotAttached { .. } => "NotAttachedError",
            Self::AlreadyAttached { .. } => "AlreadyAttachedError",
            Self::CommandTimeout { .. } => "CommandTimeoutError",
            Self::Command { .. } => "CommandError",
            Self::SizeLimit { .. } => "SizeLimitError",
            Self::InvalidAddressFormat(_) => "InvalidAddressFormatError",
            Self::InvalidCommand(_) => "InvalidCommandError",
            Self::SessionStopped => "SessionStoppedError",
            Self::ProcessExited { .. } => "ProcessExitedError",
            Self::UnexpectedResponse { .. } => "UnexpectedResponseError",
            Self::Io(_) => "IoError",
        }
    }

    pub fn details(&self) -> Option<Value> {
        match self {
            Self::ProcessSpawn { path, source } => Some(json!({
                "path": path,
                "os_error": source.to_string(),
            })),
            Self::AlreadyRunning { pid } => pid.map(|pid| json!({ "pid": pid })),
            Self::NotAttached { state } => Some(json!({ "state": state })),
            Self::AlreadyAttached { pid } => pid.map(|pid| json!({ "pid": pid })),
            Self::CommandTimeout { command, timeout } => Some(json!({
                "command": command,
                "timeout_secs": timeout.as_secs_f64(),
            })),
            Self::Command { command, code, .. } => {
                let mut details = json!({ "command": command });
                if let Some(code) = code {
                    details["code"] = json!(code);
                }
                Some(details)
            }
            Self::SizeLimit { requested, max } => Some(json!({
                "requested": requested,
                "max": max,
            })),
            Self::InvalidAddressFormat(address) => Some(json!({ "address": address })),
            Self::ProcessExited { status } => status.as_ref().map(|s| json!({ "status": s })),
            Self::UnexpectedResponse { command, .. } => Some(json!({ "command": command })),
            Self::NotRunning | Self::InvalidCommand(_) | Self::SessionStopped | Self::Io(_) => None,
        }
    }

    pub fn to_payload(&self) -> ErrorPayload {
        ErrorPayload {
            error_kind: self.kind(),
            message: self.to_string(),
            details: self.details(),
        }
    }
}
