use serde::Serialize;
use serde_json::Value;

use crate::events::{SideLogEntry, StopEvent};
use crate::state::{Breakpoint, SessionState};

#[derive(Debug, Clone, Serialize)]
pub struct StartResponse {
    pub state: SessionState,
    pub debugger_pid: Option<u32>,
    pub gdb_path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StopResponse {
    pub state: SessionState,
    pub was_running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_status: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttachResponse {
    pub state: SessionState,
    pub pid: u32,
    /// Result payload of `-target-attach`, usually empty.
    pub details: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct DetachResponse {
    pub state: SessionState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detached_pid: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BreakpointDeleted {
    pub number: u32,
    pub deleted: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecResponse {
    pub state: SessionState,
    pub result_class: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterValue {
    pub register: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemoryBlock {
    pub address: String,
    pub size: u64,
    /// Hex string exactly as the debugger returned it.
    pub contents: String,
    pub data_base64: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HitsResponse {
    pub hits: Vec<StopEvent>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub state: SessionState,
    pub running: bool,
    pub debugger_pid: Option<u32>,
    pub attached_pid: Option<u32>,
    pub breakpoints: Vec<Breakpoint>,
    pub pending_hits: usize,
    /// Stop events evicted because nobody drained them in time.
    pub dropped_hits: u64,
    pub outstanding_commands: usize,
    pub recent_events: Vec<SideLogEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RawCommandResponse {
    pub command: String,
    pub result_class: String,
    pub payload: Value,
    pub output: Vec<String>,
}
