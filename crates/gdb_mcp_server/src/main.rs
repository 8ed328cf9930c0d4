use std::sync::Arc;

use gdb_mi_core::{ops, GdbController, MiConfig, MiError};
use rmcp::{
    handler::server::{tool::ToolRouter, wrapper::Parameters, ServerHandler},
    model::*,
    tool, tool_handler, tool_router, transport, ErrorData as McpError, ServiceExt,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
struct GdbAttachParams {
    /// Process id to attach to.
    pid: u32,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
struct GdbBreakpointParams {
    /// Absolute hex address, e.g. "0x401000".
    address: String,
    /// Use a hardware breakpoint slot.
    #[serde(default)]
    hardware: bool,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
struct GdbDeleteBreakpointParams {
    number: u32,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
struct GdbReadRegisterParams {
    /// Register name without the leading '$', e.g. "rip".
    register: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
struct GdbReadMemoryParams {
    /// Absolute hex address, e.g. "0x401000".
    address: String,
    /// Number of bytes to read, 1 to 4096.
    size: u64,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
struct GdbCommandParams {
    /// A single MI or CLI command line.
    command: String,
}

fn success<T: Serialize>(response: &T) -> Result<CallToolResult, McpError> {
    let value = serde_json::to_value(response)
        .map_err(|e| McpError::internal_error(format!("Failed to encode response: {e}"), None))?;
    Ok(CallToolResult::structured(value))
}

/// Controller failures are tool-level errors, never JSON-RPC errors.
fn tool_error(err: &MiError) -> CallToolResult {
    tracing::debug!("Tool failed with {}: {}", err.kind(), err);
    CallToolResult::structured_error(json!(err.to_payload()))
}

fn respond<T: Serialize>(result: gdb_mi_core::Result<T>) -> Result<CallToolResult, McpError> {
    match result {
        Ok(response) => success(&response),
        Err(err) => Ok(tool_error(&err)),
    }
}

#[derive(Clone)]
struct GdbMcpServer {
    tool_router: ToolRouter<Self>,
    controller: Arc<GdbController>,
}

#[tool_router]
impl GdbMcpServer {
    fn new(config: MiConfig) -> Self {
        Self {
            tool_router: Self::tool_router(),
            controller: Arc::new(GdbController::new(config)),
        }
    }

    #[tool(description = "Start a GDB session using the MI3 interpreter")]
    async fn gdb_start(&self) -> Result<CallToolResult, McpError> {
        respond(self.controller.start().await)
    }

    #[tool(description = "Stop the GDB session; outstanding commands fail with SessionStoppedError")]
    async fn gdb_stop(&self) -> Result<CallToolResult, McpError> {
        respond(self.controller.stop().await)
    }

    #[tool(description = "Attach GDB to a running process by pid")]
    async fn gdb_attach(
        &self,
        params: Parameters<GdbAttachParams>,
    ) -> Result<CallToolResult, McpError> {
        respond(ops::target::attach(&self.controller, params.0.pid).await)
    }

    #[tool(description = "Detach GDB from the current process")]
    async fn gdb_detach(&self) -> Result<CallToolResult, McpError> {
        respond(ops::target::detach(&self.controller).await)
    }

    #[tool(description = "Set a software or hardware breakpoint at a hex address")]
    async fn gdb_breakpoint(
        &self,
        params: Parameters<GdbBreakpointParams>,
    ) -> Result<CallToolResult, McpError> {
        let params = params.0;
        respond(ops::breakpoint::insert(&self.controller, &params.address, params.hardware).await)
    }

    #[tool(description = "Delete a breakpoint by number")]
    async fn gdb_delete_breakpoint(
        &self,
        params: Parameters<GdbDeleteBreakpointParams>,
    ) -> Result<CallToolResult, McpError> {
        respond(ops::breakpoint::delete(&self.controller, params.0.number).await)
    }

    #[tool(description = "Continue execution of the attached process")]
    async fn gdb_continue(&self) -> Result<CallToolResult, McpError> {
        respond(ops::exec::resume(&self.controller).await)
    }

    #[tool(description = "Interrupt the running process; the stop is reported by gdb_get_hits")]
    async fn gdb_interrupt(&self) -> Result<CallToolResult, McpError> {
        respond(ops::exec::interrupt(&self.controller).await)
    }

    #[tool(description = "Read the value of a CPU register")]
    async fn gdb_read_register(
        &self,
        params: Parameters<GdbReadRegisterParams>,
    ) -> Result<CallToolResult, McpError> {
        respond(ops::data::read_register(&self.controller, &params.0.register).await)
    }

    #[tool(description = "Read up to 4096 bytes of memory; returns hex and base64")]
    async fn gdb_read_memory(
        &self,
        params: Parameters<GdbReadMemoryParams>,
    ) -> Result<CallToolResult, McpError> {
        let params = params.0;
        respond(ops::data::read_memory(&self.controller, &params.address, params.size).await)
    }

    #[tool(description = "Drain stop events (breakpoint hits, signals, exits) recorded since the last call")]
    async fn gdb_get_hits(&self) -> Result<CallToolResult, McpError> {
        respond(ops::status::get_hits(&self.controller).await)
    }

    #[tool(description = "Report session state, breakpoints and recent debugger events")]
    async fn gdb_status(&self) -> Result<CallToolResult, McpError> {
        respond(ops::status::status(&self.controller).await)
    }

    #[tool(description = "Send a raw GDB/MI or CLI command and return its result and console output")]
    async fn gdb_command(
        &self,
        params: Parameters<GdbCommandParams>,
    ) -> Result<CallToolResult, McpError> {
        respond(ops::raw::raw(&self.controller, &params.0.command).await)
    }
}

#[tool_handler]
impl ServerHandler for GdbMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "GDB MCP Server: drive a single GDB/MI session (attach, breakpoints, registers, memory, stop events)".into(),
            ),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // stdout carries the MCP stream.
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let config = MiConfig::from_env();
    tracing::info!(
        "Starting GDB MCP Server on stdio (gdb: {}, timeout: {:?})...",
        config.gdb_path,
        config.command_timeout
    );

    let server = GdbMcpServer::new(config);
    server.serve(transport::stdio()).await?.waiting().await?;

    Ok(())
}
