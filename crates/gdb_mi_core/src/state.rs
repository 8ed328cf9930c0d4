use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::mi::MiValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    NotStarted,
    Started,
    Attached,
    Running,
    Stopped,
    /// After a successful detach; behaves like `Started`.
    Detached,
    /// The debugged inferior exited; behaves like `Started`.
    Exited,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Started => "started",
            Self::Attached => "attached",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Detached => "detached",
            Self::Exited => "exited",
        }
    }

    pub fn is_live(self) -> bool {
        self != Self::NotStarted
    }

    /// Attached, running or stopped: exec and data commands are allowed.
    pub fn has_inferior(self) -> bool {
        matches!(self, Self::Attached | Self::Running | Self::Stopped)
    }

    pub fn can_attach(self) -> bool {
        matches!(self, Self::Started | Self::Detached | Self::Exited)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakpointKind {
    Software,
    Hardware,
}

impl BreakpointKind {
    fn from_mi_type(kind: &str) -> Option<Self> {
        match kind {
            "breakpoint" => Some(Self::Software),
            "hw breakpoint" => Some(Self::Hardware),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Breakpoint {
    pub number: u32,
    /// As reported by the debugger; never reinterpreted.
    pub address: String,
    pub kind: BreakpointKind,
    pub enabled: bool,
}

impl Breakpoint {
    /// Builds a breakpoint from an MI `bkpt={...}` tuple. Returns `None` for
    /// watchpoints, catchpoints and sub-locations (`number="1.2"`).
    pub fn from_mi(bkpt: &MiValue, fallback_address: Option<&str>) -> Option<Self> {
        let number = bkpt.get_str("number")?.parse::<u32>().ok()?;
        let kind = BreakpointKind::from_mi_type(bkpt.get_str("type")?)?;
        let address = bkpt
            .get_str("addr")
            .filter(|addr| addr.starts_with("0x"))
            .or(fallback_address)
            .or_else(|| bkpt.get_str("addr"))?
            .to_string();
        let enabled = bkpt.get_str("enabled").map_or(true, |e| e == "y");

        Some(Self {
            number,
            address,
            kind,
            enabled,
        })
    }
}

#[derive(Debug, Default)]
pub struct BreakpointTable {
    entries: BTreeMap<u32, Breakpoint>,
}

impl BreakpointTable {
    pub fn insert(&mut self, breakpoint: Breakpoint) {
        self.entries.insert(breakpoint.number, breakpoint);
    }

    pub fn remove(&mut self, number: u32) -> Option<Breakpoint> {
        self.entries.remove(&number)
    }

    pub fn get(&self, number: u32) -> Option<&Breakpoint> {
        self.entries.get(&number)
    }

    pub fn list(&self) -> Vec<Breakpoint> {
        self.entries.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
