use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Reachability of a single TCP port.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PortState {
    Open,
    Closed,
}

impl PortState {
    pub fn as_str(self) -> &'static str {
        match self {
            PortState::Open => "open",
            PortState::Closed => "closed",
        }
    }
}

impl fmt::Display for PortState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of probing one port. Built once by the worker that probed it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub port: u16,
    pub state: PortState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banner: Option<String>,
}

impl ProbeOutcome {
    pub fn open(port: u16, banner: Option<String>) -> Self {
        Self {
            port,
            state: PortState::Open,
            banner,
        }
    }

    pub fn closed(port: u16) -> Self {
        Self {
            port,
            state: PortState::Closed,
            banner: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.state == PortState::Open
    }
}

/// Finalized per-target aggregation of all probe outcomes.
///
/// `open_ports` only ever holds outcomes whose state is [`PortState::Open`],
/// sorted by port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSummary {
    pub target: String,
    pub scanned_count: usize,
    pub elapsed: Duration,
    pub open_ports: Vec<ProbeOutcome>,
}

impl ScanSummary {
    pub fn open_count(&self) -> usize {
        self.open_ports.len()
    }
}
