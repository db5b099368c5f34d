//! Error types surfaced by the scanning core.
//!
//! Per-port network failures are not errors: they are folded into
//! [`PortState::Closed`](crate::types::PortState). Only configuration problems
//! and conditions that mean the scanner itself is malfunctioning end up here.

use std::io;
use thiserror::Error;

/// Invalid run parameters, detected before any scan starts.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid port range {start}-{end} (expected 1 <= start <= end <= 65535)")]
    InvalidPortRange { start: i64, end: i64 },

    #[error("worker count must be at least 1")]
    NoWorkers,

    #[error("connect timeout must be greater than zero")]
    ZeroTimeout,

    #[error("no targets to scan")]
    NoTargets,
}

/// Run-level failures of a target scan.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("resource exhaustion while connecting (lower --workers or raise the open file limit): {0}")]
    ResourceExhausted(#[source] io::Error),

    #[error("scan cancelled after {completed} of {submitted} ports")]
    Cancelled { completed: usize, submitted: usize },

    #[error("scan finished with {received} outcomes for {expected} submitted ports")]
    Incomplete { expected: usize, received: usize },

    #[error("scan worker panicked: {0}")]
    WorkerPanicked(String),
}

/// Whether a connect error means the process ran out of descriptors, as
/// opposed to the remote port being unreachable.
pub fn is_resource_exhaustion(err: &io::Error) -> bool {
    match err.raw_os_error() {
        #[cfg(unix)]
        Some(code) => code == libc::EMFILE || code == libc::ENFILE,
        // WSAEMFILE
        #[cfg(windows)]
        Some(code) => code == 10024,
        #[cfg(not(any(unix, windows)))]
        Some(_) => false,
        None => false,
    }
}
