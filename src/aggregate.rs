use crate::error::ScanError;
use crate::types::{ProbeOutcome, ScanSummary};
use tokio::time::Instant;
use tracing::debug;

/// Collects the outcomes of one target's run into a [`ScanSummary`].
#[derive(Debug)]
pub struct Aggregator {
    target: String,
    started: Instant,
    scanned: usize,
    open: Vec<ProbeOutcome>,
}

impl Aggregator {
    /// `started` is the moment the run was handed to the worker pool.
    pub fn new(target: impl Into<String>, started: Instant) -> Self {
        Self {
            target: target.into(),
            started,
            scanned: 0,
            open: Vec::new(),
        }
    }

    pub fn record(&mut self, outcome: ProbeOutcome) {
        self.scanned += 1;
        if outcome.is_open() {
            debug!(host = %self.target, port = outcome.port, banner = ?outcome.banner, "open port");
            self.open.push(outcome);
        }
    }

    pub fn scanned(&self) -> usize {
        self.scanned
    }

    /// Finalize once the pool has signalled completion.
    ///
    /// Fails with [`ScanError::Incomplete`] if the number of recorded outcomes
    /// does not match the number of submitted ports.
    pub fn finish(mut self, submitted: usize) -> Result<ScanSummary, ScanError> {
        let elapsed = self.started.elapsed();
        if self.scanned != submitted {
            return Err(ScanError::Incomplete {
                expected: submitted,
                received: self.scanned,
            });
        }
        self.open.sort_by_key(|o| o.port);
        Ok(ScanSummary {
            target: self.target,
            scanned_count: self.scanned,
            elapsed,
            open_ports: self.open,
        })
    }
}
