use crate::error::ConfigError;
use crate::ports;
use crate::probe::ProbeOptions;
use crate::scanner::ScanOptions;
use std::time::Duration;

/// Fully resolved run configuration, independent of how it was parsed.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub targets: Vec<String>,
    pub start_port: i64,
    pub end_port: i64,
    /// Explicit comma-separated port list; overrides the range when non-empty.
    pub ports: Option<String>,
    pub workers: usize,
    pub timeout: Duration,
    pub banner_timeout: Duration,
    pub grab_banner: bool,
    pub show_progress: bool,
}

impl ScanConfig {
    /// Reject configurations that must not reach the scanner.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let (start, end) = (self.start_port, self.end_port);
        if start < 1 || end > 65535 || start > end {
            return Err(ConfigError::InvalidPortRange { start, end });
        }
        if self.workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.targets.is_empty() {
            return Err(ConfigError::NoTargets);
        }
        Ok(())
    }

    /// Ports to probe for every target. Call after [`validate`](Self::validate).
    pub fn port_set(&self) -> Vec<u16> {
        let start = self.start_port.clamp(1, 65535) as u16;
        let end = self.end_port.clamp(1, 65535) as u16;
        ports::build_port_set(self.ports.as_deref(), start, end)
    }

    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            workers: self.workers,
            probe: ProbeOptions {
                timeout: self.timeout,
                grab_banner: self.grab_banner,
                banner_timeout: self.banner_timeout,
            },
            show_progress: self.show_progress,
        }
    }
}

/// Resolve the target list: a non-empty comma list wins over the single default.
/// Entries are trimmed and blanks dropped.
pub fn parse_targets(target: &str, targets: Option<&str>) -> Vec<String> {
    let raw = match targets.map(str::trim).filter(|s| !s.is_empty()) {
        Some(list) => list,
        None => target,
    };
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
