//! Human-readable and JSON renderings of a [`ScanSummary`].

use crate::types::{ProbeOutcome, ScanSummary};
use serde::Serialize;
use std::fmt::Write as _;
use std::time::Duration;

/// JSON shape of a summary. `ports` is left out when nothing is open.
#[derive(Serialize, Debug)]
pub struct SummaryRecord<'a> {
    pub target: &'a str,
    pub open_ports: usize,
    pub scanned_ports: usize,
    pub time_taken_ms: u64,
    #[serde(skip_serializing_if = "<[ProbeOutcome]>::is_empty")]
    pub ports: &'a [ProbeOutcome],
}

impl<'a> From<&'a ScanSummary> for SummaryRecord<'a> {
    fn from(s: &'a ScanSummary) -> Self {
        Self {
            target: &s.target,
            open_ports: s.open_count(),
            scanned_ports: s.scanned_count,
            time_taken_ms: s.elapsed.as_millis() as u64,
            ports: &s.open_ports,
        }
    }
}

pub fn render_json(summary: &ScanSummary) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&SummaryRecord::from(summary))
}

pub fn render_text(summary: &ScanSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== Scan Results for {} ===", summary.target);
    let _ = writeln!(out, "Scanned ports: {}", summary.scanned_count);
    let _ = writeln!(out, "Open ports: {}", summary.open_count());
    let _ = writeln!(out, "Scan duration: {}", format_elapsed(summary.elapsed));

    if !summary.open_ports.is_empty() {
        out.push('\n');
        out.push_str("OPEN PORTS:\n");
        for o in &summary.open_ports {
            out.push_str(&port_line(o));
            out.push('\n');
        }
    }
    out
}

/// `"<port>/tcp <state>"`, with `" | <banner>"` when a banner was read.
pub fn port_line(o: &ProbeOutcome) -> String {
    match &o.banner {
        Some(b) => format!("{}/tcp {} | {}", o.port, o.state, b),
        None => format!("{}/tcp {}", o.port, o.state),
    }
}

/// Elapsed time rounded to the millisecond, e.g. `0s`, `250ms`, `1.234s`, `1m1.5s`, `1h0m5s`.
pub fn format_elapsed(d: Duration) -> String {
    let ms = (d.as_micros() + 500) / 1000;
    if ms == 0 {
        return "0s".to_string();
    }
    if ms < 1000 {
        return format!("{ms}ms");
    }

    let hours = ms / 3_600_000;
    let minutes = (ms / 60_000) % 60;
    let secs = (ms / 1000) % 60;
    let frac = ms % 1000;

    let mut out = String::new();
    if hours > 0 {
        let _ = write!(out, "{hours}h");
    }
    if hours > 0 || minutes > 0 {
        let _ = write!(out, "{minutes}m");
    }
    if frac == 0 {
        let _ = write!(out, "{secs}s");
    } else {
        let frac = format!("{frac:03}");
        let _ = write!(out, "{secs}.{}s", frac.trim_end_matches('0'));
    }
    out
}
