use std::collections::HashSet;

/// Build the ordered sequence of ports to probe.
///
/// A non-empty explicit `list` wins over the `start..=end` range. The range is
/// expected to be validated by the caller (see [`crate::config::ScanConfig::validate`]).
pub fn build_port_set(list: Option<&str>, start: u16, end: u16) -> Vec<u16> {
    match list.map(str::trim).filter(|s| !s.is_empty()) {
        Some(list) => parse_port_list(list),
        None => port_range(start, end),
    }
}

/// Parse a comma-separated port list.
///
/// The policy is permissive on purpose: entries that do not parse as an
/// integer, or that fall outside 1..=65535, are dropped without error.
/// Duplicates are dropped too, keeping the first occurrence, so the result is
/// in input order with each port at most once.
pub fn parse_port_list(s: &str) -> Vec<u16> {
    let mut out: Vec<u16> = Vec::new();
    let mut seen = HashSet::new();

    for raw in s.split(',') {
        let Some(p) = parse_port_str(raw.trim()) else {
            continue;
        };
        if seen.insert(p) {
            out.push(p);
        }
    }

    out
}

/// All ports from `start` to `end` inclusive, ascending. Empty if `start > end`.
pub fn port_range(start: u16, end: u16) -> Vec<u16> {
    (start..=end).collect()
}

fn parse_port_str(s: &str) -> Option<u16> {
    let val: i64 = s.parse().ok()?;
    if !(1..=65535).contains(&val) {
        return None;
    }
    Some(val as u16)
}
