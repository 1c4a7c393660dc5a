//! Process memory sampling for build statistics.
//!
//! Reads `/proc/self/status` on Linux. Other platforms report `None` and the
//! statistics simply omit the memory column.

/// Current resident set size in megabytes.
pub fn resident_mb() -> Option<f64> {
    read_status_kb("VmRSS:").map(kb_to_mb)
}

/// Peak resident set size of this process in megabytes.
pub fn peak_resident_mb() -> Option<f64> {
    read_status_kb("VmHWM:").map(kb_to_mb)
}

#[allow(clippy::cast_precision_loss)]
fn kb_to_mb(kb: u64) -> f64 {
    kb as f64 / 1024.0
}

#[cfg(target_os = "linux")]
fn read_status_kb(key: &str) -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    parse_status_kb(&status, key)
}

#[cfg(not(target_os = "linux"))]
fn read_status_kb(_key: &str) -> Option<u64> {
    None
}

/// Extract a `Key:   1234 kB` line from a proc status dump.
fn parse_status_kb(status: &str, key: &str) -> Option<u64> {
    status
        .lines()
        .find_map(|line| line.strip_prefix(key))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|value| value.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status_kb() {
        let status = "Name:\tmdxc\nVmHWM:\t   20480 kB\nVmRSS:\t   10240 kB\n";
        assert_eq!(parse_status_kb(status, "VmRSS:"), Some(10240));
        assert_eq!(parse_status_kb(status, "VmHWM:"), Some(20480));
        assert_eq!(parse_status_kb(status, "VmSwap:"), None);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_resident_is_reported_on_linux() {
        assert!(resident_mb().unwrap() > 0.0);
        assert!(peak_resident_mb().unwrap() > 0.0);
    }
}
