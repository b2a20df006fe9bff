use std::time::Duration;

/// Format a playback position as `m:ss`, flooring to whole seconds.
/// Minutes are not wrapped into hours, so an hour-long session reads `60:00`.
pub fn format_clock(position: Duration) -> String {
    let secs = position.as_secs();
    format!("{}:{:02}", secs / 60, secs % 60)
}

/// Whole milliseconds in a duration, saturating at `u64::MAX`.
pub fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
