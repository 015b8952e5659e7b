//! Time formatting helpers

/// Format microseconds as `MM:SS.mmm`, or `HH:MM:SS.mmm` past an hour
pub fn format_micros(micros: i64) -> String {
    let sign = if micros < 0 { "-" } else { "" };
    let total_ms = micros.unsigned_abs() / 1_000;
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let seconds = (total_ms % 60_000) / 1_000;
    let milliseconds = total_ms % 1_000;

    if hours > 0 {
        format!(
            "{}{:02}:{:02}:{:02}.{:03}",
            sign, hours, minutes, seconds, milliseconds
        )
    } else {
        format!("{}{:02}:{:02}.{:03}", sign, minutes, seconds, milliseconds)
    }
}
