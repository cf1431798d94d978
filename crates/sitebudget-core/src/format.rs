//! Human-readable durations for listings.

/// `"{m} min {s} sec"`, used for remaining budget.
pub fn format_time(total_seconds: i64) -> String {
    if total_seconds < 0 {
        return "Invalid time".to_string();
    }
    format!("{} min {} sec", total_seconds / 60, total_seconds % 60)
}

/// Compact usage format: `1h 5m`, `2h`, `3m 20s`, `4m`, `45s`.
pub fn format_time_tracking(total_seconds: i64) -> String {
    if total_seconds < 0 {
        return "0s".to_string();
    }

    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    match (hours, minutes, seconds) {
        (0, 0, s) => format!("{s}s"),
        (0, m, 0) => format!("{m}m"),
        (0, m, s) => format!("{m}m {s}s"),
        (h, 0, _) => format!("{h}h"),
        (h, m, _) => format!("{h}h {m}m"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_time_minutes_and_seconds() {
        assert_eq!(format_time(0), "0 min 0 sec");
        assert_eq!(format_time(125), "2 min 5 sec");
        assert_eq!(format_time(-1), "Invalid time");
    }

    #[test]
    fn format_time_tracking_variants() {
        assert_eq!(format_time_tracking(45), "45s");
        assert_eq!(format_time_tracking(240), "4m");
        assert_eq!(format_time_tracking(200), "3m 20s");
        assert_eq!(format_time_tracking(7200), "2h");
        assert_eq!(format_time_tracking(3930), "1h 5m");
        assert_eq!(format_time_tracking(-3), "0s");
    }
}
