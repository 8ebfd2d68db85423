use crate::error::WorkerError;

/// Subtitle clock style. The two differ only in the millisecond separator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampStyle {
    /// `HH:MM:SS,mmm`
    Srt,
    /// `HH:MM:SS.mmm`
    Vtt,
}

impl TimestampStyle {
    fn separator(self) -> char {
        match self {
            Self::Srt => ',',
            Self::Vtt => '.',
        }
    }
}

/// Format a seconds offset as a fixed-width subtitle clock.
///
/// Milliseconds are truncated, not rounded. Hours grow past two digits for
/// offsets of 100 hours or more.
pub fn format_timestamp(seconds: f64, style: TimestampStyle) -> Result<String, WorkerError> {
    if !seconds.is_finite() {
        return Err(WorkerError::InvalidInput(format!(
            "timestamp must be finite, got {}",
            seconds
        )));
    }
    if seconds < 0.0 {
        return Err(WorkerError::InvalidInput(format!(
            "timestamp must be non-negative, got {}",
            seconds
        )));
    }

    let whole = seconds.floor() as u64;
    let hours = whole / 3600;
    let minutes = (whole % 3600) / 60;
    let secs = whole % 60;
    let millis = ((seconds % 1.0) * 1000.0).floor() as u64;

    Ok(format!(
        "{:02}:{:02}:{:02}{}{:03}",
        hours,
        minutes,
        secs,
        style.separator(),
        millis
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero() {
        assert_eq!(format_timestamp(0.0, TimestampStyle::Srt).unwrap(), "00:00:00,000");
        assert_eq!(format_timestamp(0.0, TimestampStyle::Vtt).unwrap(), "00:00:00.000");
    }

    #[test]
    fn test_minutes_and_millis() {
        assert_eq!(format_timestamp(65.5, TimestampStyle::Srt).unwrap(), "00:01:05,500");
        assert_eq!(format_timestamp(70.25, TimestampStyle::Srt).unwrap(), "00:01:10,250");
    }

    #[test]
    fn test_hours() {
        assert_eq!(
            format_timestamp(3723.042, TimestampStyle::Vtt).unwrap(),
            "01:02:03.042"
        );
        assert_eq!(
            format_timestamp(360_000.0, TimestampStyle::Srt).unwrap(),
            "100:00:00,000"
        );
    }

    #[test]
    fn test_millis_truncate() {
        assert_eq!(format_timestamp(1.9999, TimestampStyle::Srt).unwrap(), "00:00:01,999");
    }

    #[test]
    fn test_styles_differ_only_in_separator() {
        for seconds in [0.0, 0.001, 1.5, 59.999, 61.0, 3599.5, 7322.75, 86_400.125] {
            let srt = format_timestamp(seconds, TimestampStyle::Srt).unwrap();
            let vtt = format_timestamp(seconds, TimestampStyle::Vtt).unwrap();
            assert_eq!(srt.len(), vtt.len());
            assert_eq!(srt.replace(',', "."), vtt, "seconds = {}", seconds);
            assert_eq!(srt.matches(',').count(), 1);
        }
    }

    #[test]
    fn test_idempotent() {
        let a = format_timestamp(12.345, TimestampStyle::Vtt).unwrap();
        let b = format_timestamp(12.345, TimestampStyle::Vtt).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_rejects_negative_and_non_finite() {
        for bad in [-0.5, f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = format_timestamp(bad, TimestampStyle::Srt).unwrap_err();
            assert!(matches!(err, WorkerError::InvalidInput(_)));
        }
    }
}
