use chrono::{DateTime, Utc};
use chrono_tz::Tz;

/// Returns the current time in the configured timezone.
pub fn now_in_timezone(tz: &Tz) -> DateTime<Tz> {
    Utc::now().with_timezone(tz)
}

/// Renders a UTC instant as local wall-clock time, e.g. `2025-01-31 18:04:05`.
pub fn format_local(at: DateTime<Utc>, tz: &Tz) -> String {
    at.with_timezone(tz).format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_in_timezone_returns_datetime_in_tz() {
        let tz = chrono_tz::UTC;
        let result = now_in_timezone(&tz);
        assert_eq!(result.timezone(), tz);
    }

    #[test]
    fn format_local_shifts_into_timezone() {
        let at = DateTime::parse_from_rfc3339("2025-01-31T09:04:05Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(format_local(at, &chrono_tz::UTC), "2025-01-31 09:04:05");
        assert_eq!(
            format_local(at, &chrono_tz::Asia::Tokyo),
            "2025-01-31 18:04:05"
        );
    }
}
