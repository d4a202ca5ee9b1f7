use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Parse a backend timestamp.
///
/// Accepts RFC 3339 (`2024-03-01T15:04:05.000Z`), a naive date-time
/// (`2024-03-01 15:04:05`, `2024-03-01T15:04:05`, read as UTC) or a bare
/// calendar date (midnight UTC). Anything else is `None`.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Whole years between `birth` and `on`.
pub fn age_on(birth: NaiveDate, on: NaiveDate) -> Option<u32> {
    on.years_since(birth)
}

/// Display label for a facial analysis status.
///
/// Empty and "not-started" both read as "Pending"; anything mentioning
/// "reviewed" is "Patient Reviewed".
pub fn format_facial_status(status: Option<&str>) -> String {
    let normalized = status.map(str::trim).unwrap_or_default();
    let lower = normalized.to_lowercase();
    if lower.is_empty() || lower == "not-started" || lower == "pending" {
        return "Pending".to_string();
    }
    if lower == "ready" {
        return "Ready for Review".to_string();
    }
    if lower.contains("reviewed") {
        return "Patient Reviewed".to_string();
    }

    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 15, 4, 5).unwrap();
        assert_eq!(parse_timestamp("2024-03-01T15:04:05.000Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01T17:04:05+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01 15:04:05"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01T15:04:05"), Some(expected));
        assert_eq!(
            parse_timestamp("2024-03-01"),
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("last tuesday"), None);
        assert_eq!(parse_timestamp("2024-13-45"), None);
    }

    #[test]
    fn test_age_on() {
        let birth = NaiveDate::from_ymd_opt(1990, 6, 15).unwrap();
        assert_eq!(age_on(birth, NaiveDate::from_ymd_opt(2024, 6, 14).unwrap()), Some(33));
        assert_eq!(age_on(birth, NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()), Some(34));
        assert_eq!(age_on(birth, NaiveDate::from_ymd_opt(1980, 1, 1).unwrap()), None);
    }

    #[test]
    fn test_format_facial_status() {
        assert_eq!(format_facial_status(None), "Pending");
        assert_eq!(format_facial_status(Some("  ")), "Pending");
        assert_eq!(format_facial_status(Some("not-started")), "Pending");
        assert_eq!(format_facial_status(Some("READY")), "Ready for Review");
        assert_eq!(format_facial_status(Some("Patient reviewed")), "Patient Reviewed");
        assert_eq!(format_facial_status(Some("opened")), "Opened");
    }
}
