use chrono::{DateTime, Utc};

/// Convert export epoch seconds (possibly fractional) to a UTC datetime.
/// Out-of-range values fall back to the epoch rather than failing the import.
pub fn datetime(secs: f64) -> DateTime<Utc> {
    let whole = secs.trunc() as i64;
    let nanos = (secs.fract().abs() * 1_000_000_000.0) as u32;
    DateTime::from_timestamp(whole, nanos.min(999_999_999)).unwrap_or(DateTime::UNIX_EPOCH)
}

/// Human-readable timestamp, e.g. `2024-05-12 14:03:11`.
pub fn human(secs: f64) -> String {
    datetime(secs).format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Compact day used as a file name prefix, e.g. `20240512`.
pub fn compact_day(secs: f64) -> String {
    datetime(secs).format("%Y%m%d").to_string()
}

/// Year-month folder bucket, e.g. `2024-05`.
pub fn month(secs: f64) -> String {
    datetime(secs).format("%Y-%m").to_string()
}
