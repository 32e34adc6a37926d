//! Timestamp storage conventions
//!
//! Every persisted timestamp is timezone-naive UTC with microsecond
//! precision. Wire formats re-attach `Z`; the database never sees an offset,
//! so the same value round-trips identically across database drivers.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::{Result, StoreError};

/// Storage format: `2025-01-10T08:30:00.000000`
const DB_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Current UTC instant, naive, truncated to microseconds
pub fn now() -> NaiveDateTime {
    let now = Utc::now().naive_utc();
    // Drop sub-microsecond digits so values round-trip through storage
    parse_db(&to_db(&now)).expect("freshly formatted timestamp must parse")
}

/// Format a timestamp for a TEXT column
pub fn to_db(value: &NaiveDateTime) -> String {
    value.format(DB_FORMAT).to_string()
}

/// Parse a stored timestamp; tolerates missing fractional seconds
pub fn parse_db(value: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, DB_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S"))
        .map_err(|e| StoreError::corrupt("timestamp", format!("'{value}': {e}")))
}

/// Parse an optional stored timestamp ("" means NULL)
pub fn parse_db_opt(value: &str) -> Result<Option<NaiveDateTime>> {
    if value.is_empty() {
        Ok(None)
    } else {
        parse_db(value).map(Some)
    }
}

/// Normalize any incoming wire timestamp to naive UTC
pub fn normalize_utc(value: DateTime<Utc>) -> NaiveDateTime {
    value.naive_utc()
}

/// Re-attach UTC for wire serialization (RFC 3339 with `Z`)
pub fn to_wire(value: NaiveDateTime) -> DateTime<Utc> {
    DateTime::from_naive_utc_and_offset(value, Utc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_roundtrip() {
        let ts = NaiveDate::from_ymd_opt(2025, 1, 10)
            .unwrap()
            .and_hms_micro_opt(8, 30, 0, 123456)
            .unwrap();
        assert_eq!(parse_db(&to_db(&ts)).unwrap(), ts);
    }

    #[test]
    fn test_parse_without_fraction() {
        let ts = parse_db("2025-01-10T08:30:00").unwrap();
        assert_eq!(to_db(&ts), "2025-01-10T08:30:00.000000");
    }

    #[test]
    fn test_empty_is_none() {
        assert_eq!(parse_db_opt("").unwrap(), None);
        assert!(parse_db_opt("2025-01-10T08:30:00").unwrap().is_some());
    }

    #[test]
    fn test_garbage_is_corrupt() {
        assert!(parse_db("not-a-timestamp").is_err());
    }
}
