//! Shared wire types
//!
//! Stored timestamps are timezone-naive UTC; on the wire they are RFC 3339
//! with `Z`. The `wire_time` serde modules do that conversion so DTOs can
//! keep using the storage representation internally.

/// Serialize a `NaiveDateTime` as RFC 3339 UTC (`...Z`)
pub mod wire_time {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        let utc: DateTime<Utc> = DateTime::from_naive_utc_and_offset(*value, Utc);
        serializer.serialize_str(&utc.to_rfc3339_opts(chrono::SecondsFormat::Micros, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc).naive_utc())
            .map_err(serde::de::Error::custom)
    }

    /// `Option<NaiveDateTime>` variant
    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(
            value: &Option<NaiveDateTime>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(value) => super::serialize(value, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<NaiveDateTime>, D::Error> {
            let raw = Option::<String>::deserialize(deserializer)?;
            match raw {
                None => Ok(None),
                Some(raw) => DateTime::parse_from_rfc3339(&raw)
                    .map(|dt| Some(dt.with_timezone(&Utc).naive_utc()))
                    .map_err(serde::de::Error::custom),
            }
        }
    }
}

/// Pagination query parameters shared by the list endpoints
#[derive(Debug, Clone, serde::Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    50
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            offset: 0,
        }
    }
}

impl Pagination {
    /// Clamp the limit to something the database should be asked for
    pub fn clamped(&self, max: usize) -> (usize, usize) {
        (self.limit.clamp(1, max), self.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize)]
    struct Stamped {
        #[serde(with = "wire_time")]
        at: chrono::NaiveDateTime,
    }

    #[test]
    fn test_wire_time_has_z_suffix() {
        let stamped = Stamped {
            at: NaiveDate::from_ymd_opt(2025, 1, 10)
                .unwrap()
                .and_hms_opt(8, 30, 0)
                .unwrap(),
        };
        let json = serde_json::to_string(&stamped).unwrap();
        assert!(json.contains("2025-01-10T08:30:00.000000Z"));

        let back: Stamped = serde_json::from_str(&json).unwrap();
        assert_eq!(back.at, stamped.at);
    }

    #[test]
    fn test_wire_time_accepts_offsets() {
        let back: Stamped =
            serde_json::from_str(r#"{"at":"2025-01-10T10:30:00+02:00"}"#).unwrap();
        assert_eq!(back.at.format("%H:%M").to_string(), "08:30");
    }

    #[test]
    fn test_pagination_clamp() {
        let pagination = Pagination { limit: 9999, offset: 10 };
        assert_eq!(pagination.clamped(200), (200, 10));
        let pagination = Pagination { limit: 0, offset: 0 };
        assert_eq!(pagination.clamped(200).0, 1);
    }
}
