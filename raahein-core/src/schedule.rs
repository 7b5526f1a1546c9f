use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

use crate::{CoreError, CoreResult};

/// Combine a calendar day and a time-of-day into one UTC instant.
///
/// All departure and window comparisons go through this so a date-only
/// column is never compared against a full timestamp.
pub fn combine(date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    date.and_time(time).and_utc()
}

/// Strict "HH:MM" parser (00-23 hours, 00-59 minutes, zero padded).
pub fn parse_hhmm(raw: &str) -> CoreResult<NaiveTime> {
    let bytes = raw.as_bytes();
    let well_formed = bytes.len() == 5
        && bytes[2] == b':'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 2 || b.is_ascii_digit());

    if !well_formed {
        return Err(CoreError::InvalidInput(format!(
            "Time must be in HH:MM format, got {raw:?}"
        )));
    }

    NaiveTime::parse_from_str(raw, "%H:%M")
        .map_err(|_| CoreError::InvalidInput(format!("{raw:?} is not a valid time of day")))
}

/// Serde adapter for "HH:MM" payload fields.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_hhmm(&raw).map_err(de::Error::custom)
    }

    pub mod option {
        use chrono::NaiveTime;
        use serde::{de, Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            time: &Option<NaiveTime>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match time {
                Some(t) => serializer.serialize_str(&t.format("%H:%M").to_string()),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<NaiveTime>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|raw| crate::schedule::parse_hhmm(&raw).map_err(de::Error::custom))
                .transpose()
        }
    }
}
