//! Shared helpers for moving timestamps and options through DuckDB rows.

use crate::error::{MetaError, MetaResult};
use chrono::{DateTime, NaiveDateTime};
use std::collections::BTreeMap;

/// Timestamps are stored as microseconds since the Unix epoch.
pub(crate) fn to_micros(ts: NaiveDateTime) -> i64 {
    ts.and_utc().timestamp_micros()
}

pub(crate) fn from_micros(micros: i64) -> MetaResult<NaiveDateTime> {
    DateTime::from_timestamp_micros(micros)
        .map(|dt| dt.naive_utc())
        .ok_or_else(|| MetaError::CorruptRow(format!("timestamp out of range: {micros}")))
}

pub(crate) fn opt_from_micros(micros: Option<i64>) -> MetaResult<Option<NaiveDateTime>> {
    micros.map(from_micros).transpose()
}

pub(crate) fn options_to_json(options: &BTreeMap<String, String>) -> MetaResult<String> {
    serde_json::to_string(options).map_err(|e| MetaError::CorruptRow(e.to_string()))
}

pub(crate) fn options_from_json(text: &str) -> MetaResult<BTreeMap<String, String>> {
    serde_json::from_str(text)
        .map_err(|e| MetaError::CorruptRow(format!("invalid options json '{text}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mt_core::parse_timestamp;

    #[test]
    fn test_micros_round_trip_keeps_subseconds() {
        let ts = parse_timestamp("2024-05-06 07:08:09.123456").unwrap();
        assert_eq!(from_micros(to_micros(ts)).unwrap(), ts);
        assert_eq!(opt_from_micros(None).unwrap(), None);
    }

    #[test]
    fn test_options_json() {
        let mut opts = BTreeMap::new();
        opts.insert("k".to_string(), "v".to_string());
        let text = options_to_json(&opts).unwrap();
        assert_eq!(options_from_json(&text).unwrap(), opts);
        assert!(options_from_json("not json").is_err());
    }
}
