// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Timestamp parsing for the `before`/`after` clause operators,
//! grounded on
//! `original_source/libs/server-sdk/src/evaluation/detail/timestamp_operations.cpp`:
//! a clause value is either a millisecond epoch integer or an RFC 3339
//! string; anything else does not match.

use crate::value::Value;
use chrono::{DateTime, Utc};

pub fn to_timepoint(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(ms) => milliseconds_to_timepoint(*ms),
        Value::String(s) => rfc3339_to_timepoint(s),
        _ => None,
    }
}

fn milliseconds_to_timepoint(ms: f64) -> Option<DateTime<Utc>> {
    if ms.trunc() != ms {
        return None;
    }
    DateTime::from_timestamp_millis(ms as i64)
}

fn rfc3339_to_timepoint(s: &str) -> Option<DateTime<Utc>> {
    if s.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_millis_parses() {
        let v = Value::Number(1_000.0);
        assert!(to_timepoint(&v).is_some());
    }

    #[test]
    fn fractional_millis_rejected() {
        let v = Value::Number(1_000.5);
        assert!(to_timepoint(&v).is_none());
    }

    #[test]
    fn rfc3339_parses() {
        let v = Value::String("2024-01-01T00:00:00Z".to_string());
        assert!(to_timepoint(&v).is_some());
    }

    #[test]
    fn garbage_string_rejected() {
        let v = Value::String("not a date".to_string());
        assert!(to_timepoint(&v).is_none());
    }

    #[test]
    fn non_scalar_rejected() {
        assert!(to_timepoint(&Value::Bool(true)).is_none());
    }
}
