//! Optimistic-concurrency tokens and prefer-latest timestamp resolution.

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use itemshape_core::{Item, Value};

use crate::error::AdapterError;
use crate::storage::WriteCondition;

/// The idempotence attribute's value as read when an update fetched its
/// original item. Lives only for the duration of one update call.
#[derive(Debug, Clone, PartialEq)]
pub struct ConflictToken {
    pub attribute: String,
    pub value: Value,
}

impl ConflictToken {
    /// Reads the token from the fetched item.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::MissingIdempotenceKey`] when the attribute is
    /// absent or null.
    pub fn read(original: &Item, attribute: &str) -> Result<Self, AdapterError> {
        match original.get(attribute) {
            None | Some(Value::Null) => Err(AdapterError::MissingIdempotenceKey {
                attribute: attribute.to_string(),
            }),
            Some(value) => Ok(Self {
                attribute: attribute.to_string(),
                value: value.clone(),
            }),
        }
    }

    /// Condition asserting the stored attribute still holds this token.
    #[must_use]
    pub fn unchanged(&self) -> WriteCondition {
        WriteCondition::AttributeEquals {
            attribute: self.attribute.clone(),
            value: self.value.clone(),
        }
    }
}

/// Comparable instant extracted from an idempotence value.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Instant {
    Time(DateTime<Utc>),
    Number(f64),
}

impl Instant {
    /// Instants of different kinds are incomparable.
    fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Instant::Time(a), Instant::Time(b)) => Some(a.cmp(b)),
            (Instant::Number(a), Instant::Number(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

fn parse_instant(value: &Value) -> Option<Instant> {
    match value {
        Value::Int(_) | Value::Float(_) => value.as_f64().map(Instant::Number),
        Value::String(s) => {
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(Instant::Time(dt.with_timezone(&Utc)));
            }
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
                return Some(Instant::Time(naive.and_utc()));
            }
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
                return Some(Instant::Time(naive.and_utc()));
            }
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|naive| Instant::Time(naive.and_utc()))
        }
        _ => None,
    }
}

/// Compares two idempotence values as timestamps.
///
/// Accepts RFC 3339, ISO date-times without an offset (read as UTC), plain
/// ISO dates, and numbers (compared numerically, e.g. epoch seconds).
///
/// # Errors
///
/// Returns [`AdapterError::InvalidIdempotenceValue`] naming the first value
/// that does not parse, or when a timestamp is compared with a number.
pub fn compare_timestamps(
    attribute: &str,
    stored: &Value,
    incoming: &Value,
) -> Result<Ordering, AdapterError> {
    let invalid = |value: &Value| AdapterError::InvalidIdempotenceValue {
        attribute: attribute.to_string(),
        value: serde_json::Value::from(value.clone()).to_string(),
    };
    let a = parse_instant(stored).ok_or_else(|| invalid(stored))?;
    let b = parse_instant(incoming).ok_or_else(|| invalid(incoming))?;
    a.compare(&b).ok_or_else(|| invalid(incoming))
}

/// Whether the stored value is strictly newer than the incoming one, in
/// which case a prefer-latest update must not write.
///
/// # Errors
///
/// See [`compare_timestamps`].
pub fn stored_is_newer(
    attribute: &str,
    stored: &Value,
    incoming: &Value,
) -> Result<bool, AdapterError> {
    Ok(compare_timestamps(attribute, stored, incoming)? == Ordering::Greater)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item_with(attr: &str, value: Value) -> Item {
        let mut item = Item::new();
        item.insert("pk".into(), Value::from("1"));
        item.insert(attr.into(), value);
        item
    }

    #[test]
    fn token_read_requires_the_attribute() {
        let token = ConflictToken::read(&item_with("modified", "2020-10-05".into()), "modified")
            .unwrap();
        assert_eq!(
            token.unchanged(),
            WriteCondition::AttributeEquals {
                attribute: "modified".into(),
                value: Value::from("2020-10-05"),
            }
        );

        let err = ConflictToken::read(&item_with("other", "x".into()), "modified").unwrap_err();
        assert!(matches!(err, AdapterError::MissingIdempotenceKey { .. }));

        let err = ConflictToken::read(&item_with("modified", Value::Null), "modified").unwrap_err();
        assert!(matches!(err, AdapterError::MissingIdempotenceKey { .. }));
    }

    #[test]
    fn compares_mixed_iso_formats() {
        let cmp = |a: &str, b: &str| {
            compare_timestamps("modified", &Value::from(a), &Value::from(b)).unwrap()
        };
        assert_eq!(cmp("2020-12-01", "2020-10-05"), Ordering::Greater);
        assert_eq!(cmp("2020-10-05T10:00:00", "2020-10-05T10:00:00.500"), Ordering::Less);
        assert_eq!(cmp("2020-10-05T12:00:00+02:00", "2020-10-05T10:00:00Z"), Ordering::Equal);
        assert_eq!(cmp("2020-10-05", "2020-10-05T00:00:00"), Ordering::Equal);
    }

    #[test]
    fn numbers_compare_numerically() {
        assert!(stored_is_newer("v", &Value::Int(20), &Value::Float(10.5)).unwrap());
        assert!(!stored_is_newer("v", &Value::Int(3), &Value::Int(3)).unwrap());
    }

    #[test]
    fn unparseable_values_are_rejected() {
        let err = compare_timestamps("modified", &Value::from("yesterday"), &Value::from("2020-10-05"))
            .unwrap_err();
        assert!(matches!(
            err,
            AdapterError::InvalidIdempotenceValue { ref value, .. } if value == "\"yesterday\""
        ));

        assert!(compare_timestamps("modified", &Value::Int(1), &Value::from("2020-10-05")).is_err());
    }
}
