//! Column-level value types shared by every entity record.

use chrono::DateTime;
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::Postgres;

/// Seconds since the unix epoch.
///
/// The remote API reports RFC 3339 timestamps; they are stored as plain integers
/// so no timezone handling leaks into the relational schema. Absent, null and
/// pre-epoch values all become `0`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct UnixTime(pub i64);

impl UnixTime {
    pub fn seconds(self) -> i64 {
        self.0
    }
}

impl<'de> Deserialize<'de> for UnixTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        match raw.as_deref() {
            None | Some("") => Ok(UnixTime(0)),
            Some(text) => DateTime::parse_from_rfc3339(text)
                .map(|ts| UnixTime(ts.timestamp().max(0)))
                .map_err(serde::de::Error::custom),
        }
    }
}

/// Duration reported as `{"calendar": .., "business": ..}` minutes; only calendar time is kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CalendarMinutes(pub i64);

#[derive(Deserialize)]
struct BusinessCalendar {
    #[serde(default)]
    calendar: Option<i64>,
}

impl<'de> Deserialize<'de> for CalendarMinutes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<BusinessCalendar>::deserialize(deserializer)?;
        Ok(CalendarMinutes(
            raw.and_then(|minutes| minutes.calendar).unwrap_or_default(),
        ))
    }
}

/// Whether a mapped column identifies the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    Key,
    Value,
}

/// One persisted field of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub role: ColumnRole,
}

impl Column {
    pub const fn key(name: &'static str) -> Self {
        Self {
            name,
            role: ColumnRole::Key,
        }
    }

    pub const fn value(name: &'static str) -> Self {
        Self {
            name,
            role: ColumnRole::Value,
        }
    }

    pub fn is_key(&self) -> bool {
        self.role == ColumnRole::Key
    }
}

/// A bindable column value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Int(i64),
    OptInt(Option<i64>),
    Bool(bool),
    Text(Option<String>),
}

impl SqlValue {
    /// Bind this value as the next positional parameter of `query`.
    pub fn bind<'q>(
        self,
        query: Query<'q, Postgres, PgArguments>,
    ) -> Query<'q, Postgres, PgArguments> {
        match self {
            SqlValue::Int(v) => query.bind(v),
            SqlValue::OptInt(v) => query.bind(v),
            SqlValue::Bool(v) => query.bind(v),
            SqlValue::Text(v) => query.bind(v),
        }
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Int(v)
    }
}

impl From<Option<i64>> for SqlValue {
    fn from(v: Option<i64>) -> Self {
        SqlValue::OptInt(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<UnixTime> for SqlValue {
    fn from(v: UnixTime) -> Self {
        SqlValue::Int(v.0)
    }
}

impl From<CalendarMinutes> for SqlValue {
    fn from(v: CalendarMinutes) -> Self {
        SqlValue::Int(v.0)
    }
}

impl From<&Option<String>> for SqlValue {
    fn from(v: &Option<String>) -> Self {
        SqlValue::Text(v.clone())
    }
}

impl From<&serde_json::Value> for SqlValue {
    fn from(v: &serde_json::Value) -> Self {
        SqlValue::Text(json_text(v))
    }
}

/// Render an arbitrary JSON value as column text. Strings are stored unquoted.
pub fn json_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unix_time_parses_rfc3339() {
        let t: UnixTime = serde_json::from_value(json!("2017-06-01T12:00:00Z")).unwrap();
        assert_eq!(t.seconds(), 1_496_318_400);
    }

    #[test]
    fn test_unix_time_null_is_zero() {
        let t: UnixTime = serde_json::from_value(json!(null)).unwrap();
        assert_eq!(t, UnixTime(0));
    }

    #[test]
    fn test_unix_time_pre_epoch_is_zero() {
        let t: UnixTime = serde_json::from_value(json!("1960-01-01T00:00:00Z")).unwrap();
        assert_eq!(t, UnixTime(0));
    }

    #[test]
    fn test_unix_time_rejects_garbage() {
        assert!(serde_json::from_value::<UnixTime>(json!("yesterday")).is_err());
    }

    #[test]
    fn test_calendar_minutes_keeps_calendar() {
        let m: CalendarMinutes =
            serde_json::from_value(json!({"calendar": 42, "business": 7})).unwrap();
        assert_eq!(m, CalendarMinutes(42));

        let empty: CalendarMinutes = serde_json::from_value(json!(null)).unwrap();
        assert_eq!(empty, CalendarMinutes(0));
    }

    #[test]
    fn test_json_text() {
        assert_eq!(json_text(&json!("hello")), Some("hello".to_string()));
        assert_eq!(json_text(&json!(12)), Some("12".to_string()));
        assert_eq!(json_text(&json!(true)), Some("true".to_string()));
        assert_eq!(json_text(&json!(null)), None);
    }
}
