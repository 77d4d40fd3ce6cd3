use serde::{Deserialize, Serialize};

use super::entity::{EntityKind, Record};
use super::types::{Column, SqlValue, UnixTime};

/// End user or agent from the incremental user export.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct User {
    pub id: i64,
    pub email: Option<String>,
    pub name: Option<String>,
    pub created_at: UnixTime,
    pub external_id: Option<String>,
    pub last_login_at: UnixTime,
    pub organization_id: Option<i64>,
    pub default_group_id: Option<i64>,
    pub role: Option<String>,
    pub suspended: bool,
    pub time_zone: Option<String>,
    pub updated_at: UnixTime,
    /// Custom field values keyed by field key; denormalised into `userdata`
    pub user_fields: serde_json::Map<String, serde_json::Value>,
}

impl Record for User {
    const KIND: EntityKind = EntityKind::User;

    fn columns() -> &'static [Column] {
        const COLUMNS: &[Column] = &[
            Column::key("id"),
            Column::value("email"),
            Column::value("name"),
            Column::value("created_at"),
            Column::value("external_id"),
            Column::value("last_login_at"),
            Column::value("organization_id"),
            Column::value("group_id"),
            Column::value("role"),
            Column::value("suspended"),
            Column::value("time_zone"),
            Column::value("updated_at"),
        ];
        COLUMNS
    }

    fn values(&self) -> Vec<SqlValue> {
        vec![
            self.id.into(),
            (&self.email).into(),
            (&self.name).into(),
            self.created_at.into(),
            (&self.external_id).into(),
            self.last_login_at.into(),
            self.organization_id.into(),
            self.default_group_id.into(),
            (&self.role).into(),
            self.suspended.into(),
            (&self.time_zone).into(),
            self.updated_at.into(),
        ]
    }

    fn watermark(&self) -> Option<i64> {
        Some(self.updated_at.seconds())
    }
}
