use serde::{Deserialize, Serialize};

use super::entity::{EntityKind, Record};
use super::types::{Column, SqlValue, UnixTime};

/// Organization from the incremental organization export.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Organization {
    pub id: i64,
    pub name: Option<String>,
    pub created_at: UnixTime,
    pub updated_at: UnixTime,
    pub group_id: Option<i64>,
    /// Custom field values keyed by field key; denormalised into `organizationdata`
    pub organization_fields: serde_json::Map<String, serde_json::Value>,
}

impl Record for Organization {
    const KIND: EntityKind = EntityKind::Organization;

    fn columns() -> &'static [Column] {
        const COLUMNS: &[Column] = &[
            Column::key("id"),
            Column::value("name"),
            Column::value("created_at"),
            Column::value("updated_at"),
            Column::value("group_id"),
        ];
        COLUMNS
    }

    fn values(&self) -> Vec<SqlValue> {
        vec![
            self.id.into(),
            (&self.name).into(),
            self.created_at.into(),
            self.updated_at.into(),
            self.group_id.into(),
        ]
    }

    fn watermark(&self) -> Option<i64> {
        Some(self.updated_at.seconds())
    }
}
