use serde::{Deserialize, Serialize};

use super::entity::{EntityKind, Record};
use super::types::{Column, SqlValue, UnixTime};

/// Ticket working group, from the `groups` listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Groups {
    pub id: i64,
    pub name: Option<String>,
    pub created_at: UnixTime,
    pub updated_at: UnixTime,
}

impl Record for Groups {
    const KIND: EntityKind = EntityKind::Groups;

    fn columns() -> &'static [Column] {
        const COLUMNS: &[Column] = &[
            Column::key("id"),
            Column::value("name"),
            Column::value("created_at"),
            Column::value("updated_at"),
        ];
        COLUMNS
    }

    fn values(&self) -> Vec<SqlValue> {
        vec![
            self.id.into(),
            (&self.name).into(),
            self.created_at.into(),
            self.updated_at.into(),
        ]
    }

    fn watermark(&self) -> Option<i64> {
        Some(self.id)
    }
}
