use serde::{Deserialize, Serialize};

use super::entity::{EntityKind, Record};
use super::types::{Column, SqlValue, UnixTime};

/// Survey response attached to a solved ticket.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SatisfactionRating {
    pub id: i64,
    pub url: Option<String>,
    pub assignee_id: Option<i64>,
    pub group_id: Option<i64>,
    pub requester_id: Option<i64>,
    pub ticket_id: Option<i64>,
    pub score: Option<String>,
    pub created_at: UnixTime,
    pub updated_at: UnixTime,
    pub comment: Option<String>,
}

impl Record for SatisfactionRating {
    const KIND: EntityKind = EntityKind::SatisfactionRating;

    fn columns() -> &'static [Column] {
        const COLUMNS: &[Column] = &[
            Column::key("id"),
            Column::value("url"),
            Column::value("assignee_id"),
            Column::value("group_id"),
            Column::value("requester_id"),
            Column::value("ticket_id"),
            Column::value("score"),
            Column::value("created_at"),
            Column::value("updated_at"),
            Column::value("comment"),
        ];
        COLUMNS
    }

    fn values(&self) -> Vec<SqlValue> {
        vec![
            self.id.into(),
            (&self.url).into(),
            self.assignee_id.into(),
            self.group_id.into(),
            self.requester_id.into(),
            self.ticket_id.into(),
            (&self.score).into(),
            self.created_at.into(),
            self.updated_at.into(),
            (&self.comment).into(),
        ]
    }

    fn watermark(&self) -> Option<i64> {
        Some(self.updated_at.seconds())
    }
}
