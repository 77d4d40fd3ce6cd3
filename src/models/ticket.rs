use serde::{Deserialize, Serialize};

use super::custom_field::TicketData;
use super::entity::{EntityKind, Record};
use super::types::{Column, SqlValue, UnixTime};

/// Ticket from the incremental ticket export or a single-ticket fetch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ticket {
    pub id: i64,
    pub external_id: Option<String>,
    pub subject: Option<String>,
    pub status: Option<String>,
    pub recipient: Option<String>,
    pub requester_id: Option<i64>,
    pub submitter_id: Option<i64>,
    pub assignee_id: Option<i64>,
    pub organization_id: Option<i64>,
    pub group_id: Option<i64>,
    /// Embedded `{id, value}` pairs; denormalised into `ticketdata`
    pub custom_fields: Vec<TicketData>,
    pub created_at: UnixTime,
    pub updated_at: UnixTime,
}

impl Record for Ticket {
    const KIND: EntityKind = EntityKind::Ticket;

    fn columns() -> &'static [Column] {
        const COLUMNS: &[Column] = &[
            Column::key("id"),
            Column::value("external_id"),
            Column::value("subject"),
            Column::value("status"),
            Column::value("recipient"),
            Column::value("requester_id"),
            Column::value("submitter_id"),
            Column::value("assignee_id"),
            Column::value("organization_id"),
            Column::value("group_id"),
            Column::value("created_at"),
            Column::value("updated_at"),
        ];
        COLUMNS
    }

    fn values(&self) -> Vec<SqlValue> {
        vec![
            self.id.into(),
            (&self.external_id).into(),
            (&self.subject).into(),
            (&self.status).into(),
            (&self.recipient).into(),
            self.requester_id.into(),
            self.submitter_id.into(),
            self.assignee_id.into(),
            self.organization_id.into(),
            self.group_id.into(),
            self.created_at.into(),
            self.updated_at.into(),
        ]
    }

    fn watermark(&self) -> Option<i64> {
        Some(self.updated_at.seconds())
    }
}
