use serde::{Deserialize, Serialize};

use super::entity::{EntityKind, Record};
use super::types::{CalendarMinutes, Column, SqlValue, UnixTime};

/// Ticket life-cycle metrics, fetched once per ticket.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TicketMetric {
    pub id: i64,
    pub ticket_id: i64,
    pub reopens: i64,
    pub replies: i64,
    pub assignee_updated_at: UnixTime,
    pub requester_updated_at: UnixTime,
    pub status_updated_at: UnixTime,
    pub initially_assigned_at: UnixTime,
    pub assigned_at: UnixTime,
    pub solved_at: UnixTime,
    pub latest_comment_added_at: UnixTime,
    pub reply_time_in_minutes: CalendarMinutes,
    pub full_resolution_time_in_minutes: CalendarMinutes,
    pub agent_wait_time_in_minutes: CalendarMinutes,
    pub requester_wait_time_in_minutes: CalendarMinutes,
    pub created_at: UnixTime,
    pub updated_at: UnixTime,
}

impl Record for TicketMetric {
    const KIND: EntityKind = EntityKind::TicketMetric;

    fn columns() -> &'static [Column] {
        const COLUMNS: &[Column] = &[
            Column::key("id"),
            Column::value("ticket_id"),
            Column::value("reopens"),
            Column::value("replies"),
            Column::value("assignee_updated_at"),
            Column::value("requester_updated_at"),
            Column::value("status_updated_at"),
            Column::value("initially_assigned_at"),
            Column::value("assigned_at"),
            Column::value("solved_at"),
            Column::value("latest_comment_added_at"),
            Column::value("ttfr"),
            Column::value("ttr"),
            Column::value("agent_wait_time"),
            Column::value("requester_wait_time"),
            Column::value("created_at"),
            Column::value("updated_at"),
        ];
        COLUMNS
    }

    fn values(&self) -> Vec<SqlValue> {
        vec![
            self.id.into(),
            self.ticket_id.into(),
            self.reopens.into(),
            self.replies.into(),
            self.assignee_updated_at.into(),
            self.requester_updated_at.into(),
            self.status_updated_at.into(),
            self.initially_assigned_at.into(),
            self.assigned_at.into(),
            self.solved_at.into(),
            self.latest_comment_added_at.into(),
            self.reply_time_in_minutes.into(),
            self.full_resolution_time_in_minutes.into(),
            self.agent_wait_time_in_minutes.into(),
            self.requester_wait_time_in_minutes.into(),
            self.created_at.into(),
            self.updated_at.into(),
        ]
    }

    fn watermark(&self) -> Option<i64> {
        Some(self.id)
    }
}
