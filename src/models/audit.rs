//! Ticket audits and the change events they carry.

use serde::{Deserialize, Serialize};

use super::entity::{EntityKind, Record};
use super::types::{Column, SqlValue, UnixTime};

/// One entry of a ticket's change log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Audit {
    pub id: i64,
    pub ticket_id: i64,
    pub created_at: UnixTime,
    pub author_id: Option<i64>,
    /// Embedded events; tracked `Change` events are extracted into `changeevent`
    pub events: Vec<ChangeEvent>,
}

impl Record for Audit {
    const KIND: EntityKind = EntityKind::Audit;

    fn columns() -> &'static [Column] {
        const COLUMNS: &[Column] = &[
            Column::key("id"),
            Column::key("ticket_id"),
            Column::value("created_at"),
            Column::value("author_id"),
        ];
        COLUMNS
    }

    fn values(&self) -> Vec<SqlValue> {
        vec![
            self.id.into(),
            self.ticket_id.into(),
            self.created_at.into(),
            self.author_id.into(),
        ]
    }

    fn watermark(&self) -> Option<i64> {
        Some(self.id)
    }
}

/// An audit event. Only `Create` and `Change` events are modelled; other event
/// types deserialize with their extra members ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangeEvent {
    pub id: i64,
    /// Set during extraction; the API nests events inside their audit
    #[serde(skip_deserializing)]
    pub audit_id: i64,
    #[serde(rename = "type")]
    pub event_type: Option<String>,
    /// Ticket field id (as text) for custom fields, or a system field name
    pub field_name: Option<String>,
    pub value: serde_json::Value,
    pub previous_value: serde_json::Value,
}

impl ChangeEvent {
    pub fn is_change(&self) -> bool {
        self.event_type.as_deref() == Some("Change")
    }

    /// Custom field id this event touches, if `field_name` is numeric.
    pub fn field_id(&self) -> Option<i64> {
        self.field_name.as_deref()?.parse().ok()
    }
}

impl Record for ChangeEvent {
    const KIND: EntityKind = EntityKind::ChangeEvent;

    fn columns() -> &'static [Column] {
        const COLUMNS: &[Column] = &[
            Column::key("id"),
            Column::value("audit_id"),
            Column::value("event_type"),
            Column::value("field_name"),
            Column::value("value"),
            Column::value("previous_value"),
        ];
        COLUMNS
    }

    fn values(&self) -> Vec<SqlValue> {
        vec![
            self.id.into(),
            self.audit_id.into(),
            (&self.event_type).into(),
            (&self.field_name).into(),
            (&self.value).into(),
            (&self.previous_value).into(),
        ]
    }

    fn watermark(&self) -> Option<i64> {
        Some(self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_audit_with_mixed_events() {
        let audit: Audit = serde_json::from_value(json!({
            "id": 2127301143,
            "ticket_id": 666,
            "created_at": "2011-09-25T22:35:44Z",
            "author_id": 5246746,
            "via": {"channel": "web"},
            "events": [
                {"id": 1564245, "type": "Comment", "body": "Thanks!", "public": true},
                {"id": 1564246, "type": "Change", "field_name": "360001", "value": "120", "previous_value": "60"}
            ]
        }))
        .unwrap();

        assert_eq!(audit.events.len(), 2);
        assert!(!audit.events[0].is_change());
        assert!(audit.events[1].is_change());
        assert_eq!(audit.events[1].field_id(), Some(360001));
        assert_eq!(audit.events[1].audit_id, 0);
    }

    #[test]
    fn test_system_field_name_has_no_field_id() {
        let event = ChangeEvent {
            field_name: Some("status".to_string()),
            ..Default::default()
        };
        assert_eq!(event.field_id(), None);
    }
}
