//! Custom field definitions and the denormalised values attached to tickets,
//! organizations and users.
//!
//! All three families share one definition shape and one value shape; the
//! per-family newtypes exist so each maps to its own table.

use serde::{Deserialize, Serialize};
use std::ops::{Deref, DerefMut};

use super::entity::{EntityKind, Record};
use super::types::{Column, SqlValue, UnixTime};

/// A custom field definition (`ticket_fields`, `organization_fields`, `user_fields`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomField {
    pub id: i64,
    #[serde(rename = "type")]
    pub field_type: Option<String>,
    /// Organization and user values are keyed by this rather than by id
    pub key: Option<String>,
    pub title: Option<String>,
    pub created_at: UnixTime,
    pub updated_at: UnixTime,
}

const FIELD_COLUMNS: &[Column] = &[
    Column::key("id"),
    Column::value("field_type"),
    Column::value("field_key"),
    Column::value("title"),
    Column::value("created_at"),
    Column::value("updated_at"),
];

impl CustomField {
    fn column_values(&self) -> Vec<SqlValue> {
        vec![
            self.id.into(),
            (&self.field_type).into(),
            (&self.key).into(),
            (&self.title).into(),
            self.created_at.into(),
            self.updated_at.into(),
        ]
    }
}

/// One custom field value of one parent object, keyed by `(object_id, field_id)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomFieldValue {
    pub object_id: i64,
    #[serde(rename = "id")]
    pub field_id: i64,
    pub title: Option<String>,
    pub value: serde_json::Value,
    /// Normalised form written by domain transforms
    pub transformed: Option<String>,
}

const VALUE_COLUMNS: &[Column] = &[
    Column::key("object_id"),
    Column::key("field_id"),
    Column::value("title"),
    Column::value("value"),
    Column::value("transformed"),
];

impl CustomFieldValue {
    fn column_values(&self) -> Vec<SqlValue> {
        vec![
            self.object_id.into(),
            self.field_id.into(),
            (&self.title).into(),
            (&self.value).into(),
            (&self.transformed).into(),
        ]
    }
}

macro_rules! custom_field_family {
    ($(#[$meta:meta])* $name:ident($inner:ty) => $kind:expr, $columns:expr, watermark: $watermark:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub $inner);

        impl Deref for $name {
            type Target = $inner;

            fn deref(&self) -> &$inner {
                &self.0
            }
        }

        impl DerefMut for $name {
            fn deref_mut(&mut self) -> &mut $inner {
                &mut self.0
            }
        }

        impl From<$inner> for $name {
            fn from(inner: $inner) -> Self {
                Self(inner)
            }
        }

        impl Record for $name {
            const KIND: EntityKind = $kind;

            fn columns() -> &'static [Column] {
                $columns
            }

            fn values(&self) -> Vec<SqlValue> {
                self.0.column_values()
            }

            fn watermark(&self) -> Option<i64> {
                let watermark: fn(&$inner) -> Option<i64> = $watermark;
                watermark(&self.0)
            }
        }
    };
}

custom_field_family!(
    /// Definition row in `ticketfields`
    TicketField(CustomField) => EntityKind::TicketField, FIELD_COLUMNS, watermark: |f| Some(f.id)
);
custom_field_family!(
    /// Definition row in `organizationfields`
    OrganizationField(CustomField) => EntityKind::OrganizationField, FIELD_COLUMNS, watermark: |f| Some(f.id)
);
custom_field_family!(
    /// Definition row in `userfields`
    UserField(CustomField) => EntityKind::UserField, FIELD_COLUMNS, watermark: |f| Some(f.id)
);
custom_field_family!(
    /// Value row in `ticketdata`
    TicketData(CustomFieldValue) => EntityKind::TicketData, VALUE_COLUMNS, watermark: |_| None
);
custom_field_family!(
    /// Value row in `organizationdata`
    OrganizationData(CustomFieldValue) => EntityKind::OrganizationData, VALUE_COLUMNS, watermark: |_| None
);
custom_field_family!(
    /// Value row in `userdata`
    UserData(CustomFieldValue) => EntityKind::UserData, VALUE_COLUMNS, watermark: |_| None
);
