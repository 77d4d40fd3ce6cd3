//! # Entity Records
//!
//! Typed records for every resource the remote API exports, each with an
//! explicit [`Record`] column mapping used to synthesize SQL statements.

pub mod audit;
pub mod custom_field;
pub mod entity;
pub mod group;
pub mod organization;
pub mod satisfaction_rating;
pub mod ticket;
pub mod ticket_metric;
pub mod types;
pub mod user;

pub use audit::{Audit, ChangeEvent};
pub use custom_field::{
    CustomField, CustomFieldValue, OrganizationData, OrganizationField, TicketData, TicketField,
    UserData, UserField,
};
pub use entity::{Entity, EntityKind, Record};
pub use group::Groups;
pub use organization::Organization;
pub use satisfaction_rating::SatisfactionRating;
pub use ticket::Ticket;
pub use ticket_metric::TicketMetric;
pub use types::{CalendarMinutes, Column, ColumnRole, SqlValue, UnixTime};
pub use user::User;
