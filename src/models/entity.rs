//! The fixed catalogue of persisted entity kinds.
//!
//! [`EntityKind`] names a target table, [`Entity`] carries one record of any kind
//! through code paths that handle every kind (transforms, write failures), and
//! [`Record`] is the explicit mapping from a typed record to its columns.

use serde::Serialize;
use std::fmt;

use super::types::{Column, SqlValue};
use super::{
    Audit, ChangeEvent, Groups, Organization, OrganizationData, OrganizationField,
    SatisfactionRating, Ticket, TicketData, TicketField, TicketMetric, User, UserData, UserField,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum EntityKind {
    Groups,
    Organization,
    OrganizationField,
    OrganizationData,
    User,
    UserField,
    UserData,
    Ticket,
    TicketField,
    TicketData,
    TicketMetric,
    Audit,
    ChangeEvent,
    SatisfactionRating,
}

impl EntityKind {
    pub const ALL: [EntityKind; 14] = [
        EntityKind::Groups,
        EntityKind::Organization,
        EntityKind::OrganizationField,
        EntityKind::OrganizationData,
        EntityKind::User,
        EntityKind::UserField,
        EntityKind::UserData,
        EntityKind::Ticket,
        EntityKind::TicketField,
        EntityKind::TicketData,
        EntityKind::TicketMetric,
        EntityKind::Audit,
        EntityKind::ChangeEvent,
        EntityKind::SatisfactionRating,
    ];

    /// Target table: the lower-cased record type name.
    ///
    /// Also the sequence name under which the kind's watermark is stored.
    pub fn table_name(self) -> &'static str {
        match self {
            EntityKind::Groups => "groups",
            EntityKind::Organization => "organization",
            EntityKind::OrganizationField => "organizationfields",
            EntityKind::OrganizationData => "organizationdata",
            EntityKind::User => "user",
            EntityKind::UserField => "userfields",
            EntityKind::UserData => "userdata",
            EntityKind::Ticket => "ticket",
            EntityKind::TicketField => "ticketfields",
            EntityKind::TicketData => "ticketdata",
            EntityKind::TicketMetric => "ticketmetric",
            EntityKind::Audit => "audit",
            EntityKind::ChangeEvent => "changeevent",
            EntityKind::SatisfactionRating => "satisfactionrating",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

/// One record of any kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Entity {
    Groups(Groups),
    Organization(Organization),
    OrganizationField(OrganizationField),
    OrganizationData(OrganizationData),
    User(User),
    UserField(UserField),
    UserData(UserData),
    Ticket(Ticket),
    TicketField(TicketField),
    TicketData(TicketData),
    TicketMetric(TicketMetric),
    Audit(Audit),
    ChangeEvent(ChangeEvent),
    SatisfactionRating(SatisfactionRating),
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Groups(_) => EntityKind::Groups,
            Entity::Organization(_) => EntityKind::Organization,
            Entity::OrganizationField(_) => EntityKind::OrganizationField,
            Entity::OrganizationData(_) => EntityKind::OrganizationData,
            Entity::User(_) => EntityKind::User,
            Entity::UserField(_) => EntityKind::UserField,
            Entity::UserData(_) => EntityKind::UserData,
            Entity::Ticket(_) => EntityKind::Ticket,
            Entity::TicketField(_) => EntityKind::TicketField,
            Entity::TicketData(_) => EntityKind::TicketData,
            Entity::TicketMetric(_) => EntityKind::TicketMetric,
            Entity::Audit(_) => EntityKind::Audit,
            Entity::ChangeEvent(_) => EntityKind::ChangeEvent,
            Entity::SatisfactionRating(_) => EntityKind::SatisfactionRating,
        }
    }
}

/// Explicit column mapping for a persisted record type.
///
/// `columns()` lists every persisted field in statement order; embedded
/// collections (custom fields, audit events) are never listed. `values()` must
/// return exactly one value per column, in the same order. Conversion to and
/// from [`Entity`] lets transforms operate on any kind.
pub trait Record:
    Clone + Send + Sync + fmt::Debug + Into<Entity> + TryFrom<Entity, Error = Entity> + 'static
{
    const KIND: EntityKind;

    fn columns() -> &'static [Column];

    fn values(&self) -> Vec<SqlValue>;

    /// High-water mark this record contributes to its kind's sequence, if any.
    fn watermark(&self) -> Option<i64> {
        None
    }
}

macro_rules! entity_record_conversions {
    ($($variant:ident => $ty:ty),+ $(,)?) => {
        $(
            impl From<$ty> for Entity {
                fn from(record: $ty) -> Self {
                    Entity::$variant(record)
                }
            }

            impl TryFrom<Entity> for $ty {
                type Error = Entity;

                fn try_from(entity: Entity) -> Result<Self, Entity> {
                    match entity {
                        Entity::$variant(record) => Ok(record),
                        other => Err(other),
                    }
                }
            }
        )+
    };
}

entity_record_conversions! {
    Groups => Groups,
    Organization => Organization,
    OrganizationField => OrganizationField,
    OrganizationData => OrganizationData,
    User => User,
    UserField => UserField,
    UserData => UserData,
    Ticket => Ticket,
    TicketField => TicketField,
    TicketData => TicketData,
    TicketMetric => TicketMetric,
    Audit => Audit,
    ChangeEvent => ChangeEvent,
    SatisfactionRating => SatisfactionRating,
}
