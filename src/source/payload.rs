use serde::de::DeserializeOwned;
use serde_json::value::RawValue;

use super::preprocessor::Resource;
use crate::models::{
    Audit, EntityKind, Groups, Organization, OrganizationField, SatisfactionRating, Ticket,
    TicketField, TicketMetric, User, UserField,
};

/// A decoded resource payload. Single-object resources (`ticket`, `user`, ...)
/// decode to a one-element collection of the same kind as their listing.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Groups(Vec<Groups>),
    Organizations(Vec<Organization>),
    OrganizationFields(Vec<OrganizationField>),
    Users(Vec<User>),
    UserFields(Vec<UserField>),
    Tickets(Vec<Ticket>),
    TicketFields(Vec<TicketField>),
    Audits(Vec<Audit>),
    TicketMetrics(Vec<TicketMetric>),
    SatisfactionRatings(Vec<SatisfactionRating>),
}

impl Payload {
    /// Deserialize the raw slice captured for `resource` into its typed container.
    pub fn decode(resource: Resource, raw: &RawValue) -> Result<Payload, serde_json::Error> {
        let payload = match resource {
            Resource::Groups => Payload::Groups(many(raw)?),
            Resource::Organization => Payload::Organizations(one(raw)?),
            Resource::Organizations => Payload::Organizations(many(raw)?),
            Resource::OrganizationFields => Payload::OrganizationFields(many(raw)?),
            Resource::User => Payload::Users(one(raw)?),
            Resource::Users => Payload::Users(many(raw)?),
            Resource::UserFields => Payload::UserFields(many(raw)?),
            Resource::Ticket => Payload::Tickets(one(raw)?),
            Resource::Tickets => Payload::Tickets(many(raw)?),
            Resource::TicketFields => Payload::TicketFields(many(raw)?),
            Resource::Audits => Payload::Audits(many(raw)?),
            Resource::TicketMetric => Payload::TicketMetrics(one(raw)?),
            Resource::TicketMetrics => Payload::TicketMetrics(many(raw)?),
            Resource::SatisfactionRatings => Payload::SatisfactionRatings(many(raw)?),
        };
        Ok(payload)
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Payload::Groups(_) => EntityKind::Groups,
            Payload::Organizations(_) => EntityKind::Organization,
            Payload::OrganizationFields(_) => EntityKind::OrganizationField,
            Payload::Users(_) => EntityKind::User,
            Payload::UserFields(_) => EntityKind::UserField,
            Payload::Tickets(_) => EntityKind::Ticket,
            Payload::TicketFields(_) => EntityKind::TicketField,
            Payload::Audits(_) => EntityKind::Audit,
            Payload::TicketMetrics(_) => EntityKind::TicketMetric,
            Payload::SatisfactionRatings(_) => EntityKind::SatisfactionRating,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Payload::Groups(v) => v.len(),
            Payload::Organizations(v) => v.len(),
            Payload::OrganizationFields(v) => v.len(),
            Payload::Users(v) => v.len(),
            Payload::UserFields(v) => v.len(),
            Payload::Tickets(v) => v.len(),
            Payload::TicketFields(v) => v.len(),
            Payload::Audits(v) => v.len(),
            Payload::TicketMetrics(v) => v.len(),
            Payload::SatisfactionRatings(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn many<T: DeserializeOwned>(raw: &RawValue) -> Result<Vec<T>, serde_json::Error> {
    serde_json::from_str(raw.get())
}

fn one<T: DeserializeOwned>(raw: &RawValue) -> Result<Vec<T>, serde_json::Error> {
    serde_json::from_str(raw.get()).map(|record| vec![record])
}
