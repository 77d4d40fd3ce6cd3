//! Pre-write transforms that build field lookups and denormalise embedded data.
//!
//! Definition imports populate the lookups; entity imports read them. The
//! orchestrator imports definitions and waits before any entity import, so a
//! lookup is complete by the time it is read.

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

use crate::database::{Persistence, Transform};
use crate::models::{
    Audit, ChangeEvent, CustomFieldValue, Entity, EntityKind, OrganizationData, TicketData,
    TicketMetric, UserData,
};

/// Lookups and accumulators for one pipeline run.
#[derive(Debug, Default)]
pub struct RunState {
    /// Ticket field id -> title
    pub ticket_fields: HashMap<i64, String>,
    /// Organization field key -> id
    pub organization_fields: HashMap<String, i64>,
    /// User field key -> id
    pub user_fields: HashMap<String, i64>,
    /// Ticket ids that need audits and metrics fetched
    pub follow_ups: Vec<i64>,
    pub ticket_values: Vec<TicketData>,
    pub organization_values: Vec<OrganizationData>,
    pub user_values: Vec<UserData>,
    pub audits: Vec<Audit>,
    pub metrics: Vec<TicketMetric>,
    pub change_events: Vec<ChangeEvent>,
}

impl RunState {
    /// Clear accumulators. Lookups are kept; definition imports refresh them.
    pub fn reset(&mut self) {
        self.follow_ups.clear();
        self.ticket_values.clear();
        self.organization_values.clear();
        self.user_values.clear();
        self.audits.clear();
        self.metrics.clear();
        self.change_events.clear();
    }

    /// Collected ticket ids, deduplicated.
    pub fn take_follow_ups(&mut self) -> Vec<i64> {
        let mut ids = std::mem::take(&mut self.follow_ups);
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

pub type SharedRunState = Arc<Mutex<RunState>>;

/// Register every extraction transform on `persistence`.
///
/// An empty `tracked_change_fields` disables change-event extraction and keeps all audits.
pub fn register_extractions(
    persistence: &Persistence,
    state: &SharedRunState,
    tracked_change_fields: &[String],
) {
    persistence.register_transformation(
        EntityKind::OrganizationField,
        IndexOrganizationFields(Arc::clone(state)),
    );
    persistence.register_transformation(
        EntityKind::Organization,
        ExtractOrganizationFieldValues(Arc::clone(state)),
    );

    persistence.register_transformation(EntityKind::UserField, IndexUserFields(Arc::clone(state)));
    persistence.register_transformation(EntityKind::User, ExtractUserFieldValues(Arc::clone(state)));

    persistence.register_transformation(EntityKind::Ticket, CollectFollowUps(Arc::clone(state)));
    persistence.register_transformation(
        EntityKind::Ticket,
        ExtractTicketFieldValues(Arc::clone(state)),
    );
    persistence.register_transformation(
        EntityKind::TicketField,
        IndexTicketFields(Arc::clone(state)),
    );

    if !tracked_change_fields.is_empty() {
        persistence.register_transformation(
            EntityKind::Audit,
            ExtractChangeEvents::new(Arc::clone(state), tracked_change_fields),
        );
    }
}

pub struct IndexTicketFields(pub SharedRunState);

impl Transform for IndexTicketFields {
    fn apply(&self, entity: Entity) -> Option<Entity> {
        if let Entity::TicketField(field) = &entity {
            self.0
                .lock()
                .ticket_fields
                .insert(field.id, field.title.clone().unwrap_or_default());
        }
        Some(entity)
    }
}

pub struct IndexOrganizationFields(pub SharedRunState);

impl Transform for IndexOrganizationFields {
    fn apply(&self, entity: Entity) -> Option<Entity> {
        if let Entity::OrganizationField(field) = &entity {
            if let Some(key) = &field.key {
                self.0.lock().organization_fields.insert(key.clone(), field.id);
            }
        }
        Some(entity)
    }
}

pub struct IndexUserFields(pub SharedRunState);

impl Transform for IndexUserFields {
    fn apply(&self, entity: Entity) -> Option<Entity> {
        if let Entity::UserField(field) = &entity {
            if let Some(key) = &field.key {
                self.0.lock().user_fields.insert(key.clone(), field.id);
            }
        }
        Some(entity)
    }
}

pub struct CollectFollowUps(pub SharedRunState);

impl Transform for CollectFollowUps {
    fn apply(&self, entity: Entity) -> Option<Entity> {
        if let Entity::Ticket(ticket) = &entity {
            self.0.lock().follow_ups.push(ticket.id);
        }
        Some(entity)
    }
}

/// Copies each ticket's custom fields into `ticketdata` rows titled from the ticket field lookup.
pub struct ExtractTicketFieldValues(pub SharedRunState);

impl Transform for ExtractTicketFieldValues {
    fn apply(&self, entity: Entity) -> Option<Entity> {
        if let Entity::Ticket(ticket) = &entity {
            let mut state = self.0.lock();
            let values: Vec<TicketData> = ticket
                .custom_fields
                .iter()
                .map(|field| {
                    let mut value = field.clone();
                    value.object_id = ticket.id;
                    value.title = state.ticket_fields.get(&field.field_id).cloned();
                    value
                })
                .collect();
            state.ticket_values.extend(values);
        }
        Some(entity)
    }
}

fn keyed_values(
    object_id: i64,
    fields: &serde_json::Map<String, serde_json::Value>,
    lookup: &HashMap<String, i64>,
) -> Vec<CustomFieldValue> {
    fields
        .iter()
        .map(|(key, value)| CustomFieldValue {
            object_id,
            field_id: lookup.get(key).copied().unwrap_or_default(),
            title: Some(key.clone()),
            value: value.clone(),
            transformed: None,
        })
        .collect()
}

pub struct ExtractOrganizationFieldValues(pub SharedRunState);

impl Transform for ExtractOrganizationFieldValues {
    fn apply(&self, entity: Entity) -> Option<Entity> {
        if let Entity::Organization(organization) = &entity {
            let mut state = self.0.lock();
            let values: Vec<OrganizationData> = keyed_values(
                organization.id,
                &organization.organization_fields,
                &state.organization_fields,
            )
            .into_iter()
            .map(OrganizationData::from)
            .collect();
            state.organization_values.extend(values);
        }
        Some(entity)
    }
}

pub struct ExtractUserFieldValues(pub SharedRunState);

impl Transform for ExtractUserFieldValues {
    fn apply(&self, entity: Entity) -> Option<Entity> {
        if let Entity::User(user) = &entity {
            let mut state = self.0.lock();
            let values: Vec<UserData> =
                keyed_values(user.id, &user.user_fields, &state.user_fields)
                    .into_iter()
                    .map(UserData::from)
                    .collect();
            state.user_values.extend(values);
        }
        Some(entity)
    }
}

/// Keeps only audits whose `Change` events touch a tracked ticket field, and
/// collects those events.
pub struct ExtractChangeEvents {
    state: SharedRunState,
    tracked: HashSet<String>,
}

impl ExtractChangeEvents {
    pub fn new(state: SharedRunState, tracked: &[String]) -> Self {
        Self {
            state,
            tracked: tracked.iter().cloned().collect(),
        }
    }
}

impl Transform for ExtractChangeEvents {
    fn apply(&self, entity: Entity) -> Option<Entity> {
        let Entity::Audit(audit) = &entity else {
            return Some(entity);
        };

        let mut state = self.state.lock();
        let events: Vec<ChangeEvent> = audit
            .events
            .iter()
            .filter(|event| event.is_change())
            .filter(|event| {
                event
                    .field_id()
                    .and_then(|id| state.ticket_fields.get(&id))
                    .is_some_and(|title| self.tracked.contains(title))
            })
            .map(|event| ChangeEvent {
                audit_id: audit.id,
                ..event.clone()
            })
            .collect();

        if events.is_empty() {
            debug!(audit_id = audit.id, "Audit has no tracked changes, dropping");
            return None;
        }
        state.change_events.extend(events);
        drop(state);
        Some(entity)
    }
}
