//! Pre-write record transforms.
//!
//! Transforms are registered per [`EntityKind`] and run in registration order
//! on every record of that kind before it is written. Returning `None` drops
//! the record.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::models::{Entity, EntityKind};

pub trait Transform: Send + Sync {
    fn apply(&self, entity: Entity) -> Option<Entity>;
}

impl<F> Transform for F
where
    F: Fn(Entity) -> Option<Entity> + Send + Sync,
{
    fn apply(&self, entity: Entity) -> Option<Entity> {
        self(entity)
    }
}

#[derive(Default)]
pub struct TransformRegistry {
    transforms: RwLock<HashMap<EntityKind, Vec<Arc<dyn Transform>>>>,
}

impl TransformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, kind: EntityKind, transform: impl Transform + 'static) {
        self.transforms
            .write()
            .entry(kind)
            .or_default()
            .push(Arc::new(transform));
    }

    /// Run every transform registered for the entity's kind, stopping at the first drop.
    pub fn apply(&self, entity: Entity) -> Option<Entity> {
        let chain = self.chain(entity.kind());
        chain
            .iter()
            .try_fold(entity, |entity, transform| transform.apply(entity))
    }

    pub fn count(&self, kind: EntityKind) -> usize {
        self.transforms.read().get(&kind).map_or(0, Vec::len)
    }

    // Snapshot so a transform may register further transforms without deadlocking
    fn chain(&self, kind: EntityKind) -> Vec<Arc<dyn Transform>> {
        self.transforms.read().get(&kind).cloned().unwrap_or_default()
    }
}

impl fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: HashMap<EntityKind, usize> = self
            .transforms
            .read()
            .iter()
            .map(|(kind, chain)| (*kind, chain.len()))
            .collect();
        f.debug_struct("TransformRegistry")
            .field("transforms", &counts)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Groups;

    fn group(id: i64, name: &str) -> Entity {
        Entity::from(Groups {
            id,
            name: Some(name.to_string()),
            ..Default::default()
        })
    }

    fn rename(suffix: &'static str) -> impl Fn(Entity) -> Option<Entity> + Send + Sync {
        move |entity| match entity {
            Entity::Groups(mut g) => {
                g.name = g.name.map(|n| format!("{n}{suffix}"));
                Some(Entity::Groups(g))
            }
            other => Some(other),
        }
    }

    #[test]
    fn test_transforms_run_in_registration_order() {
        let registry = TransformRegistry::new();
        registry.register(EntityKind::Groups, rename("-a"));
        registry.register(EntityKind::Groups, rename("-b"));

        let out = registry.apply(group(1, "support")).unwrap();
        assert_eq!(
            Groups::try_from(out).unwrap().name.as_deref(),
            Some("support-a-b")
        );
    }

    #[test]
    fn test_none_drops_record_and_short_circuits() {
        let registry = TransformRegistry::new();
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        registry.register(EntityKind::Groups, |_| None);
        {
            let calls = Arc::clone(&calls);
            registry.register(EntityKind::Groups, move |e| {
                calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Some(e)
            });
        }

        assert!(registry.apply(group(1, "support")).is_none());
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[test]
    fn test_other_kinds_pass_through() {
        let registry = TransformRegistry::new();
        registry.register(EntityKind::Ticket, |_| None);
        assert!(registry.apply(group(2, "billing")).is_some());
        assert_eq!(registry.count(EntityKind::Ticket), 1);
        assert_eq!(registry.count(EntityKind::Groups), 0);
    }
}
