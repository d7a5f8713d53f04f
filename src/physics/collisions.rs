//! Collision state tracking across steps.
//!
//! Two registries are kept by the system: a durable one holding every pairing
//! confirmed so far, and a this-frame one rebuilt from each step's manifolds.
//! Diffing them yields start and end transitions.

use std::collections::BTreeMap;

use hecs::Entity;

/// Map from an entity to the other entities it currently touches.
///
/// Keys iterate in entity order and others in insertion order, so event
/// dispatch driven from a registry is deterministic. Entries never stay
/// empty: removing the last other drops the entry.
#[derive(Debug, Clone, Default)]
pub struct CollisionRegistry {
    entries: BTreeMap<Entity, Vec<Entity>>,
}

impl CollisionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `entity` touches `other`. Returns true if the pairing was new.
    pub fn insert(&mut self, entity: Entity, other: Entity) -> bool {
        let others = self.entries.entry(entity).or_default();
        if others.contains(&other) {
            false
        } else {
            others.push(other);
            true
        }
    }

    pub fn contains(&self, entity: Entity, other: Entity) -> bool {
        self.entries
            .get(&entity)
            .is_some_and(|others| others.contains(&other))
    }

    /// Forget one pairing. Returns true if it was recorded.
    pub fn remove(&mut self, entity: Entity, other: Entity) -> bool {
        let Some(others) = self.entries.get_mut(&entity) else {
            return false;
        };
        let Some(index) = others.iter().position(|e| *e == other) else {
            return false;
        };
        others.remove(index);
        if others.is_empty() {
            self.entries.remove(&entity);
        }
        true
    }

    /// Others recorded for `entity`, in insertion order.
    pub fn others(&self, entity: Entity) -> &[Entity] {
        self.entries.get(&entity).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.entries.keys().copied()
    }

    /// Number of entities with at least one recorded other.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Remove every pairing absent from `current` and append it to `ended`
    /// as `(entity, other)`. Entries left without others are dropped.
    ///
    /// Pairs come out in entity order, and within one entity in the order
    /// its others were inserted. That inner order is not otherwise meaningful.
    pub fn drain_ended(&mut self, current: &CollisionRegistry, ended: &mut Vec<(Entity, Entity)>) {
        self.entries.retain(|&entity, others| {
            others.retain(|&other| {
                if current.contains(entity, other) {
                    true
                } else {
                    ended.push((entity, other));
                    false
                }
            });
            !others.is_empty()
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entities(n: usize) -> Vec<Entity> {
        let mut world = hecs::World::new();
        (0..n).map(|_| world.spawn(())).collect()
    }

    #[test]
    fn test_insert_reports_new_pairings() {
        let e = entities(3);
        let mut registry = CollisionRegistry::new();
        assert!(registry.insert(e[0], e[1]));
        assert!(!registry.insert(e[0], e[1]));
        assert!(registry.insert(e[0], e[2]));
        assert_eq!(registry.others(e[0]), &[e[1], e[2]]);
        assert!(!registry.contains(e[1], e[0]));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_drops_empty_entries() {
        let e = entities(2);
        let mut registry = CollisionRegistry::new();
        registry.insert(e[0], e[1]);
        assert!(registry.remove(e[0], e[1]));
        assert!(!registry.remove(e[0], e[1]));
        assert!(registry.is_empty());
        assert!(registry.others(e[0]).is_empty());
    }

    #[test]
    fn test_drain_ended_keeps_current_pairings() {
        let e = entities(4);
        let mut durable = CollisionRegistry::new();
        durable.insert(e[0], e[1]);
        durable.insert(e[0], e[2]);
        durable.insert(e[3], e[0]);

        let mut frame = CollisionRegistry::new();
        frame.insert(e[0], e[2]);

        let mut ended = Vec::new();
        durable.drain_ended(&frame, &mut ended);

        assert_eq!(ended, vec![(e[0], e[1]), (e[3], e[0])]);
        assert_eq!(durable.others(e[0]), &[e[2]]);
        assert_eq!(durable.entities().collect::<Vec<_>>(), vec![e[0]]);
    }

    #[test]
    fn test_drain_against_empty_frame_clears_everything() {
        let e = entities(2);
        let mut durable = CollisionRegistry::new();
        durable.insert(e[0], e[1]);
        durable.insert(e[1], e[0]);

        let mut ended = Vec::new();
        durable.drain_ended(&CollisionRegistry::new(), &mut ended);
        assert_eq!(ended.len(), 2);
        assert!(durable.is_empty());

        ended.clear();
        durable.drain_ended(&CollisionRegistry::new(), &mut ended);
        assert!(ended.is_empty());
    }
}
