//! Per-entity collision listeners.

use std::fmt;

use hecs::{CommandBuffer, Entity};

use crate::physics::contact::ContactResult;

/// Kinds of collision events an entity can listen for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// First step two rigid bodies touch.
    CollisionStart,
    /// Every step two rigid bodies touch.
    Contact,
    /// First step two rigid bodies no longer touch.
    CollisionEnd,
    /// A body starts overlapping a trigger volume.
    TriggerEnter,
    /// A body stops overlapping a trigger volume.
    TriggerLeave,
}

impl EventKind {
    pub const ALL: [EventKind; 5] = [
        EventKind::CollisionStart,
        EventKind::Contact,
        EventKind::CollisionEnd,
        EventKind::TriggerEnter,
        EventKind::TriggerLeave,
    ];

    const fn bit(self) -> u8 {
        1 << self as u8
    }
}

/// Event passed to a collision listener. Borrowed contact data is only valid
/// for the duration of the call.
#[derive(Debug, Clone, Copy)]
pub enum CollisionEvent<'a> {
    CollisionStart(&'a ContactResult),
    Contact(&'a ContactResult),
    CollisionEnd(Entity),
    TriggerEnter(Entity),
    TriggerLeave(Entity),
}

impl CollisionEvent<'_> {
    pub fn kind(&self) -> EventKind {
        match self {
            CollisionEvent::CollisionStart(_) => EventKind::CollisionStart,
            CollisionEvent::Contact(_) => EventKind::Contact,
            CollisionEvent::CollisionEnd(_) => EventKind::CollisionEnd,
            CollisionEvent::TriggerEnter(_) => EventKind::TriggerEnter,
            CollisionEvent::TriggerLeave(_) => EventKind::TriggerLeave,
        }
    }

    /// The entity on the other side of the event.
    pub fn other(&self) -> Entity {
        match self {
            CollisionEvent::CollisionStart(result) | CollisionEvent::Contact(result) => {
                result.other
            }
            CollisionEvent::CollisionEnd(other)
            | CollisionEvent::TriggerEnter(other)
            | CollisionEvent::TriggerLeave(other) => *other,
        }
    }
}

/// Collision listener. Structural world changes go through the command
/// buffer and are applied once the update finishes.
pub type CollisionListener =
    Box<dyn FnMut(&CollisionEvent<'_>, &mut CommandBuffer) + Send + Sync + 'static>;

/// Collision event emitter of an entity.
#[derive(Default)]
pub struct CollisionListeners {
    listeners: Vec<(EventKind, CollisionListener)>,
    mask: u8,
}

impl CollisionListeners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for `kind`.
    pub fn on<F>(&mut self, kind: EventKind, listener: F) -> &mut Self
    where
        F: FnMut(&CollisionEvent<'_>, &mut CommandBuffer) + Send + Sync + 'static,
    {
        self.listeners.push((kind, Box::new(listener)));
        self.mask |= kind.bit();
        self
    }

    /// Builder form of [`CollisionListeners::on`].
    pub fn with<F>(mut self, kind: EventKind, listener: F) -> Self
    where
        F: FnMut(&CollisionEvent<'_>, &mut CommandBuffer) + Send + Sync + 'static,
    {
        self.on(kind, listener);
        self
    }

    /// Drop every listener for `kind`.
    pub fn off(&mut self, kind: EventKind) -> &mut Self {
        self.listeners.retain(|(k, _)| *k != kind);
        self.mask &= !kind.bit();
        self
    }

    pub fn has_event(&self, kind: EventKind) -> bool {
        self.mask & kind.bit() != 0
    }

    pub fn has_any(&self, kinds: &[EventKind]) -> bool {
        let bits = kinds.iter().fold(0, |acc, k| acc | k.bit());
        self.mask & bits != 0
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Call every listener registered for the event's kind, in registration order.
    pub fn fire(&mut self, event: &CollisionEvent<'_>, commands: &mut CommandBuffer) {
        let kind = event.kind();
        if !self.has_event(kind) {
            return;
        }
        for (k, listener) in &mut self.listeners {
            if *k == kind {
                listener(event, commands);
            }
        }
    }
}

impl fmt::Debug for CollisionListeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kinds: Vec<EventKind> = self.listeners.iter().map(|(k, _)| *k).collect();
        f.debug_struct("CollisionListeners")
            .field("kinds", &kinds)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_has_event_tracks_registration() {
        let mut listeners = CollisionListeners::new();
        assert!(!listeners.has_any(&EventKind::ALL));

        listeners.on(EventKind::TriggerEnter, |_, _| {});
        assert!(listeners.has_event(EventKind::TriggerEnter));
        assert!(!listeners.has_event(EventKind::TriggerLeave));
        assert!(listeners.has_any(&[EventKind::TriggerLeave, EventKind::TriggerEnter]));
        assert!(!listeners.has_any(&[EventKind::Contact, EventKind::CollisionStart]));

        listeners.off(EventKind::TriggerEnter);
        assert!(!listeners.has_event(EventKind::TriggerEnter));
        assert!(listeners.is_empty());
    }

    #[test]
    fn test_fire_only_matching_kind() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let mut listeners = CollisionListeners::new()
            .with(EventKind::CollisionEnd, move |event, _| {
                assert_eq!(event.kind(), EventKind::CollisionEnd);
                c.fetch_add(1, Ordering::SeqCst);
            })
            .with(EventKind::TriggerLeave, |_, _| panic!("wrong kind"));

        let mut world = hecs::World::new();
        let other = world.spawn(());
        let mut commands = CommandBuffer::new();
        listeners.fire(&CollisionEvent::CollisionEnd(other), &mut commands);
        listeners.fire(&CollisionEvent::TriggerEnter(other), &mut commands);

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(listeners.len(), 2);
    }

    #[test]
    fn test_listener_defers_despawn() {
        let mut world = hecs::World::new();
        let other = world.spawn(());
        let mut listeners =
            CollisionListeners::new().with(EventKind::TriggerEnter, |event, commands| {
                commands.despawn(event.other());
            });

        let mut commands = CommandBuffer::new();
        listeners.fire(&CollisionEvent::TriggerEnter(other), &mut commands);
        assert!(world.contains(other));

        commands.run_on(&mut world);
        assert!(!world.contains(other));
    }

    #[test]
    fn test_event_other() {
        let mut world = hecs::World::new();
        let other = world.spawn(());
        let result = ContactResult {
            other,
            contacts: Vec::new(),
        };
        assert_eq!(CollisionEvent::Contact(&result).other(), other);
        assert_eq!(CollisionEvent::TriggerLeave(other).other(), other);
    }
}
