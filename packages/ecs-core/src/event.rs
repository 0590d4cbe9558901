//! Events: immutable, per-frame messages with a (type, batch_key) identity.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use crate::entity::EntityId;

/// An immutable message broadcast into the next frame's event table.
pub trait Event: Any + Send + Sync + fmt::Debug {
    fn as_any(&self) -> &dyn Any;
}

/// Downcasts a stored event to its concrete type.
pub fn downcast<T: Event>(event: &dyn Event) -> Option<&T> {
    event.as_any().downcast_ref::<T>()
}

pub fn event_kind<T: Event + 'static>() -> TypeId {
    TypeId::of::<T>()
}

pub fn event_type_name<T: Event + 'static>() -> &'static str {
    std::any::type_name::<T>()
}

/// Opaque key controlling intra-frame batching of same-typed events.
///
/// Within one batch, at most one event survives per `(event_type, batch_key)`
/// pair (invariant E1); carry-over events spill into subsequent batches.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BatchKey {
    /// The sentinel "no particular key" batch key.
    Default,
    /// A caller-supplied discriminator.
    Keyed(String),
}

impl Default for BatchKey {
    fn default() -> Self {
        BatchKey::Default
    }
}

/// The identity of an event within a single batch: its type plus its batch key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventKey {
    pub event_type: TypeId,
    pub batch_key: BatchKey,
}

/// An event payload plus the metadata the Store and Scheduler need to route it.
#[derive(Clone)]
pub struct StampedEvent {
    pub event_type: TypeId,
    pub type_name: &'static str,
    pub batch_key: BatchKey,
    /// Monotonic millisecond timestamp captured at enqueue time.
    pub inserted_at: u64,
    pub payload: Arc<dyn Event>,
}

impl fmt::Debug for StampedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StampedEvent")
            .field("type_name", &self.type_name)
            .field("batch_key", &self.batch_key)
            .field("inserted_at", &self.inserted_at)
            .finish()
    }
}

impl StampedEvent {
    pub fn key(&self) -> EventKey {
        EventKey {
            event_type: self.event_type,
            batch_key: self.batch_key.clone(),
        }
    }

    pub fn downcast<T: Event>(&self) -> Option<&T> {
        self.payload.as_any().downcast_ref::<T>()
    }
}

/// Current monotonic milliseconds, used to stamp events as they're enqueued.
pub fn now_millis() -> u64 {
    use std::sync::OnceLock;
    use std::time::Instant;

    static START: OnceLock<Instant> = OnceLock::new();
    let start = *START.get_or_init(Instant::now);
    start.elapsed().as_millis() as u64
}

macro_rules! impl_event {
    ($name:ident) => {
        impl Event for $name {
            fn as_any(&self) -> &dyn Any {
                self
            }
        }
    };
}

/// Emitted after a command commits a new component.
#[derive(Debug, Clone)]
pub struct ComponentCreated {
    pub entity: EntityId,
    pub component_type: &'static str,
}
impl_event!(ComponentCreated);

/// Emitted after a command commits an update to an existing component.
#[derive(Debug, Clone)]
pub struct ComponentUpdated {
    pub entity: EntityId,
    pub component_type: &'static str,
}
impl_event!(ComponentUpdated);

/// Emitted after a command commits the removal of a component (including via despawn).
#[derive(Debug, Clone)]
pub struct ComponentDeleted {
    pub entity: EntityId,
    pub component_type: &'static str,
}
impl_event!(ComponentDeleted);

/// Emitted after a resource is inserted.
#[derive(Debug, Clone)]
pub struct ResourceCreated {
    pub resource_type: &'static str,
}
impl_event!(ResourceCreated);

/// Emitted after a resource is updated.
#[derive(Debug, Clone)]
pub struct ResourceUpdated {
    pub resource_type: &'static str,
}
impl_event!(ResourceUpdated);

/// Emitted after a resource is deleted.
#[derive(Debug, Clone)]
pub struct ResourceDeleted {
    pub resource_type: &'static str,
}
impl_event!(ResourceDeleted);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_key_defaults_to_default_variant() {
        assert_eq!(BatchKey::default(), BatchKey::Default);
    }

    #[test]
    fn now_millis_is_monotonic_nondecreasing() {
        let a = now_millis();
        let b = now_millis();
        assert!(b >= a);
    }
}
