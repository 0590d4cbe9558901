//! The Store: concurrent component/resource storage plus the event table.
//!
//! Components live in a `dashmap::DashMap` keyed by `(EntityId, TypeId)`,
//! mirroring the guard-deref access pattern the teacher's row storage used,
//! generalized from byte rows to boxed trait objects. A secondary
//! `TypeId -> DashSet<EntityId>` index keeps "all entities with component T"
//! queries off a full table scan.

mod events;

use std::any::{Any, TypeId};
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::{DashMap, DashSet};

use crate::component::{self, Component, ComponentMeta};
use crate::config::EngineConfig;
use crate::entity::EntityId;
use crate::error::{EcsError, Result};
use crate::event::{self, Event, StampedEvent};
use crate::resource::{self, Resource};

pub use events::EventTable;

struct StoredComponent {
    payload: Box<dyn Component>,
    meta: ComponentMeta,
    type_name: &'static str,
}

/// A version-checked memoized relationship traversal.
struct RelationshipCache {
    entries: DashMap<EntityId, (u64, Vec<EntityId>)>,
}

impl RelationshipCache {
    fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    fn get_or_compute(
        &self,
        entity: EntityId,
        current_version: u64,
        compute: impl FnOnce() -> Vec<EntityId>,
    ) -> Vec<EntityId> {
        if let Some(entry) = self.entries.get(&entity) {
            if entry.0 == current_version {
                return entry.1.clone();
            }
        }
        let fresh = compute();
        self.entries.insert(entity, (current_version, fresh.clone()));
        fresh
    }
}

/// Owns every component, resource, and pending event in the world.
///
/// Cheap to share: every field is independently lock-free or internally
/// locked, so `Store` is typically held behind an `Arc` and never needs its
/// own outer lock.
pub struct Store {
    components: DashMap<(EntityId, TypeId), StoredComponent>,
    component_index: DashMap<TypeId, DashSet<EntityId>>,
    resources: DashMap<TypeId, Box<dyn Resource>>,
    events: EventTable,
    /// Bumped on every structural mutation (spawn, despawn, add/remove
    /// component or relationship). Query-engine traversal caches compare
    /// against this to know when to recompute.
    version: AtomicU64,
    config: EngineConfig,
    children_cache: RelationshipCache,
    descendants_cache: RelationshipCache,
    parents_cache: RelationshipCache,
    ancestors_cache: RelationshipCache,
}

impl Store {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            components: DashMap::with_capacity(config.initial_component_capacity),
            component_index: DashMap::new(),
            resources: DashMap::new(),
            events: EventTable::with_capacity(config.initial_event_capacity),
            version: AtomicU64::new(0),
            config,
            children_cache: RelationshipCache::new(),
            descendants_cache: RelationshipCache::new(),
            parents_cache: RelationshipCache::new(),
            ancestors_cache: RelationshipCache::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Monotonic counter of structural mutations, for cache invalidation.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    fn bump_version(&self) {
        self.version.fetch_add(1, Ordering::AcqRel);
    }

    // -- components ---------------------------------------------------

    pub fn insert_component<T: Component + 'static>(
        &self,
        entity: EntityId,
        value: T,
        instance_tags: &[String],
    ) -> Result<()> {
        value.validate()?;
        let key = (entity, component::component_kind::<T>());
        if self.components.contains_key(&key) {
            return Err(EcsError::AlreadyExists(format!(
                "entity {entity} already has component '{}'",
                component::component_type_name::<T>()
            )));
        }
        let meta = ComponentMeta::merged(value.static_tags(), instance_tags);
        self.components.insert(
            key,
            StoredComponent {
                payload: Box::new(value),
                meta,
                type_name: component::component_type_name::<T>(),
            },
        );
        self.component_index
            .entry(component::component_kind::<T>())
            .or_insert_with(DashSet::new)
            .insert(entity);
        self.bump_version();
        Ok(())
    }

    pub fn update_component<T: Component + 'static>(&self, entity: EntityId, value: T) -> Result<()> {
        value.validate()?;
        let key = (entity, component::component_kind::<T>());
        let mut slot = self.components.get_mut(&key).ok_or_else(|| {
            EcsError::NotFound(format!(
                "entity {entity} has no component '{}'",
                component::component_type_name::<T>()
            ))
        })?;
        slot.payload = Box::new(value);
        drop(slot);
        // Covers relationship updates (`Children`/`Parents` are mutated via
        // `update_component`): the traversal caches compare against this
        // counter, so any update must be visible to them, not just structural
        // inserts/removes.
        self.bump_version();
        Ok(())
    }

    pub fn remove_component<T: Component + 'static>(&self, entity: EntityId) -> Result<()> {
        let key = (entity, component::component_kind::<T>());
        self.components.remove(&key).ok_or_else(|| {
            EcsError::NotFound(format!(
                "entity {entity} has no component '{}'",
                component::component_type_name::<T>()
            ))
        })?;
        if let Some(set) = self.component_index.get(&component::component_kind::<T>()) {
            set.remove(&entity);
        }
        self.bump_version();
        Ok(())
    }

    pub fn has_component<T: Component + 'static>(&self, entity: EntityId) -> bool {
        self.components
            .contains_key(&(entity, component::component_kind::<T>()))
    }

    /// Runs `f` against a component's payload and tag metadata without
    /// cloning it out of the map (`DashMap`'s guards don't support
    /// `Ref::map`, so callers project out what they need instead).
    pub fn with_component<T: Component + 'static, R>(
        &self,
        entity: EntityId,
        f: impl FnOnce(&T, &ComponentMeta) -> R,
    ) -> Option<R> {
        let key = (entity, component::component_kind::<T>());
        let slot = self.components.get(&key)?;
        let typed = component::downcast::<T>(slot.payload.as_ref())?;
        Some(f(typed, &slot.meta))
    }

    pub fn entities_with<T: Component + 'static>(&self) -> Vec<EntityId> {
        match self.component_index.get(&component::component_kind::<T>()) {
            Some(set) => set.iter().map(|e| *e).collect(),
            None => Vec::new(),
        }
    }

    pub fn component_count<T: Component + 'static>(&self) -> usize {
        match self.component_index.get(&component::component_kind::<T>()) {
            Some(set) => set.len(),
            None => 0,
        }
    }

    /// Despawns an entity: removes every component row keyed to it, wherever
    /// its type appears in the index. Callers (the command executor) are
    /// responsible for cascading to children first.
    pub fn purge_entity(&self, entity: EntityId) {
        let keys: Vec<(EntityId, TypeId)> = self
            .components
            .iter()
            .filter(|entry| entry.key().0 == entity)
            .map(|entry| *entry.key())
            .collect();
        for key in keys {
            self.components.remove(&key);
            if let Some(set) = self.component_index.get(&key.1) {
                set.remove(&entity);
            }
        }
        self.bump_version();
    }

    /// Every entity with at least one component row (a full scan; there is
    /// no separate entity table).
    pub fn all_entities(&self) -> Vec<EntityId> {
        let mut seen = std::collections::HashSet::new();
        for entry in self.components.iter() {
            seen.insert(entry.key().0);
        }
        seen.into_iter().collect()
    }

    pub fn has_component_type(&self, entity: EntityId, type_id: TypeId) -> bool {
        match self.component_index.get(&type_id) {
            Some(set) => set.contains(&entity),
            None => false,
        }
    }

    /// Lists every user component on `entity`, excluding `Children`/`Parents`.
    pub fn list_components(&self, entity: EntityId) -> Vec<(TypeId, &'static str)> {
        let children = component::component_kind::<crate::component::Children>();
        let parents = component::component_kind::<crate::component::Parents>();
        self.components
            .iter()
            .filter(|entry| entry.key().0 == entity)
            .filter(|entry| entry.key().1 != children && entry.key().1 != parents)
            .map(|entry| (entry.key().1, entry.value().type_name))
            .collect()
    }

    pub fn tagged_components(&self, tags: &[String]) -> Vec<(EntityId, TypeId, &'static str)> {
        self.components
            .iter()
            .filter(|entry| entry.value().meta.has_all(tags))
            .map(|entry| (entry.key().0, entry.key().1, entry.value().type_name))
            .collect()
    }

    pub fn tagged_components_for(
        &self,
        entity: EntityId,
        tags: &[String],
    ) -> Vec<(TypeId, &'static str)> {
        self.components
            .iter()
            .filter(|entry| entry.key().0 == entity && entry.value().meta.has_all(tags))
            .map(|entry| (entry.key().1, entry.value().type_name))
            .collect()
    }

    // -- relationships ----------------------------------------------------

    fn direct_children(&self, entity: EntityId) -> Vec<EntityId> {
        self.with_component::<crate::component::Children, _>(entity, |c, _| {
            c.0.entities().to_vec()
        })
        .unwrap_or_default()
    }

    fn direct_parents(&self, entity: EntityId) -> Vec<EntityId> {
        self.with_component::<crate::component::Parents, _>(entity, |p, _| {
            p.0.entities().to_vec()
        })
        .unwrap_or_default()
    }

    pub fn children(&self, entity: EntityId) -> Vec<EntityId> {
        let version = self.version();
        self.children_cache
            .get_or_compute(entity, version, || self.direct_children(entity))
    }

    pub fn parents(&self, entity: EntityId) -> Vec<EntityId> {
        let version = self.version();
        self.parents_cache
            .get_or_compute(entity, version, || self.direct_parents(entity))
    }

    pub fn descendants(&self, entity: EntityId) -> Vec<EntityId> {
        let version = self.version();
        self.descendants_cache.get_or_compute(entity, version, || {
            self.traverse(entity, |e| self.direct_children(e))
        })
    }

    pub fn ancestors(&self, entity: EntityId) -> Vec<EntityId> {
        let version = self.version();
        self.ancestors_cache.get_or_compute(entity, version, || {
            self.traverse(entity, |e| self.direct_parents(e))
        })
    }

    fn traverse(&self, start: EntityId, mut next: impl FnMut(EntityId) -> Vec<EntityId>) -> Vec<EntityId> {
        let mut visited = std::collections::HashSet::new();
        let mut queue = std::collections::VecDeque::new();
        queue.push_back(start);
        visited.insert(start);
        let mut result = Vec::new();
        while let Some(current) = queue.pop_front() {
            for neighbor in next(current) {
                if visited.insert(neighbor) {
                    result.push(neighbor);
                    queue.push_back(neighbor);
                }
            }
        }
        result
    }

    pub fn is_parent_of(&self, parent: EntityId, child: EntityId) -> bool {
        self.direct_children(parent).contains(&child)
    }

    pub fn is_child_of(&self, child: EntityId, parent: EntityId) -> bool {
        self.direct_parents(child).contains(&parent)
    }

    // -- resources ------------------------------------------------------

    pub fn insert_resource<T: Resource + 'static>(&self, value: T) -> Result<()> {
        value.validate()?;
        let key = resource::resource_kind::<T>();
        if self.resources.contains_key(&key) {
            return Err(EcsError::AlreadyExists(format!(
                "resource '{}' already exists",
                resource::resource_type_name::<T>()
            )));
        }
        self.resources.insert(key, Box::new(value));
        Ok(())
    }

    pub fn update_resource<T: Resource + 'static>(&self, value: T) -> Result<()> {
        value.validate()?;
        let key = resource::resource_kind::<T>();
        let mut slot = self.resources.get_mut(&key).ok_or_else(|| {
            EcsError::NotFound(format!(
                "resource '{}' does not exist",
                resource::resource_type_name::<T>()
            ))
        })?;
        *slot = Box::new(value);
        Ok(())
    }

    pub fn remove_resource<T: Resource + 'static>(&self) -> Result<()> {
        let key = resource::resource_kind::<T>();
        self.resources.remove(&key).ok_or_else(|| {
            EcsError::NotFound(format!(
                "resource '{}' does not exist",
                resource::resource_type_name::<T>()
            ))
        })?;
        Ok(())
    }

    pub fn with_resource<T: Resource + 'static, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let key = resource::resource_kind::<T>();
        let slot = self.resources.get(&key)?;
        let typed = resource::downcast::<T>(slot.as_ref())?;
        Some(f(typed))
    }

    pub fn has_resource<T: Resource + 'static>(&self) -> bool {
        self.resources.contains_key(&resource::resource_kind::<T>())
    }

    // -- events -----------------------------------------------------------

    pub fn emit_event<T: Event + 'static>(&self, payload: T, batch_key: event::BatchKey) {
        self.events.enqueue(StampedEvent {
            event_type: event::event_kind::<T>(),
            type_name: event::event_type_name::<T>(),
            batch_key,
            inserted_at: event::now_millis(),
            payload: std::sync::Arc::new(payload),
        });
    }

    pub fn events(&self) -> &EventTable {
        &self.events
    }

    /// Drains this frame's events as ordered event-batches, each already
    /// collapsed per invariant E1 (same-keyed carry-over events land in a
    /// later batch rather than being dropped).
    pub fn drain_event_batches(&self) -> Vec<Vec<StampedEvent>> {
        self.events.drain_current(self.config.max_events_per_tick)
    }

    /// Drains this frame's events, flattened across batches in delivery
    /// order. Callers downcast individual events by type via
    /// `StampedEvent::downcast`.
    pub fn drain_events(&self) -> Vec<StampedEvent> {
        self.drain_event_batches().into_iter().flatten().collect()
    }

    /// Drains this frame's event batch and filters it down to one concrete
    /// event type.
    pub fn drain_events_of<T: Event + 'static>(&self) -> Vec<StampedEvent> {
        self.drain_events()
            .into_iter()
            .filter(|e| e.event_type == TypeId::of::<T>())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Position {
        x: f32,
        y: f32,
    }
    impl Component for Position {
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[derive(Debug)]
    struct Health(u32);
    impl Component for Health {
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn insert_then_get_roundtrips() {
        let store = Store::new(EngineConfig::default());
        let e = EntityId::new();
        store
            .insert_component(e, Position { x: 1.0, y: 2.0 }, &[])
            .unwrap();
        let seen = store
            .with_component::<Position, _>(e, |p, _| (p.x, p.y))
            .unwrap();
        assert_eq!(seen, (1.0, 2.0));
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let store = Store::new(EngineConfig::default());
        let e = EntityId::new();
        store.insert_component(e, Health(10), &[]).unwrap();
        let err = store.insert_component(e, Health(20), &[]).unwrap_err();
        assert!(matches!(err, EcsError::AlreadyExists(_)));
    }

    #[test]
    fn entities_with_reflects_insert_and_remove() {
        let store = Store::new(EngineConfig::default());
        let a = EntityId::new();
        let b = EntityId::new();
        store.insert_component(a, Health(10), &[]).unwrap();
        store.insert_component(b, Health(20), &[]).unwrap();
        assert_eq!(store.component_count::<Health>(), 2);
        store.remove_component::<Health>(a).unwrap();
        assert_eq!(store.entities_with::<Health>(), vec![b]);
    }

    #[test]
    fn purge_entity_removes_every_component() {
        let store = Store::new(EngineConfig::default());
        let e = EntityId::new();
        store.insert_component(e, Health(10), &[]).unwrap();
        store.insert_component(e, Position { x: 0.0, y: 0.0 }, &[]).unwrap();
        store.purge_entity(e);
        assert!(!store.has_component::<Health>(e));
        assert!(!store.has_component::<Position>(e));
    }

    #[test]
    fn structural_mutation_bumps_version() {
        let store = Store::new(EngineConfig::default());
        let before = store.version();
        store.insert_component(EntityId::new(), Health(1), &[]).unwrap();
        assert!(store.version() > before);
    }
}
