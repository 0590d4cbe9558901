//! The Command executor: validated, batched mutation of the Store.
//!
//! Commands only run from inside a system; ambient identity is an explicit
//! [`SystemContext`] threaded through every call and mirrored into a
//! `tokio::task_local!` as a convenience for call sites that can't easily
//! carry it. The task-local is never the source of truth.

use std::any::TypeId;
use std::future::Future;

use crate::component::{self, Children, Component, EntityList, Parents};
use crate::entity::EntityId;
use crate::error::{EcsError, Result};
use crate::event::{BatchKey, ComponentCreated, ComponentDeleted, ComponentUpdated};
use crate::event::{ResourceCreated, ResourceDeleted, ResourceUpdated};
use crate::resource::{self, Resource};
use crate::store::Store;

type Commit = Box<dyn FnOnce(&Store) -> Result<()> + Send + Sync>;

/// Whether a system runs serially (startup/frame-start/frame-end/shutdown)
/// or concurrently within a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Sync,
    Async,
}

/// One component type (optionally tag-qualified) a system has declared it locks.
#[derive(Debug, Clone)]
pub struct LockedComponent {
    pub type_id: TypeId,
    pub tag: Option<String>,
}

/// The ambient identity every `Commands`/`Query` call runs under.
#[derive(Debug, Clone)]
pub struct SystemContext {
    pub system_name: &'static str,
    pub mode: ExecutionMode,
    pub locked_components: Vec<LockedComponent>,
}

impl SystemContext {
    pub fn sync(system_name: &'static str) -> Self {
        Self {
            system_name,
            mode: ExecutionMode::Sync,
            locked_components: Vec::new(),
        }
    }

    pub fn async_with_locks(system_name: &'static str, locked_components: Vec<LockedComponent>) -> Self {
        Self {
            system_name,
            mode: ExecutionMode::Async,
            locked_components,
        }
    }

    fn locks(&self, type_id: TypeId) -> bool {
        self.locked_components.iter().any(|l| l.type_id == type_id)
    }

    /// Runs `f` with this context installed as the task-local ambient context.
    pub async fn scope<F: Future>(self, f: F) -> F::Output {
        CURRENT_SYSTEM.scope(self, f).await
    }

    /// Reads the ambient context, if any task-local scope is active.
    pub fn try_current() -> Option<SystemContext> {
        CURRENT_SYSTEM.try_with(|ctx| ctx.clone()).ok()
    }
}

tokio::task_local! {
    static CURRENT_SYSTEM: SystemContext;
}

/// A builder for the components, children, and parents of one spawned entity.
pub struct EntitySpec {
    id: Option<EntityId>,
    inserts: Vec<(
        TypeId,
        &'static str,
        Box<dyn FnOnce(&Store, EntityId) -> Result<()> + Send + Sync>,
    )>,
    children: Vec<EntityId>,
    parents: Vec<EntityId>,
}

impl EntitySpec {
    pub fn new() -> Self {
        Self {
            id: None,
            inserts: Vec::new(),
            children: Vec::new(),
            parents: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: EntityId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_component<T: Component + 'static>(self, value: T) -> Self {
        self.with_tagged_component(value, Vec::new())
    }

    pub fn with_tagged_component<T: Component + 'static>(mut self, value: T, tags: Vec<String>) -> Self {
        let type_id = component::component_kind::<T>();
        let type_name = component::component_type_name::<T>();
        self.inserts.push((
            type_id,
            type_name,
            Box::new(move |store: &Store, entity: EntityId| {
                store.insert_component(entity, value, &tags)?;
                store.emit_event(
                    ComponentCreated {
                        entity,
                        component_type: type_name,
                    },
                    BatchKey::Default,
                );
                Ok(())
            }),
        ));
        self
    }

    pub fn with_child(mut self, child: EntityId) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_parent(mut self, parent: EntityId) -> Self {
        self.parents.push(parent);
        self
    }

    fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.children.is_empty() && self.parents.is_empty()
    }
}

impl Default for EntitySpec {
    fn default() -> Self {
        Self::new()
    }
}

enum Op {
    Spawn {
        entity: EntityId,
        spec: EntitySpec,
    },
    Despawn {
        entity: EntityId,
        cascade: bool,
    },
    AddComponent {
        entity: EntityId,
        type_id: TypeId,
        apply: Commit,
    },
    UpdateComponent {
        entity: EntityId,
        type_id: TypeId,
        apply: Commit,
    },
    RemoveComponent {
        entity: EntityId,
        type_id: TypeId,
        apply: Commit,
    },
    Relation(Commit),
    InsertResource(Commit),
    UpdateResource(Commit),
    RemoveResource(Commit),
}

/// Accumulates mutations for one call from inside a system, then applies them
/// atomically (with respect to readers) in a single [`Commands::commit`].
pub struct Commands<'a> {
    store: &'a Store,
    context: SystemContext,
    ops: Vec<Op>,
}

impl<'a> Commands<'a> {
    /// Fails with `WrongPhase` unless called from inside a system context;
    /// per the design, that context is always passed explicitly.
    pub fn new(store: &'a Store, context: SystemContext) -> Self {
        Self {
            store,
            context,
            ops: Vec::new(),
        }
    }

    fn check_lock<T: Component + 'static>(&self) -> Result<()> {
        match self.context.mode {
            ExecutionMode::Async => {
                let type_id = component::component_kind::<T>();
                if !self.context.locks(type_id) {
                    return Err(EcsError::NotLocked {
                        system: self.context.system_name.to_string(),
                        component_type: component::component_type_name::<T>(),
                    });
                }
            }
            ExecutionMode::Sync => {
                tracing::warn!(
                    system = self.context.system_name,
                    "locked_components is ignored for sync systems"
                );
            }
        }
        Ok(())
    }

    fn check_sync_only(&self, op: &str) -> Result<()> {
        if self.context.mode == ExecutionMode::Async {
            return Err(EcsError::WrongPhase(format!(
                "'{op}' is not permitted from an async system"
            )));
        }
        Ok(())
    }

    pub fn spawn(&mut self, spec: EntitySpec) -> Result<EntityId> {
        if spec.is_empty() {
            return Err(EcsError::ArgumentShape(
                "spawn requires at least one component, child, or parent".to_string(),
            ));
        }
        let entity = spec.id.unwrap_or_else(EntityId::new);
        self.ops.push(Op::Spawn { entity, spec });
        Ok(entity)
    }

    pub fn despawn(&mut self, entity: EntityId) {
        self.ops.push(Op::Despawn {
            entity,
            cascade: false,
        });
    }

    pub fn despawn_cascade(&mut self, entity: EntityId) {
        self.ops.push(Op::Despawn {
            entity,
            cascade: true,
        });
    }

    pub fn add_component<T: Component + 'static>(&mut self, entity: EntityId, value: T) -> Result<()> {
        self.check_lock::<T>()?;
        value.validate().map_err(|e| EcsError::InvalidPayload {
            component_type: component::component_type_name::<T>(),
            reason: e.to_string(),
        })?;
        let type_id = component::component_kind::<T>();
        let type_name = component::component_type_name::<T>();
        self.ops.push(Op::AddComponent {
            entity,
            type_id,
            apply: Box::new(move |store| {
                store.insert_component(entity, value, &[])?;
                store.emit_event(
                    ComponentCreated {
                        entity,
                        component_type: type_name,
                    },
                    BatchKey::Default,
                );
                Ok(())
            }),
        });
        Ok(())
    }

    pub fn update_component<T: Component + 'static>(&mut self, entity: EntityId, value: T) -> Result<()> {
        self.check_lock::<T>()?;
        value.validate().map_err(|e| EcsError::InvalidPayload {
            component_type: component::component_type_name::<T>(),
            reason: e.to_string(),
        })?;
        let type_id = component::component_kind::<T>();
        let type_name = component::component_type_name::<T>();
        self.ops.push(Op::UpdateComponent {
            entity,
            type_id,
            apply: Box::new(move |store| {
                store.update_component(entity, value)?;
                store.emit_event(
                    ComponentUpdated {
                        entity,
                        component_type: type_name,
                    },
                    BatchKey::Default,
                );
                Ok(())
            }),
        });
        Ok(())
    }

    pub fn remove_component<T: Component + 'static>(&mut self, entity: EntityId) -> Result<()> {
        self.check_lock::<T>()?;
        let type_id = component::component_kind::<T>();
        let type_name = component::component_type_name::<T>();
        self.ops.push(Op::RemoveComponent {
            entity,
            type_id,
            apply: Box::new(move |store| {
                store.remove_component::<T>(entity)?;
                store.emit_event(
                    ComponentDeleted {
                        entity,
                        component_type: type_name,
                    },
                    BatchKey::Default,
                );
                Ok(())
            }),
        });
        Ok(())
    }

    pub fn add_child(&mut self, parent: EntityId, child: EntityId) {
        self.ops.push(Op::Relation(Box::new(move |store| {
            upsert_relation::<Children>(store, parent, child)?;
            upsert_relation::<Parents>(store, child, parent)?;
            Ok(())
        })));
    }

    pub fn remove_child(&mut self, parent: EntityId, child: EntityId) {
        self.ops.push(Op::Relation(Box::new(move |store| {
            remove_relation::<Children>(store, parent, child)?;
            remove_relation::<Parents>(store, child, parent)?;
            Ok(())
        })));
    }

    pub fn add_parent(&mut self, child: EntityId, parent: EntityId) {
        self.add_child(parent, child);
    }

    pub fn remove_parent(&mut self, child: EntityId, parent: EntityId) {
        self.remove_child(parent, child);
    }

    pub fn insert_resource<T: Resource + 'static>(&mut self, value: T) -> Result<()> {
        self.check_sync_only("insert_resource")?;
        value.validate().map_err(|e| EcsError::InvalidPayload {
            component_type: resource::resource_type_name::<T>(),
            reason: e.to_string(),
        })?;
        let type_name = resource::resource_type_name::<T>();
        self.ops.push(Op::InsertResource(Box::new(move |store| {
            store.insert_resource(value)?;
            store.emit_event(
                ResourceCreated {
                    resource_type: type_name,
                },
                BatchKey::Default,
            );
            Ok(())
        })));
        Ok(())
    }

    pub fn update_resource<T: Resource + 'static>(&mut self, value: T) -> Result<()> {
        self.check_sync_only("update_resource")?;
        value.validate().map_err(|e| EcsError::InvalidPayload {
            component_type: resource::resource_type_name::<T>(),
            reason: e.to_string(),
        })?;
        let type_name = resource::resource_type_name::<T>();
        self.ops.push(Op::UpdateResource(Box::new(move |store| {
            store.update_resource(value)?;
            store.emit_event(
                ResourceUpdated {
                    resource_type: type_name,
                },
                BatchKey::Default,
            );
            Ok(())
        })));
        Ok(())
    }

    pub fn remove_resource<T: Resource + 'static>(&mut self) -> Result<()> {
        self.check_sync_only("remove_resource")?;
        let type_name = resource::resource_type_name::<T>();
        self.ops.push(Op::RemoveResource(Box::new(move |store| {
            store.remove_resource::<T>()?;
            store.emit_event(
                ResourceDeleted {
                    resource_type: type_name,
                },
                BatchKey::Default,
            );
            Ok(())
        })));
        Ok(())
    }

    /// Validates, plans, and commits every accumulated operation: inserts,
    /// then updates, then deletes. Returns the ids of newly spawned entities.
    pub fn commit(self) -> Result<Vec<EntityId>> {
        let Commands { store, ops, .. } = self;

        check_duplicate_keys(&ops)?;
        validate_existing_entities(store, &ops)?;

        let mut spawned = Vec::new();
        let mut inserts: Vec<Commit> = Vec::new();
        let mut updates: Vec<Commit> = Vec::new();
        let mut deletes: Vec<Commit> = Vec::new();

        for op in ops {
            match op {
                Op::Spawn { entity, spec } => {
                    spawned.push(entity);
                    let EntitySpec {
                        children, parents, inserts: comp_inserts, ..
                    } = spec;
                    let children_for_relation = children.clone();
                    let parents_for_relation = parents.clone();
                    inserts.push(Box::new(move |store| {
                        let mut child_list = EntityList::default();
                        for c in &children {
                            child_list.insert(*c);
                        }
                        store.insert_component(entity, Children(child_list), &[])?;

                        let mut parent_list = EntityList::default();
                        for p in &parents {
                            parent_list.insert(*p);
                        }
                        store.insert_component(entity, Parents(parent_list), &[])?;

                        for c in &children_for_relation {
                            upsert_relation::<Parents>(store, *c, entity)?;
                        }
                        for p in &parents_for_relation {
                            upsert_relation::<Children>(store, *p, entity)?;
                        }
                        Ok(())
                    }));
                    for (_, _, apply) in comp_inserts {
                        inserts.push(Box::new(move |store| apply(store, entity)));
                    }
                }
                Op::Despawn { entity, cascade } => {
                    if cascade {
                        for descendant in store.descendants(entity) {
                            deletes.push(Box::new(move |store| despawn_one(store, descendant)));
                        }
                    }
                    deletes.push(Box::new(move |store| despawn_one(store, entity)));
                }
                Op::AddComponent { apply, .. } => inserts.push(apply),
                Op::UpdateComponent { apply, .. } => updates.push(apply),
                Op::RemoveComponent { apply, .. } => deletes.push(apply),
                Op::Relation(apply) => updates.push(apply),
                Op::InsertResource(apply) => inserts.push(apply),
                Op::UpdateResource(apply) => updates.push(apply),
                Op::RemoveResource(apply) => deletes.push(apply),
            }
        }

        for op in inserts {
            op(store)?;
        }
        for op in updates {
            op(store)?;
        }
        for op in deletes {
            op(store)?;
        }

        Ok(spawned)
    }
}

fn despawn_one(store: &Store, entity: EntityId) -> Result<()> {
    for (_, type_name) in store.list_components(entity) {
        store.emit_event(
            ComponentDeleted {
                entity,
                component_type: type_name,
            },
            BatchKey::Default,
        );
    }
    for parent in store.parents(entity) {
        remove_relation::<Children>(store, parent, entity)?;
    }
    for child in store.children(entity) {
        remove_relation::<Parents>(store, child, entity)?;
    }
    store.purge_entity(entity);
    Ok(())
}

trait RelationComponent: Component + Clone + Default + 'static {
    fn list_mut(&mut self) -> &mut EntityList;
}

impl RelationComponent for Children {
    fn list_mut(&mut self) -> &mut EntityList {
        &mut self.0
    }
}

impl RelationComponent for Parents {
    fn list_mut(&mut self) -> &mut EntityList {
        &mut self.0
    }
}

fn upsert_relation<R: RelationComponent>(store: &Store, entity: EntityId, other: EntityId) -> Result<()> {
    match store.with_component::<R, _>(entity, |c, _| c.clone()) {
        Some(mut current) => {
            if current.list_mut().insert(other) {
                store.update_component(entity, current)?;
            }
            Ok(())
        }
        None => {
            let mut fresh = R::default();
            fresh.list_mut().insert(other);
            store.insert_component(entity, fresh, &[])
        }
    }
}

fn remove_relation<R: RelationComponent>(store: &Store, entity: EntityId, other: EntityId) -> Result<()> {
    if let Some(mut current) = store.with_component::<R, _>(entity, |c, _| c.clone()) {
        if current.list_mut().remove(other) {
            store.update_component(entity, current)?;
        }
    }
    Ok(())
}

fn check_duplicate_keys(ops: &[Op]) -> Result<()> {
    use std::collections::HashSet;
    let mut insert_keys = HashSet::new();
    let mut update_keys = HashSet::new();
    let mut remove_keys = HashSet::new();
    for op in ops {
        let (entity, type_id, seen) = match op {
            Op::AddComponent { entity, type_id, .. } => (*entity, *type_id, &mut insert_keys),
            Op::UpdateComponent { entity, type_id, .. } => (*entity, *type_id, &mut update_keys),
            Op::RemoveComponent { entity, type_id, .. } => (*entity, *type_id, &mut remove_keys),
            _ => continue,
        };
        if !seen.insert((entity, type_id)) {
            return Err(EcsError::DuplicateCommitKey(format!("{entity:?}/{type_id:?}")));
        }
    }
    Ok(())
}

fn validate_existing_entities(store: &Store, ops: &[Op]) -> Result<()> {
    let mut known: std::collections::HashSet<EntityId> = store.all_entities().into_iter().collect();
    for op in ops {
        if let Op::Spawn { entity, .. } = op {
            known.insert(*entity);
        }
    }

    let check = |entity: EntityId| -> Result<()> {
        if known.contains(&entity) {
            Ok(())
        } else {
            Err(EcsError::NotFound(format!("entity {entity} does not exist")))
        }
    };

    let targets = ops.iter().filter_map(|op| match op {
        Op::Despawn { entity, .. }
        | Op::AddComponent { entity, .. }
        | Op::UpdateComponent { entity, .. }
        | Op::RemoveComponent { entity, .. } => Some(*entity),
        _ => None,
    });

    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        let targets: Vec<EntityId> = targets.collect();
        if targets.len() > 64 {
            return targets.par_iter().try_for_each(|e| check(*e));
        }
        for entity in targets {
            check(entity)?;
        }
        return Ok(());
    }

    #[cfg(not(feature = "parallel"))]
    {
        for entity in targets {
            check(entity)?;
        }
        Ok(())
    }
}
