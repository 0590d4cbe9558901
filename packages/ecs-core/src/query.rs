//! The Query engine: declarative, scoped, composable reads over the Store.

use std::any::TypeId;
use std::marker::PhantomData;

use crate::component::{self, Component};
use crate::entity::EntityId;
use crate::error::{EcsError, Result};
use crate::store::Store;

/// The set of candidate entities a query runs over. At most one scope
/// applies per query.
#[derive(Debug, Clone)]
pub enum Scope {
    /// Every entity with at least one component.
    All,
    /// Exactly the listed entities.
    For(Vec<EntityId>),
    /// Every entity except the listed ones.
    NotFor(Vec<EntityId>),
    ForChildrenOf(EntityId),
    ForDescendantsOf(EntityId),
    ForParentsOf(EntityId),
    ForAncestorsOf(EntityId),
}

/// One AND-group of with/without component-type filters. A query keeps a
/// candidate iff it satisfies at least one group (OR across groups); with no
/// groups at all, every candidate passes.
#[derive(Debug, Clone, Default)]
pub struct FilterGroup {
    with: Vec<TypeId>,
    without: Vec<TypeId>,
}

impl FilterGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<T: Component + 'static>(mut self) -> Self {
        self.with.push(component::component_kind::<T>());
        self
    }

    pub fn without<T: Component + 'static>(mut self) -> Self {
        self.without.push(component::component_kind::<T>());
        self
    }

    fn matches(&self, store: &Store, entity: EntityId) -> bool {
        self.with.iter().all(|t| store.has_component_type(entity, *t))
            && self.without.iter().all(|t| !store.has_component_type(entity, *t))
    }
}

/// One element of a select tuple: a required component, an optional
/// component (`Optional<T>`), or the entity id itself (`Entity`).
pub trait Select {
    type Item;

    /// Pushes this element's required component type, if it has one.
    fn required_types(_out: &mut Vec<TypeId>) {}

    fn fetch(store: &Store, entity: EntityId) -> Option<Self::Item>;
}

/// Selects the candidate's own id.
pub struct Entity;

impl Select for Entity {
    type Item = EntityId;

    fn fetch(_store: &Store, entity: EntityId) -> Option<EntityId> {
        Some(entity)
    }
}

/// Selects a component as present-or-absent rather than required.
pub struct Optional<T>(PhantomData<T>);

impl<T: Component + Clone + 'static> Select for Optional<T> {
    type Item = Option<T>;

    fn fetch(store: &Store, entity: EntityId) -> Option<Option<T>> {
        Some(store.with_component::<T, _>(entity, |c, _| c.clone()))
    }
}

impl<T: Component + Clone + 'static> Select for T {
    type Item = T;

    fn required_types(out: &mut Vec<TypeId>) {
        out.push(component::component_kind::<T>());
    }

    fn fetch(store: &Store, entity: EntityId) -> Option<T> {
        store.with_component::<T, _>(entity, |c, _| c.clone())
    }
}

macro_rules! impl_select_tuple {
    ($($name:ident),+) => {
        impl<$($name: Select),+> Select for ($($name,)+) {
            type Item = ($($name::Item,)+);

            fn required_types(out: &mut Vec<TypeId>) {
                $($name::required_types(out);)+
            }

            #[allow(non_snake_case)]
            fn fetch(store: &Store, entity: EntityId) -> Option<Self::Item> {
                $(let $name = $name::fetch(store, entity)?;)+
                Some(($($name,)+))
            }
        }
    };
}

impl_select_tuple!(A);
impl_select_tuple!(A, B);
impl_select_tuple!(A, B, C);
impl_select_tuple!(A, B, C, D);
impl_select_tuple!(A, B, C, D, E);
impl_select_tuple!(A, B, C, D, E, F);
impl_select_tuple!(A, B, C, D, E, F, G);
impl_select_tuple!(A, B, C, D, E, F, G, H);

/// A declarative, composable query over the Store.
pub struct Query<'a, S: Select> {
    store: &'a Store,
    scope: Scope,
    filters: Vec<FilterGroup>,
    _marker: PhantomData<S>,
}

impl<'a, S: Select> Query<'a, S> {
    pub fn new(store: &'a Store) -> Self {
        Self {
            store,
            scope: Scope::All,
            filters: Vec::new(),
            _marker: PhantomData,
        }
    }

    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn filter(mut self, group: FilterGroup) -> Self {
        self.filters.push(group);
        self
    }

    fn candidates(&self) -> Result<Vec<EntityId>> {
        Ok(match &self.scope {
            Scope::All => self.store.all_entities(),
            Scope::For(ids) => ids.clone(),
            Scope::NotFor(excluded) => {
                let excluded: std::collections::HashSet<_> = excluded.iter().copied().collect();
                self.store
                    .all_entities()
                    .into_iter()
                    .filter(|e| !excluded.contains(e))
                    .collect()
            }
            Scope::ForChildrenOf(e) => self.store.children(*e),
            Scope::ForDescendantsOf(e) => self.store.descendants(*e),
            Scope::ForParentsOf(e) => self.store.parents(*e),
            Scope::ForAncestorsOf(e) => self.store.ancestors(*e),
        })
    }

    /// Runs the query, returning every matching tuple in select order. Not
    /// ordered across candidates when produced by parallel workers.
    pub fn stream(&self) -> Result<Vec<S::Item>> {
        let mut required = Vec::new();
        S::required_types(&mut required);

        let results = self
            .candidates()?
            .into_iter()
            .filter(|entity| {
                self.filters.is_empty()
                    || self.filters.iter().any(|group| group.matches(self.store, *entity))
            })
            .filter(|entity| {
                required.iter().all(|t| self.store.has_component_type(*entity, *t))
            })
            .filter_map(|entity| S::fetch(self.store, entity))
            .collect();
        Ok(results)
    }

    /// Runs the query, expecting exactly one match.
    pub fn one(&self) -> Result<S::Item> {
        let mut results = self.stream()?;
        match results.len() {
            0 => Err(EcsError::NotFound("query matched no entities".to_string())),
            1 => Ok(results.pop().unwrap()),
            _ => Err(EcsError::MultipleResults),
        }
    }
}

/// Additional read operations that don't fit the select/scope query shape.
pub struct Queries<'a> {
    store: &'a Store,
}

impl<'a> Queries<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    pub fn query<S: Select>(&self) -> Query<'a, S> {
        Query::new(self.store)
    }

    pub fn has_component<T: Component + 'static>(&self, entity: EntityId) -> bool {
        self.store.has_component::<T>(entity)
    }

    pub fn has_components(&self, entity: EntityId, types: &[TypeId]) -> bool {
        types.iter().all(|t| self.store.has_component_type(entity, *t))
    }

    pub fn list_components(&self, entity: EntityId) -> Vec<(TypeId, &'static str)> {
        self.store.list_components(entity)
    }

    pub fn is_parent_of(&self, parent: EntityId, child: EntityId) -> bool {
        self.store.is_parent_of(parent, child)
    }

    pub fn is_child_of(&self, child: EntityId, parent: EntityId) -> bool {
        self.store.is_child_of(child, parent)
    }

    pub fn children(&self, entity: EntityId) -> Vec<EntityId> {
        self.store.children(entity)
    }

    pub fn descendants(&self, entity: EntityId) -> Vec<EntityId> {
        self.store.descendants(entity)
    }

    pub fn parents(&self, entity: EntityId) -> Vec<EntityId> {
        self.store.parents(entity)
    }

    pub fn ancestors(&self, entity: EntityId) -> Vec<EntityId> {
        self.store.ancestors(entity)
    }

    /// All tagged components world-wide carrying every tag in `tags`.
    pub fn tagged(&self, tags: &[String]) -> Vec<(EntityId, TypeId, &'static str)> {
        self.store.tagged_components(tags)
    }

    pub fn tagged_for(&self, entity: EntityId, tags: &[String]) -> Vec<(TypeId, &'static str)> {
        self.store.tagged_components_for(entity, tags)
    }

    pub fn tagged_children_of(
        &self,
        entity: EntityId,
        tags: &[String],
    ) -> Vec<(EntityId, TypeId, &'static str)> {
        self.tagged_in(self.store.children(entity), tags)
    }

    pub fn tagged_descendants_of(
        &self,
        entity: EntityId,
        tags: &[String],
    ) -> Vec<(EntityId, TypeId, &'static str)> {
        self.tagged_in(self.store.descendants(entity), tags)
    }

    pub fn tagged_parents_of(
        &self,
        entity: EntityId,
        tags: &[String],
    ) -> Vec<(EntityId, TypeId, &'static str)> {
        self.tagged_in(self.store.parents(entity), tags)
    }

    pub fn tagged_ancestors_of(
        &self,
        entity: EntityId,
        tags: &[String],
    ) -> Vec<(EntityId, TypeId, &'static str)> {
        self.tagged_in(self.store.ancestors(entity), tags)
    }

    fn tagged_in(&self, entities: Vec<EntityId>, tags: &[String]) -> Vec<(EntityId, TypeId, &'static str)> {
        entities
            .into_iter()
            .flat_map(|e| {
                self.store
                    .tagged_components_for(e, tags)
                    .into_iter()
                    .map(move |(t, name)| (e, t, name))
            })
            .collect()
    }
}
