//! Component trait, relationship components, and tag metadata.
//!
//! Components are ordinary Rust types; their "kind" is their [`TypeId`], and the
//! [`Component`] trait is the vtable the design notes call for — no runtime
//! reflection, no separate type-registration step.

use std::any::{Any, TypeId};
use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::entity::EntityId;
use crate::error::{EcsError, Result};

/// A user-declared record type attached to exactly one entity.
///
/// `static_tags` are fixed at compile time for the type; per-instance tags
/// supplied at insertion time are unioned with them. Per invariant C2, the
/// resulting set is immutable for the component's lifetime — changing tags
/// requires removing and re-adding the component.
pub trait Component: Any + Send + Sync + fmt::Debug {
    /// Tags declared by the type itself, independent of any particular instance.
    fn static_tags(&self) -> &'static [&'static str] {
        &[]
    }

    /// Optional payload validation hook run by the command executor before commit.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Upcast to `dyn Any` for downcasting by the Store.
    fn as_any(&self) -> &dyn Any;
}

/// Downcasts a stored component to its concrete type.
pub fn downcast<T: Component>(component: &dyn Component) -> Option<&T> {
    component.as_any().downcast_ref::<T>()
}

/// The `TypeId` of a component type, used as the second half of a Store row key.
pub fn component_kind<T: Component + 'static>() -> TypeId {
    TypeId::of::<T>()
}

/// Human-readable name for a component type, used in error messages.
pub fn component_type_name<T: Component + 'static>() -> &'static str {
    std::any::type_name::<T>()
}

/// An ordered, duplicate-free sequence of entities. Shared by [`Children`] and [`Parents`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityList {
    entities: Vec<EntityId>,
}

impl EntityList {
    /// Returns the list contents in insertion order.
    pub fn entities(&self) -> &[EntityId] {
        &self.entities
    }

    /// Returns true if the list is empty.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Inserts `entity`, collapsing duplicates (invariant R2). Returns whether it was newly added.
    pub fn insert(&mut self, entity: EntityId) -> bool {
        if self.entities.contains(&entity) {
            false
        } else {
            self.entities.push(entity);
            true
        }
    }

    /// Removes `entity`. A non-member is a no-op; returns whether anything was removed.
    pub fn remove(&mut self, entity: EntityId) -> bool {
        if let Some(pos) = self.entities.iter().position(|e| *e == entity) {
            self.entities.remove(pos);
            true
        } else {
            false
        }
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.entities.contains(&entity)
    }
}

/// The authoritative list of an entity's children. Auto-created empty on spawn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Children(pub EntityList);

impl Component for Children {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// The authoritative list of an entity's parents. Auto-created empty on spawn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parents(pub EntityList);

impl Component for Parents {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Out-of-band identity metadata for a stored component: its tag set.
///
/// Never embedded in the payload struct itself (design note: "tagged metadata
/// stashed on payload" is explicitly rejected — identity lives in the row, not
/// the value).
#[derive(Debug, Clone, Default)]
pub struct ComponentMeta {
    tags: HashSet<String>,
}

impl ComponentMeta {
    /// Merges a component's static tags with caller-supplied instance tags.
    pub fn merged(static_tags: &[&'static str], instance_tags: &[String]) -> Self {
        let mut tags: HashSet<String> = static_tags.iter().map(|t| t.to_string()).collect();
        tags.extend(instance_tags.iter().cloned());
        Self { tags }
    }

    /// Returns true iff every tag in `required` is present (AND semantics).
    pub fn has_all(&self, required: &[String]) -> bool {
        required.iter().all(|t| self.tags.contains(t))
    }

    pub fn tags(&self) -> &HashSet<String> {
        &self.tags
    }
}

/// Validates that a tag list contains only non-empty, simple identifiers.
pub fn validate_tags(tags: &[String]) -> Result<()> {
    for tag in tags {
        if tag.is_empty() {
            return Err(EcsError::ArgumentShape(
                "component tags must be non-empty strings".to_string(),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_list_collapses_duplicates() {
        let mut list = EntityList::default();
        let a = EntityId::new();
        assert!(list.insert(a));
        assert!(!list.insert(a));
        assert_eq!(list.entities().len(), 1);
    }

    #[test]
    fn entity_list_remove_nonmember_is_noop() {
        let mut list = EntityList::default();
        let a = EntityId::new();
        let b = EntityId::new();
        list.insert(a);
        assert!(!list.remove(b));
        assert_eq!(list.entities(), &[a]);
    }

    #[test]
    fn add_then_remove_restores_empty_list() {
        let mut list = EntityList::default();
        let a = EntityId::new();
        list.insert(a);
        list.remove(a);
        assert!(list.is_empty());
    }

    #[test]
    fn component_meta_merges_static_and_instance_tags() {
        let meta = ComponentMeta::merged(&["npc"], &["boss".to_string()]);
        assert!(meta.has_all(&["npc".to_string(), "boss".to_string()]));
        assert!(!meta.has_all(&["missing".to_string()]));
    }
}
