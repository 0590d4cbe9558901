//! Singleton resources.

use std::any::{Any, TypeId};
use std::fmt;

use crate::error::Result;

/// A singleton record keyed by its own type (invariant S1: at most one live
/// instance per resource type). Resources may only be created, updated, or
/// deleted from synchronously-scheduled systems.
pub trait Resource: Any + Send + Sync + fmt::Debug {
    /// Optional payload validation hook run before commit.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    fn as_any(&self) -> &dyn Any;
}

/// Downcasts a stored resource to its concrete type.
pub fn downcast<T: Resource>(resource: &dyn Resource) -> Option<&T> {
    resource.as_any().downcast_ref::<T>()
}

/// The `TypeId` of a resource type, used as the Store's resource map key.
pub fn resource_kind<T: Resource + 'static>() -> TypeId {
    TypeId::of::<T>()
}

pub fn resource_type_name<T: Resource + 'static>() -> &'static str {
    std::any::type_name::<T>()
}
