//! Engine error taxonomy.

use thiserror::Error;

/// Errors raised by the Store, Query engine, and Command executor.
#[derive(Error, Debug, Clone)]
pub enum EcsError {
    /// Inputs violate a declared shape (wrong arity, mixed scope selectors, etc).
    #[error("argument shape violation: {0}")]
    ArgumentShape(String),

    /// Entity, component, or resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Duplicate entity id, duplicate component on entity, or duplicate resource.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// An async system mutated a component type it did not declare in `lock_components`.
    #[error("component type '{component_type}' not locked by system '{system}'")]
    NotLocked {
        system: String,
        component_type: &'static str,
    },

    /// Resource CUD attempted from an async system, or a command attempted outside a system context.
    #[error("wrong phase: {0}")]
    WrongPhase(String),

    /// A user `validate` hook rejected a payload.
    #[error("invalid payload for '{component_type}': {reason}")]
    InvalidPayload {
        component_type: &'static str,
        reason: String,
    },

    /// `Query::one` matched more than one result.
    #[error("multiple results for query, expected exactly one")]
    MultipleResults,

    /// A run-condition returned something other than a plain boolean, or errored. Fatal by design.
    #[error("run condition '{0}' did not resolve to a boolean")]
    NonBooleanRunCondition(String),

    /// The same component/resource key appeared twice within one commit. Programmer error.
    #[error("duplicate commit key: {0}")]
    DuplicateCommitKey(String),

    /// An internal lock was poisoned by a panicking holder.
    #[error("internal lock poisoned: {0}")]
    LockPoisoned(String),
}

/// Result alias used throughout the engine.
pub type Result<T> = std::result::Result<T, EcsError>;
