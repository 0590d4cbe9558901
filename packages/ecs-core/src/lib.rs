//! Storage, query, and command core of the entity-component-system runtime.
//!
//! Provides the Store (components, resources, events), the Query engine, and
//! the Command executor. The Scheduler, state machine, and projection runtime
//! live one layer up, in `ecs-runtime`.

pub mod command;
pub mod component;
pub mod config;
pub mod entity;
pub mod error;
pub mod event;
pub mod query;
pub mod resource;
pub mod store;

pub use command::{Commands, EntitySpec, ExecutionMode, LockedComponent, SystemContext};
pub use entity::EntityId;
pub use error::{EcsError, Result};
pub use query::{Entity, FilterGroup, Optional, Queries, Query, Scope, Select};
pub use store::Store;
