//! The published snapshot cache a running scheduler's projections write into
//! and this server's single route reads from.
//!
//! Kept deliberately decoupled from `ecs_runtime::Projection`'s generic
//! `Output` type: a projection publishes by calling [`Snapshots::publish`]
//! from its `on_change` hook once it has a `serde_json::Value` to hand out,
//! rather than this crate reaching into the scheduler's internals.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;

/// Shared, lock-free map of projection name to its last published value.
#[derive(Clone, Default)]
pub struct Snapshots {
    inner: Arc<DashMap<String, Value>>,
}

impl Snapshots {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
        }
    }

    pub fn publish(&self, name: impl Into<String>, value: Value) {
        self.inner.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.inner.get(name).map(|entry| entry.value().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_then_get_roundtrips() {
        let snapshots = Snapshots::new();
        snapshots.publish("entity_count", serde_json::json!(3));
        assert_eq!(snapshots.get("entity_count"), Some(serde_json::json!(3)));
    }

    #[test]
    fn unpublished_name_is_none() {
        let snapshots = Snapshots::new();
        assert!(snapshots.get("missing").is_none());
    }
}
