//! Read-only HTTP subscription server for projection snapshots.
//!
//! Deliberately thin: a running scheduler publishes `serde_json::Value`
//! snapshots into a [`snapshots::Snapshots`] map from its projections'
//! `on_change` hooks, and this server exposes them over one GET route. No
//! CRUD, DDL, or RPC surface.

pub mod router;
pub mod server;
pub mod snapshots;

pub use router::Router;
pub use server::Server;
pub use snapshots::Snapshots;
