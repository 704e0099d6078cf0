//! Store event model
//!
//! Every store layer queues at most one event per operation on the active
//! write transaction. The queue is delivered to subscribers after commit, in
//! commit order; a rolled-back transaction delivers nothing.

use serde_json::Value;

/// What happened to a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Created,
    Updated,
    Deleted,
}

/// One committed store mutation, as seen by subscribers
#[derive(Debug, Clone)]
pub struct Event {
    /// Entity type tag of the emitting store layer (e.g. "router",
    /// "edgeRouter")
    pub entity_type: &'static str,
    pub kind: EventKind,
    /// Snapshot of the record at event time
    pub entity: Value,
}
