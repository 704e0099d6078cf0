//! Transactional in-memory store
//!
//! Named record collections with a unique-name index, a generic symbol index
//! (value -> owning record ids) and bidirectional link tables, mutated
//! through single-writer transactions. Write transactions run against a
//! clone-on-write copy of the state: commit swaps the copy in, any error
//! discards it, so no partial mutation is ever observable.
//!
//! The physical disk engine the controller deploys with sits behind this
//! same interface; this module is the reference implementation the rest of
//! the data layer is built and tested against.

mod events;
mod tx;

pub use events::{Event, EventKind};
pub use tx::Tx;

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tracing::trace;

use crate::error::Result;

/// One named record collection with its indexes
#[derive(Clone, Default)]
pub(crate) struct Collection {
    pub(crate) records: HashMap<String, Arc<Value>>,
    pub(crate) names: HashMap<String, String>,
    pub(crate) symbols: HashMap<&'static str, HashMap<String, BTreeSet<String>>>,
}

/// Bidirectional many-to-many id mapping
#[derive(Clone, Default)]
pub(crate) struct LinkTable {
    pub(crate) fwd: HashMap<String, BTreeSet<String>>,
    pub(crate) rev: HashMap<String, BTreeSet<String>>,
}

/// Full store state. Collections and link tables are `Arc`-shared so a write
/// transaction's working copy only deep-clones what it touches.
#[derive(Clone, Default)]
pub(crate) struct DbState {
    collections: HashMap<&'static str, Arc<Collection>>,
    links: HashMap<&'static str, Arc<LinkTable>>,
}

impl DbState {
    pub(crate) fn collection(&self, name: &str) -> Option<&Collection> {
        self.collections.get(name).map(Arc::as_ref)
    }

    pub(crate) fn collection_mut(&mut self, name: &'static str) -> &mut Collection {
        Arc::make_mut(self.collections.entry(name).or_default())
    }

    pub(crate) fn link(&self, name: &str) -> Option<&LinkTable> {
        self.links.get(name).map(Arc::as_ref)
    }

    pub(crate) fn link_mut(&mut self, name: &'static str) -> &mut LinkTable {
        Arc::make_mut(self.links.entry(name).or_default())
    }
}

type Listener = Arc<dyn Fn(&Event) + Send + Sync>;

/// The transactional store: serializes writers, admits concurrent readers,
/// and delivers queued events to subscribers after each commit.
#[derive(Default)]
pub struct Db {
    state: RwLock<DbState>,
    listeners: RwLock<Vec<Listener>>,
    delivery: Mutex<()>,
}

impl Db {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a post-commit event subscriber. Subscribers see every
    /// committed event in commit order and nothing from rolled-back
    /// transactions.
    pub fn subscribe(&self, listener: impl Fn(&Event) + Send + Sync + 'static) {
        self.listeners.write().push(Arc::new(listener));
    }

    /// Runs `f` inside a write transaction. Returning an error rolls the
    /// whole transaction back; on success all mutations commit atomically
    /// and queued events are delivered.
    pub fn update<T>(&self, f: impl FnOnce(&mut Tx<'_>) -> Result<T>) -> Result<T> {
        let mut guard = self.state.write();
        let mut work = guard.clone();
        let mut tx = Tx::write(&mut work);

        let value = f(&mut tx)?;

        loop {
            let hooks = std::mem::take(&mut tx.pre_commit);
            if hooks.is_empty() {
                break;
            }
            for hook in hooks {
                hook(&mut tx)?;
            }
        }

        let events = std::mem::take(&mut tx.events);
        drop(tx);
        *guard = work;

        // The delivery lock is taken while the state lock is still held, so
        // delivery order is commit order. The state lock itself is released
        // before any listener runs; listeners may open read transactions.
        let delivery = self.delivery.lock();
        drop(guard);

        if !events.is_empty() {
            trace!(count = events.len(), "delivering committed store events");
            let listeners = self.listeners.read();
            for event in &events {
                for listener in listeners.iter() {
                    listener(event);
                }
            }
        }
        drop(delivery);
        Ok(value)
    }

    /// Runs `f` inside a read-only transaction.
    pub fn view<T>(&self, f: impl FnOnce(&Tx<'_>) -> Result<T>) -> Result<T> {
        let guard = self.state.read();
        let tx = Tx::read(&guard);
        f(&tx)
    }
}
