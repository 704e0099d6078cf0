//! Shared test harness: a store instance with a captured event stream,
//! entity factories, and the reference matcher the index tests validate
//! against.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use trellis_store::roles::parse_ref;
use trellis_store::stores::Stores;
use trellis_store::types::{EdgeRouter, Identity, Semantic, Service};
use trellis_store::{Event, EventKind, Result};

pub struct TestContext {
    pub stores: Stores,
    events: Arc<Mutex<VecDeque<Event>>>,
}

impl TestContext {
    pub fn new() -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .try_init();

        let stores = Stores::open();
        let events: Arc<Mutex<VecDeque<Event>>> = Arc::new(Mutex::new(VecDeque::new()));
        let sink = Arc::clone(&events);
        stores.db.subscribe(move |event| {
            sink.lock().push_back(event.clone());
        });
        Self { stores, events }
    }

    /// Pops the oldest captured event and asserts its type and kind.
    pub fn require_event(&self, entity_type: &str, kind: EventKind) -> Value {
        let event = self
            .events
            .lock()
            .pop_front()
            .unwrap_or_else(|| panic!("expected {kind:?} event for {entity_type}, got none"));
        assert_eq!(event.entity_type, entity_type, "unexpected event entity type");
        assert_eq!(event.kind, kind, "unexpected event kind for {entity_type}");
        event.entity
    }

    pub fn require_no_events(&self) {
        let events = self.events.lock();
        assert!(events.is_empty(), "unexpected events left over: {events:?}");
    }

    pub fn clear_events(&self) {
        self.events.lock().clear();
    }

    pub fn create_identity(&self, name: &str, tags: &[&str]) -> Result<Identity> {
        let identity = Identity::new(name).with_role_attributes(tags.iter().copied());
        self.stores
            .db
            .update(|tx| self.stores.identities.create(tx, &identity))
    }

    pub fn update_identity(&self, identity: &Identity) -> Result<Identity> {
        self.stores
            .db
            .update(|tx| self.stores.identities.update(tx, identity))
    }

    pub fn create_service(&self, name: &str, tags: &[&str]) -> Result<Service> {
        let service = Service::new(name).with_role_attributes(tags.iter().copied());
        self.stores
            .db
            .update(|tx| self.stores.services.create(tx, &service))
    }

    pub fn update_service(&self, service: &Service) -> Result<Service> {
        self.stores
            .db
            .update(|tx| self.stores.services.update(tx, service))
    }

    pub fn create_edge_router(&self, name: &str, tags: &[&str]) -> Result<EdgeRouter> {
        let router = EdgeRouter::new(name).with_role_attributes(tags.iter().copied());
        self.stores
            .db
            .update(|tx| self.stores.edge_routers.create(tx, &router))
    }

    pub fn update_edge_router(&self, router: &EdgeRouter) -> Result<EdgeRouter> {
        self.stores
            .db
            .update(|tx| self.stores.edge_routers.update(tx, router))
    }
}

/// Reference implementation of the matcher, written independently of the
/// engine so index tests validate against it rather than against the code
/// under test.
pub fn policy_should_match(
    semantic: Semantic,
    roles: &[String],
    entity_id: &str,
    entity_name: &str,
    tags: &[String],
) -> bool {
    use trellis_store::roles::RoleRef;

    if roles.is_empty() {
        return false;
    }
    let mut tag_refs = Vec::new();
    for role in roles {
        match parse_ref(role) {
            RoleRef::All => return true,
            RoleRef::Entity(token) => {
                if token == entity_id || token == entity_name {
                    return true;
                }
            }
            RoleRef::Tag(tag) => tag_refs.push(tag),
        }
    }
    if tag_refs.is_empty() {
        return false;
    }
    match semantic {
        Semantic::AllOf => tag_refs.iter().all(|t| tags.contains(t)),
        Semantic::AnyOf => tag_refs.iter().any(|t| tags.contains(t)),
    }
}

/// Every full-length permutation of the input, via Heap's algorithm.
pub fn permutations<T: Clone>(items: &[T]) -> Vec<Vec<T>> {
    fn heap<T: Clone>(items: &mut Vec<T>, k: usize, out: &mut Vec<Vec<T>>) {
        if k <= 1 {
            out.push(items.clone());
            return;
        }
        for i in 0..k {
            heap(items, k - 1, out);
            if k % 2 == 0 {
                items.swap(i, k - 1);
            } else {
                items.swap(0, k - 1);
            }
        }
    }
    let mut work = items.to_vec();
    let mut out = Vec::new();
    let len = work.len();
    heap(&mut work, len, &mut out);
    out
}

pub fn strings(tokens: &[&str]) -> Vec<String> {
    tokens.iter().map(|t| t.to_string()).collect()
}
