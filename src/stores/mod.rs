//! Typed stores over the transactional engine
//!
//! One store per entity kind plus one per policy kind, all bound to the same
//! [`Db`]. Store-scoped state (indexes, link tables) lives and dies with the
//! `Db` instance; nothing is process-global.

pub mod identity;
pub mod policy;
pub mod router;
pub mod service;

pub use identity::IdentityStore;
pub use policy::{PolicyRecord, PolicyStore, RoleField};
pub use router::{EdgeRouterStore, RouterStore};
pub use service::ServiceStore;

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::error::Result;
use crate::store::{Db, Tx};
use crate::types::{EdgeRouterPolicy, ServiceEdgeRouterPolicy, ServicePolicy};

pub type ServicePolicyStore = PolicyStore<ServicePolicy>;
pub type EdgeRouterPolicyStore = PolicyStore<EdgeRouterPolicy>;
pub type ServiceEdgeRouterPolicyStore = PolicyStore<ServiceEdgeRouterPolicy>;

/// Symbol index name holding the tag -> entity id sets of a collection
pub(crate) const ROLE_ATTRIBUTES: &str = "roleAttributes";

/// Registry of every store bound to one database instance.
pub struct Stores {
    pub db: Arc<Db>,
    pub identities: IdentityStore,
    pub services: ServiceStore,
    pub routers: RouterStore,
    pub edge_routers: EdgeRouterStore,
    pub service_policies: ServicePolicyStore,
    pub edge_router_policies: EdgeRouterPolicyStore,
    pub service_edge_router_policies: ServiceEdgeRouterPolicyStore,
}

impl Stores {
    /// Opens a fresh store instance with its own indexes.
    pub fn open() -> Self {
        Self {
            db: Arc::new(Db::new()),
            identities: IdentityStore,
            services: ServiceStore,
            routers: RouterStore,
            edge_routers: EdgeRouterStore::new(RouterStore),
            service_policies: PolicyStore::new(),
            edge_router_policies: PolicyStore::new(),
            service_edge_router_policies: PolicyStore::new(),
        }
    }
}

/// Role attribute sets are stored deduplicated and sorted; empty tags are
/// dropped.
pub(crate) fn normalize_role_attributes(attrs: &[String]) -> Vec<String> {
    attrs
        .iter()
        .filter(|a| !a.is_empty())
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Applies the tag-set delta of an entity update to the collection's symbol
/// index. Returns whether anything changed.
pub(crate) fn apply_tag_diff(
    tx: &mut Tx<'_>,
    collection: &'static str,
    id: &str,
    old: &[String],
    new: &[String],
) -> Result<bool> {
    let old: BTreeSet<&String> = old.iter().collect();
    let new: BTreeSet<&String> = new.iter().collect();
    for gone in old.difference(&new) {
        tx.symbol_remove(collection, ROLE_ATTRIBUTES, gone, id)?;
    }
    for added in new.difference(&old) {
        tx.symbol_add(collection, ROLE_ATTRIBUTES, added, id)?;
    }
    Ok(old != new)
}
