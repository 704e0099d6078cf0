//! # Trellis Store
//!
//! Transactional entity stores with a role-based policy engine. Policies
//! select entities through role references (`#tag`, `@id`, `all`), and a
//! relationship index keeps the policy/entity link sets consistent inside
//! every committing transaction.
//!
//! ```
//! use trellis_store::stores::Stores;
//! use trellis_store::types::{Identity, ServicePolicy};
//! use trellis_store::roles::role_ref;
//! use trellis_store::EntityKind;
//!
//! let stores = Stores::open();
//!
//! let identity = stores.db.update(|tx| {
//!     stores
//!         .identities
//!         .create(tx, &Identity::new("dev-laptop").with_role_attributes(["dev"]))
//! })?;
//!
//! let mut policy = ServicePolicy::new("dev-access");
//! policy.identity_roles = vec![role_ref("dev")];
//! let policy = stores.db.update(|tx| stores.service_policies.create(tx, &policy))?;
//!
//! stores.db.view(|tx| {
//!     let related = stores
//!         .service_policies
//!         .related_ids(tx, &policy.id, EntityKind::Identity);
//!     assert_eq!(related, vec![identity.id.clone()]);
//!     Ok(())
//! })?;
//! # Ok::<(), trellis_store::StoreError>(())
//! ```

pub mod error;
pub mod roles;
pub mod store;
pub mod stores;
pub mod types;

mod index;

// Re-export commonly used types
pub use error::{Result, StoreError};
pub use store::{Db, Event, EventKind, Tx};
pub use stores::Stores;
pub use types::{
    EdgeRouter, EdgeRouterPolicy, EntityKind, Identity, Router, Semantic, Service,
    ServiceEdgeRouterPolicy, ServicePolicy,
};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
