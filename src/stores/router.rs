//! Router store hierarchy
//!
//! A base [`RouterStore`] persists the shared router record; the
//! [`EdgeRouterStore`] wraps it and persists the edge extension record under
//! the same id, forming the two-layer "is-a" composition. Every operation
//! through either store touches both layers when the extension exists and
//! emits exactly one event per layer, atomically with the mutation.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{apply_tag_diff, normalize_role_attributes, ROLE_ATTRIBUTES};
use crate::error::{Result, StoreError};
use crate::index;
use crate::roles::Candidate;
use crate::store::{EventKind, Tx};
use crate::types::{EdgeRouter, EntityKind, Router};

/// Collection holding the base router records (and their name index, which
/// edge routers share).
pub(crate) const ROUTERS: &str = "routers";

const ROUTER_TYPE: &str = "router";
const EDGE_ROUTER_TYPE: &str = "edgeRouter";

/// Edge extension record persisted alongside the base router, linked 1:1 by
/// id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EdgeRouterExt {
    id: String,
    #[serde(default)]
    role_attributes: Vec<String>,
    #[serde(default)]
    is_verified: bool,
}

fn compose(router: Router, ext: EdgeRouterExt) -> EdgeRouter {
    EdgeRouter {
        router,
        role_attributes: ext.role_attributes,
        is_verified: ext.is_verified,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RouterStore;

impl RouterStore {
    pub fn create(&self, tx: &mut Tx<'_>, router: &Router) -> Result<Router> {
        validate(router)?;
        if tx.exists(ROUTERS, &router.id) {
            return Err(StoreError::InvalidInput(format!(
                "router {} already exists",
                router.id
            )));
        }
        tx.set_name(ROUTERS, &router.name, &router.id)?;
        tx.insert_record(ROUTERS, &router.id, serde_json::to_value(router)?)?;
        tx.emit(ROUTER_TYPE, EventKind::Created, serde_json::to_value(router)?)?;
        debug!(id = %router.id, "created router");
        Ok(router.clone())
    }

    /// Updates the base record and emits the base-layer event only. The
    /// public entry points layer the extension handling on top.
    fn update_base(&self, tx: &mut Tx<'_>, router: &Router) -> Result<Router> {
        validate(router)?;
        let old: Router = tx
            .get_record(ROUTERS, &router.id)?
            .ok_or_else(|| StoreError::NotFound {
                kind: ROUTER_TYPE,
                id: router.id.clone(),
            })?;
        if old.name != router.name {
            tx.set_name(ROUTERS, &router.name, &router.id)?;
            tx.remove_name(ROUTERS, &old.name)?;
        }
        tx.insert_record(ROUTERS, &router.id, serde_json::to_value(router)?)?;
        tx.emit(ROUTER_TYPE, EventKind::Updated, serde_json::to_value(router)?)?;
        Ok(router.clone())
    }

    /// Updates the shared base fields. If an edge extension exists, the
    /// change is observable from the subtype layer too: its update event
    /// fires with the same shared field values.
    pub fn update(&self, tx: &mut Tx<'_>, router: &Router) -> Result<Router> {
        let record = self.update_base(tx, router)?;
        let ext: Option<EdgeRouterExt> =
            tx.get_record(EntityKind::EdgeRouter.collection(), &record.id)?;
        if let Some(ext) = ext {
            let composed = compose(record.clone(), ext);
            tx.emit(
                EDGE_ROUTER_TYPE,
                EventKind::Updated,
                serde_json::to_value(&composed)?,
            )?;
        }
        Ok(record)
    }

    /// Deletes the router and, when present, its edge extension; one delete
    /// event per layer.
    pub fn delete(&self, tx: &mut Tx<'_>, id: &str) -> Result<()> {
        delete_router(tx, id)
    }

    pub fn load(&self, tx: &Tx<'_>, id: &str) -> Result<Router> {
        tx.get_record(ROUTERS, id)?.ok_or_else(|| StoreError::NotFound {
            kind: ROUTER_TYPE,
            id: id.to_string(),
        })
    }

    pub fn load_by_name(&self, tx: &Tx<'_>, name: &str) -> Result<Option<Router>> {
        match tx.id_for_name(ROUTERS, name) {
            Some(id) => self.load(tx, &id).map(Some),
            None => Ok(None),
        }
    }
}

/// Subtype store wrapping the base [`RouterStore`].
#[derive(Debug, Clone, Copy)]
pub struct EdgeRouterStore {
    base: RouterStore,
}

impl EdgeRouterStore {
    pub fn new(base: RouterStore) -> Self {
        Self { base }
    }

    pub fn create(&self, tx: &mut Tx<'_>, edge_router: &EdgeRouter) -> Result<EdgeRouter> {
        let record = self.base.create(tx, &edge_router.router)?;

        let collection = EntityKind::EdgeRouter.collection();
        let tags = normalize_role_attributes(&edge_router.role_attributes);
        let ext = EdgeRouterExt {
            id: record.id.clone(),
            role_attributes: tags.clone(),
            is_verified: edge_router.is_verified,
        };
        tx.insert_record(collection, &ext.id, serde_json::to_value(&ext)?)?;
        for tag in &tags {
            tx.symbol_add(collection, ROLE_ATTRIBUTES, tag, &ext.id)?;
        }

        let composed = compose(record, ext);
        tx.emit(
            EDGE_ROUTER_TYPE,
            EventKind::Created,
            serde_json::to_value(&composed)?,
        )?;
        index::entity_updated(
            tx,
            EntityKind::EdgeRouter,
            &Candidate::new(composed.id(), &composed.role_attributes),
        )?;
        debug!(id = %composed.id(), "created edge router");
        Ok(composed)
    }

    pub fn update(&self, tx: &mut Tx<'_>, edge_router: &EdgeRouter) -> Result<EdgeRouter> {
        let record = self.base.update_base(tx, &edge_router.router)?;

        let collection = EntityKind::EdgeRouter.collection();
        let old: EdgeRouterExt =
            tx.get_record(collection, &record.id)?
                .ok_or_else(|| StoreError::NotFound {
                    kind: EDGE_ROUTER_TYPE,
                    id: record.id.clone(),
                })?;
        let tags = normalize_role_attributes(&edge_router.role_attributes);
        let ext = EdgeRouterExt {
            id: record.id.clone(),
            role_attributes: tags.clone(),
            is_verified: edge_router.is_verified,
        };
        tx.insert_record(collection, &ext.id, serde_json::to_value(&ext)?)?;
        let tags_changed =
            apply_tag_diff(tx, collection, &record.id, &old.role_attributes, &tags)?;

        let composed = compose(record, ext);
        tx.emit(
            EDGE_ROUTER_TYPE,
            EventKind::Updated,
            serde_json::to_value(&composed)?,
        )?;
        if tags_changed {
            index::entity_updated(
                tx,
                EntityKind::EdgeRouter,
                &Candidate::new(composed.id(), &composed.role_attributes),
            )?;
        }
        Ok(composed)
    }

    pub fn delete(&self, tx: &mut Tx<'_>, id: &str) -> Result<()> {
        delete_router(tx, id)
    }

    pub fn load(&self, tx: &Tx<'_>, id: &str) -> Result<EdgeRouter> {
        let router = self.base.load(tx, id)?;
        let ext: EdgeRouterExt = tx
            .get_record(EntityKind::EdgeRouter.collection(), id)?
            .ok_or_else(|| StoreError::NotFound {
                kind: EDGE_ROUTER_TYPE,
                id: id.to_string(),
            })?;
        Ok(compose(router, ext))
    }

    pub fn load_by_name(&self, tx: &Tx<'_>, name: &str) -> Result<Option<EdgeRouter>> {
        match tx.id_for_name(ROUTERS, name) {
            Some(id) if tx.exists(EntityKind::EdgeRouter.collection(), &id) => {
                self.load(tx, &id).map(Some)
            }
            _ => Ok(None),
        }
    }

    pub fn find_by_role_attribute(&self, tx: &Tx<'_>, tag: &str) -> Vec<String> {
        tx.ids_with_symbol(EntityKind::EdgeRouter.collection(), ROLE_ATTRIBUTES, tag)
    }
}

/// Shared delete path: removes both layers (when both exist), emits the
/// parent event before the child event, then cascades into the relationship
/// index.
fn delete_router(tx: &mut Tx<'_>, id: &str) -> Result<()> {
    let base: Router = tx.get_record(ROUTERS, id)?.ok_or_else(|| StoreError::NotFound {
        kind: ROUTER_TYPE,
        id: id.to_string(),
    })?;
    let collection = EntityKind::EdgeRouter.collection();
    let ext: Option<EdgeRouterExt> = tx.get_record(collection, id)?;

    tx.remove_name(ROUTERS, &base.name)?;
    tx.remove_record(ROUTERS, id)?;
    tx.emit(ROUTER_TYPE, EventKind::Deleted, serde_json::to_value(&base)?)?;

    if let Some(ext) = ext {
        for tag in &ext.role_attributes {
            tx.symbol_remove(collection, ROLE_ATTRIBUTES, tag, id)?;
        }
        tx.remove_record(collection, id)?;
        let composed = compose(base, ext);
        tx.emit(
            EDGE_ROUTER_TYPE,
            EventKind::Deleted,
            serde_json::to_value(&composed)?,
        )?;
        debug!(id, "deleted edge router");
        index::entity_deleted(tx, EntityKind::EdgeRouter, id)?;
    } else {
        debug!(id, "deleted router");
    }
    Ok(())
}

fn validate(router: &Router) -> Result<()> {
    if router.id.is_empty() {
        return Err(StoreError::InvalidInput("router id is required".to_string()));
    }
    if router.name.is_empty() {
        return Err(StoreError::InvalidInput("router name is required".to_string()));
    }
    Ok(())
}
