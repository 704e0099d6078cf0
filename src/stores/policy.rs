//! Generic policy store machinery
//!
//! The three policy kinds share their whole lifecycle: role lists are
//! resolved and normalized at write time, the relationship index slice is
//! fully recomputed inside the writing transaction, and loads present
//! explicit references by the referenced entity's current name. Each kind
//! supplies its static [`RoleField`] descriptors through [`PolicyRecord`].

use std::fmt::Debug;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::index;
use crate::roles;
use crate::store::{EventKind, Tx};
use crate::types::{
    EdgeRouterPolicy, EntityKind, Semantic, ServiceEdgeRouterPolicy, ServicePolicy,
};

/// One role list of a policy kind: its persisted field name, the entity
/// kind it references, and the link table holding its index slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleField {
    pub field: &'static str,
    pub kind: EntityKind,
    pub link_table: &'static str,
}

/// Implemented by each policy record type; gives the generic store and the
/// index maintainer access to the kind's role lists.
pub trait PolicyRecord: Serialize + DeserializeOwned + Clone + Debug {
    const COLLECTION: &'static str;
    const ENTITY_TYPE: &'static str;

    fn fields() -> &'static [RoleField];
    fn id(&self) -> &str;
    fn name(&self) -> &str;
    fn semantic(&self) -> Semantic;
    fn roles(&self, field: &RoleField) -> &[String];
    fn set_roles(&mut self, field: &RoleField, roles: Vec<String>);
}

pub struct PolicyStore<P> {
    _marker: PhantomData<P>,
}

impl<P> PolicyStore<P> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<P> Default for PolicyStore<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> Clone for PolicyStore<P> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<P: PolicyRecord> PolicyStore<P> {
    pub fn create(&self, tx: &mut Tx<'_>, policy: &P) -> Result<P> {
        validate::<P>(policy)?;
        if tx.exists(P::COLLECTION, policy.id()) {
            return Err(StoreError::InvalidInput(format!(
                "{} {} already exists",
                P::ENTITY_TYPE,
                policy.id()
            )));
        }

        let record = normalize(tx, policy.clone())?;
        tx.set_name(P::COLLECTION, record.name(), record.id())?;
        tx.insert_record(P::COLLECTION, record.id(), serde_json::to_value(&record)?)?;
        index::sync_policy(tx, &record)?;
        tx.emit(
            P::ENTITY_TYPE,
            EventKind::Created,
            serde_json::to_value(&record)?,
        )?;
        debug!(id = record.id(), kind = P::ENTITY_TYPE, "created policy");
        Ok(record)
    }

    pub fn update(&self, tx: &mut Tx<'_>, policy: &P) -> Result<P> {
        validate::<P>(policy)?;
        let old: P = tx
            .get_record(P::COLLECTION, policy.id())?
            .ok_or_else(|| StoreError::NotFound {
                kind: P::ENTITY_TYPE,
                id: policy.id().to_string(),
            })?;

        let record = normalize(tx, policy.clone())?;
        if old.name() != record.name() {
            tx.set_name(P::COLLECTION, record.name(), record.id())?;
            tx.remove_name(P::COLLECTION, old.name())?;
        }
        tx.insert_record(P::COLLECTION, record.id(), serde_json::to_value(&record)?)?;
        index::sync_policy(tx, &record)?;
        tx.emit(
            P::ENTITY_TYPE,
            EventKind::Updated,
            serde_json::to_value(&record)?,
        )?;
        Ok(record)
    }

    pub fn delete(&self, tx: &mut Tx<'_>, id: &str) -> Result<()> {
        let old: P = tx
            .get_record(P::COLLECTION, id)?
            .ok_or_else(|| StoreError::NotFound {
                kind: P::ENTITY_TYPE,
                id: id.to_string(),
            })?;
        tx.remove_name(P::COLLECTION, old.name())?;
        tx.remove_record(P::COLLECTION, id)?;
        index::policy_deleted::<P>(tx, id)?;
        tx.emit(
            P::ENTITY_TYPE,
            EventKind::Deleted,
            serde_json::to_value(&old)?,
        )?;
        debug!(id, kind = P::ENTITY_TYPE, "deleted policy");
        Ok(())
    }

    /// Loads a policy with its explicit references denormalized to the
    /// referenced entities' current names.
    pub fn load(&self, tx: &Tx<'_>, id: &str) -> Result<P> {
        let mut policy: P =
            tx.get_record(P::COLLECTION, id)?
                .ok_or_else(|| StoreError::NotFound {
                    kind: P::ENTITY_TYPE,
                    id: id.to_string(),
                })?;
        for field in P::fields() {
            let presented = roles::denormalize_refs(tx, field.kind, policy.roles(field));
            policy.set_roles(field, presented);
        }
        Ok(policy)
    }

    pub fn load_by_name(&self, tx: &Tx<'_>, name: &str) -> Result<Option<P>> {
        match tx.id_for_name(P::COLLECTION, name) {
            Some(id) => self.load(tx, &id).map(Some),
            None => Ok(None),
        }
    }

    /// Ids of the entities of `kind` currently selected by the policy.
    pub fn related_ids(&self, tx: &Tx<'_>, policy_id: &str, kind: EntityKind) -> Vec<String> {
        P::fields()
            .iter()
            .find(|f| f.kind == kind)
            .map(|f| tx.links_fwd(f.link_table, policy_id))
            .unwrap_or_default()
    }

    /// Ids of the policies of this kind currently selecting the entity.
    pub fn policies_for_entity(&self, tx: &Tx<'_>, kind: EntityKind, entity_id: &str) -> Vec<String> {
        P::fields()
            .iter()
            .find(|f| f.kind == kind)
            .map(|f| tx.links_rev(f.link_table, entity_id))
            .unwrap_or_default()
    }
}

fn validate<P: PolicyRecord>(policy: &P) -> Result<()> {
    if policy.id().is_empty() {
        return Err(StoreError::InvalidInput(format!(
            "{} id is required",
            P::ENTITY_TYPE
        )));
    }
    if policy.name().is_empty() {
        return Err(StoreError::InvalidInput(format!(
            "{} name is required",
            P::ENTITY_TYPE
        )));
    }
    Ok(())
}

fn normalize<P: PolicyRecord>(tx: &Tx<'_>, mut policy: P) -> Result<P> {
    for field in P::fields() {
        let resolved = roles::resolve_refs(tx, field.kind, field.field, policy.roles(field))?;
        policy.set_roles(field, resolved);
    }
    Ok(policy)
}

static SERVICE_POLICY_FIELDS: [RoleField; 2] = [
    RoleField {
        field: "identityRoles",
        kind: EntityKind::Identity,
        link_table: "servicePolicyIdentities",
    },
    RoleField {
        field: "serviceRoles",
        kind: EntityKind::Service,
        link_table: "servicePolicyServices",
    },
];

impl PolicyRecord for ServicePolicy {
    const COLLECTION: &'static str = "servicePolicies";
    const ENTITY_TYPE: &'static str = "servicePolicy";

    fn fields() -> &'static [RoleField] {
        &SERVICE_POLICY_FIELDS
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn semantic(&self) -> Semantic {
        self.semantic
    }

    fn roles(&self, field: &RoleField) -> &[String] {
        match field.field {
            "identityRoles" => &self.identity_roles,
            "serviceRoles" => &self.service_roles,
            other => unreachable!("unknown service policy role field {other}"),
        }
    }

    fn set_roles(&mut self, field: &RoleField, roles: Vec<String>) {
        match field.field {
            "identityRoles" => self.identity_roles = roles,
            "serviceRoles" => self.service_roles = roles,
            other => unreachable!("unknown service policy role field {other}"),
        }
    }
}

static EDGE_ROUTER_POLICY_FIELDS: [RoleField; 2] = [
    RoleField {
        field: "identityRoles",
        kind: EntityKind::Identity,
        link_table: "edgeRouterPolicyIdentities",
    },
    RoleField {
        field: "edgeRouterRoles",
        kind: EntityKind::EdgeRouter,
        link_table: "edgeRouterPolicyEdgeRouters",
    },
];

impl PolicyRecord for EdgeRouterPolicy {
    const COLLECTION: &'static str = "edgeRouterPolicies";
    const ENTITY_TYPE: &'static str = "edgeRouterPolicy";

    fn fields() -> &'static [RoleField] {
        &EDGE_ROUTER_POLICY_FIELDS
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn semantic(&self) -> Semantic {
        self.semantic
    }

    fn roles(&self, field: &RoleField) -> &[String] {
        match field.field {
            "identityRoles" => &self.identity_roles,
            "edgeRouterRoles" => &self.edge_router_roles,
            other => unreachable!("unknown edge router policy role field {other}"),
        }
    }

    fn set_roles(&mut self, field: &RoleField, roles: Vec<String>) {
        match field.field {
            "identityRoles" => self.identity_roles = roles,
            "edgeRouterRoles" => self.edge_router_roles = roles,
            other => unreachable!("unknown edge router policy role field {other}"),
        }
    }
}

static SERVICE_EDGE_ROUTER_POLICY_FIELDS: [RoleField; 2] = [
    RoleField {
        field: "serviceRoles",
        kind: EntityKind::Service,
        link_table: "serviceEdgeRouterPolicyServices",
    },
    RoleField {
        field: "edgeRouterRoles",
        kind: EntityKind::EdgeRouter,
        link_table: "serviceEdgeRouterPolicyEdgeRouters",
    },
];

impl PolicyRecord for ServiceEdgeRouterPolicy {
    const COLLECTION: &'static str = "serviceEdgeRouterPolicies";
    const ENTITY_TYPE: &'static str = "serviceEdgeRouterPolicy";

    fn fields() -> &'static [RoleField] {
        &SERVICE_EDGE_ROUTER_POLICY_FIELDS
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn semantic(&self) -> Semantic {
        self.semantic
    }

    fn roles(&self, field: &RoleField) -> &[String] {
        match field.field {
            "serviceRoles" => &self.service_roles,
            "edgeRouterRoles" => &self.edge_router_roles,
            other => unreachable!("unknown service edge router policy role field {other}"),
        }
    }

    fn set_roles(&mut self, field: &RoleField, roles: Vec<String>) {
        match field.field {
            "serviceRoles" => self.service_roles = roles,
            "edgeRouterRoles" => self.edge_router_roles = roles,
            other => unreachable!("unknown service edge router policy role field {other}"),
        }
    }
}
