//! Identity store

use tracing::debug;

use super::{apply_tag_diff, normalize_role_attributes, ROLE_ATTRIBUTES};
use crate::error::{Result, StoreError};
use crate::index;
use crate::roles::Candidate;
use crate::store::{EventKind, Tx};
use crate::types::{EntityKind, Identity};

const ENTITY_TYPE: &str = "identity";

#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityStore;

impl IdentityStore {
    pub fn create(&self, tx: &mut Tx<'_>, identity: &Identity) -> Result<Identity> {
        let collection = EntityKind::Identity.collection();
        validate(identity)?;
        if tx.exists(collection, &identity.id) {
            return Err(StoreError::InvalidInput(format!(
                "identity {} already exists",
                identity.id
            )));
        }

        let mut record = identity.clone();
        record.role_attributes = normalize_role_attributes(&identity.role_attributes);
        tx.set_name(collection, &record.name, &record.id)?;
        tx.insert_record(collection, &record.id, serde_json::to_value(&record)?)?;
        for tag in &record.role_attributes {
            tx.symbol_add(collection, ROLE_ATTRIBUTES, tag, &record.id)?;
        }

        index::entity_updated(
            tx,
            EntityKind::Identity,
            &Candidate::new(&record.id, &record.role_attributes),
        )?;
        tx.emit(ENTITY_TYPE, EventKind::Created, serde_json::to_value(&record)?)?;
        debug!(id = %record.id, "created identity");
        Ok(record)
    }

    pub fn update(&self, tx: &mut Tx<'_>, identity: &Identity) -> Result<Identity> {
        let collection = EntityKind::Identity.collection();
        validate(identity)?;
        let old: Identity = tx
            .get_record(collection, &identity.id)?
            .ok_or_else(|| StoreError::NotFound {
                kind: ENTITY_TYPE,
                id: identity.id.clone(),
            })?;

        let mut record = identity.clone();
        record.role_attributes = normalize_role_attributes(&identity.role_attributes);
        if old.name != record.name {
            tx.set_name(collection, &record.name, &record.id)?;
            tx.remove_name(collection, &old.name)?;
        }
        tx.insert_record(collection, &record.id, serde_json::to_value(&record)?)?;

        let tags_changed = apply_tag_diff(
            tx,
            collection,
            &record.id,
            &old.role_attributes,
            &record.role_attributes,
        )?;
        if tags_changed {
            index::entity_updated(
                tx,
                EntityKind::Identity,
                &Candidate::new(&record.id, &record.role_attributes),
            )?;
        }
        tx.emit(ENTITY_TYPE, EventKind::Updated, serde_json::to_value(&record)?)?;
        Ok(record)
    }

    pub fn delete(&self, tx: &mut Tx<'_>, id: &str) -> Result<()> {
        let collection = EntityKind::Identity.collection();
        let old: Identity = tx
            .get_record(collection, id)?
            .ok_or_else(|| StoreError::NotFound {
                kind: ENTITY_TYPE,
                id: id.to_string(),
            })?;

        tx.remove_name(collection, &old.name)?;
        for tag in &old.role_attributes {
            tx.symbol_remove(collection, ROLE_ATTRIBUTES, tag, id)?;
        }
        tx.remove_record(collection, id)?;
        tx.emit(ENTITY_TYPE, EventKind::Deleted, serde_json::to_value(&old)?)?;
        debug!(id, "deleted identity");
        index::entity_deleted(tx, EntityKind::Identity, id)
    }

    pub fn load(&self, tx: &Tx<'_>, id: &str) -> Result<Identity> {
        tx.get_record(EntityKind::Identity.collection(), id)?
            .ok_or_else(|| StoreError::NotFound {
                kind: ENTITY_TYPE,
                id: id.to_string(),
            })
    }

    pub fn load_by_name(&self, tx: &Tx<'_>, name: &str) -> Result<Option<Identity>> {
        match tx.id_for_name(EntityKind::Identity.collection(), name) {
            Some(id) => self.load(tx, &id).map(Some),
            None => Ok(None),
        }
    }

    /// Ids of every identity carrying the tag, via the symbol index.
    pub fn find_by_role_attribute(&self, tx: &Tx<'_>, tag: &str) -> Vec<String> {
        tx.ids_with_symbol(EntityKind::Identity.collection(), ROLE_ATTRIBUTES, tag)
    }
}

fn validate(identity: &Identity) -> Result<()> {
    if identity.id.is_empty() {
        return Err(StoreError::InvalidInput("identity id is required".to_string()));
    }
    if identity.name.is_empty() {
        return Err(StoreError::InvalidInput("identity name is required".to_string()));
    }
    Ok(())
}
