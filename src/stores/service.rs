//! Service store

use tracing::debug;

use super::{apply_tag_diff, normalize_role_attributes, ROLE_ATTRIBUTES};
use crate::error::{Result, StoreError};
use crate::index;
use crate::roles::Candidate;
use crate::store::{EventKind, Tx};
use crate::types::{EntityKind, Service};

const ENTITY_TYPE: &str = "service";

#[derive(Debug, Clone, Copy, Default)]
pub struct ServiceStore;

impl ServiceStore {
    pub fn create(&self, tx: &mut Tx<'_>, service: &Service) -> Result<Service> {
        let collection = EntityKind::Service.collection();
        validate(service)?;
        if tx.exists(collection, &service.id) {
            return Err(StoreError::InvalidInput(format!(
                "service {} already exists",
                service.id
            )));
        }

        let mut record = service.clone();
        record.role_attributes = normalize_role_attributes(&service.role_attributes);
        tx.set_name(collection, &record.name, &record.id)?;
        tx.insert_record(collection, &record.id, serde_json::to_value(&record)?)?;
        for tag in &record.role_attributes {
            tx.symbol_add(collection, ROLE_ATTRIBUTES, tag, &record.id)?;
        }

        index::entity_updated(
            tx,
            EntityKind::Service,
            &Candidate::new(&record.id, &record.role_attributes),
        )?;
        tx.emit(ENTITY_TYPE, EventKind::Created, serde_json::to_value(&record)?)?;
        debug!(id = %record.id, "created service");
        Ok(record)
    }

    pub fn update(&self, tx: &mut Tx<'_>, service: &Service) -> Result<Service> {
        let collection = EntityKind::Service.collection();
        validate(service)?;
        let old: Service = tx
            .get_record(collection, &service.id)?
            .ok_or_else(|| StoreError::NotFound {
                kind: ENTITY_TYPE,
                id: service.id.clone(),
            })?;

        let mut record = service.clone();
        record.role_attributes = normalize_role_attributes(&service.role_attributes);
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
                EntityKind::Service,
                &Candidate::new(&record.id, &record.role_attributes),
            )?;
        }
        tx.emit(ENTITY_TYPE, EventKind::Updated, serde_json::to_value(&record)?)?;
        Ok(record)
    }

    pub fn delete(&self, tx: &mut Tx<'_>, id: &str) -> Result<()> {
        let collection = EntityKind::Service.collection();
        let old: Service = tx
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
        debug!(id, "deleted service");
        index::entity_deleted(tx, EntityKind::Service, id)
    }

    pub fn load(&self, tx: &Tx<'_>, id: &str) -> Result<Service> {
        tx.get_record(EntityKind::Service.collection(), id)?
            .ok_or_else(|| StoreError::NotFound {
                kind: ENTITY_TYPE,
                id: id.to_string(),
            })
    }

    pub fn load_by_name(&self, tx: &Tx<'_>, name: &str) -> Result<Option<Service>> {
        match tx.id_for_name(EntityKind::Service.collection(), name) {
            Some(id) => self.load(tx, &id).map(Some),
            None => Ok(None),
        }
    }

    pub fn find_by_role_attribute(&self, tx: &Tx<'_>, tag: &str) -> Vec<String> {
        tx.ids_with_symbol(EntityKind::Service.collection(), ROLE_ATTRIBUTES, tag)
    }
}

fn validate(service: &Service) -> Result<()> {
    if service.id.is_empty() {
        return Err(StoreError::InvalidInput("service id is required".to_string()));
    }
    if service.name.is_empty() {
        return Err(StoreError::InvalidInput("service name is required".to_string()));
    }
    Ok(())
}
