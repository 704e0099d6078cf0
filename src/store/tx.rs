//! Transaction handle over the store state
//!
//! A `Tx` is only ever constructed by [`Db::update`](super::Db::update) or
//! [`Db::view`](super::Db::view). Write transactions operate on a
//! clone-on-write copy of the state; nothing a transaction does is visible
//! until the copy is swapped in at commit.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::events::{Event, EventKind};
use super::DbState;
use crate::error::{Result, StoreError};

pub(crate) type PreCommitHook =
    Box<dyn for<'a, 'b> FnOnce(&'a mut Tx<'b>) -> Result<()> + Send>;

enum TxState<'a> {
    Read(&'a DbState),
    Write(&'a mut DbState),
}

/// Handle for reading and (when opened by `Db::update`) mutating the store
/// within one atomic unit.
pub struct Tx<'a> {
    state: TxState<'a>,
    pub(crate) events: Vec<Event>,
    pub(crate) pre_commit: Vec<PreCommitHook>,
}

impl<'a> Tx<'a> {
    pub(crate) fn read(state: &'a DbState) -> Self {
        Self {
            state: TxState::Read(state),
            events: Vec::new(),
            pre_commit: Vec::new(),
        }
    }

    pub(crate) fn write(state: &'a mut DbState) -> Self {
        Self {
            state: TxState::Write(state),
            events: Vec::new(),
            pre_commit: Vec::new(),
        }
    }

    pub fn writable(&self) -> bool {
        matches!(self.state, TxState::Write(_))
    }

    fn db(&self) -> &DbState {
        match &self.state {
            TxState::Read(s) => s,
            TxState::Write(s) => s,
        }
    }

    fn db_mut(&mut self) -> Result<&mut DbState> {
        match &mut self.state {
            TxState::Write(s) => Ok(s),
            TxState::Read(_) => Err(StoreError::ReadOnlyTx),
        }
    }

    // --- records ---

    pub fn get(&self, collection: &str, id: &str) -> Option<Arc<Value>> {
        self.db()
            .collection(collection)
            .and_then(|c| c.records.get(id).cloned())
    }

    pub fn get_record<T: DeserializeOwned>(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<T>> {
        match self.get(collection, id) {
            Some(raw) => serde_json::from_value((*raw).clone())
                .map(Some)
                .map_err(StoreError::from),
            None => Ok(None),
        }
    }

    pub fn exists(&self, collection: &str, id: &str) -> bool {
        self.db()
            .collection(collection)
            .is_some_and(|c| c.records.contains_key(id))
    }

    pub fn id_for_name(&self, collection: &str, name: &str) -> Option<String> {
        self.db()
            .collection(collection)
            .and_then(|c| c.names.get(name).cloned())
    }

    /// All records of a collection, ordered by id for determinism.
    pub fn scan(&self, collection: &str) -> Vec<(String, Arc<Value>)> {
        let mut out: Vec<_> = self
            .db()
            .collection(collection)
            .map(|c| {
                c.records
                    .iter()
                    .map(|(id, v)| (id.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    pub fn count(&self, collection: &str) -> usize {
        self.db().collection(collection).map_or(0, |c| c.records.len())
    }

    pub(crate) fn insert_record(
        &mut self,
        collection: &'static str,
        id: &str,
        value: Value,
    ) -> Result<()> {
        self.db_mut()?
            .collection_mut(collection)
            .records
            .insert(id.to_string(), Arc::new(value));
        Ok(())
    }

    pub(crate) fn remove_record(&mut self, collection: &'static str, id: &str) -> Result<bool> {
        Ok(self
            .db_mut()?
            .collection_mut(collection)
            .records
            .remove(id)
            .is_some())
    }

    // --- unique name index ---

    pub(crate) fn set_name(&mut self, collection: &'static str, name: &str, id: &str) -> Result<()> {
        let col = self.db_mut()?.collection_mut(collection);
        if let Some(existing) = col.names.get(name) {
            if existing != id {
                return Err(StoreError::DuplicateName(name.to_string()));
            }
        }
        col.names.insert(name.to_string(), id.to_string());
        Ok(())
    }

    pub(crate) fn remove_name(&mut self, collection: &'static str, name: &str) -> Result<()> {
        if self.db_mut()?.collection_mut(collection).names.remove(name).is_none() {
            return Err(StoreError::Invariant(format!(
                "name index of {collection} is missing '{name}'"
            )));
        }
        Ok(())
    }

    // --- symbol index (value -> owning record ids) ---

    pub(crate) fn symbol_add(
        &mut self,
        collection: &'static str,
        symbol: &'static str,
        value: &str,
        id: &str,
    ) -> Result<()> {
        self.db_mut()?
            .collection_mut(collection)
            .symbols
            .entry(symbol)
            .or_default()
            .entry(value.to_string())
            .or_default()
            .insert(id.to_string());
        Ok(())
    }

    pub(crate) fn symbol_remove(
        &mut self,
        collection: &'static str,
        symbol: &'static str,
        value: &str,
        id: &str,
    ) -> Result<()> {
        let symbols = &mut self.db_mut()?.collection_mut(collection).symbols;
        let Some(by_value) = symbols.get_mut(symbol) else {
            return Ok(());
        };
        if let Some(ids) = by_value.get_mut(value) {
            ids.remove(id);
            if ids.is_empty() {
                by_value.remove(value);
            }
        }
        Ok(())
    }

    pub fn ids_with_symbol(&self, collection: &str, symbol: &str, value: &str) -> Vec<String> {
        self.db()
            .collection(collection)
            .and_then(|c| c.symbols.get(symbol))
            .and_then(|by_value| by_value.get(value))
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default()
    }

    // --- link tables (bidirectional many-to-many) ---

    pub(crate) fn link_add(&mut self, table: &'static str, left: &str, right: &str) -> Result<()> {
        let t = self.db_mut()?.link_mut(table);
        t.fwd.entry(left.to_string()).or_default().insert(right.to_string());
        t.rev.entry(right.to_string()).or_default().insert(left.to_string());
        Ok(())
    }

    pub(crate) fn link_remove(
        &mut self,
        table: &'static str,
        left: &str,
        right: &str,
    ) -> Result<()> {
        let t = self.db_mut()?.link_mut(table);
        let had_fwd = t.fwd.get_mut(left).is_some_and(|s| s.remove(right));
        let had_rev = t.rev.get_mut(right).is_some_and(|s| s.remove(left));
        if had_fwd != had_rev {
            return Err(StoreError::Invariant(format!(
                "link table {table} out of sync for ({left}, {right})"
            )));
        }
        if t.fwd.get(left).is_some_and(BTreeSet::is_empty) {
            t.fwd.remove(left);
        }
        if t.rev.get(right).is_some_and(BTreeSet::is_empty) {
            t.rev.remove(right);
        }
        Ok(())
    }

    /// Replaces the forward link set of `left` with `desired`, fixing up the
    /// reverse direction entry by entry.
    pub(crate) fn relink_left(
        &mut self,
        table: &'static str,
        left: &str,
        desired: BTreeSet<String>,
    ) -> Result<()> {
        let current: BTreeSet<String> = self.links_fwd(table, left).into_iter().collect();
        for gone in current.difference(&desired) {
            self.link_remove(table, left, gone)?;
        }
        for added in desired.difference(&current) {
            self.link_add(table, left, added)?;
        }
        Ok(())
    }

    pub(crate) fn unlink_left_all(&mut self, table: &'static str, left: &str) -> Result<()> {
        for right in self.links_fwd(table, left) {
            self.link_remove(table, left, &right)?;
        }
        Ok(())
    }

    pub(crate) fn purge_right(&mut self, table: &'static str, right: &str) -> Result<()> {
        for left in self.links_rev(table, right) {
            self.link_remove(table, &left, right)?;
        }
        Ok(())
    }

    pub fn links_fwd(&self, table: &str, left: &str) -> Vec<String> {
        self.db()
            .link(table)
            .and_then(|t| t.fwd.get(left))
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn links_rev(&self, table: &str, right: &str) -> Vec<String> {
        self.db()
            .link(table)
            .and_then(|t| t.rev.get(right))
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default()
    }

    // --- events and hooks ---

    pub(crate) fn emit(
        &mut self,
        entity_type: &'static str,
        kind: EventKind,
        entity: Value,
    ) -> Result<()> {
        if !self.writable() {
            return Err(StoreError::ReadOnlyTx);
        }
        self.events.push(Event {
            entity_type,
            kind,
            entity,
        });
        Ok(())
    }

    /// Registers a closure to run just before commit, inside this
    /// transaction. An error from the hook aborts the whole transaction.
    pub fn on_pre_commit(
        &mut self,
        hook: impl for<'x, 'y> FnOnce(&'x mut Tx<'y>) -> Result<()> + Send + 'static,
    ) {
        self.pre_commit.push(Box::new(hook));
    }
}
