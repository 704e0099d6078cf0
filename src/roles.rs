//! Role reference grammar, resolution and policy matching
//!
//! A policy role list selects entities through four reference forms:
//!
//! - `all`: every entity of the target kind; must be the sole entry
//! - `#tag`: any entity whose role attribute set contains `tag`
//! - `@id`: exactly the entity with that id
//! - a bare token: legacy explicit form, resolved like `@token`
//!
//! Explicit references are resolved once at policy-write time (id lookup
//! wins over name lookup when a token is both) and persisted in `@id` form,
//! so renaming an entity never invalidates or rescans an index. Tag
//! references stay symbolic and are evaluated against each candidate.

use std::collections::BTreeSet;

use crate::error::{Result, StoreError};
use crate::store::Tx;
use crate::stores::router::ROUTERS;
use crate::types::{EntityKind, Semantic};

/// Reserved wildcard matching every entity of the target kind
pub const ALL_ROLE: &str = "all";

/// Builds a tag reference (`#tag`)
pub fn role_ref(tag: &str) -> String {
    format!("#{tag}")
}

/// Builds an explicit entity reference (`@id-or-name`)
pub fn entity_ref(token: &str) -> String {
    format!("@{token}")
}

/// One parsed role reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleRef {
    All,
    Tag(String),
    /// Explicit reference carrying the raw id-or-name token
    Entity(String),
}

pub fn parse_ref(token: &str) -> RoleRef {
    if token == ALL_ROLE {
        RoleRef::All
    } else if let Some(tag) = token.strip_prefix('#') {
        RoleRef::Tag(tag.to_string())
    } else if let Some(explicit) = token.strip_prefix('@') {
        RoleRef::Entity(explicit.to_string())
    } else {
        RoleRef::Entity(token.to_string())
    }
}

/// The matcher's view of an entity: id plus role attribute set.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub id: String,
    pub role_attributes: BTreeSet<String>,
}

impl Candidate {
    pub fn new(id: &str, role_attributes: &[String]) -> Self {
        Self {
            id: id.to_string(),
            role_attributes: role_attributes.iter().cloned().collect(),
        }
    }
}

/// Decides whether a policy with the given semantic and role list selects
/// the candidate. Pure; set-based; duplicate references are idempotent.
///
/// An empty list matches nothing and the wildcard matches everything. An
/// explicit reference selects its entity regardless of semantic; the
/// semantic governs how the tag references combine.
pub fn policy_matches(semantic: Semantic, refs: &[String], candidate: &Candidate) -> bool {
    if refs.is_empty() {
        return false;
    }
    let mut tags = Vec::new();
    for r in refs {
        match parse_ref(r) {
            RoleRef::All => return true,
            RoleRef::Entity(token) => {
                if token == candidate.id {
                    return true;
                }
            }
            RoleRef::Tag(tag) => tags.push(tag),
        }
    }
    if tags.is_empty() {
        return false;
    }
    match semantic {
        Semantic::AllOf => tags.iter().all(|t| candidate.role_attributes.contains(t)),
        Semantic::AnyOf => tags.iter().any(|t| candidate.role_attributes.contains(t)),
    }
}

/// Resolves and normalizes a policy role list for persistence.
///
/// Validates the wildcard is alone, resolves every explicit reference to its
/// entity id (id lookup first, then unique name) and returns the normalized
/// list. All unresolvable tokens are reported in one aggregated error.
pub fn resolve_refs(
    tx: &Tx<'_>,
    kind: EntityKind,
    field: &str,
    refs: &[String],
) -> Result<Vec<String>> {
    if refs.iter().any(|r| r == ALL_ROLE) && refs.len() != 1 {
        return Err(StoreError::InvalidFieldValue {
            field: field.to_string(),
            values: refs.join(" "),
            reason: format!("if using {ALL_ROLE}, it should be the only role specified"),
        });
    }

    let mut normalized = Vec::with_capacity(refs.len());
    let mut unresolved = Vec::new();
    for r in refs {
        match parse_ref(r) {
            RoleRef::All => normalized.push(ALL_ROLE.to_string()),
            RoleRef::Tag(tag) => normalized.push(role_ref(&tag)),
            RoleRef::Entity(token) => match lookup_entity(tx, kind, &token) {
                Some(id) => normalized.push(entity_ref(&id)),
                None => unresolved.push(token),
            },
        }
    }

    if !unresolved.is_empty() {
        return Err(StoreError::InvalidFieldValue {
            field: field.to_string(),
            values: unresolved.join(" "),
            reason: format!("no {} found with the given names/ids", kind.plural()),
        });
    }
    Ok(normalized)
}

/// Resolves an explicit reference token to an entity id. Id lookup wins;
/// the unique-name index is only consulted when no record has that id.
pub fn lookup_entity(tx: &Tx<'_>, kind: EntityKind, token: &str) -> Option<String> {
    match kind {
        EntityKind::Identity | EntityKind::Service => {
            let collection = kind.collection();
            if tx.exists(collection, token) {
                return Some(token.to_string());
            }
            tx.id_for_name(collection, token)
        }
        // Edge router names live on the base router record; a name only
        // resolves when the edge extension record exists too.
        EntityKind::EdgeRouter => {
            if tx.exists(EntityKind::EdgeRouter.collection(), token) {
                return Some(token.to_string());
            }
            tx.id_for_name(ROUTERS, token)
                .filter(|id| tx.exists(EntityKind::EdgeRouter.collection(), id))
        }
    }
}

/// Current unique name of an entity, if it still exists.
pub fn entity_name(tx: &Tx<'_>, kind: EntityKind, id: &str) -> Option<String> {
    let collection = match kind {
        EntityKind::Identity | EntityKind::Service => kind.collection(),
        EntityKind::EdgeRouter => ROUTERS,
    };
    tx.get(collection, id)
        .and_then(|raw| raw.get("name").and_then(|n| n.as_str()).map(str::to_string))
}

/// Rewrites persisted `@id` references to `@current-name` for presentation,
/// so a reloaded policy reflects entity renames. References to missing
/// entities are left in id form.
pub fn denormalize_refs(tx: &Tx<'_>, kind: EntityKind, refs: &[String]) -> Vec<String> {
    refs.iter()
        .map(|r| match parse_ref(r) {
            RoleRef::Entity(id) => match entity_name(tx, kind, &id) {
                Some(name) => entity_ref(&name),
                None => r.clone(),
            },
            _ => r.clone(),
        })
        .collect()
}

/// All candidates of a kind, extracted from the kind's record collection.
pub fn candidates(tx: &Tx<'_>, kind: EntityKind) -> Vec<Candidate> {
    tx.scan(kind.collection())
        .into_iter()
        .map(|(id, raw)| {
            let role_attributes = raw
                .get("roleAttributes")
                .and_then(|v| v.as_array())
                .map(|a| {
                    a.iter()
                        .filter_map(|v| v.as_str().map(str::to_string))
                        .collect()
                })
                .unwrap_or_default();
            Candidate { id, role_attributes }
        })
        .collect()
}
