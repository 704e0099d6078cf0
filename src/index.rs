//! Relationship index maintenance
//!
//! Recomputes and persists the slice of the policy/entity relationship index
//! affected by one mutation, inside that mutation's transaction. The index
//! invariant (an entity appears in a policy's link set iff the matcher
//! selects it) holds at the end of every committed transaction, never
//! merely eventually.

use std::collections::BTreeSet;

use tracing::debug;

use crate::error::Result;
use crate::roles::{self, Candidate};
use crate::store::{EventKind, Tx};
use crate::stores::policy::PolicyRecord;
use crate::types::{EdgeRouterPolicy, EntityKind, ServiceEdgeRouterPolicy, ServicePolicy};

/// Recomputes every link set of one policy from scratch. Used on policy
/// create and update; reference-list changes can alter matching non-locally,
/// so no incremental diffing of the list itself is attempted.
pub(crate) fn sync_policy<P: PolicyRecord>(tx: &mut Tx<'_>, policy: &P) -> Result<()> {
    for field in P::fields() {
        let desired: BTreeSet<String> = roles::candidates(tx, field.kind)
            .iter()
            .filter(|c| roles::policy_matches(policy.semantic(), policy.roles(field), c))
            .map(|c| c.id.clone())
            .collect();
        debug!(
            policy = policy.id(),
            field = field.field,
            matched = desired.len(),
            "recomputed policy link set"
        );
        tx.relink_left(field.link_table, policy.id(), desired)?;
    }
    Ok(())
}

/// Drops every link set keyed by a deleted policy.
pub(crate) fn policy_deleted<P: PolicyRecord>(tx: &mut Tx<'_>, policy_id: &str) -> Result<()> {
    for field in P::fields() {
        tx.unlink_left_all(field.link_table, policy_id)?;
    }
    Ok(())
}

/// Re-evaluates one entity against every policy that can reference its kind,
/// adding and removing link entries for this entity only. Called when the
/// entity is created or its tag set changes; only this entity's membership
/// can have changed, so the local recomputation is sufficient.
pub(crate) fn entity_updated(
    tx: &mut Tx<'_>,
    kind: EntityKind,
    candidate: &Candidate,
) -> Result<()> {
    entity_updated_for::<ServicePolicy>(tx, kind, candidate)?;
    entity_updated_for::<EdgeRouterPolicy>(tx, kind, candidate)?;
    entity_updated_for::<ServiceEdgeRouterPolicy>(tx, kind, candidate)
}

fn entity_updated_for<P: PolicyRecord>(
    tx: &mut Tx<'_>,
    kind: EntityKind,
    candidate: &Candidate,
) -> Result<()> {
    for field in P::fields().iter().filter(|f| f.kind == kind) {
        for (policy_id, raw) in tx.scan(P::COLLECTION) {
            let policy: P = serde_json::from_value((*raw).clone())?;
            if roles::policy_matches(policy.semantic(), policy.roles(field), candidate) {
                tx.link_add(field.link_table, &policy_id, &candidate.id)?;
            } else {
                tx.link_remove(field.link_table, &policy_id, &candidate.id)?;
            }
        }
    }
    Ok(())
}

/// Cascades an entity delete through the index: strips the now-dangling
/// `@id` reference from every policy role list that carries it (persisting
/// and re-syncing those policies), then removes every remaining link entry
/// for the entity. Runs after the entity record itself is gone.
pub(crate) fn entity_deleted(tx: &mut Tx<'_>, kind: EntityKind, entity_id: &str) -> Result<()> {
    entity_deleted_for::<ServicePolicy>(tx, kind, entity_id)?;
    entity_deleted_for::<EdgeRouterPolicy>(tx, kind, entity_id)?;
    entity_deleted_for::<ServiceEdgeRouterPolicy>(tx, kind, entity_id)
}

fn entity_deleted_for<P: PolicyRecord>(
    tx: &mut Tx<'_>,
    kind: EntityKind,
    entity_id: &str,
) -> Result<()> {
    let dangling = roles::entity_ref(entity_id);
    for field in P::fields().iter().filter(|f| f.kind == kind) {
        for (policy_id, raw) in tx.scan(P::COLLECTION) {
            let mut policy: P = serde_json::from_value((*raw).clone())?;
            if !policy.roles(field).iter().any(|r| r == &dangling) {
                continue;
            }
            let pruned: Vec<String> = policy
                .roles(field)
                .iter()
                .filter(|r| *r != &dangling)
                .cloned()
                .collect();
            policy.set_roles(field, pruned);
            debug!(
                policy = %policy_id,
                entity = entity_id,
                field = field.field,
                "pruned dangling reference from policy"
            );
            tx.insert_record(P::COLLECTION, &policy_id, serde_json::to_value(&policy)?)?;
            tx.emit(P::ENTITY_TYPE, EventKind::Updated, serde_json::to_value(&policy)?)?;

            let desired: BTreeSet<String> = roles::candidates(tx, field.kind)
                .iter()
                .filter(|c| roles::policy_matches(policy.semantic(), policy.roles(field), c))
                .map(|c| c.id.clone())
                .collect();
            tx.relink_left(field.link_table, &policy_id, desired)?;
        }
        tx.purge_right(field.link_table, entity_id)?;
    }
    Ok(())
}
