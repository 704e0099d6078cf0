//! Event propagation across the router / edge router layers: creating,
//! updating, and deleting through either store surfaces the right events in
//! parent-before-child order, with composed edge router payloads.

mod common;

use common::TestContext;
use trellis_store::types::{EdgeRouter, Router};
use trellis_store::{EventKind, StoreError};

#[test]
fn test_create_edge_router_emits_both_layers() {
    let ctx = TestContext::new();

    let router = ctx.create_edge_router("er-1", &["edge"]).unwrap();

    let parent = ctx.require_event("router", EventKind::Created);
    assert_eq!(parent["id"], router.id());
    assert_eq!(parent["name"], "er-1");
    // Base payloads carry no role attributes.
    assert!(parent.get("roleAttributes").is_none());

    let child = ctx.require_event("edgeRouter", EventKind::Created);
    assert_eq!(child["id"], router.id());
    assert_eq!(child["name"], "er-1");
    assert_eq!(child["roleAttributes"], serde_json::json!(["edge"]));
    ctx.require_no_events();
}

#[test]
fn test_update_through_edge_store_updates_both_layers() {
    let ctx = TestContext::new();
    let mut router = ctx.create_edge_router("er-2", &[]).unwrap();
    ctx.clear_events();

    router.router.fingerprint = Some("ab:cd".to_string());
    router.role_attributes = vec!["edge".to_string()];
    let router = ctx.update_edge_router(&router).unwrap();

    let parent = ctx.require_event("router", EventKind::Updated);
    assert_eq!(parent["fingerprint"], "ab:cd");
    let child = ctx.require_event("edgeRouter", EventKind::Updated);
    assert_eq!(child["fingerprint"], "ab:cd");
    assert_eq!(child["roleAttributes"], serde_json::json!(["edge"]));
    ctx.require_no_events();

    assert_eq!(router.router.fingerprint.as_deref(), Some("ab:cd"));
}

#[test]
fn test_update_through_base_store_updates_edge_view() {
    let ctx = TestContext::new();
    let router = ctx.create_edge_router("er-3", &["edge"]).unwrap();
    ctx.clear_events();

    // A base-layer write still surfaces on the edge layer, role attributes
    // untouched.
    let renamed = Router {
        id: router.id().to_string(),
        name: "er-3-renamed".to_string(),
        fingerprint: Some("99:00".to_string()),
    };
    ctx.stores
        .db
        .update(|tx| ctx.stores.routers.update(tx, &renamed))
        .unwrap();

    let parent = ctx.require_event("router", EventKind::Updated);
    assert_eq!(parent["name"], "er-3-renamed");
    let child = ctx.require_event("edgeRouter", EventKind::Updated);
    assert_eq!(child["name"], "er-3-renamed");
    assert_eq!(child["fingerprint"], "99:00");
    assert_eq!(child["roleAttributes"], serde_json::json!(["edge"]));
    ctx.require_no_events();

    ctx.stores
        .db
        .view(|tx| {
            let loaded = ctx.stores.edge_routers.load(tx, router.id())?;
            assert_eq!(loaded.router.name, "er-3-renamed");
            assert_eq!(loaded.role_attributes, vec!["edge".to_string()]);
            Ok(())
        })
        .unwrap();
}

#[test]
fn test_clearing_fingerprint_is_visible_on_both_layers() {
    let ctx = TestContext::new();
    let mut router = ctx.create_edge_router("er-4", &[]).unwrap();
    router.router.fingerprint = Some("11:22".to_string());
    let mut router = ctx.update_edge_router(&router).unwrap();
    ctx.clear_events();

    router.router.fingerprint = None;
    ctx.update_edge_router(&router).unwrap();

    let parent = ctx.require_event("router", EventKind::Updated);
    assert!(parent["fingerprint"].is_null());
    let child = ctx.require_event("edgeRouter", EventKind::Updated);
    assert!(child["fingerprint"].is_null());
    ctx.require_no_events();
}

#[test]
fn test_delete_emits_both_layers_in_parent_order() {
    let ctx = TestContext::new();
    let router = ctx.create_edge_router("er-5", &["edge"]).unwrap();
    ctx.clear_events();

    // Deleting through the base store cascades to the edge layer.
    ctx.stores
        .db
        .update(|tx| ctx.stores.routers.delete(tx, router.id()))
        .unwrap();

    let parent = ctx.require_event("router", EventKind::Deleted);
    assert_eq!(parent["id"], router.id());
    let child = ctx.require_event("edgeRouter", EventKind::Deleted);
    assert_eq!(child["id"], router.id());
    assert_eq!(child["roleAttributes"], serde_json::json!(["edge"]));
    ctx.require_no_events();

    ctx.stores
        .db
        .view(|tx| {
            assert!(matches!(
                ctx.stores.edge_routers.load(tx, router.id()),
                Err(StoreError::NotFound { .. })
            ));
            assert!(matches!(
                ctx.stores.routers.load(tx, router.id()),
                Err(StoreError::NotFound { .. })
            ));
            Ok(())
        })
        .unwrap();

    // Deleting through the edge store behaves identically.
    let router = ctx.create_edge_router("er-5", &[]).unwrap();
    ctx.clear_events();
    ctx.stores
        .db
        .update(|tx| ctx.stores.edge_routers.delete(tx, router.id()))
        .unwrap();
    ctx.require_event("router", EventKind::Deleted);
    ctx.require_event("edgeRouter", EventKind::Deleted);
    ctx.require_no_events();
}

#[test]
fn test_plain_router_has_no_edge_layer() {
    let ctx = TestContext::new();

    let router = Router::new("plain").with_fingerprint("aa:bb");
    let router = ctx
        .stores
        .db
        .update(|tx| ctx.stores.routers.create(tx, &router))
        .unwrap();
    ctx.require_event("router", EventKind::Created);
    ctx.require_no_events();

    // No edge extension, so base updates emit only the base event and edge
    // lookups miss.
    let mut renamed = router.clone();
    renamed.name = "plain-renamed".to_string();
    ctx.stores
        .db
        .update(|tx| ctx.stores.routers.update(tx, &renamed))
        .unwrap();
    ctx.require_event("router", EventKind::Updated);
    ctx.require_no_events();

    ctx.stores
        .db
        .view(|tx| {
            assert!(matches!(
                ctx.stores.edge_routers.load(tx, &router.id),
                Err(StoreError::NotFound { .. })
            ));
            assert!(ctx
                .stores
                .edge_routers
                .load_by_name(tx, "plain-renamed")?
                .is_none());
            Ok(())
        })
        .unwrap();

    ctx.stores
        .db
        .update(|tx| ctx.stores.routers.delete(tx, &router.id))
        .unwrap();
    ctx.require_event("router", EventKind::Deleted);
    ctx.require_no_events();
}

#[test]
fn test_edge_router_unusable_name_for_second_router() {
    let ctx = TestContext::new();
    ctx.create_edge_router("shared-name", &[]).unwrap();

    // The name index is shared across both layers.
    let dup = Router::new("shared-name");
    let err = ctx
        .stores
        .db
        .update(|tx| ctx.stores.routers.create(tx, &dup))
        .unwrap_err();
    assert!(matches!(err, StoreError::DuplicateName(_)));

    let dup = EdgeRouter::new("shared-name");
    let err = ctx
        .stores
        .db
        .update(|tx| ctx.stores.edge_routers.create(tx, &dup))
        .unwrap_err();
    assert!(matches!(err, StoreError::DuplicateName(_)));
}
