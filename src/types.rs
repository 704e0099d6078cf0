//! Persisted record types and the closed set of policy-referenceable kinds

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique record identifier
pub type Id = String;

/// How a policy combines multiple role references into one match decision.
///
/// The semantic applies to tag references; explicit entity references always
/// select the named entity regardless of semantic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Semantic {
    /// Candidate must carry every referenced tag
    #[default]
    AllOf,
    /// Candidate must carry at least one referenced tag
    AnyOf,
}

/// The fixed set of entity kinds a policy role list can reference.
///
/// Base routers are not referenceable; policies bind edge routers, which
/// extend them. Adding a kind here is a closed-set extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Identity,
    Service,
    EdgeRouter,
}

impl EntityKind {
    /// Name of the record collection holding this kind.
    pub fn collection(&self) -> &'static str {
        match self {
            EntityKind::Identity => "identities",
            EntityKind::Service => "services",
            EntityKind::EdgeRouter => "edgeRouters",
        }
    }

    /// Plural noun used in user-facing validation messages.
    pub fn plural(&self) -> &'static str {
        self.collection()
    }
}

/// A device or user identity enrolled with the controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: Id,
    pub name: String,
    #[serde(default)]
    pub role_attributes: Vec<String>,
    #[serde(default)]
    pub is_admin: bool,
}

impl Identity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            role_attributes: Vec::new(),
            is_admin: false,
        }
    }

    pub fn with_role_attributes<I, S>(mut self, attrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.role_attributes = attrs.into_iter().map(Into::into).collect();
        self
    }
}

/// A service reachable through the overlay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: Id,
    pub name: String,
    #[serde(default)]
    pub role_attributes: Vec<String>,
    #[serde(default)]
    pub encryption_required: bool,
}

impl Service {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            role_attributes: Vec::new(),
            encryption_required: false,
        }
    }

    pub fn with_role_attributes<I, S>(mut self, attrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.role_attributes = attrs.into_iter().map(Into::into).collect();
        self
    }
}

/// Base router record. May be extended 1:1 by an [`EdgeRouter`] sharing the
/// same id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Router {
    pub id: Id,
    pub name: String,
    pub fingerprint: Option<String>,
}

impl Router {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            fingerprint: None,
        }
    }

    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.fingerprint = Some(fingerprint.into());
        self
    }
}

/// Edge router: the subtype view composed of the base [`Router`] record and
/// the edge extension record stored under the same id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeRouter {
    #[serde(flatten)]
    pub router: Router,
    #[serde(default)]
    pub role_attributes: Vec<String>,
    #[serde(default)]
    pub is_verified: bool,
}

impl EdgeRouter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            router: Router::new(name),
            role_attributes: Vec::new(),
            is_verified: false,
        }
    }

    pub fn with_role_attributes<I, S>(mut self, attrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.role_attributes = attrs.into_iter().map(Into::into).collect();
        self
    }

    pub fn id(&self) -> &str {
        &self.router.id
    }
}

/// Grants identities dial/bind access to services
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePolicy {
    pub id: Id,
    pub name: String,
    #[serde(default)]
    pub semantic: Semantic,
    #[serde(default)]
    pub identity_roles: Vec<String>,
    #[serde(default)]
    pub service_roles: Vec<String>,
}

impl ServicePolicy {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            semantic: Semantic::default(),
            identity_roles: Vec::new(),
            service_roles: Vec::new(),
        }
    }

    pub fn with_semantic(mut self, semantic: Semantic) -> Self {
        self.semantic = semantic;
        self
    }
}

/// Grants identities access to edge routers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeRouterPolicy {
    pub id: Id,
    pub name: String,
    #[serde(default)]
    pub semantic: Semantic,
    #[serde(default)]
    pub identity_roles: Vec<String>,
    #[serde(default)]
    pub edge_router_roles: Vec<String>,
}

impl EdgeRouterPolicy {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            semantic: Semantic::default(),
            identity_roles: Vec::new(),
            edge_router_roles: Vec::new(),
        }
    }

    pub fn with_semantic(mut self, semantic: Semantic) -> Self {
        self.semantic = semantic;
        self
    }
}

/// Binds services to the edge routers allowed to terminate them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceEdgeRouterPolicy {
    pub id: Id,
    pub name: String,
    #[serde(default)]
    pub semantic: Semantic,
    #[serde(default)]
    pub service_roles: Vec<String>,
    #[serde(default)]
    pub edge_router_roles: Vec<String>,
}

impl ServiceEdgeRouterPolicy {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            semantic: Semantic::default(),
            service_roles: Vec::new(),
            edge_router_roles: Vec::new(),
        }
    }

    pub fn with_semantic(mut self, semantic: Semantic) -> Self {
        self.semantic = semantic;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn semantic_serializes_as_variant_name() {
        assert_eq!(
            serde_json::to_value(Semantic::AllOf).unwrap(),
            serde_json::json!("AllOf")
        );
        assert_eq!(
            serde_json::to_value(Semantic::AnyOf).unwrap(),
            serde_json::json!("AnyOf")
        );
    }

    #[test]
    fn edge_router_flattens_base_fields() {
        let er = EdgeRouter::new("er-1").with_role_attributes(["edge"]);
        let value = serde_json::to_value(&er).unwrap();
        assert_eq!(value["name"], serde_json::json!("er-1"));
        assert_eq!(value["fingerprint"], serde_json::Value::Null);
        assert_eq!(value["roleAttributes"], serde_json::json!(["edge"]));

        let back: EdgeRouter = serde_json::from_value(value).unwrap();
        assert_eq!(back, er);
    }
}
