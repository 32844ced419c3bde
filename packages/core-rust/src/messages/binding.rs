//! Service binding requests and responses.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::ServicePlanKey;

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// `PUT /v2/service_instances/:instance_id/service_bindings/:binding_id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindRequest {
    pub instance_id: String,
    /// Caller-supplied binding identifier, scoped under `instance_id`.
    pub binding_id: String,
    #[serde(flatten)]
    pub key: ServicePlanKey,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub accepts_incomplete: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub context: Option<Value>,
    /// Deprecated in favour of `bind_resource.app_guid`, still sent by some platforms.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub app_guid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub bind_resource: Option<BindResource>,
    /// Binding parameters, validated against the plan's binding create schema.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub parameters: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BindRequest {
    /// The application GUID from `bind_resource`, falling back to the top-level field.
    #[must_use]
    pub fn app_guid(&self) -> Option<&str> {
        self.bind_resource
            .as_ref()
            .and_then(|r| r.app_guid.as_deref())
            .or(self.app_guid.as_deref())
    }
}

/// The resource a binding is created for.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BindResource {
    /// Application the credentials are for.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub app_guid: Option<String>,
    /// URL of the application to intermediate, for route services.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub route: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `DELETE` and `GET /v2/service_instances/:instance_id/service_bindings/:binding_id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindingRequest {
    pub instance_id: String,
    pub binding_id: String,
    #[serde(flatten)]
    pub key: ServicePlanKey,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub accepts_incomplete: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `GET .../service_bindings/:binding_id/last_operation`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindingLastOperationRequest {
    pub instance_id: String,
    pub binding_id: String,
    #[serde(flatten)]
    pub key: ServicePlanKey,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub operation: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Result of creating or fetching a binding. Relayed verbatim to the platform.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BindingResponse {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub metadata: Option<BindingMetadata>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub credentials: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub syslog_drain_url: Option<String>,
    /// Requires the offering to declare `"requires": ["route_forwarding"]`.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub route_service_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub volume_mounts: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub parameters: Option<Value>,
    /// MUST match the token of the original request while the binding is in progress.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub operation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BindingMetadata {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub expires_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub renew_before: Option<String>,
}
