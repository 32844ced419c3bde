//! Service instance requests and responses.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::catalog::MaintenanceInfo;
use crate::types::ServicePlanKey;

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// `PUT /v2/service_instances/:instance_id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvisionRequest {
    /// Caller-supplied, globally unique instance identifier.
    pub instance_id: String,
    #[serde(flatten)]
    pub key: ServicePlanKey,
    /// Whether the platform supports asynchronous operations.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub accepts_incomplete: Option<bool>,
    /// Platform-specific contextual data.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub context: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub organization_guid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub space_guid: Option<String>,
    /// Configuration parameters, validated against the plan's create schema.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub parameters: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub maintenance_info: Option<MaintenanceInfo>,
    /// Any other field the platform sent.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `PATCH /v2/service_instances/:instance_id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateRequest {
    pub instance_id: String,
    #[serde(flatten)]
    pub key: ServicePlanKey,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub accepts_incomplete: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub context: Option<Value>,
    /// Configuration parameters, validated against the plan's update schema.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub parameters: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub maintenance_info: Option<MaintenanceInfo>,
    /// What the platform believes the instance looked like before this update.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub previous_values: Option<PreviousValues>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UpdateRequest {
    /// True when the request moves the instance to a different plan.
    #[must_use]
    pub fn changes_plan(&self) -> bool {
        self.previous_values
            .as_ref()
            .and_then(|prev| prev.plan_id.as_deref())
            .is_some_and(|prev| prev != self.key.plan_id)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PreviousValues {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub service_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub plan_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub organization_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub space_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub maintenance_info: Option<MaintenanceInfo>,
}

/// `DELETE` and `GET /v2/service_instances/:instance_id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceRequest {
    pub instance_id: String,
    #[serde(flatten)]
    pub key: ServicePlanKey,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub accepts_incomplete: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `GET /v2/service_instances/:instance_id/last_operation`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceLastOperationRequest {
    pub instance_id: String,
    #[serde(flatten)]
    pub key: ServicePlanKey,
    /// Operation token previously returned by the broker.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub operation: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Result of a provision or update.
///
/// A non-empty `operation` token marks the operation as asynchronous.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProvisionResponse {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub dashboard_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub operation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub metadata: Option<InstanceMetadata>,
}

impl ProvisionResponse {
    /// True when the backend handed out a non-empty operation token.
    #[must_use]
    pub fn is_async(&self) -> bool {
        self.operation.as_deref().is_some_and(|op| !op.is_empty())
    }
}

pub type UpdateResponse = ProvisionResponse;

/// Labels and attributes the broker attaches to an instance.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InstanceMetadata {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub labels: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub attributes: Option<Map<String, Value>>,
}

/// Result of fetching an instance.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InstanceDetails {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub service_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub plan_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub dashboard_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub parameters: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub maintenance_info: Option<MaintenanceInfo>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub metadata: Option<InstanceMetadata>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn provision_request_collects_unknown_fields() {
        let req: ProvisionRequest = serde_json::from_value(json!({
            "instance_id": "i1",
            "service_id": "svc-1",
            "plan_id": "plan-free",
            "accepts_incomplete": true,
            "parameters": { "locale": "en-US" },
            "x-custom": "kept"
        }))
        .unwrap();

        assert_eq!(req.key, ServicePlanKey::new("svc-1", "plan-free"));
        assert_eq!(req.accepts_incomplete, Some(true));
        assert_eq!(req.parameters, Some(json!({ "locale": "en-US" })));
        assert_eq!(req.extra.get("x-custom"), Some(&json!("kept")));
        assert!(!req.extra.contains_key("service_id"));
    }

    #[test]
    fn provision_request_requires_plan_key() {
        let err = serde_json::from_value::<ProvisionRequest>(json!({
            "instance_id": "i1",
            "service_id": "svc-1"
        }))
        .unwrap_err();
        assert!(err.to_string().contains("plan_id"));
    }

    #[test]
    fn update_detects_plan_change() {
        let mut req: UpdateRequest = serde_json::from_value(json!({
            "instance_id": "i1",
            "service_id": "svc-1",
            "plan_id": "plan-large",
            "previous_values": { "plan_id": "plan-small" }
        }))
        .unwrap();
        assert!(req.changes_plan());

        req.previous_values = Some(PreviousValues {
            plan_id: Some("plan-large".to_string()),
            ..PreviousValues::default()
        });
        assert!(!req.changes_plan());

        req.previous_values = None;
        assert!(!req.changes_plan());
    }

    #[test]
    fn empty_operation_token_is_synchronous() {
        let mut resp = ProvisionResponse::default();
        assert!(!resp.is_async());
        resp.operation = Some(String::new());
        assert!(!resp.is_async());
        resp.operation = Some("op-1".to_string());
        assert!(resp.is_async());
    }
}
