//! Catalog documents: service offerings, their plans, and maintenance info.
//!
//! These types are both the configuration a backend declares and the JSON
//! rendered by `GET /v2/catalog`. Absent optional fields stay absent, declared
//! empty lists stay declared, and unknown fields are carried in `extra`, so
//! the rendered catalog matches what the backend declared.

use std::collections::HashSet;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::BrokerError;
use crate::schema::PlanSchemas;

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// The catalog document: every offering the broker exposes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Catalog {
    pub services: Vec<ServiceConfiguration>,
}

impl Catalog {
    /// Loads a catalog document from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid catalog.
    pub fn from_path(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading catalog {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing catalog {}", path.display()))
    }
}

// ---------------------------------------------------------------------------
// ServiceConfiguration
// ---------------------------------------------------------------------------

/// Immutable descriptor of one service offering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfiguration {
    /// Globally unique offering identifier.
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub requires: Option<Vec<String>>,
    #[serde(default)]
    pub bindable: bool,
    /// Whether `GET /v2/service_instances/:id` is supported for all plans.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub instances_retrievable: Option<bool>,
    /// Whether `GET .../service_bindings/:id` is supported for all plans.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub bindings_retrievable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub allow_context_updates: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub plan_updateable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub metadata: Option<ServiceMetadata>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub dashboard_client: Option<DashboardClient>,
    /// Ordered, non-empty list of plans.
    pub plans: Vec<Plan>,
    /// Vendor extensions are relayed untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ServiceConfiguration {
    /// Looks up a plan of this offering by identifier.
    #[must_use]
    pub fn plan(&self, plan_id: &str) -> Option<&Plan> {
        self.plans.iter().find(|p| p.id == plan_id)
    }

    #[must_use]
    pub fn supports_instance_fetch(&self) -> bool {
        self.instances_retrievable.unwrap_or(false)
    }

    #[must_use]
    pub fn supports_binding_fetch(&self) -> bool {
        self.bindings_retrievable.unwrap_or(false)
    }

    /// Effective bindability for a plan: the plan's override, else the service flag.
    #[must_use]
    pub fn is_bindable(&self, plan_id: &str) -> bool {
        self.plan(plan_id)
            .and_then(|p| p.bindable)
            .unwrap_or(self.bindable)
    }

    /// Effective plan-change permission: the plan's override, else the service flag.
    #[must_use]
    pub fn allows_plan_change(&self, plan_id: &str) -> bool {
        self.plan(plan_id)
            .and_then(|p| p.plan_updateable)
            .or(self.plan_updateable)
            .unwrap_or(false)
    }

    /// Checks the structural invariants of the offering.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` when the id is empty, the plan list is
    /// empty, or a plan id is empty or duplicated.
    pub fn validate(&self) -> Result<(), BrokerError> {
        if self.id.is_empty() {
            return Err(BrokerError::configuration_error(format!(
                "Service '{}' has an empty id",
                self.name
            )));
        }
        if self.plans.is_empty() {
            return Err(BrokerError::configuration_error(format!(
                "Service {} declares no plans",
                self.id
            )));
        }
        let mut seen = HashSet::new();
        for plan in &self.plans {
            if plan.id.is_empty() {
                return Err(BrokerError::configuration_error(format!(
                    "Service {} has a plan with an empty id",
                    self.id
                )));
            }
            if !seen.insert(plan.id.as_str()) {
                return Err(BrokerError::configuration_error(format!(
                    "Service {} declares plan {} more than once",
                    self.id, plan.id
                )));
            }
        }
        Ok(())
    }
}

/// Presentation metadata for an offering.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceMetadata {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub long_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub provider_display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub documentation_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub support_url: Option<String>,
    /// Vendor extensions are relayed untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// OAuth client the platform creates for the offering's dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardClient {
    pub id: String,
    pub secret: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub redirect_uri: Option<String>,
}

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// A tier of an offering with its own optional parameter schemas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// Unique within the owning service.
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(default = "default_free")]
    pub free: bool,
    /// Overrides the service-level `bindable` flag for this plan.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub bindable: Option<bool>,
    /// Overrides the service-level `plan_updateable` flag for this plan.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub plan_updateable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub maximum_polling_duration: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub metadata: Option<PlanMetadata>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub schemas: Option<PlanSchemas>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub maintenance_info: Option<MaintenanceInfo>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_free() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanMetadata {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub costs: Option<Vec<PlanCost>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub bullets: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub display_name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanCost {
    /// Currency code to amount, e.g. `{"usd": 99.0}`.
    pub amount: Map<String, Value>,
    pub unit: String,
}

// ---------------------------------------------------------------------------
// MaintenanceInfo
// ---------------------------------------------------------------------------

/// Version tag on a plan. Only `version` takes part in comparisons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceInfo {
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub description: Option<String>,
}

impl MaintenanceInfo {
    #[must_use]
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            description: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
