use serde::{Deserialize, Serialize};

/// Correlation pair carried by every instance and binding operation.
///
/// `service_id` selects the backend; `plan_id` is resolved against that
/// backend's plans only by the steps that need a plan.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServicePlanKey {
    pub service_id: String,
    pub plan_id: String,
}

impl ServicePlanKey {
    #[must_use]
    pub fn new(service_id: impl Into<String>, plan_id: impl Into<String>) -> Self {
        Self {
            service_id: service_id.into(),
            plan_id: plan_id.into(),
        }
    }
}
