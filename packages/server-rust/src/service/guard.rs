//! Capability and maintenance-version checks run before any backend call.
//!
//! These are pure functions over the declared catalog entry; they never
//! touch the backend or mutate stored configuration.

use broker_core::messages::UpdateRequest;
use broker_core::{BrokerError, MaintenanceInfo, Plan, ServiceConfiguration};

use super::operation::OperationKind;

/// Checks the capability flag an operation depends on.
///
/// | Operation      | Requires                          |
/// |----------------|-----------------------------------|
/// | fetch instance | `instances_retrievable`           |
/// | bind           | `bindable` (plan override first)  |
/// | fetch binding  | `bindings_retrievable`            |
///
/// Every other operation passes unconditionally.
///
/// # Errors
///
/// Returns `UnsupportedRequest` when the flag is absent or false.
pub fn check_capability(
    operation: OperationKind,
    config: &ServiceConfiguration,
    plan_id: &str,
) -> Result<(), BrokerError> {
    match operation {
        OperationKind::FetchInstance if !config.supports_instance_fetch() => {
            Err(BrokerError::unsupported_request(format!(
                "Service {} does not support fetching instances: instances_retrievable is false or undefined",
                config.id
            )))
        }
        OperationKind::Bind if !config.is_bindable(plan_id) => {
            Err(BrokerError::unsupported_request(format!(
                "Service {} plan {plan_id} is not bindable",
                config.id
            )))
        }
        OperationKind::FetchBinding if !config.supports_binding_fetch() => {
            Err(BrokerError::unsupported_request(format!(
                "Service {} does not support fetching bindings: bindings_retrievable is false or undefined",
                config.id
            )))
        }
        _ => Ok(()),
    }
}

/// Compares the requested maintenance version with the plan's declared one.
///
/// Absence on either side is not a conflict. Only `version` is compared.
///
/// # Errors
///
/// Returns `MaintenanceInfoConflict` when both sides declare a version and
/// the versions differ.
pub fn check_maintenance_info(
    plan: &Plan,
    requested: Option<&MaintenanceInfo>,
) -> Result<(), BrokerError> {
    match (plan.maintenance_info.as_ref(), requested) {
        (Some(stored), Some(requested)) if stored.version != requested.version => {
            Err(BrokerError::maintenance_info_conflict(format!(
                "maintenance_info.version {} does not match version {} of plan {}",
                requested.version, stored.version, plan.id
            )))
        }
        _ => Ok(()),
    }
}

/// Rejects plan changes the offering does not allow.
///
/// # Errors
///
/// Returns `UnsupportedRequest` when `previous_values.plan_id` differs from
/// the requested plan and neither the plan nor the service declares
/// `plan_updateable`.
pub fn check_plan_change(
    config: &ServiceConfiguration,
    request: &UpdateRequest,
) -> Result<(), BrokerError> {
    if request.changes_plan() && !config.allows_plan_change(&request.key.plan_id) {
        return Err(BrokerError::unsupported_request(format!(
            "Service {} does not allow changing plans",
            config.id
        )));
    }
    Ok(())
}

/// Resolves a plan of the offering.
///
/// # Errors
///
/// Returns `NotFound` when the plan does not belong to the offering.
pub fn require_plan<'a>(
    config: &'a ServiceConfiguration,
    plan_id: &str,
) -> Result<&'a Plan, BrokerError> {
    config
        .plan(plan_id)
        .ok_or_else(|| BrokerError::not_found(format!("Plan {plan_id} does not exist")))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use broker_core::ErrorKind;
    use serde_json::json;

    use super::*;

    fn config(flags: serde_json::Value) -> ServiceConfiguration {
        let mut doc = json!({
            "id": "svc-1",
            "name": "svc",
            "description": "test service",
            "plans": [
                {
                    "id": "plan-1",
                    "name": "one",
                    "description": "versioned plan",
                    "maintenance_info": { "version": "2.0.0" }
                },
                { "id": "plan-2", "name": "two", "description": "unversioned plan" }
            ]
        });
        for (key, value) in flags.as_object().unwrap() {
            doc[key] = value.clone();
        }
        serde_json::from_value(doc).unwrap()
    }

    #[test]
    fn fetch_instance_requires_instances_retrievable() {
        let err = check_capability(OperationKind::FetchInstance, &config(json!({})), "plan-1")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedRequest);

        let allowed = config(json!({ "instances_retrievable": true }));
        assert!(check_capability(OperationKind::FetchInstance, &allowed, "plan-1").is_ok());
    }

    #[test]
    fn bind_requires_bindable() {
        let err = check_capability(OperationKind::Bind, &config(json!({ "bindable": false })), "plan-1")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedRequest);

        let allowed = config(json!({ "bindable": true }));
        assert!(check_capability(OperationKind::Bind, &allowed, "plan-1").is_ok());
    }

    #[test]
    fn plan_level_bindable_overrides_service() {
        let mut cfg = config(json!({ "bindable": false }));
        cfg.plans[1].bindable = Some(true);
        assert!(check_capability(OperationKind::Bind, &cfg, "plan-2").is_ok());
        assert!(check_capability(OperationKind::Bind, &cfg, "plan-1").is_err());
    }

    #[test]
    fn fetch_binding_requires_bindings_retrievable() {
        let err = check_capability(OperationKind::FetchBinding, &config(json!({})), "plan-1")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedRequest);
    }

    #[test]
    fn other_operations_are_unconditional() {
        let cfg = config(json!({}));
        for op in [
            OperationKind::Provision,
            OperationKind::UpdateInstance,
            OperationKind::Deprovision,
            OperationKind::InstanceLastOperation,
            OperationKind::Unbind,
            OperationKind::BindingLastOperation,
        ] {
            assert!(check_capability(op, &cfg, "plan-1").is_ok(), "{}", op.as_str());
        }
    }

    #[test]
    fn maintenance_version_mismatch_conflicts() {
        let cfg = config(json!({}));
        let err = check_maintenance_info(&cfg.plans[0], Some(&MaintenanceInfo::new("1.0.0")))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MaintenanceInfoConflict);
    }

    #[test]
    fn maintenance_version_match_or_absence_passes() {
        let cfg = config(json!({}));
        let matching = MaintenanceInfo {
            version: "2.0.0".to_string(),
            description: Some("ignored".to_string()),
        };
        assert!(check_maintenance_info(&cfg.plans[0], Some(&matching)).is_ok());
        assert!(check_maintenance_info(&cfg.plans[0], None).is_ok());
        assert!(check_maintenance_info(&cfg.plans[1], Some(&MaintenanceInfo::new("9.9.9"))).is_ok());
    }

    #[test]
    fn plan_change_requires_plan_updateable() {
        let request: UpdateRequest = serde_json::from_value(json!({
            "instance_id": "i1",
            "service_id": "svc-1",
            "plan_id": "plan-2",
            "previous_values": { "plan_id": "plan-1" }
        }))
        .unwrap();

        let err = check_plan_change(&config(json!({})), &request).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedRequest);
        assert!(check_plan_change(&config(json!({ "plan_updateable": true })), &request).is_ok());
    }

    #[test]
    fn require_plan_reports_missing_plan() {
        let cfg = config(json!({}));
        assert_eq!(require_plan(&cfg, "plan-2").unwrap().name, "two");
        assert_eq!(
            require_plan(&cfg, "plan-9").unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }
}
