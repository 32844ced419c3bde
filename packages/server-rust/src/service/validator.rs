//! Per-plan JSON Schema validation of request `parameters`.
//!
//! Schemas are compiled once, when a backend is registered, and are
//! read-only afterwards: a `ParameterValidator` is shared by every
//! in-flight request without locking.

use std::collections::HashMap;
use std::fmt;

use broker_core::{BrokerError, SchemaFlow, ServiceConfiguration};
use jsonschema::error::ValidationErrorKind;
use jsonschema::{ValidationError, Validator};
use serde_json::{Map, Value};

/// Separator between per-path violation messages.
const VIOLATION_DELIMITER: &str = " - ";

/// Label used for violations on the `parameters` object itself.
const ROOT_PATH: &str = "(root)";

// ---------------------------------------------------------------------------
// PlanValidators
// ---------------------------------------------------------------------------

/// Compiled schemas for one plan, one slot per flow.
#[derive(Default)]
struct PlanValidators {
    instance_create: Option<Validator>,
    instance_update: Option<Validator>,
    binding_create: Option<Validator>,
}

impl PlanValidators {
    fn get(&self, flow: SchemaFlow) -> Option<&Validator> {
        match flow {
            SchemaFlow::InstanceCreate => self.instance_create.as_ref(),
            SchemaFlow::InstanceUpdate => self.instance_update.as_ref(),
            SchemaFlow::BindingCreate => self.binding_create.as_ref(),
        }
    }

    fn slot(&mut self, flow: SchemaFlow) -> &mut Option<Validator> {
        match flow {
            SchemaFlow::InstanceCreate => &mut self.instance_create,
            SchemaFlow::InstanceUpdate => &mut self.instance_update,
            SchemaFlow::BindingCreate => &mut self.binding_create,
        }
    }
}

// ---------------------------------------------------------------------------
// ParameterValidator
// ---------------------------------------------------------------------------

/// Compiled parameter schemas for every plan of one offering, keyed by plan id.
pub struct ParameterValidator {
    plans: HashMap<String, PlanValidators>,
}

impl ParameterValidator {
    /// Compiles every declared plan schema of the offering.
    ///
    /// The `$schema` draft identifier is stripped before compilation; it is
    /// metadata, not a constraint.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` naming the plan and flow of the first
    /// schema that fails to compile.
    pub fn compile(config: &ServiceConfiguration) -> Result<Self, BrokerError> {
        let mut plans = HashMap::with_capacity(config.plans.len());
        for plan in &config.plans {
            let mut validators = PlanValidators::default();
            if let Some(schemas) = &plan.schemas {
                for flow in SchemaFlow::ALL {
                    if let Some(schema) = schemas.parameters(flow) {
                        let compiled = compile_schema(schema).map_err(|e| {
                            BrokerError::configuration_error(format!(
                                "Plan {} of service {} has an invalid {} schema: {e}",
                                plan.id,
                                config.id,
                                flow.as_str()
                            ))
                        })?;
                        *validators.slot(flow) = Some(compiled);
                    }
                }
            }
            plans.insert(plan.id.clone(), validators);
        }
        Ok(Self { plans })
    }

    /// Whether a schema was declared for this plan and flow.
    #[must_use]
    pub fn has_schema(&self, plan_id: &str, flow: SchemaFlow) -> bool {
        self.plans
            .get(plan_id)
            .is_some_and(|p| p.get(flow).is_some())
    }

    /// Validates `parameters` against the plan's schema for `flow`.
    ///
    /// Without a declared schema any value (or none) is accepted. Absent
    /// parameters are checked as an empty object so `required` still applies.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the plan does not belong to this offering.
    /// - `InvalidParameter` listing, per violating path, the first violation.
    pub fn validate(
        &self,
        flow: SchemaFlow,
        plan_id: &str,
        parameters: Option<&Value>,
    ) -> Result<(), BrokerError> {
        let plan = self
            .plans
            .get(plan_id)
            .ok_or_else(|| BrokerError::not_found(format!("Plan {plan_id} does not exist")))?;

        let Some(validator) = plan.get(flow) else {
            return Ok(());
        };

        let empty = Value::Object(Map::new());
        let instance = parameters.unwrap_or(&empty);

        let mut violations: Vec<(String, String)> = Vec::new();
        for error in validator.iter_errors(instance) {
            let (path, message) = describe(&error);
            if !violations.iter().any(|(seen, _)| *seen == path) {
                violations.push((path, message));
            }
        }

        if violations.is_empty() {
            return Ok(());
        }

        let description = violations
            .iter()
            .map(|(path, message)| format!("[{path}]: {message}"))
            .collect::<Vec<_>>()
            .join(VIOLATION_DELIMITER);
        Err(BrokerError::invalid_parameter(description))
    }
}

impl fmt::Debug for ParameterValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (plan_id, validators) in &self.plans {
            let flows: Vec<_> = SchemaFlow::ALL
                .into_iter()
                .filter(|flow| validators.get(*flow).is_some())
                .map(SchemaFlow::as_str)
                .collect();
            map.entry(plan_id, &flows);
        }
        map.finish()
    }
}

fn compile_schema(schema: &Value) -> Result<Validator, ValidationError<'static>> {
    let mut schema = schema.clone();
    if let Value::Object(map) = &mut schema {
        map.remove("$schema");
    }
    jsonschema::validator_for(&schema)
}

/// Renders a violation as a (path, message) pair.
///
/// A missing required property is reported at the property's own path, so
/// the platform sees which field is missing rather than its parent.
fn describe(error: &ValidationError<'_>) -> (String, String) {
    let pointer = error.instance_path.to_string();
    let mut segments: Vec<String> = pointer
        .split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    let message = if let ValidationErrorKind::Required { property } = &error.kind {
        segments.push(match property {
            Value::String(name) => name.clone(),
            other => other.to_string(),
        });
        "is required".to_string()
    } else {
        error.to_string()
    };

    let path = if segments.is_empty() {
        ROOT_PATH.to_string()
    } else {
        segments.join("/")
    };
    (path, message)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use broker_core::ErrorKind;
    use serde_json::json;

    use super::*;

    fn config_with_schema(schema: Value) -> ServiceConfiguration {
        serde_json::from_value(json!({
            "id": "svc-1",
            "name": "svc",
            "description": "test service",
            "plans": [
                {
                    "id": "plan-free",
                    "name": "free",
                    "description": "free plan",
                    "schemas": {
                        "service_instance": { "create": { "parameters": schema } }
                    }
                },
                { "id": "plan-open", "name": "open", "description": "no schemas" }
            ]
        }))
        .unwrap()
    }

    fn locale_schema() -> Value {
        json!({
            "$schema": "http://json-schema.org/draft-04/schema#",
            "type": "object",
            "properties": {
                "locale": { "type": "string" },
                "size": { "type": "integer", "minimum": 1 }
            },
            "required": ["locale"]
        })
    }

    #[test]
    fn plan_without_schema_accepts_anything() {
        let validator = ParameterValidator::compile(&config_with_schema(locale_schema())).unwrap();
        assert!(validator
            .validate(SchemaFlow::InstanceCreate, "plan-open", None)
            .is_ok());
        assert!(validator
            .validate(SchemaFlow::InstanceCreate, "plan-open", Some(&json!([1, 2, 3])))
            .is_ok());
        assert!(validator
            .validate(SchemaFlow::BindingCreate, "plan-free", Some(&json!("anything")))
            .is_ok());
    }

    #[test]
    fn valid_parameters_pass() {
        let validator = ParameterValidator::compile(&config_with_schema(locale_schema())).unwrap();
        let params = json!({ "locale": "en-US", "size": 3 });
        assert!(validator
            .validate(SchemaFlow::InstanceCreate, "plan-free", Some(&params))
            .is_ok());
    }

    #[test]
    fn missing_required_field_names_the_field() {
        let validator = ParameterValidator::compile(&config_with_schema(locale_schema())).unwrap();
        let err = validator
            .validate(SchemaFlow::InstanceCreate, "plan-free", Some(&json!({})))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
        assert_eq!(err.description(), Some("[locale]: is required"));
    }

    #[test]
    fn absent_parameters_are_checked_as_empty_object() {
        let validator = ParameterValidator::compile(&config_with_schema(locale_schema())).unwrap();
        let err = validator
            .validate(SchemaFlow::InstanceCreate, "plan-free", None)
            .unwrap_err();
        assert!(err.description().unwrap().contains("locale"));

        let lenient = ParameterValidator::compile(&config_with_schema(json!({
            "type": "object",
            "properties": { "locale": { "type": "string" } }
        })))
        .unwrap();
        assert!(lenient
            .validate(SchemaFlow::InstanceCreate, "plan-free", None)
            .is_ok());
    }

    #[test]
    fn every_violating_path_is_reported_once() {
        let validator = ParameterValidator::compile(&config_with_schema(json!({
            "type": "object",
            "properties": {
                "locale": { "type": "string", "minLength": 5 },
                "size": { "type": "integer", "minimum": 1 }
            },
            "required": ["locale", "region"]
        })))
        .unwrap();
        let err = validator
            .validate(
                SchemaFlow::InstanceCreate,
                "plan-free",
                Some(&json!({ "locale": 42, "size": 0 })),
            )
            .unwrap_err();
        let description = err.description().unwrap();
        let parts: Vec<_> = description.split(VIOLATION_DELIMITER).collect();

        assert_eq!(parts.len(), 3, "{description}");
        assert!(parts.iter().any(|p| p.starts_with("[region]: is required")));
        assert_eq!(parts.iter().filter(|p| p.starts_with("[locale]")).count(), 1);
        assert!(parts.iter().any(|p| p.starts_with("[size]")));
    }

    #[test]
    fn nested_paths_use_pointer_segments() {
        let validator = ParameterValidator::compile(&config_with_schema(json!({
            "type": "object",
            "properties": {
                "backup": {
                    "type": "object",
                    "properties": { "retention": { "type": "integer" } },
                    "required": ["schedule"]
                }
            }
        })))
        .unwrap();
        let err = validator
            .validate(
                SchemaFlow::InstanceCreate,
                "plan-free",
                Some(&json!({ "backup": { "retention": "weekly" } })),
            )
            .unwrap_err();
        let description = err.description().unwrap();
        assert!(description.contains("[backup/schedule]: is required"), "{description}");
        assert!(description.contains("[backup/retention]: "), "{description}");
    }

    #[test]
    fn root_type_violation_uses_root_label() {
        let validator = ParameterValidator::compile(&config_with_schema(locale_schema())).unwrap();
        let err = validator
            .validate(SchemaFlow::InstanceCreate, "plan-free", Some(&json!("en-US")))
            .unwrap_err();
        assert!(err.description().unwrap().starts_with("[(root)]: "));
    }

    #[test]
    fn unknown_plan_is_not_found() {
        let validator = ParameterValidator::compile(&config_with_schema(locale_schema())).unwrap();
        let err = validator
            .validate(SchemaFlow::InstanceCreate, "plan-gold", None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn malformed_schema_fails_at_compile_time() {
        let err = ParameterValidator::compile(&config_with_schema(json!({
            "type": "not-a-real-type"
        })))
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigurationError);
        assert!(err.description().unwrap().contains("plan-free"));
    }

    #[test]
    fn has_schema_reports_declared_flows() {
        let validator = ParameterValidator::compile(&config_with_schema(locale_schema())).unwrap();
        assert!(validator.has_schema("plan-free", SchemaFlow::InstanceCreate));
        assert!(!validator.has_schema("plan-free", SchemaFlow::InstanceUpdate));
        assert!(!validator.has_schema("plan-open", SchemaFlow::InstanceCreate));
    }

    #[test]
    fn compiled_validator_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ParameterValidator>();
    }
}
