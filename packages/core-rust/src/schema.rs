use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which request flow a plan schema applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaFlow {
    /// `parameters` of a provision request.
    InstanceCreate,
    /// `parameters` of an update request.
    InstanceUpdate,
    /// `parameters` of a bind request.
    BindingCreate,
}

impl SchemaFlow {
    pub const ALL: [SchemaFlow; 3] = [
        SchemaFlow::InstanceCreate,
        SchemaFlow::InstanceUpdate,
        SchemaFlow::BindingCreate,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InstanceCreate => "service_instance.create",
            Self::InstanceUpdate => "service_instance.update",
            Self::BindingCreate => "service_binding.create",
        }
    }
}

/// Per-plan JSON Schemas for input parameters, as declared in the catalog.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PlanSchemas {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub service_instance: Option<ServiceInstanceSchemas>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub service_binding: Option<ServiceBindingSchemas>,
}

impl PlanSchemas {
    /// Returns the declared parameters schema for a flow, if any.
    #[must_use]
    pub fn parameters(&self, flow: SchemaFlow) -> Option<&Value> {
        let schema = match flow {
            SchemaFlow::InstanceCreate => self.service_instance.as_ref()?.create.as_ref(),
            SchemaFlow::InstanceUpdate => self.service_instance.as_ref()?.update.as_ref(),
            SchemaFlow::BindingCreate => self.service_binding.as_ref()?.create.as_ref(),
        };
        schema?.parameters.as_ref()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ServiceInstanceSchemas {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub create: Option<InputParametersSchema>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub update: Option<InputParametersSchema>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ServiceBindingSchemas {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub create: Option<InputParametersSchema>,
}

/// Wrapper around a raw JSON Schema document for the `parameters` field.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InputParametersSchema {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub parameters: Option<Value>,
}
