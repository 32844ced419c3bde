//! Backend that accepts every operation and provisions nothing.
//!
//! Used to serve a catalog file without custom backends and as the default
//! backend in tests.

use async_trait::async_trait;
use broker_core::messages::{
    BindRequest, BindingLastOperationRequest, BindingRequest, BindingResponse, InstanceDetails,
    InstanceLastOperationRequest, InstanceRequest, LastOperation, ProvisionRequest,
    ProvisionResponse, UpdateRequest, UpdateResponse,
};
use broker_core::{RequestContext, ServiceConfiguration};
use tracing::debug;

use crate::service::operation::ServiceResult;
use crate::traits::BrokerService;

/// Synchronous, stateless backend for one offering.
#[derive(Debug, Clone)]
pub struct NoopService {
    config: ServiceConfiguration,
}

impl NoopService {
    #[must_use]
    pub fn new(config: ServiceConfiguration) -> Self {
        Self { config }
    }
}

#[async_trait]
impl BrokerService for NoopService {
    fn configuration(&self) -> &ServiceConfiguration {
        &self.config
    }

    async fn provision(
        &self,
        _ctx: &RequestContext,
        request: ProvisionRequest,
    ) -> ServiceResult<ProvisionResponse> {
        debug!(instance_id = %request.instance_id, "noop provision");
        Ok(ProvisionResponse::default())
    }

    async fn deprovision(
        &self,
        _ctx: &RequestContext,
        request: InstanceRequest,
    ) -> ServiceResult<()> {
        debug!(instance_id = %request.instance_id, "noop deprovision");
        Ok(())
    }

    async fn fetch_instance(
        &self,
        _ctx: &RequestContext,
        request: InstanceRequest,
    ) -> ServiceResult<InstanceDetails> {
        Ok(InstanceDetails {
            service_id: Some(request.key.service_id),
            plan_id: Some(request.key.plan_id),
            ..InstanceDetails::default()
        })
    }

    async fn update_instance(
        &self,
        _ctx: &RequestContext,
        request: UpdateRequest,
    ) -> ServiceResult<UpdateResponse> {
        debug!(instance_id = %request.instance_id, "noop update");
        Ok(UpdateResponse::default())
    }

    async fn instance_last_operation(
        &self,
        _ctx: &RequestContext,
        _request: InstanceLastOperationRequest,
    ) -> ServiceResult<LastOperation> {
        Ok(LastOperation::succeeded())
    }

    async fn bind_instance(
        &self,
        _ctx: &RequestContext,
        request: BindRequest,
    ) -> ServiceResult<BindingResponse> {
        debug!(binding_id = %request.binding_id, "noop bind");
        Ok(BindingResponse::default())
    }

    async fn unbind_instance(
        &self,
        _ctx: &RequestContext,
        request: BindingRequest,
    ) -> ServiceResult<()> {
        debug!(binding_id = %request.binding_id, "noop unbind");
        Ok(())
    }

    async fn fetch_binding(
        &self,
        _ctx: &RequestContext,
        _request: BindingRequest,
    ) -> ServiceResult<BindingResponse> {
        Ok(BindingResponse::default())
    }

    async fn binding_last_operation(
        &self,
        _ctx: &RequestContext,
        _request: BindingLastOperationRequest,
    ) -> ServiceResult<LastOperation> {
        Ok(LastOperation::succeeded())
    }
}

#[cfg(test)]
mod tests {
    use broker_core::messages::OperationState;
    use broker_core::ServicePlanKey;
    use serde_json::Map;

    use super::*;

    fn config() -> ServiceConfiguration {
        serde_json::from_value(serde_json::json!({
            "id": "svc-1",
            "name": "noop",
            "description": "does nothing",
            "plans": [{ "id": "plan-1", "name": "one", "description": "only plan" }]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn provision_is_synchronous() {
        let svc = NoopService::new(config());
        let request: ProvisionRequest = serde_json::from_value(serde_json::json!({
            "instance_id": "i1",
            "service_id": "svc-1",
            "plan_id": "plan-1"
        }))
        .unwrap();
        let response = svc
            .provision(&RequestContext::default(), request)
            .await
            .unwrap();
        assert!(!response.is_async());
    }

    #[tokio::test]
    async fn fetch_instance_echoes_key() {
        let svc = NoopService::new(config());
        let request = InstanceRequest {
            instance_id: "i1".to_string(),
            key: ServicePlanKey::new("svc-1", "plan-1"),
            accepts_incomplete: None,
            extra: Map::new(),
        };
        let details = svc
            .fetch_instance(&RequestContext::default(), request)
            .await
            .unwrap();
        assert_eq!(details.plan_id.as_deref(), Some("plan-1"));
    }

    #[tokio::test]
    async fn last_operation_reports_success() {
        let svc = NoopService::new(config());
        let request = InstanceLastOperationRequest {
            instance_id: "i1".to_string(),
            key: ServicePlanKey::new("svc-1", "plan-1"),
            operation: None,
            extra: Map::new(),
        };
        let state = svc
            .instance_last_operation(&RequestContext::default(), request)
            .await
            .unwrap();
        assert_eq!(state.state, OperationState::Succeeded);
    }
}
