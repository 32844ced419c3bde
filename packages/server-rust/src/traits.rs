use async_trait::async_trait;
use broker_core::messages::{
    BindRequest, BindingLastOperationRequest, BindingRequest, BindingResponse, InstanceDetails,
    InstanceLastOperationRequest, InstanceRequest, LastOperation, ProvisionRequest,
    ProvisionResponse, UpdateRequest, UpdateResponse,
};
use broker_core::{RequestContext, ServiceConfiguration};

use crate::service::operation::ServiceResult;

/// Pluggable backend for one service offering.
///
/// The dispatcher resolves a backend by `configuration().id`, runs the
/// capability guard and parameter validation, and only then invokes one of
/// these operations. Backends own all instance and binding state; the
/// engine persists nothing.
///
/// Return `ServiceError::Broker` to report a specific protocol error
/// (`ConcurrencyError`, `AsyncRequired`, ...). Any other error is reported
/// to the platform as an unclassified failure.
#[async_trait]
pub trait BrokerService: Send + Sync {
    /// The catalog entry this backend serves.
    fn configuration(&self) -> &ServiceConfiguration;

    /// Create a new service instance.
    async fn provision(
        &self,
        ctx: &RequestContext,
        request: ProvisionRequest,
    ) -> ServiceResult<ProvisionResponse>;

    /// Delete everything created for an instance.
    async fn deprovision(&self, ctx: &RequestContext, request: InstanceRequest)
        -> ServiceResult<()>;

    /// Describe an instance. Only called when `instances_retrievable` is declared.
    async fn fetch_instance(
        &self,
        ctx: &RequestContext,
        request: InstanceRequest,
    ) -> ServiceResult<InstanceDetails>;

    /// Change the plan, parameters, or maintenance version of an instance.
    async fn update_instance(
        &self,
        ctx: &RequestContext,
        request: UpdateRequest,
    ) -> ServiceResult<UpdateResponse>;

    /// Report the state of the last asynchronous instance operation.
    async fn instance_last_operation(
        &self,
        ctx: &RequestContext,
        request: InstanceLastOperationRequest,
    ) -> ServiceResult<LastOperation>;

    /// Create a binding. Only called when the plan is bindable.
    async fn bind_instance(
        &self,
        ctx: &RequestContext,
        request: BindRequest,
    ) -> ServiceResult<BindingResponse>;

    /// Revoke a binding.
    async fn unbind_instance(&self, ctx: &RequestContext, request: BindingRequest)
        -> ServiceResult<()>;

    /// Describe a binding. Only called when `bindings_retrievable` is declared.
    async fn fetch_binding(
        &self,
        ctx: &RequestContext,
        request: BindingRequest,
    ) -> ServiceResult<BindingResponse>;

    /// Report the state of the last asynchronous binding operation.
    async fn binding_last_operation(
        &self,
        ctx: &RequestContext,
        request: BindingLastOperationRequest,
    ) -> ServiceResult<LastOperation>;
}
