//! The request dispatcher: one protocol request in, one protocol response out.
//!
//! Each request runs through a fixed, single-pass sequence:
//!
//! 1. **Headers**: version, originating identity, shared secret
//! 2. **Assembly**: path, query, and body merged into one object
//! 3. **Resolution**: backend looked up by `service_id`
//! 4. **Guard**: capability flags, maintenance version, plan change
//! 5. **Validation**: plan schema for the operation's `parameters`
//! 6. **Invocation**: the backend operation, with panics contained
//! 7. **Shaping**: status code and body, or a taxonomy error body
//!
//! Every failure in steps 1-6 ends the request with HTTP 400. Nothing is
//! kept between requests.

use std::convert::Infallible;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use broker_core::messages::{
    BindRequest, BindingLastOperationRequest, BindingRequest, InstanceLastOperationRequest,
    InstanceRequest, ProvisionRequest, UpdateRequest,
};
use broker_core::{RequestContext, SchemaFlow, ServicePlanKey};
use futures_util::FutureExt;
use http::StatusCode;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tower::Service;
use tracing::{debug, error, warn};

use super::catalog;
use super::config::BrokerConfig;
use super::events::{LifecycleEvent, LifecycleEventKind};
use super::guard;
use super::headers;
use super::operation::{
    panic_message, BrokerRequest, BrokerResponse, OperationKind, ServiceError, ServiceResult,
};
use super::params;
use super::registry::{RegisteredService, ServiceRegistry};

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Stateless request handler shared by every connection.
///
/// Cloning is cheap: the registry and configuration are behind `Arc`s.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<ServiceRegistry>,
    config: Arc<BrokerConfig>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(registry: Arc<ServiceRegistry>, config: Arc<BrokerConfig>) -> Self {
        Self { registry, config }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    /// Runs one request to completion. Never fails: errors become 400 bodies.
    pub async fn dispatch(&self, request: BrokerRequest) -> BrokerResponse {
        let operation = request.operation;
        let identity = headers::request_identity(&request.headers);

        let response = match self.run(request).await {
            Ok(response) => response,
            Err(err) => {
                warn!(
                    operation = operation.as_str(),
                    error = %err,
                    "request rejected"
                );
                BrokerResponse::from_error(&err)
            }
        };
        response.with_request_identity(identity)
    }

    async fn run(&self, request: BrokerRequest) -> ServiceResult<BrokerResponse> {
        let operation = request.operation;
        let ctx = headers::parse_headers(&request.headers, &self.config)?;
        debug!(operation = operation.as_str(), "headers accepted");

        if operation == OperationKind::Catalog {
            return self.catalog();
        }

        let params = params::assemble(&request)?;
        let key = params::service_plan_key(&params)?;
        let entry = self.registry.resolve(&key.service_id)?;
        guard::check_capability(operation, entry.configuration(), &key.plan_id)?;
        debug!(
            operation = operation.as_str(),
            service_id = %key.service_id,
            plan_id = %key.plan_id,
            "backend resolved"
        );

        let call = Call {
            ctx: &ctx,
            entry: &entry,
            key: &key,
        };
        match operation {
            OperationKind::Catalog => self.catalog(),
            OperationKind::Provision => self.provision(call, params).await,
            OperationKind::UpdateInstance => self.update_instance(call, params).await,
            OperationKind::Deprovision => self.deprovision(call, params).await,
            OperationKind::FetchInstance => fetch_instance(call, params).await,
            OperationKind::InstanceLastOperation => instance_last_operation(call, params).await,
            OperationKind::Bind => self.bind(call, params).await,
            OperationKind::Unbind => self.unbind(call, params).await,
            OperationKind::FetchBinding => fetch_binding(call, params).await,
            OperationKind::BindingLastOperation => binding_last_operation(call, params).await,
        }
    }

    fn catalog(&self) -> ServiceResult<BrokerResponse> {
        let body = json_body(&catalog::project(&self.registry))?;
        Ok(BrokerResponse::new(StatusCode::OK, body))
    }

    // -- Instance operations ------------------------------------------------

    async fn provision(&self, call: Call<'_>, params: Map<String, Value>) -> ServiceResult<BrokerResponse> {
        let request: ProvisionRequest = params::decode(params)?;
        let plan = guard::require_plan(call.entry.configuration(), &call.key.plan_id)?;
        guard::check_maintenance_info(plan, request.maintenance_info.as_ref())?;
        call.entry.validator().validate(
            SchemaFlow::InstanceCreate,
            &call.key.plan_id,
            request.parameters.as_ref(),
        )?;

        let instance_id = request.instance_id.clone();
        let backend = call.entry.backend();
        let response = contain(OperationKind::Provision, call.key, backend.provision(call.ctx, request)).await?;

        let status = if response.is_async() {
            StatusCode::ACCEPTED
        } else {
            StatusCode::CREATED
        };
        self.emit(LifecycleEventKind::Provisioned, call.key, instance_id, None);
        Ok(BrokerResponse::new(status, json_body(&response)?))
    }

    async fn update_instance(
        &self,
        call: Call<'_>,
        params: Map<String, Value>,
    ) -> ServiceResult<BrokerResponse> {
        let request: UpdateRequest = params::decode(params)?;
        let config = call.entry.configuration();
        let plan = guard::require_plan(config, &call.key.plan_id)?;
        guard::check_maintenance_info(plan, request.maintenance_info.as_ref())?;
        guard::check_plan_change(config, &request)?;
        call.entry.validator().validate(
            SchemaFlow::InstanceUpdate,
            &call.key.plan_id,
            request.parameters.as_ref(),
        )?;

        let instance_id = request.instance_id.clone();
        let backend = call.entry.backend();
        let response = contain(
            OperationKind::UpdateInstance,
            call.key,
            backend.update_instance(call.ctx, request),
        )
        .await?;

        let status = if response.is_async() {
            StatusCode::ACCEPTED
        } else {
            StatusCode::OK
        };
        self.emit(LifecycleEventKind::Updated, call.key, instance_id, None);
        Ok(BrokerResponse::new(status, json_body(&response)?))
    }

    async fn deprovision(&self, call: Call<'_>, params: Map<String, Value>) -> ServiceResult<BrokerResponse> {
        let request: InstanceRequest = params::decode(params)?;
        let instance_id = request.instance_id.clone();
        let backend = call.entry.backend();
        contain(OperationKind::Deprovision, call.key, backend.deprovision(call.ctx, request)).await?;

        self.emit(LifecycleEventKind::Deprovisioned, call.key, instance_id, None);
        Ok(BrokerResponse::new(StatusCode::OK, json!({})))
    }

    // -- Binding operations -------------------------------------------------

    async fn bind(&self, call: Call<'_>, params: Map<String, Value>) -> ServiceResult<BrokerResponse> {
        let request: BindRequest = params::decode(params)?;
        call.entry.validator().validate(
            SchemaFlow::BindingCreate,
            &call.key.plan_id,
            request.parameters.as_ref(),
        )?;

        let instance_id = request.instance_id.clone();
        let binding_id = request.binding_id.clone();
        let backend = call.entry.backend();
        let response = contain(OperationKind::Bind, call.key, backend.bind_instance(call.ctx, request)).await?;

        self.emit(LifecycleEventKind::Bound, call.key, instance_id, Some(binding_id));
        Ok(BrokerResponse::new(StatusCode::CREATED, json_body(&response)?))
    }

    async fn unbind(&self, call: Call<'_>, params: Map<String, Value>) -> ServiceResult<BrokerResponse> {
        let request: BindingRequest = params::decode(params)?;
        let instance_id = request.instance_id.clone();
        let binding_id = request.binding_id.clone();
        let backend = call.entry.backend();
        contain(OperationKind::Unbind, call.key, backend.unbind_instance(call.ctx, request)).await?;

        self.emit(LifecycleEventKind::Unbound, call.key, instance_id, Some(binding_id));
        Ok(BrokerResponse::new(StatusCode::OK, json!({})))
    }

    fn emit(
        &self,
        kind: LifecycleEventKind,
        key: &ServicePlanKey,
        instance_id: String,
        binding_id: Option<String>,
    ) {
        self.registry.events().emit(&LifecycleEvent {
            kind,
            service_id: key.service_id.clone(),
            plan_id: key.plan_id.clone(),
            instance_id,
            binding_id,
        });
    }
}

// ---------------------------------------------------------------------------
// Read-only operations
// ---------------------------------------------------------------------------

async fn fetch_instance(call: Call<'_>, params: Map<String, Value>) -> ServiceResult<BrokerResponse> {
    let request: InstanceRequest = params::decode(params)?;
    let backend = call.entry.backend();
    let details = contain(OperationKind::FetchInstance, call.key, backend.fetch_instance(call.ctx, request)).await?;
    Ok(BrokerResponse::new(StatusCode::OK, json_body(&details)?))
}

async fn instance_last_operation(
    call: Call<'_>,
    params: Map<String, Value>,
) -> ServiceResult<BrokerResponse> {
    let request: InstanceLastOperationRequest = params::decode(params)?;
    let backend = call.entry.backend();
    let state = contain(
        OperationKind::InstanceLastOperation,
        call.key,
        backend.instance_last_operation(call.ctx, request),
    )
    .await?;
    Ok(BrokerResponse::new(StatusCode::OK, json_body(&state)?))
}

async fn fetch_binding(call: Call<'_>, params: Map<String, Value>) -> ServiceResult<BrokerResponse> {
    let request: BindingRequest = params::decode(params)?;
    let backend = call.entry.backend();
    let binding = contain(OperationKind::FetchBinding, call.key, backend.fetch_binding(call.ctx, request)).await?;
    Ok(BrokerResponse::new(StatusCode::OK, json_body(&binding)?))
}

async fn binding_last_operation(
    call: Call<'_>,
    params: Map<String, Value>,
) -> ServiceResult<BrokerResponse> {
    let request: BindingLastOperationRequest = params::decode(params)?;
    let backend = call.entry.backend();
    let state = contain(
        OperationKind::BindingLastOperation,
        call.key,
        backend.binding_last_operation(call.ctx, request),
    )
    .await?;
    Ok(BrokerResponse::new(StatusCode::OK, json_body(&state)?))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Everything a single operation needs once the backend is resolved.
#[derive(Clone, Copy)]
struct Call<'a> {
    ctx: &'a RequestContext,
    entry: &'a RegisteredService,
    key: &'a ServicePlanKey,
}

/// Awaits a backend future, turning a panic into an unclassified error so a
/// defective backend cannot take the dispatcher down with it.
async fn contain<T, F>(operation: OperationKind, key: &ServicePlanKey, fut: F) -> ServiceResult<T>
where
    F: Future<Output = ServiceResult<T>>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_message(&*payload);
            error!(
                operation = operation.as_str(),
                service_id = %key.service_id,
                panic = %message,
                "backend panicked"
            );
            Err(ServiceError::Internal(anyhow::anyhow!(
                "backend panicked during {}: {message}",
                operation.as_str()
            )))
        }
    }
}

fn json_body<T: Serialize>(value: &T) -> ServiceResult<Value> {
    serde_json::to_value(value).map_err(|e| ServiceError::Internal(e.into()))
}

// ---------------------------------------------------------------------------
// tower::Service
// ---------------------------------------------------------------------------

impl Service<BrokerRequest> for Dispatcher {
    type Response = BrokerResponse;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<BrokerResponse, Infallible>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: BrokerRequest) -> Self::Future {
        let this = self.clone();
        Box::pin(async move { Ok(this.dispatch(request).await) })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
