//! Broker protocol handlers.
//!
//! Each route maps to exactly one `OperationKind`. Handlers only collect
//! headers, path parameters, query, and raw body; everything else happens
//! in the dispatcher.

use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::rejection::{BytesRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, HeaderValue, Method, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use broker_core::BrokerError;
use tower::ServiceExt;

use super::AppState;
use crate::service::headers::{request_identity, REQUEST_IDENTITY_HEADER};
use crate::service::{BrokerRequest, BrokerResponse, OperationKind, ServiceError};

type PathParams = Result<Path<HashMap<String, String>>, PathRejection>;
type QueryParams = Result<Query<HashMap<String, String>>, QueryRejection>;
type RawBody = Result<Bytes, BytesRejection>;

impl IntoResponse for BrokerResponse {
    fn into_response(self) -> Response {
        let identity = self
            .request_identity
            .as_deref()
            .and_then(|v| HeaderValue::from_str(v).ok());
        let mut response = (self.status, Json(self.body)).into_response();
        if let Some(identity) = identity {
            response
                .headers_mut()
                .insert(REQUEST_IDENTITY_HEADER, identity);
        }
        response
    }
}

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

/// `GET /v2/catalog`
pub async fn catalog_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> BrokerResponse {
    let parts = Parts {
        headers,
        path: Ok(HashMap::new()),
        query: Ok(HashMap::new()),
        body: Ok(Bytes::new()),
    };
    dispatch(&state, OperationKind::Catalog, parts).await
}

/// `PUT /v2/service_instances/{instance_id}`
pub async fn provision_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    path: PathParams,
    query: QueryParams,
    body: RawBody,
) -> BrokerResponse {
    let parts = Parts::new(headers, path, query, body);
    dispatch(&state, OperationKind::Provision, parts).await
}

/// `PATCH /v2/service_instances/{instance_id}`
pub async fn update_instance_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    path: PathParams,
    query: QueryParams,
    body: RawBody,
) -> BrokerResponse {
    let parts = Parts::new(headers, path, query, body);
    dispatch(&state, OperationKind::UpdateInstance, parts).await
}

/// `DELETE /v2/service_instances/{instance_id}`
pub async fn deprovision_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    path: PathParams,
    query: QueryParams,
) -> BrokerResponse {
    let parts = Parts::without_body(headers, path, query);
    dispatch(&state, OperationKind::Deprovision, parts).await
}

/// `GET /v2/service_instances/{instance_id}`
pub async fn fetch_instance_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    path: PathParams,
    query: QueryParams,
) -> BrokerResponse {
    let parts = Parts::without_body(headers, path, query);
    dispatch(&state, OperationKind::FetchInstance, parts).await
}

/// `GET /v2/service_instances/{instance_id}/last_operation`
pub async fn instance_last_operation_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    path: PathParams,
    query: QueryParams,
) -> BrokerResponse {
    let parts = Parts::without_body(headers, path, query);
    dispatch(&state, OperationKind::InstanceLastOperation, parts).await
}

/// `PUT /v2/service_instances/{instance_id}/service_bindings/{binding_id}`
pub async fn bind_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    path: PathParams,
    query: QueryParams,
    body: RawBody,
) -> BrokerResponse {
    let parts = Parts::new(headers, path, query, body);
    dispatch(&state, OperationKind::Bind, parts).await
}

/// `DELETE /v2/service_instances/{instance_id}/service_bindings/{binding_id}`
pub async fn unbind_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    path: PathParams,
    query: QueryParams,
) -> BrokerResponse {
    let parts = Parts::without_body(headers, path, query);
    dispatch(&state, OperationKind::Unbind, parts).await
}

/// `GET /v2/service_instances/{instance_id}/service_bindings/{binding_id}`
pub async fn fetch_binding_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    path: PathParams,
    query: QueryParams,
) -> BrokerResponse {
    let parts = Parts::without_body(headers, path, query);
    dispatch(&state, OperationKind::FetchBinding, parts).await
}

/// `GET /v2/service_instances/{instance_id}/service_bindings/{binding_id}/last_operation`
pub async fn binding_last_operation_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    path: PathParams,
    query: QueryParams,
) -> BrokerResponse {
    let parts = Parts::without_body(headers, path, query);
    dispatch(&state, OperationKind::BindingLastOperation, parts).await
}

/// Any method/path pair no route claims.
pub async fn unrouted_handler(method: Method, uri: Uri, headers: HeaderMap) -> BrokerResponse {
    let err = BrokerError::not_found(format!("No route for {method} {}", uri.path()));
    BrokerResponse::from_error(&ServiceError::from(err))
        .with_request_identity(request_identity(&headers))
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Extracted request parts; extractor rejections are reported as broker errors.
struct Parts {
    headers: HeaderMap,
    path: Result<HashMap<String, String>, String>,
    query: Result<HashMap<String, String>, String>,
    body: Result<Bytes, String>,
}

impl Parts {
    fn new(headers: HeaderMap, path: PathParams, query: QueryParams, body: RawBody) -> Self {
        Self {
            headers,
            path: path
                .map(|Path(p)| p)
                .map_err(|e| format!("Malformed path: {}", e.body_text())),
            query: query
                .map(|Query(q)| q)
                .map_err(|e| format!("Malformed query string: {}", e.body_text())),
            body: body.map_err(|e| format!("Unreadable request body: {}", e.body_text())),
        }
    }

    fn without_body(headers: HeaderMap, path: PathParams, query: QueryParams) -> Self {
        Self::new(headers, path, query, Ok(Bytes::new()))
    }

    fn into_request(self, operation: OperationKind) -> Result<BrokerRequest, BrokerError> {
        let mut request = BrokerRequest::new(operation);
        request.path_params = self.path.map_err(BrokerError::invalid_parameter)?;
        request.query = self.query.map_err(BrokerError::invalid_parameter)?;
        request.body = self.body.map_err(BrokerError::invalid_parameter)?;
        request.headers = self.headers;
        Ok(request)
    }
}

async fn dispatch(state: &AppState, operation: OperationKind, parts: Parts) -> BrokerResponse {
    let _in_flight = state.shutdown.in_flight_guard();
    let identity = request_identity(&parts.headers);

    match parts.into_request(operation) {
        Ok(request) => match state.pipeline.clone().oneshot(request).await {
            Ok(response) => response,
            Err(never) => match never {},
        },
        Err(err) => {
            BrokerResponse::from_error(&ServiceError::from(err)).with_request_identity(identity)
        }
    }
}
