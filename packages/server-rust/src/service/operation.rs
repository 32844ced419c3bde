//! Operation kinds, the per-request envelope, and the error type backends return.

use std::any::Any;
use std::collections::HashMap;

use broker_core::{BrokerError, ErrorBody};
use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use serde_json::Value;

// ---------------------------------------------------------------------------
// OperationKind
// ---------------------------------------------------------------------------

/// One protocol endpoint. Each (method, path) pair maps to exactly one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Catalog,
    Provision,
    UpdateInstance,
    Deprovision,
    FetchInstance,
    InstanceLastOperation,
    Bind,
    Unbind,
    FetchBinding,
    BindingLastOperation,
}

impl OperationKind {
    pub const ALL: [OperationKind; 10] = [
        OperationKind::Catalog,
        OperationKind::Provision,
        OperationKind::UpdateInstance,
        OperationKind::Deprovision,
        OperationKind::FetchInstance,
        OperationKind::InstanceLastOperation,
        OperationKind::Bind,
        OperationKind::Unbind,
        OperationKind::FetchBinding,
        OperationKind::BindingLastOperation,
    ];

    /// Stable name used in spans, metrics labels, and log lines.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Catalog => "catalog",
            Self::Provision => "provision",
            Self::UpdateInstance => "update_instance",
            Self::Deprovision => "deprovision",
            Self::FetchInstance => "fetch_instance",
            Self::InstanceLastOperation => "instance_last_operation",
            Self::Bind => "bind",
            Self::Unbind => "unbind",
            Self::FetchBinding => "fetch_binding",
            Self::BindingLastOperation => "binding_last_operation",
        }
    }

    /// Whether the request body carries the operation's parameters.
    /// For the other kinds the body is ignored and `service_id` comes from the query.
    #[must_use]
    pub fn reads_body(self) -> bool {
        matches!(self, Self::Provision | Self::UpdateInstance | Self::Bind)
    }
}

// ---------------------------------------------------------------------------
// BrokerRequest / BrokerResponse
// ---------------------------------------------------------------------------

/// Transport-independent view of one inbound request.
#[derive(Debug, Clone)]
pub struct BrokerRequest {
    pub operation: OperationKind,
    pub headers: HeaderMap,
    pub path_params: HashMap<String, String>,
    pub query: HashMap<String, String>,
    /// Raw body; parsed inside the dispatcher so malformed JSON is reported
    /// like any other invalid parameter.
    pub body: Bytes,
}

impl BrokerRequest {
    #[must_use]
    pub fn new(operation: OperationKind) -> Self {
        Self {
            operation,
            headers: HeaderMap::new(),
            path_params: HashMap::new(),
            query: HashMap::new(),
            body: Bytes::new(),
        }
    }
}

/// Status code and JSON body to send back to the platform.
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerResponse {
    pub status: StatusCode,
    pub body: Value,
    /// Echo of `X-Broker-API-Request-Identity`.
    pub request_identity: Option<String>,
}

impl BrokerResponse {
    #[must_use]
    pub fn new(status: StatusCode, body: Value) -> Self {
        Self {
            status,
            body,
            request_identity: None,
        }
    }

    /// Every engine and backend failure is reported as 400 with a taxonomy body.
    #[must_use]
    pub fn from_error(err: &ServiceError) -> Self {
        let body = serde_json::to_value(err.to_body()).unwrap_or(Value::Null);
        Self::new(StatusCode::BAD_REQUEST, body)
    }

    #[must_use]
    pub fn with_request_identity(mut self, identity: Option<String>) -> Self {
        self.request_identity = identity;
        self
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

// ---------------------------------------------------------------------------
// ServiceError
// ---------------------------------------------------------------------------

/// Error returned by backends and by the engine's own pipeline steps.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// A classified protocol error.
    #[error(transparent)]
    Broker(#[from] BrokerError),
    /// Anything else; reported with the fallback error kind.
    #[error("internal error: {0:#}")]
    Internal(#[from] anyhow::Error),
}

impl ServiceError {
    #[must_use]
    pub fn to_body(&self) -> ErrorBody {
        match self {
            Self::Broker(err) => err.to_body(),
            Self::Internal(err) => ErrorBody::unclassified(format!("{err:#}")),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_owned())
}

#[cfg(test)]
mod tests {
    use broker_core::ErrorKind;
    use serde_json::json;

    use super::*;

    #[test]
    fn operation_names_are_unique() {
        let mut names: Vec<_> = OperationKind::ALL.iter().map(|k| k.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), OperationKind::ALL.len());
    }

    #[test]
    fn only_mutating_puts_and_patch_read_body() {
        let readers: Vec<_> = OperationKind::ALL
            .into_iter()
            .filter(|k| k.reads_body())
            .collect();
        assert_eq!(
            readers,
            vec![
                OperationKind::Provision,
                OperationKind::UpdateInstance,
                OperationKind::Bind
            ]
        );
    }

    #[test]
    fn broker_error_keeps_its_kind() {
        let err = ServiceError::from(BrokerError::new(ErrorKind::AsyncRequired));
        let resp = BrokerResponse::from_error(&err);
        assert_eq!(resp.status, StatusCode::BAD_REQUEST);
        assert_eq!(resp.body, json!({ "error": "AsyncRequired" }));
    }

    #[test]
    fn internal_error_uses_fallback_kind() {
        let err = ServiceError::from(anyhow::anyhow!("disk full"));
        let resp = BrokerResponse::from_error(&err);
        assert_eq!(resp.body, json!({ "error": "InternalError", "description": "disk full" }));
    }
}
