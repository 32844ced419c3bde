//! Protocol error taxonomy and its wire representation.
//!
//! Every failure the broker reports to a platform carries exactly one
//! [`ErrorKind`] and serializes as `{"error": <kind>, "description": ...}`.
//! Failures that cannot be classified (unexpected backend faults) are
//! rendered with the [`UNCLASSIFIED_ERROR`] kind instead of leaking out as
//! opaque server errors.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Error string used for failures outside the taxonomy.
pub const UNCLASSIFIED_ERROR: &str = "InternalError";

// ---------------------------------------------------------------------------
// ErrorKind
// ---------------------------------------------------------------------------

/// Closed set of protocol error kinds.
///
/// Variant names are the exact strings placed in the `error` field of an
/// error response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The service, plan, instance, or binding does not exist.
    NotFound,
    /// A header, path, query, or body value is missing or malformed.
    InvalidParameter,
    /// This request requires client support for asynchronous service operations.
    AsyncRequired,
    /// The backend does not support concurrent requests that mutate the same resource.
    ConcurrencyError,
    /// The request body is missing the `app_guid` field.
    RequiresApp,
    /// The requested `maintenance_info.version` does not match the catalog.
    MaintenanceInfoConflict,
    /// The offering does not declare the capability the request needs.
    UnsupportedRequest,
    /// A service configuration or plan schema is invalid.
    ConfigurationError,
}

impl ErrorKind {
    /// Returns the wire string for this kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "NotFound",
            Self::InvalidParameter => "InvalidParameter",
            Self::AsyncRequired => "AsyncRequired",
            Self::ConcurrencyError => "ConcurrencyError",
            Self::RequiresApp => "RequiresApp",
            Self::MaintenanceInfoConflict => "MaintenanceInfoConflict",
            Self::UnsupportedRequest => "UnsupportedRequest",
            Self::ConfigurationError => "ConfigurationError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// BrokerError
// ---------------------------------------------------------------------------

/// A classified broker failure.
///
/// Raised by the engine itself (header validation, guard, schema
/// validation, registry lookups) and by backends that want the platform to
/// see a specific protocol error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}{}", .description.as_deref().map(|d| format!(": {d}")).unwrap_or_default())]
pub struct BrokerError {
    kind: ErrorKind,
    description: Option<String>,
    instance_usable: Option<bool>,
    update_repeatable: Option<bool>,
}

impl BrokerError {
    /// Creates an error of the given kind without a description.
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            description: None,
            instance_usable: None,
            update_repeatable: None,
        }
    }

    /// Creates an error of the given kind with a human-readable description.
    #[must_use]
    pub fn with_description(kind: ErrorKind, description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            ..Self::new(kind)
        }
    }

    #[must_use]
    pub fn not_found(description: impl Into<String>) -> Self {
        Self::with_description(ErrorKind::NotFound, description)
    }

    #[must_use]
    pub fn invalid_parameter(description: impl Into<String>) -> Self {
        Self::with_description(ErrorKind::InvalidParameter, description)
    }

    #[must_use]
    pub fn async_required(description: impl Into<String>) -> Self {
        Self::with_description(ErrorKind::AsyncRequired, description)
    }

    #[must_use]
    pub fn concurrency_error(description: impl Into<String>) -> Self {
        Self::with_description(ErrorKind::ConcurrencyError, description)
    }

    #[must_use]
    pub fn requires_app(description: impl Into<String>) -> Self {
        Self::with_description(ErrorKind::RequiresApp, description)
    }

    #[must_use]
    pub fn maintenance_info_conflict(description: impl Into<String>) -> Self {
        Self::with_description(ErrorKind::MaintenanceInfoConflict, description)
    }

    #[must_use]
    pub fn unsupported_request(description: impl Into<String>) -> Self {
        Self::with_description(ErrorKind::UnsupportedRequest, description)
    }

    #[must_use]
    pub fn configuration_error(description: impl Into<String>) -> Self {
        Self::with_description(ErrorKind::ConfigurationError, description)
    }

    /// Marks whether the instance is still usable after a failed operation.
    #[must_use]
    pub fn instance_usable(mut self, usable: bool) -> Self {
        self.instance_usable = Some(usable);
        self
    }

    /// Marks whether a failed update may be repeated.
    #[must_use]
    pub fn update_repeatable(mut self, repeatable: bool) -> Self {
        self.update_repeatable = Some(repeatable);
        self
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Renders the wire body for this error.
    #[must_use]
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            error: self.kind.as_str().to_string(),
            description: self.description.clone(),
            instance_usable: self.instance_usable,
            update_repeatable: self.update_repeatable,
        }
    }
}

// ---------------------------------------------------------------------------
// ErrorBody
// ---------------------------------------------------------------------------

/// JSON error body returned to the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub instance_usable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub update_repeatable: Option<bool>,
}

impl ErrorBody {
    /// Body for a failure that is not part of the taxonomy.
    #[must_use]
    pub fn unclassified(description: impl Into<String>) -> Self {
        Self {
            error: UNCLASSIFIED_ERROR.to_string(),
            description: Some(description.into()),
            instance_usable: None,
            update_repeatable: None,
        }
    }
}

impl From<&BrokerError> for ErrorBody {
    fn from(err: &BrokerError) -> Self {
        err.to_body()
    }
}

impl From<BrokerError> for ErrorBody {
    fn from(err: BrokerError) -> Self {
        err.to_body()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
