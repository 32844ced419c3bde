//! The broker mediation engine.
//!
//! A request moves through these parts in order:
//!
//! 1. **Headers** (`headers`): protocol version, originating identity, shared secret
//! 2. **Parameters** (`params`): path, query, and body merged into one object
//! 3. **Registry** (`registry`): backend resolved by `service_id`
//! 4. **Guard** (`guard`): declared capabilities and maintenance version
//! 5. **Validator** (`validator`): per-plan JSON Schema for `parameters`
//! 6. **Dispatcher** (`dispatcher`): backend invocation and response shaping
//! 7. **Middleware** (`middleware`): tower layers wrapped around the dispatcher

pub mod catalog;
pub mod config;
pub mod dispatcher;
pub mod events;
pub mod guard;
pub mod headers;
pub mod middleware;
pub mod noop;
pub mod operation;
pub mod params;
pub mod registry;
pub mod validator;

// Re-export key types for convenient access.
pub use config::{BrokerConfig, DEFAULT_API_VERSION};
pub use dispatcher::Dispatcher;
pub use events::{LifecycleEvent, LifecycleEventKind, LifecycleEvents};
pub use middleware::{build_dispatch_pipeline, DispatchPipeline};
pub use noop::NoopService;
pub use operation::{
    BrokerRequest, BrokerResponse, OperationKind, ServiceError, ServiceResult,
};
pub use registry::{RegisteredService, ServiceRegistry};
pub use validator::ParameterValidator;
