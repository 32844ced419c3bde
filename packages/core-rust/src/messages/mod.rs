//! Request and response messages exchanged between the dispatcher and
//! backends.
//!
//! Requests are the merged view of path, query, and body parameters;
//! fields the protocol does not name land in `extra`. Responses are relayed
//! to the platform verbatim.

pub mod binding;
pub mod instance;
pub mod operation;

pub use binding::{
    BindRequest, BindResource, BindingLastOperationRequest, BindingMetadata, BindingRequest,
    BindingResponse,
};
pub use instance::{
    InstanceDetails, InstanceLastOperationRequest, InstanceMetadata, InstanceRequest,
    PreviousValues, ProvisionRequest, ProvisionResponse, UpdateRequest, UpdateResponse,
};
pub use operation::{LastOperation, OperationState};
