//! Last-operation polling envelope.

use serde::{Deserialize, Serialize};

/// State of an asynchronous operation, as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationState {
    #[serde(rename = "succeeded")]
    Succeeded,
    #[serde(rename = "failed")]
    Failed,
    #[serde(rename = "in progress")]
    InProgress,
}

/// Body returned by both last-operation endpoints.
///
/// The engine never stores or interprets it; it is produced by the backend
/// on every poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastOperation {
    pub state: OperationState,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub instance_usable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub update_repeatable: Option<bool>,
}

impl LastOperation {
    #[must_use]
    pub fn new(state: OperationState) -> Self {
        Self {
            state,
            description: None,
            instance_usable: None,
            update_repeatable: None,
        }
    }

    #[must_use]
    pub fn succeeded() -> Self {
        Self::new(OperationState::Succeeded)
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.state != OperationState::InProgress
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn state_uses_protocol_spelling() {
        let op = LastOperation {
            description: Some("50% done".to_string()),
            ..LastOperation::new(OperationState::InProgress)
        };
        assert_eq!(
            serde_json::to_value(&op).unwrap(),
            json!({ "state": "in progress", "description": "50% done" })
        );
        assert!(!op.is_terminal());
        assert!(LastOperation::succeeded().is_terminal());
    }
}
