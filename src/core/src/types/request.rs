//! Authorization request and response types

use serde::{Deserialize, Serialize};

/// A single authorization question: may `principal` perform `action` on `resource`?
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationRequest {
    /// Caller-supplied request identifier, echoed in the response
    pub id: String,

    /// Who is asking
    pub principal: String,

    /// Resource identifier (e.g. "/org/employees/bob/pay")
    pub resource: String,

    /// Action name (e.g. "increase")
    pub action: String,
}

impl AuthorizationRequest {
    /// Create a new request
    pub fn new(
        id: impl Into<String>,
        principal: impl Into<String>,
        resource: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            principal: principal.into(),
            resource: resource.into(),
            action: action.into(),
        }
    }

    /// Names of required fields that are empty
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("id", &self.id),
            ("principal", &self.principal),
            ("resource", &self.resource),
            ("action", &self.action),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(name, _)| name)
        .collect()
    }
}

/// Outcome of an authorization request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthorizationStatus {
    Permitted,
    Denied,
}

/// Authorization decision for one request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationResponse {
    /// Id of the request this answers
    pub request_id: String,

    pub status: AuthorizationStatus,

    /// Optional explanation of how the decision was reached
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
}

impl AuthorizationResponse {
    /// Permitted response
    pub fn permitted(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            status: AuthorizationStatus::Permitted,
            remarks: None,
        }
    }

    /// Denied response
    pub fn denied(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            status: AuthorizationStatus::Denied,
            remarks: None,
        }
    }

    /// Attach remarks
    pub fn with_remarks(mut self, remarks: impl Into<String>) -> Self {
        self.remarks = Some(remarks.into());
        self
    }

    pub fn is_permitted(&self) -> bool {
        self.status == AuthorizationStatus::Permitted
    }
}
