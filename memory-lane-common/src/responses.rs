//! Response envelopes for the REST API.

use serde::{Deserialize, Serialize};

use crate::memory::{Memory, MemoryEntry};
use crate::user::UserProfile;

/// `GET /memories` and `GET /users/:uid/memories`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoriesResponse {
    pub memories: Vec<MemoryEntry>,
    /// Id of the identified caller, present only when a valid session was sent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewer_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryResponse {
    pub memory: Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub user: UserProfile,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// `GET /whoami`; serializes to `{}` for anonymous callers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhoAmIResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CsrfTokenResponse {
    pub csrf_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whoami_anonymous_is_empty_object() {
        let json = serde_json::to_string(&WhoAmIResponse::default()).unwrap();
        assert_eq!(json, "{}");
    }

    #[test]
    fn test_whoami_identified() {
        let resp = WhoAmIResponse {
            user_id: Some("u1".to_string()),
        };
        assert_eq!(serde_json::to_string(&resp).unwrap(), r#"{"userId":"u1"}"#);
    }

    #[test]
    fn test_memories_response_omits_viewer_when_anonymous() {
        let resp = MemoriesResponse {
            memories: vec![],
            viewer_id: None,
        };
        assert_eq!(serde_json::to_string(&resp).unwrap(), r#"{"memories":[]}"#);
    }

    #[test]
    fn test_csrf_token_field_name() {
        let resp = CsrfTokenResponse {
            csrf_token: "abc".to_string(),
        };
        assert_eq!(serde_json::to_string(&resp).unwrap(), r#"{"csrfToken":"abc"}"#);
    }
}
