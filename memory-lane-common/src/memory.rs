//! Memory payloads as they travel over the REST API.

use serde::{Deserialize, Serialize};

use crate::user::AuthorProfile;

/// A memory as returned by the API. `timestamp` is in Unix seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Memory {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub timestamp: i64,
    /// Id of the user who wrote the memory.
    pub author: String,
}

/// A memory annotated with the author's public profile, as listed in feeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryEntry {
    #[serde(flatten)]
    pub memory: Memory,
    #[serde(flatten)]
    pub author_profile: AuthorProfile,
}

/// Body of `POST /memories` and `PUT /memories/:id`.
///
/// Every field is optional at the serde level so that a missing field
/// becomes a descriptive 400 instead of a generic deserialization error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryPayload {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub timestamp: Option<i64>,
}

/// A memory payload that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidMemory {
    pub name: String,
    pub description: Option<String>,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
}

impl MemoryPayload {
    /// Enforce the memory contract: `name` (non-blank) and `timestamp` are
    /// required, `description` is optional and kept exactly as sent.
    pub fn validate(self) -> Result<ValidMemory, PayloadError> {
        let name = self
            .name
            .filter(|n| !n.trim().is_empty())
            .ok_or(PayloadError::MissingField("name"))?;
        let timestamp = self.timestamp.ok_or(PayloadError::MissingField("timestamp"))?;
        Ok(ValidMemory {
            name,
            description: self.description,
            timestamp,
        })
    }
}
