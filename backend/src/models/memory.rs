use chrono::{DateTime, Utc};
use memory_lane_common::{
    from_unix_seconds, to_unix_seconds, AuthorProfile, Memory as WireMemory, MemoryEntry,
    TimestampError, ValidMemory,
};

/// Memory row with its timestamp in native form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Memory {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub author: String,
}

/// Fields written by create and update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryFields {
    pub name: String,
    pub description: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Memory joined with its author's public profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryWithAuthor {
    pub memory: Memory,
    pub author: AuthorProfile,
}

impl Memory {
    pub fn to_wire(&self) -> WireMemory {
        WireMemory {
            id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            timestamp: to_unix_seconds(&self.timestamp),
            author: self.author.clone(),
        }
    }
}

impl TryFrom<ValidMemory> for MemoryFields {
    type Error = TimestampError;

    fn try_from(valid: ValidMemory) -> Result<Self, Self::Error> {
        Ok(Self {
            name: valid.name,
            description: valid.description,
            timestamp: from_unix_seconds(valid.timestamp)?,
        })
    }
}

impl MemoryWithAuthor {
    pub fn into_entry(self) -> MemoryEntry {
        MemoryEntry {
            memory: self.memory.to_wire(),
            author_profile: self.author,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_wire_converts_timestamp_to_seconds() {
        let memory = Memory {
            id: 1,
            name: "Trip".to_string(),
            description: Some("Beach day".to_string()),
            timestamp: from_unix_seconds(1_700_000_000).unwrap(),
            author: "u1".to_string(),
        };
        let wire = memory.to_wire();
        assert_eq!(wire.timestamp, 1_700_000_000);
        assert_eq!(wire.author, "u1");
    }

    #[test]
    fn test_fields_from_valid_memory() {
        let fields = MemoryFields::try_from(ValidMemory {
            name: "Trip".to_string(),
            description: None,
            timestamp: 1_700_000_000,
        })
        .unwrap();
        assert_eq!(to_unix_seconds(&fields.timestamp), 1_700_000_000);
        assert!(fields.description.is_none());
    }

    #[test]
    fn test_fields_reject_out_of_range_timestamp() {
        let result = MemoryFields::try_from(ValidMemory {
            name: "Trip".to_string(),
            description: None,
            timestamp: i64::MAX,
        });
        assert!(result.is_err());
    }
}
