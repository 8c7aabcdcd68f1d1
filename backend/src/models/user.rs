use memory_lane_common::{AuthorProfile, UserProfile};
use serde::{Deserialize, Serialize};

/// User row. The id is issued by the identity provider and never changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User ID from the identity provider
    pub id: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub profile_picture_url: Option<String>,
    pub bio: Option<String>,
}

impl User {
    /// Project to the profile shown to anyone, without the email.
    pub fn public_profile(&self) -> UserProfile {
        UserProfile {
            id: self.id.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            profile_picture_url: self.profile_picture_url.clone(),
            bio: self.bio.clone(),
        }
    }

    pub fn author_profile(&self) -> AuthorProfile {
        AuthorProfile {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            profile_picture_url: self.profile_picture_url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_profile_drops_email() {
        let user = User {
            id: "user_01".to_string(),
            email: "ada@example.com".to_string(),
            first_name: Some("Ada".to_string()),
            last_name: None,
            profile_picture_url: None,
            bio: Some("math".to_string()),
        };
        let json = serde_json::to_string(&user.public_profile()).unwrap();
        assert!(!json.contains("ada@example.com"));
        assert!(json.contains("math"));
    }
}
