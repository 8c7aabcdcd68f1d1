//! User-facing profile types.

use serde::{Deserialize, Serialize};

/// The public slice of a user's profile attached to each listed memory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorProfile {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub profile_picture_url: Option<String>,
}

/// Public profile returned by `GET /users/:uid`. Email is never exposed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub profile_picture_url: Option<String>,
    pub bio: Option<String>,
}

/// Body of `PUT /users`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateBioRequest {
    #[serde(default)]
    pub bio: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_profile_camel_case() {
        let profile = UserProfile {
            id: "u1".to_string(),
            first_name: Some("Ada".to_string()),
            last_name: Some("Lovelace".to_string()),
            profile_picture_url: None,
            bio: Some("hi".to_string()),
        };
        let json = serde_json::to_string(&profile).unwrap();
        assert!(json.contains(r#""firstName":"Ada""#));
        assert!(json.contains(r#""profilePictureUrl":null"#));
        assert!(!json.contains("email"));
    }

    #[test]
    fn test_update_bio_missing() {
        let req: UpdateBioRequest = serde_json::from_str("{}").unwrap();
        assert!(req.bio.is_none());
    }
}
