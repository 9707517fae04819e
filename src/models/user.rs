//! User credential record and merge-patch updates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Cursor;

/// Per-user credential record stored in Firestore (document ID = `user_id`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Twitter user ID
    pub user_id: String,
    /// Most recent access token issued by the provider
    pub provider_access_token: String,
    pub provider_refresh_token: String,
    /// Access token last disclosed to an API client
    pub authorization_access_token: String,
    /// Provider-declared expiry of `provider_access_token`
    pub expiration_time: DateTime<Utc>,
    /// Newest item this user has been polled through
    #[serde(default)]
    pub last_item_cursor: Option<Cursor>,
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
    /// Handle (screen name), queried by the handle lookup
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub profile_image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Authorization state of a credential record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialState {
    /// Not expired, and the client holds the current provider token.
    Valid,
    /// The provider token has expired and must be refreshed.
    Expired,
    /// A background refresh happened that the client has not seen yet.
    Diverged,
}

impl UserRecord {
    pub fn credential_state(&self, now: DateTime<Utc>) -> CredentialState {
        if self.expiration_time <= now {
            CredentialState::Expired
        } else if self.authorization_access_token != self.provider_access_token {
            CredentialState::Diverged
        } else {
            CredentialState::Valid
        }
    }
}

/// Merge-patch for a [`UserRecord`]: only `Some` fields are written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization_access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_item_cursor: Option<Cursor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl UserPatch {
    /// New provider token pair after a refresh. The authorization token is
    /// deliberately left alone, which moves the record to `Diverged`.
    pub fn refreshed_tokens(
        access_token: String,
        refresh_token: String,
        expiration_time: DateTime<Utc>,
    ) -> Self {
        Self {
            provider_access_token: Some(access_token),
            provider_refresh_token: Some(refresh_token),
            expiration_time: Some(expiration_time),
            updated_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    pub fn authorization_advanced(access_token: String) -> Self {
        Self {
            authorization_access_token: Some(access_token),
            updated_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    /// Fresh sign-in of a known user: both tokens and the profile are
    /// replaced, the cursor is not touched.
    pub fn signed_in(
        access_token: String,
        refresh_token: String,
        expiration_time: DateTime<Utc>,
        name: String,
        username: String,
        profile_image_url: Option<String>,
    ) -> Self {
        Self {
            provider_access_token: Some(access_token.clone()),
            provider_refresh_token: Some(refresh_token),
            authorization_access_token: Some(access_token),
            expiration_time: Some(expiration_time),
            name: Some(name),
            username: Some(username),
            profile_image_url,
            updated_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    pub fn cursor_advanced(cursor: Cursor) -> Self {
        Self {
            last_item_cursor: Some(cursor),
            updated_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    /// Field paths written by this patch (Firestore update mask).
    pub fn field_names(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.provider_access_token.is_some() {
            fields.push("provider_access_token");
        }
        if self.provider_refresh_token.is_some() {
            fields.push("provider_refresh_token");
        }
        if self.authorization_access_token.is_some() {
            fields.push("authorization_access_token");
        }
        if self.expiration_time.is_some() {
            fields.push("expiration_time");
        }
        if self.last_item_cursor.is_some() {
            fields.push("last_item_cursor");
        }
        if self.name.is_some() {
            fields.push("name");
        }
        if self.username.is_some() {
            fields.push("username");
        }
        if self.profile_image_url.is_some() {
            fields.push("profile_image_url");
        }
        if self.updated_at.is_some() {
            fields.push("updated_at");
        }
        fields
    }

    pub fn is_empty(&self) -> bool {
        self.field_names().is_empty()
    }

    /// Apply the patch to an in-memory record.
    pub fn apply_to(&self, user: &mut UserRecord) {
        if let Some(v) = &self.provider_access_token {
            user.provider_access_token = v.clone();
        }
        if let Some(v) = &self.provider_refresh_token {
            user.provider_refresh_token = v.clone();
        }
        if let Some(v) = &self.authorization_access_token {
            user.authorization_access_token = v.clone();
        }
        if let Some(v) = self.expiration_time {
            user.expiration_time = v;
        }
        if let Some(v) = &self.last_item_cursor {
            user.last_item_cursor = Some(v.clone());
        }
        if let Some(v) = &self.name {
            user.name = Some(v.clone());
        }
        if let Some(v) = &self.username {
            user.username = Some(v.clone());
        }
        if let Some(v) = &self.profile_image_url {
            user.profile_image_url = Some(v.clone());
        }
        if let Some(v) = self.updated_at {
            user.updated_at = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn user(expires_in: Duration) -> UserRecord {
        let now = Utc::now();
        UserRecord {
            user_id: "u1".to_string(),
            provider_access_token: "access".to_string(),
            provider_refresh_token: "refresh".to_string(),
            authorization_access_token: "access".to_string(),
            expiration_time: now + expires_in,
            last_item_cursor: Some(Cursor::new("100")),
            name: Some("Test".to_string()),
            username: Some("test".to_string()),
            profile_image_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_credential_states() {
        let now = Utc::now();
        let mut record = user(Duration::hours(1));
        assert_eq!(record.credential_state(now), CredentialState::Valid);

        record.provider_access_token = "rotated".to_string();
        assert_eq!(record.credential_state(now), CredentialState::Diverged);

        let expired = user(Duration::seconds(-1));
        assert_eq!(expired.credential_state(now), CredentialState::Expired);
    }

    #[test]
    fn test_refresh_patch_leaves_other_fields_untouched() {
        let mut record = user(Duration::seconds(-10));
        let expiry = Utc::now() + Duration::hours(2);

        UserPatch::refreshed_tokens("new_access".into(), "new_refresh".into(), expiry)
            .apply_to(&mut record);

        assert_eq!(record.provider_access_token, "new_access");
        assert_eq!(record.provider_refresh_token, "new_refresh");
        assert_eq!(record.authorization_access_token, "access");
        assert_eq!(record.expiration_time, expiry);
        assert_eq!(record.last_item_cursor, Some(Cursor::new("100")));
        assert_eq!(record.username.as_deref(), Some("test"));
    }

    #[test]
    fn test_patch_field_names_match_serialized_fields() {
        let patch = UserPatch::cursor_advanced(Cursor::new("7"));
        let json = serde_json::to_value(&patch).unwrap();
        let object = json.as_object().unwrap();

        let mut names = patch.field_names();
        names.sort();
        let mut keys: Vec<&str> = object.keys().map(String::as_str).collect();
        keys.sort();

        assert_eq!(names, keys);
        assert_eq!(object["last_item_cursor"], "7");
    }

    #[test]
    fn test_patch_reads_back_from_partial_document() {
        let expiry = Utc::now() + Duration::hours(2);
        let patch = UserPatch::refreshed_tokens("B".into(), "R2".into(), expiry);

        let json = serde_json::to_value(&patch).unwrap();
        let back: UserPatch = serde_json::from_value(json).unwrap();

        assert_eq!(back, patch);
        assert!(back.authorization_access_token.is_none());
        assert!(back.last_item_cursor.is_none());
    }

    #[test]
    fn test_sign_in_patch_leaves_cursor_alone() {
        let mut record = user(Duration::hours(1));
        record.last_item_cursor = Some(Cursor::new("500"));
        let created_at = record.created_at;

        let expiry = Utc::now() + Duration::hours(2);
        let patch = UserPatch::signed_in(
            "NEW".into(),
            "R".into(),
            expiry,
            "Name".into(),
            "handle".into(),
            None,
        );
        assert!(!patch.field_names().contains(&"last_item_cursor"));

        patch.apply_to(&mut record);

        assert_eq!(record.provider_access_token, "NEW");
        assert_eq!(record.authorization_access_token, "NEW");
        assert_eq!(record.username.as_deref(), Some("handle"));
        assert_eq!(record.last_item_cursor, Some(Cursor::new("500")));
        assert_eq!(record.created_at, created_at);
    }

    #[test]
    fn test_empty_patch() {
        assert!(UserPatch::default().is_empty());
        assert!(!UserPatch::authorization_advanced("x".into()).is_empty());
    }
}
