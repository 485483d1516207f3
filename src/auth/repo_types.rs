use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum UserRole {
    User,
    Admin,
    Author,
}

/// User record in the database. Credential material and one-time-secret
/// digests are never serialized into responses.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub phone_number: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar: Option<String>,
    pub google_id: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: UserRole,
    pub active: bool,
    pub is_email_verified: bool,
    #[serde(skip_serializing)]
    pub password_changed_at: Option<OffsetDateTime>,
    #[serde(skip_serializing)]
    pub password_reset_digest: Option<String>,
    #[serde(skip_serializing)]
    pub password_reset_expires_at: Option<OffsetDateTime>,
    #[serde(skip_serializing)]
    pub email_verify_digest: Option<String>,
    #[serde(skip_serializing)]
    pub email_verify_expires_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl User {
    /// True when the password was changed after the token carrying
    /// `token_iat` was issued; such tokens must be rejected even though
    /// their signature and expiry are valid.
    pub fn was_password_changed(&self, token_iat: usize) -> bool {
        match self.password_changed_at {
            Some(changed_at) => (token_iat as i64) < changed_at.unix_timestamp(),
            None => false,
        }
    }
}

#[cfg(test)]
pub(crate) fn fake_user() -> User {
    let now = OffsetDateTime::now_utc();
    User {
        id: Uuid::new_v4(),
        email: "a@b.com".into(),
        phone_number: None,
        first_name: None,
        last_name: None,
        avatar: None,
        google_id: None,
        password_hash: "unused".into(),
        role: UserRole::User,
        active: true,
        is_email_verified: false,
        password_changed_at: None,
        password_reset_digest: None,
        password_reset_expires_at: None,
        email_verify_digest: None,
        email_verify_expires_at: None,
        created_at: now,
        updated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    #[test]
    fn never_changed_password_never_invalidates() {
        let user = fake_user();
        assert!(!user.was_password_changed(0));
        assert!(!user.was_password_changed(usize::MAX));
    }

    #[test]
    fn token_issued_before_change_is_stale() {
        let mut user = fake_user();
        let changed = OffsetDateTime::now_utc();
        user.password_changed_at = Some(changed);
        let issued_before = (changed - Duration::minutes(5)).unix_timestamp() as usize;
        assert!(user.was_password_changed(issued_before));
    }

    #[test]
    fn token_issued_after_change_stays_valid() {
        let mut user = fake_user();
        let changed = OffsetDateTime::now_utc();
        user.password_changed_at = Some(changed);
        let issued_after = (changed + Duration::minutes(5)).unix_timestamp() as usize;
        assert!(!user.was_password_changed(issued_after));
    }

    #[test]
    fn serialized_user_hides_credential_material() {
        let mut user = fake_user();
        user.password_hash = "argon2-secret".into();
        user.password_reset_digest = Some("digest".into());
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("argon2-secret"));
        assert!(!json.contains("password_hash"));
        assert!(!json.contains("digest"));
        assert!(json.contains("a@b.com"));
    }
}
