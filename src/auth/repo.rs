use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::google::GoogleProfile;
use crate::auth::repo_types::User;

pub(crate) const USER_COLUMNS: &str = "id, email, phone_number, first_name, last_name, avatar, google_id, \
     password_hash, role, active, is_email_verified, password_changed_at, \
     password_reset_digest, password_reset_expires_at, email_verify_digest, \
     email_verify_expires_at, created_at, updated_at";

impl User {
    /// Find a user by email. Includes the password hash; callers decide what
    /// to expose.
    pub async fn find_by_email(db: &PgPool, email: &str) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(db)
        .await
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(db)
            .await
    }

    pub async fn find_by_google_id(db: &PgPool, google_id: &str) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE google_id = $1"
        ))
        .bind(google_id)
        .fetch_optional(db)
        .await
    }

    /// Create a new user with an already-hashed password. Duplicate email
    /// surfaces as a unique violation for the error layer to translate.
    pub async fn create(db: &PgPool, email: &str, password_hash: &str) -> sqlx::Result<User> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (email, password_hash) VALUES ($1, $2) RETURNING {USER_COLUMNS}"
        ))
        .bind(email)
        .bind(password_hash)
        .fetch_one(db)
        .await
    }

    /// First Google sign-in: the profile supplies identity fields and the
    /// verified flag; the password slot is filled with a hash of a random
    /// secret nobody knows.
    pub async fn create_from_google(
        db: &PgPool,
        profile: &GoogleProfile,
        password_hash: &str,
    ) -> sqlx::Result<User> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (email, google_id, first_name, last_name, avatar, \
             is_email_verified, password_hash) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {USER_COLUMNS}"
        ))
        .bind(&profile.email)
        .bind(&profile.sub)
        .bind(&profile.given_name)
        .bind(&profile.family_name)
        .bind(&profile.picture)
        .bind(profile.email_verified)
        .bind(password_hash)
        .fetch_one(db)
        .await
    }

    pub async fn link_google_id(db: &PgPool, id: Uuid, google_id: &str) -> sqlx::Result<()> {
        sqlx::query("UPDATE users SET google_id = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(google_id)
            .execute(db)
            .await?;
        Ok(())
    }

    /// Set a new password hash, stamp the change, and consume any reset
    /// state. The change timestamp is back-dated one second so a token
    /// minted in the same instant stays valid.
    pub async fn set_password(db: &PgPool, id: Uuid, password_hash: &str) -> sqlx::Result<User> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET password_hash = $2, \
             password_changed_at = now() - interval '1 second', \
             password_reset_digest = NULL, password_reset_expires_at = NULL, \
             updated_at = now() \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(password_hash)
        .fetch_one(db)
        .await
    }

    pub async fn store_reset_digest(
        db: &PgPool,
        id: Uuid,
        reset_digest: &str,
        expires_at: OffsetDateTime,
    ) -> sqlx::Result<()> {
        sqlx::query(
            "UPDATE users SET password_reset_digest = $2, password_reset_expires_at = $3, \
             updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(reset_digest)
        .bind(expires_at)
        .execute(db)
        .await?;
        Ok(())
    }

    pub async fn clear_reset_digest(db: &PgPool, id: Uuid) -> sqlx::Result<()> {
        sqlx::query(
            "UPDATE users SET password_reset_digest = NULL, password_reset_expires_at = NULL, \
             updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .execute(db)
        .await?;
        Ok(())
    }

    /// A reset code is usable only while unexpired and digest-matching.
    pub async fn find_by_reset_digest(db: &PgPool, reset_digest: &str) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE password_reset_digest = $1 AND password_reset_expires_at > now()"
        ))
        .bind(reset_digest)
        .fetch_optional(db)
        .await
    }

    pub async fn store_verify_digest(
        db: &PgPool,
        id: Uuid,
        verify_digest: &str,
        expires_at: OffsetDateTime,
    ) -> sqlx::Result<()> {
        sqlx::query(
            "UPDATE users SET email_verify_digest = $2, email_verify_expires_at = $3, \
             updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(verify_digest)
        .bind(expires_at)
        .execute(db)
        .await?;
        Ok(())
    }

    pub async fn clear_verify_digest(db: &PgPool, id: Uuid) -> sqlx::Result<()> {
        sqlx::query(
            "UPDATE users SET email_verify_digest = NULL, email_verify_expires_at = NULL, \
             updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .execute(db)
        .await?;
        Ok(())
    }

    pub async fn find_by_verify_digest(
        db: &PgPool,
        verify_digest: &str,
    ) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE email_verify_digest = $1 AND email_verify_expires_at > now()"
        ))
        .bind(verify_digest)
        .fetch_optional(db)
        .await
    }

    /// Mark the email verified and consume the verification token.
    pub async fn mark_email_verified(db: &PgPool, id: Uuid) -> sqlx::Result<User> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET is_email_verified = TRUE, \
             email_verify_digest = NULL, email_verify_expires_at = NULL, \
             updated_at = now() \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .fetch_one(db)
        .await
    }
}
