use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(skip_serializing)]
    pub reset_token: Option<String>,
    #[serde(skip_serializing)]
    pub logged_out_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}

impl User {
    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, reset_token, logged_out_at, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, reset_token, logged_out_at, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Create a new user with hashed password. The unique constraint on email
    /// is the authority on duplicates; callers inspect the error for it.
    pub async fn create(
        db: &PgPool,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, name, email, password_hash, reset_token, logged_out_at, created_at
            "#,
        )
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    /// Store a pending reset-token value, replacing any previous one.
    pub async fn set_reset_token(db: &PgPool, id: Uuid, token: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET reset_token = $2 WHERE id = $1")
            .bind(id)
            .bind(token)
            .execute(db)
            .await?;
        Ok(())
    }

    /// Swap in the new password hash and clear the pending token in one
    /// statement. Returns false when the presented token no longer matches the
    /// stored value (already consumed, superseded, or never issued).
    pub async fn redeem_reset_token(
        db: &PgPool,
        id: Uuid,
        token: &str,
        new_password_hash: &str,
    ) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users SET password_hash = $3, reset_token = NULL
            WHERE id = $1 AND reset_token = $2
            "#,
        )
        .bind(id)
        .bind(token)
        .bind(new_password_hash)
        .execute(db)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn record_logout(db: &PgPool, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET logged_out_at = now() WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }

    pub async fn delete_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialization_never_exposes_secrets() {
        let user = User {
            id: Uuid::new_v4(),
            name: "Ann".into(),
            email: "ann@x.com".into(),
            password_hash: "$argon2id$v=19$secret".into(),
            reset_token: Some("pending-token".into()),
            logged_out_at: None,
            created_at: OffsetDateTime::now_utc(),
        };

        let json = serde_json::to_string(&user).unwrap();
        assert!(json.contains("ann@x.com"));
        assert!(!json.contains("password_hash"));
        assert!(!json.contains("argon2id"));
        assert!(!json.contains("reset_token"));
        assert!(!json.contains("pending-token"));
    }
}
