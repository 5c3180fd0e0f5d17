use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Contact {
    pub id: Uuid,
    pub user_id: Uuid,
    pub mobile: String,
    pub email: String,
    pub address: String,
    pub registration_number: String,
    pub created_at: OffsetDateTime,
}

pub struct NewContact<'a> {
    pub mobile: &'a str,
    pub email: &'a str,
    pub address: &'a str,
    pub registration_number: &'a str,
}

impl Contact {
    pub async fn create(
        db: &PgPool,
        user_id: Uuid,
        new: NewContact<'_>,
    ) -> anyhow::Result<Contact> {
        let contact = sqlx::query_as::<_, Contact>(
            r#"
            INSERT INTO contacts (user_id, mobile, email, address, registration_number)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, mobile, email, address, registration_number, created_at
            "#,
        )
        .bind(user_id)
        .bind(new.mobile)
        .bind(new.email)
        .bind(new.address)
        .bind(new.registration_number)
        .fetch_one(db)
        .await?;
        Ok(contact)
    }

    /// Lookup is scoped to the owner; another user's contact is invisible here.
    pub async fn find_by_registration(
        db: &PgPool,
        user_id: Uuid,
        registration_number: &str,
    ) -> anyhow::Result<Option<Contact>> {
        let contact = sqlx::query_as::<_, Contact>(
            r#"
            SELECT id, user_id, mobile, email, address, registration_number, created_at
            FROM contacts
            WHERE user_id = $1 AND registration_number = $2
            "#,
        )
        .bind(user_id)
        .bind(registration_number)
        .fetch_optional(db)
        .await?;
        Ok(contact)
    }

    pub async fn count_by_owner(db: &PgPool, user_id: Uuid) -> anyhow::Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM contacts WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(db)
            .await?;
        Ok(count.0)
    }

    pub async fn count_recent(db: &PgPool, user_id: Uuid, days: i32) -> anyhow::Result<i64> {
        let count: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM contacts
            WHERE user_id = $1 AND created_at > now() - ($2 * INTERVAL '1 day')
            "#,
        )
        .bind(user_id)
        .bind(days)
        .fetch_one(db)
        .await?;
        Ok(count.0)
    }

    pub async fn delete_by_owner(db: &PgPool, user_id: Uuid) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM contacts WHERE user_id = $1")
            .bind(user_id)
            .execute(db)
            .await?;
        Ok(result.rows_affected())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Activity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub details: String,
    pub created_at: OffsetDateTime,
}

impl Activity {
    pub async fn record(db: &PgPool, user_id: Uuid, details: &str) -> anyhow::Result<()> {
        sqlx::query("INSERT INTO activities (user_id, details) VALUES ($1, $2)")
            .bind(user_id)
            .bind(details)
            .execute(db)
            .await?;
        Ok(())
    }

    pub async fn recent_by_owner(
        db: &PgPool,
        user_id: Uuid,
        limit: i64,
    ) -> anyhow::Result<Vec<Activity>> {
        let rows = sqlx::query_as::<_, Activity>(
            r#"
            SELECT id, user_id, details, created_at
            FROM activities
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    pub async fn delete_by_owner(db: &PgPool, user_id: Uuid) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM activities WHERE user_id = $1")
            .bind(user_id)
            .execute(db)
            .await?;
        Ok(result.rows_affected())
    }
}
