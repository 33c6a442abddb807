/// PostgreSQL identity store
///
/// Refresh digests live on the `identities` row (`refresh_token_hash`,
/// `refresh_token_expires_at`). Rotation is a single conditional `UPDATE`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{Identity, IdentityStore, RefreshTokenRecord, Role};
use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct PgIdentityStore {
    pool: PgPool,
}

impl PgIdentityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct IdentityRow {
    id: Uuid,
    email: String,
    name: String,
    password_hash: String,
    role: String,
    refresh_token_hash: Option<String>,
    refresh_token_expires_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<IdentityRow> for Identity {
    type Error = AppError;

    fn try_from(row: IdentityRow) -> Result<Self, Self::Error> {
        let refresh_token = match (row.refresh_token_hash, row.refresh_token_expires_at) {
            (Some(digest), Some(expires_at)) => Some(RefreshTokenRecord { digest, expires_at }),
            _ => None,
        };

        Ok(Identity {
            id: row.id,
            email: row.email,
            name: row.name,
            password_hash: row.password_hash,
            role: Role::parse(&row.role)?,
            refresh_token,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const SELECT_IDENTITY: &str = r#"
    SELECT id, email, name, password_hash, role,
           refresh_token_hash, refresh_token_expires_at, created_at, updated_at
    FROM identities
"#;

fn split(record: Option<RefreshTokenRecord>) -> (Option<String>, Option<DateTime<Utc>>) {
    match record {
        Some(r) => (Some(r.digest), Some(r.expires_at)),
        None => (None, None),
    }
}

#[async_trait]
impl IdentityStore for PgIdentityStore {
    async fn insert(&self, identity: &Identity) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO identities (id, email, name, password_hash, role, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(identity.id)
        .bind(&identity.email)
        .bind(&identity.name)
        .bind(&identity.password_hash)
        .bind(identity.role.as_str())
        .bind(identity.created_at)
        .bind(identity.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>, AppError> {
        sqlx::query_as::<_, IdentityRow>(&format!("{} WHERE id = $1", SELECT_IDENTITY))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Identity::try_from)
            .transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, AppError> {
        sqlx::query_as::<_, IdentityRow>(&format!("{} WHERE email = $1", SELECT_IDENTITY))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?
            .map(Identity::try_from)
            .transpose()
    }

    async fn find_by_refresh_token(&self, digest: &str) -> Result<Option<Identity>, AppError> {
        sqlx::query_as::<_, IdentityRow>(&format!(
            "{} WHERE refresh_token_hash = $1",
            SELECT_IDENTITY
        ))
        .bind(digest)
        .fetch_optional(&self.pool)
        .await?
        .map(Identity::try_from)
        .transpose()
    }

    async fn set_refresh_token(
        &self,
        id: Uuid,
        record: Option<RefreshTokenRecord>,
    ) -> Result<bool, AppError> {
        let (digest, expires_at) = split(record);

        let result = sqlx::query(
            r#"
            UPDATE identities
            SET refresh_token_hash = $1, refresh_token_expires_at = $2, updated_at = $3
            WHERE id = $4
            "#,
        )
        .bind(digest)
        .bind(expires_at)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn swap_refresh_token(
        &self,
        id: Uuid,
        expected_digest: &str,
        next: Option<RefreshTokenRecord>,
    ) -> Result<bool, AppError> {
        let (digest, expires_at) = split(next);

        let result = sqlx::query(
            r#"
            UPDATE identities
            SET refresh_token_hash = $1, refresh_token_expires_at = $2, updated_at = $3
            WHERE id = $4 AND refresh_token_hash = $5
            "#,
        )
        .bind(digest)
        .bind(expires_at)
        .bind(Utc::now())
        .bind(id)
        .bind(expected_digest)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
