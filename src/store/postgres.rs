use anyhow::Context;
use axum::async_trait;
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};
use time::OffsetDateTime;

use super::{Credential, StoreError, User, UserStore};

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

/// Row shape of the `users` table; `password_hash` is NULL for external
/// accounts.
#[derive(Debug, FromRow)]
struct UserRow {
    username: String,
    email: String,
    password_hash: Option<String>,
    created_at: OffsetDateTime,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        let credential = match row.password_hash {
            Some(hash) => Credential::Local { hash },
            None => Credential::External,
        };
        User {
            username: row.username,
            email: row.email,
            credential,
            created_at: row.created_at,
        }
    }
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .context("connect to database")?;
        Ok(Self::new(db))
    }

    pub fn pool(&self) -> &PgPool {
        &self.db
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn insert(&self, user: User) -> Result<User, StoreError> {
        // ON CONFLICT DO NOTHING keeps the uniqueness check and the insert
        // in one statement; a lost race surfaces as an empty result.
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (username, email, password_hash, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (username) DO NOTHING
            RETURNING username, email, password_hash, created_at
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(user.credential.local_hash())
        .bind(user.created_at)
        .fetch_optional(&self.db)
        .await
        .context("insert user")?;

        row.map(User::from).ok_or(StoreError::AlreadyExists)
    }

    async fn get(&self, username: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT username, email, password_hash, created_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.db)
        .await
        .context("get user")?;
        Ok(row.map(User::from))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT username, email, password_hash, created_at
            FROM users
            WHERE email = $1
            ORDER BY created_at
            LIMIT 1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find user by email")?;
        Ok(row.map(User::from))
    }

    async fn set_credential(
        &self,
        username: &str,
        credential: Credential,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $2
            WHERE username = $1
            "#,
        )
        .bind(username)
        .bind(credential.local_hash())
        .execute(&self.db)
        .await
        .context("update credential")?;
        Ok(result.rows_affected() > 0)
    }
}
