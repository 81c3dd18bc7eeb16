use axum::async_trait;
use serde::Serialize;
use time::OffsetDateTime;

pub mod memory;
pub mod postgres;

pub use memory::MemoryUserStore;
pub use postgres::PgUserStore;

/// How an account may authenticate.
///
/// `External` marks accounts linked from the OAuth provider; the variant is
/// disjoint from every Argon2 hash string, so no submitted password can ever
/// match it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    Local { hash: String },
    External,
}

impl Credential {
    pub fn local_hash(&self) -> Option<&str> {
        match self {
            Credential::Local { hash } => Some(hash),
            Credential::External => None,
        }
    }
}

/// User record. `username` is the primary key and immutable once created.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub credential: Credential,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("username already exists")]
    AlreadyExists,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Durable username -> account mapping, atomic per key.
///
/// `insert` must be indivisible with respect to the uniqueness check: of two
/// concurrent inserts for the same username, exactly one may succeed.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert(&self, user: User) -> Result<User, StoreError>;

    async fn get(&self, username: &str) -> Result<Option<User>, StoreError>;

    /// First user carrying `email`, by creation time. The schema does not
    /// force unique emails.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Overwrite the stored credential. Returns `false` when no such user.
    async fn set_credential(&self, username: &str, credential: Credential)
        -> Result<bool, StoreError>;
}
