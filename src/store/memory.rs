use std::collections::HashMap;
use std::sync::Mutex;

use axum::async_trait;

use super::{Credential, StoreError, User, UserStore};

/// In-memory store, used as a test double only. The mutex is held across
/// the whole check-and-insert, which keeps concurrent creates serialized.
#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<HashMap<String, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn insert(&self, user: User) -> Result<User, StoreError> {
        let mut users = self.users.lock().expect("user store lock poisoned");
        if users.contains_key(&user.username) {
            return Err(StoreError::AlreadyExists);
        }
        users.insert(user.username.clone(), user.clone());
        Ok(user)
    }

    async fn get(&self, username: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.lock().expect("user store lock poisoned");
        Ok(users.get(username).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.lock().expect("user store lock poisoned");
        Ok(users
            .values()
            .filter(|u| u.email == email)
            .min_by_key(|u| u.created_at)
            .cloned())
    }

    async fn set_credential(
        &self,
        username: &str,
        credential: Credential,
    ) -> Result<bool, StoreError> {
        let mut users = self.users.lock().expect("user store lock poisoned");
        match users.get_mut(username) {
            Some(user) => {
                user.credential = credential;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use time::OffsetDateTime;

    use super::*;

    fn user(username: &str, email: &str) -> User {
        User {
            username: username.into(),
            email: email.into(),
            credential: Credential::Local {
                hash: "$argon2id$fake".into(),
            },
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[tokio::test]
    async fn insert_then_get() {
        let store = MemoryUserStore::new();
        store.insert(user("alice", "alice@example.com")).await.expect("insert");
        let found = store.get("alice").await.expect("get").expect("present");
        assert_eq!(found.email, "alice@example.com");
        assert!(store.get("bob").await.expect("get").is_none());
    }

    #[tokio::test]
    async fn duplicate_username_is_rejected() {
        let store = MemoryUserStore::new();
        store.insert(user("alice", "a@example.com")).await.expect("insert");
        let err = store.insert(user("alice", "b@example.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists));
    }

    #[tokio::test]
    async fn concurrent_creates_admit_exactly_one() {
        let store = Arc::new(MemoryUserStore::new());

        let a = {
            let store = store.clone();
            tokio::spawn(async move { store.insert(user("race", "a@example.com")).await })
        };
        let b = {
            let store = store.clone();
            tokio::spawn(async move { store.insert(user("race", "b@example.com")).await })
        };

        let results = [a.await.expect("join"), b.await.expect("join")];
        let wins = results.iter().filter(|r| r.is_ok()).count();
        let losses = results
            .iter()
            .filter(|r| matches!(r, Err(StoreError::AlreadyExists)))
            .count();
        assert_eq!(wins, 1);
        assert_eq!(losses, 1);
    }

    #[tokio::test]
    async fn find_by_email_prefers_earliest_created() {
        let store = MemoryUserStore::new();
        let mut first = user("first", "shared@example.com");
        first.created_at = OffsetDateTime::from_unix_timestamp(1_000).expect("timestamp");
        let mut second = user("second", "shared@example.com");
        second.created_at = OffsetDateTime::from_unix_timestamp(2_000).expect("timestamp");
        store.insert(second).await.expect("insert");
        store.insert(first).await.expect("insert");

        let found = store
            .find_by_email("shared@example.com")
            .await
            .expect("find")
            .expect("present");
        assert_eq!(found.username, "first");
    }
}
