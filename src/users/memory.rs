use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::users::repo::{StoreError, UserStore};
use crate::users::repo_types::{NewUser, User, UserChanges};

#[derive(Default)]
struct Inner {
    next_id: i64,
    rows: BTreeMap<i64, User>,
}

/// In-memory `UserStore` with the same uniqueness rule as the `users_email_key` constraint.
#[derive(Clone, Default)]
pub struct InMemoryUserStore {
    inner: Arc<RwLock<Inner>>,
    fail_writes: Arc<AtomicBool>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following write fail as if the engine went away.
    pub fn fail_writes(&self, on: bool) {
        self.fail_writes.store(on, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        self.check_writable()?;
        let mut inner = self.inner.write().await;
        if inner.rows.values().any(|u| u.email == user.email) {
            return Err(StoreError::EmailTaken);
        }
        inner.next_id += 1;
        let row = User {
            id: inner.next_id,
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            created_at: OffsetDateTime::now_utc(),
        };
        inner.rows.insert(row.id, row.clone());
        Ok(row)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(self.inner.read().await.rows.get(&id).cloned())
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.rows.values().find(|u| u.email == email).cloned())
    }

    async fn list_all(&self) -> Result<Vec<User>, StoreError> {
        Ok(self.inner.read().await.rows.values().cloned().collect())
    }

    async fn update(&self, id: i64, changes: UserChanges) -> Result<Option<User>, StoreError> {
        self.check_writable()?;
        let mut inner = self.inner.write().await;
        if let Some(email) = &changes.email {
            if inner.rows.values().any(|u| u.id != id && &u.email == email) {
                return Err(StoreError::EmailTaken);
            }
        }
        let Some(row) = inner.rows.get_mut(&id) else {
            return Ok(None);
        };
        changes.apply(row);
        Ok(Some(row.clone()))
    }

    async fn delete(&self, id: i64) -> Result<bool, StoreError> {
        self.check_writable()?;
        Ok(self.inner.write().await.rows.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: "Test".into(),
            email: email.into(),
            password_hash: "hash".into(),
        }
    }

    #[tokio::test]
    async fn assigns_increasing_ids_and_lists_in_order() {
        let store = InMemoryUserStore::new();
        let a = store.insert(new_user("a@example.com")).await.unwrap();
        let b = store.insert(new_user("b@example.com")).await.unwrap();
        assert!(b.id > a.id);
        let all = store.list_all().await.unwrap();
        assert_eq!(all, vec![a, b]);
    }

    #[tokio::test]
    async fn enforces_unique_email_on_insert_and_update() {
        let store = InMemoryUserStore::new();
        store.insert(new_user("a@example.com")).await.unwrap();
        let b = store.insert(new_user("b@example.com")).await.unwrap();

        let err = store.insert(new_user("a@example.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::EmailTaken));

        let changes = UserChanges {
            email: Some("a@example.com".into()),
            ..Default::default()
        };
        let err = store.update(b.id, changes).await.unwrap_err();
        assert!(matches!(err, StoreError::EmailTaken));
        assert_eq!(store.get_by_id(b.id).await.unwrap().unwrap().email, "b@example.com");
    }

    #[tokio::test]
    async fn failed_writes_leave_no_trace() {
        let store = InMemoryUserStore::new();
        store.fail_writes(true);
        assert!(store.insert(new_user("a@example.com")).await.is_err());
        store.fail_writes(false);
        assert!(store.list_all().await.unwrap().is_empty());
    }
}
