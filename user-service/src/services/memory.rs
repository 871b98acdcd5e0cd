use super::store::{StoreError, UserStore};
use crate::models::{User, UserChanges};
use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

/// Process-local store that keeps records in insertion order.
///
/// Counts every call it receives and can be switched unavailable or slowed
/// down, which lets tests observe whether a request reached the store.
#[derive(Default)]
pub struct InMemoryUserStore {
    users: RwLock<Vec<User>>,
    operations: AtomicU64,
    unavailable: AtomicBool,
    latency: Option<Duration>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make subsequent calls fail with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn operation_count(&self) -> u64 {
        self.operations.load(Ordering::SeqCst)
    }

    async fn begin(&self) -> Result<(), StoreError> {
        self.operations.fetch_add(1, Ordering::SeqCst);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "in-memory store switched off".to_string(),
            ));
        }

        Ok(())
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn insert(&self, user: &User) -> Result<ObjectId, StoreError> {
        self.begin().await?;
        self.users.write().await.push(user.clone());
        Ok(user.id)
    }

    async fn find_all(&self) -> Result<Vec<User>, StoreError> {
        self.begin().await?;
        Ok(self.users.read().await.clone())
    }

    async fn find_by_id(&self, id: ObjectId) -> Result<Option<User>, StoreError> {
        self.begin().await?;
        Ok(self.users.read().await.iter().find(|u| u.id == id).cloned())
    }

    async fn update(&self, id: ObjectId, changes: &UserChanges) -> Result<bool, StoreError> {
        self.begin().await?;
        let mut users = self.users.write().await;
        match users.iter_mut().find(|u| u.id == id) {
            Some(user) => {
                changes.apply(user);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: ObjectId) -> Result<bool, StoreError> {
        self.begin().await?;
        let mut users = self.users.write().await;
        let before = users.len();
        users.retain(|u| u.id != id);
        Ok(users.len() < before)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.begin().await
    }
}
