//! Persistence capability used by the handlers.
//!
//! Handlers only see `dyn UserStore`; production wires a [`MongoUserStore`]
//! behind a [`BoundedStore`], tests use the in-memory store.
//!
//! [`MongoUserStore`]: super::MongoUserStore

use crate::config::StoreConfig;
use crate::models::{User, UserChanges};
use async_trait::async_trait;
use metrics::histogram;
use mongodb::bson::oid::ObjectId;
use std::future::Future;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] mongodb::error::Error),

    #[error("failed to decode stored record: {0}")]
    Decode(String),

    #[error("store operation `{operation}` timed out after {limit:?}")]
    Timeout {
        operation: &'static str,
        limit: Duration,
    },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Persists a new record and returns the identifier it was stored under.
    async fn insert(&self, user: &User) -> Result<ObjectId, StoreError>;

    /// Every record, in store order. Unbounded.
    async fn find_all(&self) -> Result<Vec<User>, StoreError>;

    async fn find_by_id(&self, id: ObjectId) -> Result<Option<User>, StoreError>;

    /// Applies `changes` to the matching record. `Ok(false)` when nothing matched.
    async fn update(&self, id: ObjectId, changes: &UserChanges) -> Result<bool, StoreError>;

    /// Removes the matching record. `Ok(false)` when nothing was removed.
    async fn delete(&self, id: ObjectId) -> Result<bool, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

/// Applies per-call time limits to any store. No retries.
pub struct BoundedStore<S> {
    inner: S,
    operation_timeout: Duration,
    list_timeout: Duration,
}

impl<S: UserStore> BoundedStore<S> {
    pub fn new(inner: S, config: &StoreConfig) -> Self {
        Self {
            inner,
            operation_timeout: config.operation_timeout,
            list_timeout: config.list_timeout,
        }
    }

    async fn bounded<T, F>(
        &self,
        operation: &'static str,
        limit: Duration,
        fut: F,
    ) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>> + Send,
    {
        let start = Instant::now();
        let result = match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(operation, ?limit, "Store operation timed out");
                Err(StoreError::Timeout { operation, limit })
            }
        };

        let outcome = if result.is_ok() { "ok" } else { "error" };
        histogram!(
            "store_operation_duration_seconds",
            "operation" => operation,
            "outcome" => outcome
        )
        .record(start.elapsed().as_secs_f64());

        result
    }
}

#[async_trait]
impl<S: UserStore> UserStore for BoundedStore<S> {
    async fn insert(&self, user: &User) -> Result<ObjectId, StoreError> {
        self.bounded("insert", self.operation_timeout, self.inner.insert(user))
            .await
    }

    async fn find_all(&self) -> Result<Vec<User>, StoreError> {
        self.bounded("find_all", self.list_timeout, self.inner.find_all())
            .await
    }

    async fn find_by_id(&self, id: ObjectId) -> Result<Option<User>, StoreError> {
        self.bounded("find_by_id", self.operation_timeout, self.inner.find_by_id(id))
            .await
    }

    async fn update(&self, id: ObjectId, changes: &UserChanges) -> Result<bool, StoreError> {
        self.bounded(
            "update",
            self.operation_timeout,
            self.inner.update(id, changes),
        )
        .await
    }

    async fn delete(&self, id: ObjectId) -> Result<bool, StoreError> {
        self.bounded("delete", self.operation_timeout, self.inner.delete(id))
            .await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.bounded("ping", self.operation_timeout, self.inner.ping())
            .await
    }
}
