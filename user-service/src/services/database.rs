use super::store::{StoreError, UserStore};
use crate::config::MongoConfig;
use crate::models::{User, UserChanges};
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId, DateTime as BsonDateTime},
    Client as MongoClient, Collection, Database,
};
use service_core::error::AppError;
use std::time::Duration;

#[derive(Clone)]
pub struct MongoUserStore {
    client: MongoClient,
    db: Database,
    collection: String,
}

impl MongoUserStore {
    /// Connects and verifies the server answers a ping, both within `timeout`.
    pub async fn connect(config: &MongoConfig, timeout: Duration) -> Result<Self, AppError> {
        tracing::info!(database = %config.database, "Connecting to MongoDB");

        let store = tokio::time::timeout(timeout, async {
            let client = MongoClient::with_uri_str(&config.uri).await?;
            let store = Self {
                db: client.database(&config.database),
                client,
                collection: config.collection.clone(),
            };
            store.run_ping().await?;
            Ok::<_, mongodb::error::Error>(store)
        })
        .await
        .map_err(|_| {
            tracing::error!(?timeout, "Timed out connecting to MongoDB");
            AppError::DatabaseError(anyhow::anyhow!(
                "Failed to connect to MongoDB within {:?}",
                timeout
            ))
        })?
        .map_err(|e| {
            tracing::error!("Failed to connect to MongoDB: {}", e);
            AppError::from(e)
        })?;

        tracing::info!(database = %config.database, "Successfully connected to MongoDB database");
        Ok(store)
    }

    async fn run_ping(&self) -> Result<(), mongodb::error::Error> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await?;
        Ok(())
    }

    /// Releases the connection pool. Waits at most `grace`; a release that does
    /// not finish in time is logged and abandoned.
    pub async fn shutdown(self, grace: Duration) {
        match tokio::time::timeout(grace, self.client.shutdown()).await {
            Ok(()) => tracing::info!("Disconnected from MongoDB"),
            Err(_) => tracing::error!(?grace, "Error disconnecting from MongoDB: timed out"),
        }
    }

    pub fn users(&self) -> Collection<User> {
        self.db.collection(&self.collection)
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl UserStore for MongoUserStore {
    async fn insert(&self, user: &User) -> Result<ObjectId, StoreError> {
        let result = self.users().insert_one(user, None).await?;
        result.inserted_id.as_object_id().ok_or_else(|| {
            StoreError::Decode(format!(
                "inserted id is not an ObjectId: {}",
                result.inserted_id
            ))
        })
    }

    async fn find_all(&self) -> Result<Vec<User>, StoreError> {
        let cursor = self.users().find(doc! {}, None).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn find_by_id(&self, id: ObjectId) -> Result<Option<User>, StoreError> {
        Ok(self.users().find_one(doc! { "_id": id }, None).await?)
    }

    async fn update(&self, id: ObjectId, changes: &UserChanges) -> Result<bool, StoreError> {
        // Pipeline form so updated_at can be derived from the stored value:
        // max(now, stored + 1ms). User text goes through $literal so a leading
        // '$' is not read as a field path.
        let mut set = doc! {
            "updated_at": {
                "$max": [
                    BsonDateTime::from_chrono(changes.updated_at),
                    { "$add": ["$updated_at", 1_i64] },
                ]
            }
        };
        if let Some(name) = &changes.name {
            set.insert("name", doc! { "$literal": name.as_str() });
        }
        if let Some(email) = &changes.email {
            set.insert("email", doc! { "$literal": email.as_str() });
        }
        if let Some(age) = changes.age {
            set.insert("age", age);
        }

        let result = self
            .users()
            .update_one(doc! { "_id": id }, vec![doc! { "$set": set }], None)
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn delete(&self, id: ObjectId) -> Result<bool, StoreError> {
        let result = self.users().delete_one(doc! { "_id": id }, None).await?;
        Ok(result.deleted_count > 0)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(self.run_ping().await?)
    }
}
