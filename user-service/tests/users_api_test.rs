mod common;

use async_trait::async_trait;
use axum::http::{Method, StatusCode};
use chrono::{DateTime, FixedOffset};
use common::{user_uri, TestApp};
use mongodb::bson::oid::ObjectId;
use serde_json::json;
use std::collections::HashSet;
use std::time::Duration;
use user_service::config::StoreConfig;
use user_service::models::{User, UserChanges};
use user_service::services::{BoundedStore, InMemoryUserStore, StoreError, UserStore};

fn timestamp(value: &serde_json::Value) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(value.as_str().expect("timestamp is a string"))
        .expect("timestamp is RFC 3339")
}

const MISSING_ID: &str = "507f1f77bcf86cd799439011";

/// Acknowledges every update but never finds the record afterwards, as when a
/// concurrent delete lands between the write and the read-back.
struct VanishingStore;

#[async_trait]
impl UserStore for VanishingStore {
    async fn insert(&self, user: &User) -> Result<ObjectId, StoreError> {
        Ok(user.id)
    }

    async fn find_all(&self) -> Result<Vec<User>, StoreError> {
        Ok(Vec::new())
    }

    async fn find_by_id(&self, _id: ObjectId) -> Result<Option<User>, StoreError> {
        Ok(None)
    }

    async fn update(&self, _id: ObjectId, _changes: &UserChanges) -> Result<bool, StoreError> {
        Ok(true)
    }

    async fn delete(&self, _id: ObjectId) -> Result<bool, StoreError> {
        Ok(false)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[tokio::test]
async fn create_returns_full_record() {
    let app = TestApp::spawn();

    let user = app.create_user("Ada", "ada@x.io", 30).await;

    assert!(!user["id"].as_str().unwrap().is_empty());
    assert_eq!(user["name"], "Ada");
    assert_eq!(user["email"], "ada@x.io");
    assert_eq!(user["age"], 30);
    assert_eq!(timestamp(&user["created_at"]), timestamp(&user["updated_at"]));
}

#[tokio::test]
async fn create_assigns_unique_ids() {
    let app = TestApp::spawn();

    let mut ids = HashSet::new();
    for i in 0..10 {
        let user = app
            .create_user(&format!("user{}", i), &format!("user{}@x.io", i), 20 + i)
            .await;
        ids.insert(user["id"].as_str().unwrap().to_string());
    }

    assert_eq!(ids.len(), 10);
}

#[tokio::test]
async fn created_user_round_trips_through_get() {
    let app = TestApp::spawn();
    let created = app.create_user("Ada", "ada@x.io", 30).await;

    let response = app.get(&user_uri(created["id"].as_str().unwrap())).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["name"], "Ada");
    assert_eq!(response.body["email"], "ada@x.io");
    assert_eq!(response.body["age"], 30);
    assert_eq!(response.body, created);
}

#[tokio::test]
async fn create_rejects_out_of_range_age_before_store() {
    let app = TestApp::spawn();

    for age in [0, 151, 200, -1] {
        let response = app
            .send_json(
                Method::POST,
                "/api/v1/users",
                &json!({ "name": "Ada", "email": "ada@x.io", "age": age }),
            )
            .await;

        assert_eq!(response.status, StatusCode::BAD_REQUEST, "age {}", age);
        assert!(response.body["error"].is_string());
    }

    assert_eq!(app.store.operation_count(), 0);
}

#[tokio::test]
async fn create_rejects_missing_or_invalid_fields() {
    let app = TestApp::spawn();

    let bodies = [
        json!({ "email": "ada@x.io", "age": 30 }),
        json!({ "name": "Ada", "age": 30 }),
        json!({ "name": "Ada", "email": "ada@x.io" }),
        json!({ "name": "", "email": "ada@x.io", "age": 30 }),
        json!({ "name": "Ada", "email": "not-an-email", "age": 30 }),
        json!({ "name": "Ada", "email": "ada@x.io", "age": "thirty" }),
    ];

    for body in &bodies {
        let response = app.send_json(Method::POST, "/api/v1/users", body).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST, "body {}", body);
    }

    let malformed = app
        .send_raw(Method::POST, "/api/v1/users", r#"{"name": "Ada""#)
        .await;
    assert_eq!(malformed.status, StatusCode::BAD_REQUEST);

    assert_eq!(app.store.operation_count(), 0);
}

#[tokio::test]
async fn list_on_empty_store_returns_empty_collection() {
    let app = TestApp::spawn();

    let response = app.get("/api/v1/users").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, json!({ "users": [], "count": 0 }));
}

#[tokio::test]
async fn list_returns_every_user_in_insertion_order() {
    let app = TestApp::spawn();
    app.create_user("Ada", "ada@x.io", 30).await;
    app.create_user("Grace", "grace@x.io", 45).await;
    app.create_user("Barbara", "barbara@x.io", 60).await;

    let response = app.get("/api/v1/users").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["count"], 3);
    let names: Vec<&str> = response.body["users"]
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["Ada", "Grace", "Barbara"]);
}

#[tokio::test]
async fn malformed_id_is_rejected_without_store_access() {
    let app = TestApp::spawn();

    for id in ["not-an-id", "123", "507f1f77bcf86cd79943901z"] {
        let uri = user_uri(id);

        let get = app.get(&uri).await;
        assert_eq!(get.status, StatusCode::BAD_REQUEST);
        assert_eq!(get.body, json!({ "error": "Invalid user ID" }));

        let put = app.send_json(Method::PUT, &uri, &json!({ "age": 31 })).await;
        assert_eq!(put.status, StatusCode::BAD_REQUEST);

        let delete = app.delete(&uri).await;
        assert_eq!(delete.status, StatusCode::BAD_REQUEST);
    }

    assert_eq!(app.store.operation_count(), 0);
}

#[tokio::test]
async fn missing_user_is_404_for_get_update_and_delete() {
    let app = TestApp::spawn();
    app.create_user("Ada", "ada@x.io", 30).await;
    let uri = user_uri(MISSING_ID);

    let get = app.get(&uri).await;
    assert_eq!(get.status, StatusCode::NOT_FOUND);
    assert_eq!(get.body, json!({ "error": "User not found" }));

    let put = app
        .send_json(Method::PUT, &uri, &json!({ "name": "Nobody" }))
        .await;
    assert_eq!(put.status, StatusCode::NOT_FOUND);

    let delete = app.delete(&uri).await;
    assert_eq!(delete.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn partial_update_only_changes_supplied_fields() {
    let app = TestApp::spawn();
    let created = app.create_user("Ada", "ada@x.io", 30).await;
    let uri = user_uri(created["id"].as_str().unwrap());

    let response = app.send_json(Method::PUT, &uri, &json!({ "age": 31 })).await;

    assert_eq!(response.status, StatusCode::OK);
    let updated = response.body;
    assert_eq!(updated["id"], created["id"]);
    assert_eq!(updated["name"], "Ada");
    assert_eq!(updated["email"], "ada@x.io");
    assert_eq!(updated["age"], 31);
    assert_eq!(updated["created_at"], created["created_at"]);
    assert!(timestamp(&updated["updated_at"]) > timestamp(&created["updated_at"]));

    let fetched = app.get(&uri).await;
    assert_eq!(fetched.body, updated);
}

#[tokio::test]
async fn repeated_updates_keep_advancing_timestamp() {
    let app = TestApp::spawn();
    let created = app.create_user("Ada", "ada@x.io", 30).await;
    let uri = user_uri(created["id"].as_str().unwrap());
    let mut previous = timestamp(&created["updated_at"]);

    for name in ["Augusta", "Ada King", "Countess"] {
        let response = app
            .send_json(Method::PUT, &uri, &json!({ "name": name }))
            .await;

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body["id"], created["id"]);
        assert_eq!(response.body["name"], name);
        let current = timestamp(&response.body["updated_at"]);
        assert!(current > previous);
        previous = current;
    }
}

#[tokio::test]
async fn immediate_update_always_advances_timestamp() {
    let app = TestApp::spawn();

    for _ in 0..50 {
        let created = app.create_user("Ada", "ada@x.io", 30).await;
        let uri = user_uri(created["id"].as_str().unwrap());

        let response = app.send_json(Method::PUT, &uri, &json!({ "age": 31 })).await;

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body["id"], created["id"]);
        assert!(
            timestamp(&response.body["updated_at"]) > timestamp(&created["updated_at"]),
            "updated_at {} did not advance past {}",
            response.body["updated_at"],
            created["updated_at"]
        );
    }
}

#[tokio::test]
async fn update_is_404_when_record_vanishes_before_read_back() {
    let app = TestApp::with_store(VanishingStore);

    let response = app
        .send_json(Method::PUT, &user_uri(MISSING_ID), &json!({ "age": 31 }))
        .await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.body, json!({ "error": "User not found" }));
}

#[tokio::test]
async fn update_ignores_empty_and_zero_values() {
    let app = TestApp::spawn();
    let created = app.create_user("Ada", "ada@x.io", 30).await;
    let uri = user_uri(created["id"].as_str().unwrap());

    let response = app
        .send_json(
            Method::PUT,
            &uri,
            &json!({ "name": "", "email": "", "age": 0 }),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["name"], "Ada");
    assert_eq!(response.body["email"], "ada@x.io");
    assert_eq!(response.body["age"], 30);
}

#[tokio::test]
async fn update_rejects_invalid_fields() {
    let app = TestApp::spawn();
    let created = app.create_user("Ada", "ada@x.io", 30).await;
    let uri = user_uri(created["id"].as_str().unwrap());
    let calls_before = app.store.operation_count();

    for body in [
        json!({ "email": "nope" }),
        json!({ "age": 151 }),
        json!({ "age": -5 }),
    ] {
        let response = app.send_json(Method::PUT, &uri, &body).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST, "body {}", body);
    }

    assert_eq!(app.store.operation_count(), calls_before);
}

#[tokio::test]
async fn delete_removes_user() {
    let app = TestApp::spawn();
    let created = app.create_user("Ada", "ada@x.io", 30).await;
    let uri = user_uri(created["id"].as_str().unwrap());

    let response = app.delete(&uri).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.body,
        json!({ "message": "User deleted successfully" })
    );
    assert_eq!(app.get(&uri).await.status, StatusCode::NOT_FOUND);
    assert_eq!(app.delete(&uri).await.status, StatusCode::NOT_FOUND);
    assert_eq!(
        app.get("/api/v1/users").await.body,
        json!({ "users": [], "count": 0 })
    );
}

#[tokio::test]
async fn store_failure_maps_to_500() {
    let app = TestApp::spawn();
    let created = app.create_user("Ada", "ada@x.io", 30).await;
    app.store.set_unavailable(true);

    let list = app.get("/api/v1/users").await;
    assert_eq!(list.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(list.body["error"]
        .as_str()
        .unwrap()
        .starts_with("Failed to fetch users:"));

    let get = app.get(&user_uri(created["id"].as_str().unwrap())).await;
    assert_eq!(get.status, StatusCode::INTERNAL_SERVER_ERROR);

    let create = app
        .send_json(
            Method::POST,
            "/api/v1/users",
            &json!({ "name": "Grace", "email": "grace@x.io", "age": 45 }),
        )
        .await;
    assert_eq!(create.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(create.body["error"]
        .as_str()
        .unwrap()
        .starts_with("Failed to create user:"));

    let uri = user_uri(created["id"].as_str().unwrap());
    let update = app.send_json(Method::PUT, &uri, &json!({ "age": 31 })).await;
    assert_eq!(update.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(update.body["error"]
        .as_str()
        .unwrap()
        .starts_with("Failed to update user:"));

    let delete = app.delete(&uri).await;
    assert_eq!(delete.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(delete.body["error"]
        .as_str()
        .unwrap()
        .starts_with("Failed to delete user:"));

    app.store.set_unavailable(false);
    assert_eq!(app.get(&uri).await.body["age"], 30);
}

#[tokio::test]
async fn store_timeout_maps_to_500() {
    let limits = StoreConfig {
        operation_timeout: Duration::from_millis(20),
        list_timeout: Duration::from_millis(20),
        ..StoreConfig::default()
    };
    let slow = InMemoryUserStore::new().with_latency(Duration::from_millis(250));
    let app = TestApp::with_store(BoundedStore::new(slow, &limits));

    let response = app.get("/api/v1/users").await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.body["error"]
        .as_str()
        .unwrap()
        .contains("timed out"));
}
