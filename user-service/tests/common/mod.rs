#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::util::ServiceExt;
use user_service::services::{InMemoryUserStore, UserStore};
use user_service::startup::{build_router, AppState};

pub const SERVICE_NAME: &str = "user-service";

/// Router over an in-memory store, driven in-process with `oneshot`.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<InMemoryUserStore>,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: Value,
}

impl TestApp {
    pub fn spawn() -> Self {
        let store = Arc::new(InMemoryUserStore::new());
        let state = AppState {
            store: store.clone(),
            service_name: SERVICE_NAME.to_string(),
        };

        TestApp {
            router: build_router(state),
            store,
        }
    }

    /// Router over an arbitrary store; `self.store` is a fresh, unused fake.
    pub fn with_store<S: UserStore + 'static>(store: S) -> Self {
        TestApp {
            router: build_router(AppState::new(store, SERVICE_NAME)),
            store: Arc::new(InMemoryUserStore::new()),
        }
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to execute request");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read response body")
            .to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.send(
            Request::builder()
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn delete(&self, uri: &str) -> TestResponse {
        self.send(
            Request::builder()
                .method(Method::DELETE)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn send_json(&self, method: Method, uri: &str, body: &Value) -> TestResponse {
        self.send_raw(method, uri, &body.to_string()).await
    }

    pub async fn send_raw(&self, method: Method, uri: &str, body: &str) -> TestResponse {
        self.send(
            Request::builder()
                .method(method)
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn create_user(&self, name: &str, email: &str, age: i64) -> Value {
        let response = self
            .send_json(
                Method::POST,
                "/api/v1/users",
                &json!({ "name": name, "email": email, "age": age }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        response.body
    }
}

pub fn user_uri(id: &str) -> String {
    format!("/api/v1/users/{}", id)
}
