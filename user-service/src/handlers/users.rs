use crate::dtos::{
    CreateUserRequest, MessageResponse, UpdateUserRequest, UserListResponse, UserResponse,
};
use crate::models::User;
use crate::services::StoreError;
use crate::startup::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use mongodb::bson::oid::ObjectId;
use service_core::error::AppError;
use service_core::extract::ValidatedJson;

fn parse_user_id(raw: &str) -> Result<ObjectId, AppError> {
    ObjectId::parse_str(raw).map_err(|_| AppError::BadRequest(anyhow::anyhow!("Invalid user ID")))
}

fn user_not_found() -> AppError {
    AppError::NotFound(anyhow::anyhow!("User not found"))
}

fn store_failure(action: &'static str) -> impl FnOnce(StoreError) -> AppError {
    move |e| {
        tracing::error!(error = %e, "{}", action);
        AppError::DatabaseError(anyhow::Error::new(e).context(action))
    }
}

#[tracing::instrument(skip(state, request))]
pub async fn create_user(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    let mut user = User::new(request.name, request.email, request.age);

    user.id = state
        .store
        .insert(&user)
        .await
        .map_err(store_failure("Failed to create user"))?;

    tracing::info!(user_id = %user.id, "User created");

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

#[tracing::instrument(skip(state))]
pub async fn list_users(State(state): State<AppState>) -> Result<Json<UserListResponse>, AppError> {
    let users = state
        .store
        .find_all()
        .await
        .map_err(store_failure("Failed to fetch users"))?;

    Ok(Json(UserListResponse::from(users)))
}

#[tracing::instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>, AppError> {
    let id = parse_user_id(&id)?;

    let user = state
        .store
        .find_by_id(id)
        .await
        .map_err(store_failure("Failed to fetch user"))?
        .ok_or_else(user_not_found)?;

    Ok(Json(UserResponse::from(user)))
}

#[tracing::instrument(skip(state, request))]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ValidatedJson(request): ValidatedJson<UpdateUserRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let id = parse_user_id(&id)?;
    let changes = request.into_changes();

    let matched = state
        .store
        .update(id, &changes)
        .await
        .map_err(store_failure("Failed to update user"))?;

    if !matched {
        return Err(user_not_found());
    }

    tracing::info!(user_id = %id, "User updated");

    // Removed between the update and the read-back.
    let user = state
        .store
        .find_by_id(id)
        .await
        .map_err(store_failure("Failed to fetch updated user"))?
        .ok_or_else(user_not_found)?;

    Ok(Json(UserResponse::from(user)))
}

#[tracing::instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let id = parse_user_id(&id)?;

    let deleted = state
        .store
        .delete(id)
        .await
        .map_err(store_failure("Failed to delete user"))?;

    if !deleted {
        return Err(user_not_found());
    }

    tracing::info!(user_id = %id, "User deleted");

    Ok(Json(MessageResponse::new("User deleted successfully")))
}
