//! User account API endpoints.

use axum::{extract::State, Extension, Json};

use super::{success, ApiResult};
use crate::auth;
use crate::errors::AppError;
use crate::models::{CreateUserRequest, TokenRequest, TokenResponse, User};
use crate::AppState;

const MIN_PASSWORD_LEN: usize = 5;

/// POST /api/users - Create a new account.
pub async fn create_user(
    State(state): State<AppState>,
    Json(request): Json<CreateUserRequest>,
) -> ApiResult<User> {
    if !request.email.contains('@') || request.email.trim().is_empty() {
        return Err(AppError::validation_field(
            "email",
            "A valid email address is required",
        ));
    }
    if request.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation_field(
            "password",
            format!("Password must be at least {} characters", MIN_PASSWORD_LEN),
        ));
    }

    let password_hash = auth::hash_password(&request.password)?;
    let user = state.repo.create_user(&request, &password_hash).await?;

    tracing::info!("Created user {}", user.id);
    success(user)
}

/// POST /api/users/token - Exchange credentials for an API token.
pub async fn create_token(
    State(state): State<AppState>,
    Json(request): Json<TokenRequest>,
) -> ApiResult<TokenResponse> {
    let credentials = state.repo.get_user_credentials(&request.email).await?;

    // One rejection path for unknown email and wrong password.
    let (user, password_hash) = credentials
        .ok_or_else(|| AppError::Unauthorized("Invalid credentials".to_string()))?;
    if !auth::verify_password(&request.password, &password_hash) {
        return Err(AppError::Unauthorized("Invalid credentials".to_string()));
    }

    let token = uuid::Uuid::new_v4().simple().to_string();
    state
        .repo
        .create_token(user.id, &auth::hash_token(&token))
        .await?;

    success(TokenResponse { token })
}

/// GET /api/users/me - The authenticated account.
pub async fn me(Extension(user): Extension<User>) -> ApiResult<User> {
    success(user)
}
