// src/handlers/user.rs

use axum::{Json, extract::State, response::IntoResponse};
use serde_json::json;
use validator::Validate;

use crate::{error::AppError, models::user::EmailCheckRequest, state::AppState};

/// Pre-check for password reset: the email must belong to a known user.
pub async fn check_email(
    State(state): State<AppState>,
    Json(payload): Json<EmailCheckRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let email = payload.email.trim().to_lowercase();
    if !state.store.is_email_exist(&email).await? {
        return Err(AppError::NotFound(format!("{} not found", email)));
    }

    Ok(Json(json!({ "exists": true })))
}
