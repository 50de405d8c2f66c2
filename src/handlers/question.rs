// src/handlers/question.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    error::AppError, models::question::QuestionRequest, services::question::QuestionService,
    utils::jwt::Claims,
};

/// Creates a question. Visibility follows the author's role.
pub async fn create_question(
    State(questions): State<QuestionService>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<QuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let question = questions
        .create_question(claims.user_id()?, claims.role, payload)
        .await?;

    Ok((StatusCode::CREATED, Json(question)))
}

pub async fn list_questions(
    State(questions): State<QuestionService>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(questions.question_list().await?))
}

pub async fn get_question(
    State(questions): State<QuestionService>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(questions.get_question_details(id).await?))
}

/// Replaces a question's content.
pub async fn update_question(
    State(questions): State<QuestionService>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<QuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let question = questions
        .update_question(id, claims.user_id()?, claims.role, payload)
        .await?;

    Ok(Json(question))
}
