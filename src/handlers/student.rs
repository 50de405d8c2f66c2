// src/handlers/student.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    error::AppError, models::exam::SubmitAnswersRequest, services::exam::ExamService,
    utils::jwt::Claims,
};

/// Lists the exams assigned to the calling student.
pub async fn list_assigned(
    State(exams): State<ExamService>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let list = exams.list_for_student(claims.user_id()?).await?;
    Ok(Json(list))
}

/// Exam paper for an assigned student, without correct options.
pub async fn get_assigned_exam(
    State(exams): State<ExamService>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    exams.ensure_assigned(id, claims.user_id()?).await?;

    let details = exams.exam_details_for_student(id).await?;
    Ok(Json(details))
}

/// Submits answers, grades them and completes the exam.
///
/// `completed: false` in the response means grading was stored but the completion
/// bookkeeping did not commit.
pub async fn submit_answers(
    State(exams): State<ExamService>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<SubmitAnswersRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let outcome = exams
        .submit_answers(id, claims.user_id()?, payload.answers)
        .await?;

    Ok(Json(outcome))
}
