// src/handlers/exam.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use validator::Validate;

use crate::{
    error::AppError,
    models::exam::{
        AddQuestionsRequest, CreateExamRequest, CurateQuestionRequest, RewardRequest,
        StudentAssignmentRequest,
    },
    services::exam::ExamService,
    utils::jwt::Claims,
};

/// Creates an exam owned by the caller.
pub async fn create_exam(
    State(exams): State<ExamService>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let exam = exams.create_exam(claims.user_id()?, payload).await?;

    Ok((StatusCode::CREATED, Json(exam)))
}

/// Lists every exam the caller created.
pub async fn list_my_exams(
    State(exams): State<ExamService>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let list = exams.list_for_parent(claims.user_id()?).await?;
    Ok(Json(list))
}

/// Full view of one exam. Creator or admin only.
pub async fn get_exam(
    State(exams): State<ExamService>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    exams
        .ensure_can_manage(id, claims.user_id()?, claims.role)
        .await?;

    let exam = exams.exam_details(id).await?;
    Ok(Json(exam))
}

/// Deletes an exam.
pub async fn delete_exam(
    State(exams): State<ExamService>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    exams
        .ensure_can_manage(id, claims.user_id()?, claims.role)
        .await?;
    exams.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Sets or replaces the exam's reward.
pub async fn assign_reward(
    State(exams): State<ExamService>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<RewardRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    exams
        .ensure_can_manage(id, claims.user_id()?, claims.role)
        .await?;

    let exam = exams.assign_reward(id, payload).await?;
    Ok(Json(exam))
}

/// Selects or rejects a candidate question.
pub async fn curate_question(
    State(exams): State<ExamService>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<CurateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    exams
        .ensure_can_manage(id, claims.user_id()?, claims.role)
        .await?;

    let exam = exams
        .curate_question(id, payload.question_id, payload.is_selected)
        .await?;
    Ok(Json(exam))
}

/// Selects a batch of questions.
pub async fn add_questions(
    State(exams): State<ExamService>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<AddQuestionsRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    exams
        .ensure_can_manage(id, claims.user_id()?, claims.role)
        .await?;

    let exam = exams.add_questions_to_exam(id, payload.question_ids).await?;
    Ok(Json(exam))
}

/// Assigns or unassigns a student.
/// An already assigned student yields `success: false` with 200, not an error.
pub async fn update_student_assigning(
    State(exams): State<ExamService>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<StudentAssignmentRequest>,
) -> Result<impl IntoResponse, AppError> {
    exams
        .ensure_can_manage(id, claims.user_id()?, claims.role)
        .await?;

    let success = exams
        .update_student_assigning(id, payload.student_id, payload.is_assigning)
        .await?;

    let message = match (payload.is_assigning, success) {
        (true, true) => "Student assigned",
        (true, false) => "Student already assigned",
        (false, _) => "Student unassigned",
    };

    Ok(Json(json!({
        "success": success,
        "message": message,
    })))
}

/// Answer key of an exam, for its creator.
pub async fn answer_key(
    State(exams): State<ExamService>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    exams
        .ensure_can_manage(id, claims.user_id()?, claims.role)
        .await?;

    let key = exams.question_of_exam(id).await?;
    Ok(Json(key))
}

/// Retries the completion bookkeeping of an exam.
pub async fn complete_exam(
    State(exams): State<ExamService>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    exams
        .ensure_can_manage(id, claims.user_id()?, claims.role)
        .await?;

    let completed = exams.set_completed(id).await?;
    Ok(Json(json!({ "completed": completed })))
}
