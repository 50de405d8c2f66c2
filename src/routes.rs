// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method},
    middleware,
    routing::{get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{exam, question, student, user},
    state::AppState,
    utils::jwt::{auth_middleware, author_middleware, student_middleware},
};

/// Assembles the main application router.
///
/// * Author routes (exams, questions) require an admin, creator or parent token.
/// * Student routes require a student token.
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://127.0.0.1:3000"),
        ])
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let exam_routes = Router::new()
        .route("/", get(exam::list_my_exams).post(exam::create_exam))
        .route("/{id}", get(exam::get_exam).delete(exam::delete_exam))
        .route("/{id}/reward", put(exam::assign_reward))
        .route("/{id}/curation", post(exam::curate_question))
        .route("/{id}/questions", post(exam::add_questions))
        .route("/{id}/students", put(exam::update_student_assigning))
        .route("/{id}/answer-key", get(exam::answer_key))
        .route("/{id}/complete", post(exam::complete_exam))
        // Auth first, then role check
        .layer(middleware::from_fn(author_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let question_routes = Router::new()
        .route(
            "/",
            get(question::list_questions).post(question::create_question),
        )
        .route(
            "/{id}",
            get(question::get_question).put(question::update_question),
        )
        .layer(middleware::from_fn(author_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let student_routes = Router::new()
        .route("/", get(student::list_assigned))
        .route("/{id}", get(student::get_assigned_exam))
        .route("/{id}/submit", post(student::submit_answers))
        .layer(middleware::from_fn(student_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let user_routes = Router::new().route("/email-exists", post(user::check_email));

    Router::new()
        .nest("/api/exams", exam_routes)
        .nest("/api/questions", question_routes)
        .nest("/api/student/exams", student_routes)
        .nest("/api/users", user_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
