// src/store/mod.rs

//! Storage seams used by the services.
//!
//! Each collaborator the exam lifecycle talks to is a trait here:
//! * [`ExamStore`] persists exam aggregates.
//! * [`QuestionRepository`] holds question content.
//! * [`UserDirectory`] identifies users.
//! * [`ReferenceData`] resolves classification ids to display records.
//! * [`CompletionStore`] opens the one multi-aggregate transaction the system needs.
//!
//! [`postgres::PgStore`] is the production backend; [`memory::MemoryStore`] keeps
//! everything in process.

pub mod memory;
pub mod postgres;

use std::fmt;

use async_trait::async_trait;

use crate::models::{
    exam::{Curation, Exam, NewExam, Reward, SubmissionRecord},
    question::{NewQuestion, Question},
    reference::{AgeGroup, NamedRef, ReferenceKind},
    user::UserSummary,
};

#[derive(Debug)]
pub enum StoreError {
    Database(sqlx::Error),
    Backend(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Database(e) => write!(f, "database error: {}", e),
            StoreError::Backend(msg) => write!(f, "storage backend error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Database(e) => Some(e),
            StoreError::Backend(_) => None,
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Database(err)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence for exam aggregates.
///
/// Methods addressing a single exam return `None`/`false` when it does not exist.
#[async_trait]
pub trait ExamStore: Send + Sync {
    async fn insert_exam(&self, exam: NewExam) -> StoreResult<Exam>;

    async fn find_exam(&self, exam_id: i64) -> StoreResult<Option<Exam>>;

    async fn set_reward(&self, exam_id: i64, reward: Reward) -> StoreResult<Option<Exam>>;

    /// Applies a curation decision atomically, keeping `question_answers` and
    /// `rejected_questions` disjoint.
    async fn curate_question(
        &self,
        exam_id: i64,
        question_id: i64,
        decision: Curation,
    ) -> StoreResult<Option<Exam>>;

    /// Appends selections in order, skipping ids already selected.
    async fn append_questions(
        &self,
        exam_id: i64,
        question_ids: &[i64],
    ) -> StoreResult<Option<Exam>>;

    /// Add-if-absent on `assign_to`, in one atomic step.
    /// `None`: no such exam. `Some(false)`: already assigned.
    async fn add_student(&self, exam_id: i64, student_id: i64) -> StoreResult<Option<bool>>;

    /// Removes the student if present. Returns `false` only when the exam is missing.
    async fn remove_student(&self, exam_id: i64, student_id: i64) -> StoreResult<bool>;

    async fn list_by_creator(&self, creator_id: i64) -> StoreResult<Vec<Exam>>;

    async fn list_by_student(&self, student_id: i64) -> StoreResult<Vec<Exam>>;

    /// Writes grading results unless the exam is already completed.
    /// `None` when the exam is missing or completed.
    async fn record_submission(
        &self,
        exam_id: i64,
        submission: &SubmissionRecord,
    ) -> StoreResult<Option<Exam>>;

    async fn delete_exam(&self, exam_id: i64) -> StoreResult<bool>;
}

#[async_trait]
pub trait QuestionRepository: Send + Sync {
    async fn find_question(&self, question_id: i64) -> StoreResult<Option<Question>>;

    /// Fetches the questions that exist among `ids`, in no particular order.
    async fn find_questions(&self, ids: &[i64]) -> StoreResult<Vec<Question>>;

    async fn insert_question(&self, question: NewQuestion) -> StoreResult<Question>;

    /// Replaces question content. The click counter is left untouched.
    async fn update_question(
        &self,
        question_id: i64,
        question: NewQuestion,
    ) -> StoreResult<Option<Question>>;

    async fn list_questions(&self) -> StoreResult<Vec<Question>>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn lookup_user(&self, user_id: i64) -> StoreResult<Option<UserSummary>>;

    async fn is_email_exist(&self, email: &str) -> StoreResult<bool>;
}

#[async_trait]
pub trait ReferenceData: Send + Sync {
    async fn lookup_named(&self, kind: ReferenceKind, id: i64) -> StoreResult<Option<NamedRef>>;

    async fn lookup_age_group(&self, id: i64) -> StoreResult<Option<AgeGroup>>;
}

/// One open completion transaction.
///
/// Nothing a unit does is visible outside it until [`CompletionUnit::commit`]. Dropping
/// a unit without committing discards its work.
#[async_trait]
pub trait CompletionUnit: Send {
    /// Reads the exam inside the transaction, locking it against concurrent completion.
    async fn load_exam(&mut self, exam_id: i64) -> StoreResult<Option<Exam>>;

    /// Adds `question_ids` to each student's used-question history.
    /// Returns `false` if any of the students is unknown.
    async fn update_used_questions(
        &mut self,
        student_ids: &[i64],
        question_ids: &[i64],
    ) -> StoreResult<bool>;

    /// Increments `total_clicked` once for each distinct question id.
    /// Returns `false` if any of the questions is unknown.
    async fn update_click_multi_questions(&mut self, question_ids: &[i64]) -> StoreResult<bool>;

    /// Flips `is_exam_set_completed` from false to true. Returns `false` if it was not false.
    async fn mark_completed(&mut self, exam_id: i64) -> StoreResult<bool>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;

    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}

#[async_trait]
pub trait CompletionStore: Send + Sync {
    async fn begin_completion(&self) -> StoreResult<Box<dyn CompletionUnit>>;
}

/// Everything the services need from a backend.
pub trait Store: ExamStore + QuestionRepository + UserDirectory + ReferenceData + CompletionStore {}

impl<T> Store for T where
    T: ExamStore + QuestionRepository + UserDirectory + ReferenceData + CompletionStore
{
}

/// Distinct ids in first-seen order.
pub(crate) fn distinct(ids: &[i64]) -> Vec<i64> {
    let mut out: Vec<i64> = Vec::with_capacity(ids.len());
    for id in ids {
        if !out.contains(id) {
            out.push(*id);
        }
    }
    out
}
