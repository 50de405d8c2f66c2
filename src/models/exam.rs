// src/models/exam.rs

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use url::Url;
use validator::Validate;

use crate::models::{
    question::PublicQuestion,
    reference::{Classification, ResolvedInfo},
    user::CreatorProfile,
};

/// Scheduling window. `end` is derived once at creation and never rewritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeDetails {
    pub start: DateTime<Utc>,
    /// Minutes.
    pub duration: i32,
    pub end: DateTime<Utc>,
}

impl TimeDetails {
    pub fn new(start: DateTime<Utc>, duration_minutes: i32) -> Self {
        Self {
            start,
            duration: duration_minutes,
            end: start + Duration::minutes(i64::from(duration_minutes)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reward {
    pub title: String,
    pub description: String,
    pub image_url: String,
}

/// One slot of the exam's question list. `selected_option` is filled on submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionAnswer {
    pub question_id: i64,
    #[serde(default)]
    pub selected_option: Option<i32>,
}

impl QuestionAnswer {
    pub fn unanswered(question_id: i64) -> Self {
        Self {
            question_id,
            selected_option: None,
        }
    }
}

/// A creator's decision about a candidate question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Curation {
    Select,
    Reject,
}

impl From<bool> for Curation {
    fn from(is_selected: bool) -> Self {
        if is_selected {
            Curation::Select
        } else {
            Curation::Reject
        }
    }
}

/// Represents the 'exams' table in the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exam {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub info: Classification,
    pub creator_id: i64,
    /// Set of assigned student ids; never holds duplicates.
    pub assign_to: Vec<i64>,
    pub time_details: TimeDetails,
    pub total_question_number: i32,
    pub question_weightage: i32,
    pub total_marks: i32,
    pub cutoff_marks: i32,
    pub reward: Option<Reward>,
    pub question_answers: Vec<QuestionAnswer>,
    pub rejected_questions: Vec<i64>,
    pub total_mark_achieved: Option<i32>,
    pub pass_status: Option<bool>,
    pub attend_status: Option<bool>,
    pub is_exam_set_completed: bool,
    pub created_at: Option<DateTime<Utc>>,
}

impl Exam {
    /// Question ids in list order.
    pub fn question_ids(&self) -> Vec<i64> {
        self.question_answers.iter().map(|qa| qa.question_id).collect()
    }

    pub fn is_assigned(&self, student_id: i64) -> bool {
        self.assign_to.contains(&student_id)
    }
}

/// Insert payload for a new exam, with derived fields already computed.
#[derive(Debug, Clone)]
pub struct NewExam {
    pub title: String,
    pub description: String,
    pub info: Classification,
    pub creator_id: i64,
    pub assign_to: Vec<i64>,
    pub time_details: TimeDetails,
    pub total_question_number: i32,
    pub question_weightage: i32,
    pub total_marks: i32,
    pub cutoff_marks: i32,
}

impl NewExam {
    pub fn from_request(creator_id: i64, req: &CreateExamRequest) -> Self {
        Self {
            title: req.title.clone(),
            description: req.description.clone(),
            info: req.classification(),
            creator_id,
            assign_to: req.student_id.into_iter().collect(),
            time_details: TimeDetails::new(req.start_time, req.duration),
            total_question_number: req.total_question_number,
            question_weightage: req.question_weightage,
            total_marks: req.total_question_number * req.question_weightage,
            cutoff_marks: req.cutoff_marks,
        }
    }
}

/// Grading results written by `update_exam_for_student`.
#[derive(Debug, Clone)]
pub struct SubmissionRecord {
    pub question_answers: Vec<QuestionAnswer>,
    pub total_marks: i32,
    pub pass_status: bool,
    pub attend_status: bool,
}

/// Selecting moves a question into `answers` and out of `rejected`; rejecting does the
/// reverse. Repeating a decision leaves both lists unchanged.
pub fn apply_curation(
    answers: &mut Vec<QuestionAnswer>,
    rejected: &mut Vec<i64>,
    question_id: i64,
    decision: Curation,
) {
    match decision {
        Curation::Select => {
            rejected.retain(|id| *id != question_id);
            if !answers.iter().any(|qa| qa.question_id == question_id) {
                answers.push(QuestionAnswer::unanswered(question_id));
            }
        }
        Curation::Reject => {
            answers.retain(|qa| qa.question_id != question_id);
            if !rejected.contains(&question_id) {
                rejected.push(question_id);
            }
        }
    }
}

/// Bulk selection, preserving the given order and skipping ids already selected.
pub fn apply_bulk_select(
    answers: &mut Vec<QuestionAnswer>,
    rejected: &mut Vec<i64>,
    question_ids: &[i64],
) {
    for id in question_ids {
        apply_curation(answers, rejected, *id, Curation::Select);
    }
}

// ---------------------------------------------------------------------------
// Request DTOs
// ---------------------------------------------------------------------------

/// DTO for creating an exam.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateExamRequest {
    /// Optional first assignee.
    pub student_id: Option<i64>,
    #[validate(length(min = 1, max = 50))]
    pub exam_type: String,
    #[validate(length(min = 1, max = 50))]
    pub difficulty_level: String,
    pub board_id: Option<i64>,
    pub standard_id: Option<i64>,
    pub subject_id: Option<i64>,
    pub topic_id: Option<i64>,
    pub age_group_id: Option<i64>,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 2000))]
    #[serde(default)]
    pub description: String,
    pub start_time: DateTime<Utc>,
    /// Minutes.
    #[validate(range(min = 1, max = 1440))]
    pub duration: i32,
    #[validate(range(min = 1, max = 500))]
    pub total_question_number: i32,
    #[validate(range(min = 1, max = 100))]
    pub question_weightage: i32,
    #[validate(range(min = 0))]
    pub cutoff_marks: i32,
}

impl CreateExamRequest {
    pub fn classification(&self) -> Classification {
        Classification {
            exam_type: Some(self.exam_type.clone()),
            difficulty_level: Some(self.difficulty_level.clone()),
            board_id: self.board_id,
            standard_id: self.standard_id,
            subject_id: self.subject_id,
            topic_id: self.topic_id,
            age_group_id: self.age_group_id,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RewardRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 2000))]
    #[serde(default)]
    pub description: String,
    #[validate(length(min = 1, max = 500), custom(function = validate_url_string))]
    pub image_url: String,
}

/// Validates that a string is a correctly formatted URL.
fn validate_url_string(url: &str) -> Result<(), validator::ValidationError> {
    if Url::parse(url).is_err() {
        return Err(validator::ValidationError::new("invalid_url"));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct CurateQuestionRequest {
    pub question_id: i64,
    pub is_selected: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddQuestionsRequest {
    #[validate(length(min = 1, max = 500))]
    pub question_ids: Vec<i64>,
}

#[derive(Debug, Deserialize)]
pub struct StudentAssignmentRequest {
    pub student_id: i64,
    pub is_assigning: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitAnswersRequest {
    #[validate(length(min = 1, max = 500))]
    pub answers: Vec<QuestionAnswer>,
}

// ---------------------------------------------------------------------------
// Projections
// ---------------------------------------------------------------------------

/// Exam as listed for a student: classification resolved, grading fields and
/// the question list left out.
#[derive(Debug, Serialize)]
pub struct StudentExamSummary {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub info: ResolvedInfo,
    pub creator: Option<CreatorProfile>,
    pub assign_to: Vec<i64>,
    pub time_details: TimeDetails,
    pub total_question_number: i32,
    pub total_marks: i32,
    pub cutoff_marks: i32,
    pub reward: Option<Reward>,
    pub rejected_questions: Vec<i64>,
    pub attend_status: Option<bool>,
}

/// A question slot as a student sees it: prompt and options only.
/// `question` is `None` when the referenced question no longer exists.
#[derive(Debug, Serialize)]
pub struct StudentQuestionSlot {
    pub question: Option<PublicQuestion>,
    pub selected_option: Option<i32>,
}

/// Single exam as a student sees it. Carries no correct options, pass status,
/// completion flag, weightage or assignee list.
#[derive(Debug, Serialize)]
pub struct StudentExamDetails {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub info: ResolvedInfo,
    pub creator: Option<CreatorProfile>,
    pub time_details: TimeDetails,
    pub total_question_number: i32,
    pub total_marks: i32,
    pub cutoff_marks: i32,
    pub reward: Option<Reward>,
    pub question_answers: Vec<StudentQuestionSlot>,
    pub rejected_questions: Vec<i64>,
    pub total_mark_achieved: Option<i32>,
    pub attend_status: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnswerKeyEntry {
    pub question_id: i64,
    /// `None` when the referenced question no longer exists.
    pub correct_option: Option<i32>,
    pub selected_option: Option<i32>,
}

/// Exam with each question reduced to its correct option. Used for grading.
#[derive(Debug, Clone, Serialize)]
pub struct ExamAnswerKey {
    pub exam_id: i64,
    pub creator_id: i64,
    pub question_weightage: i32,
    pub total_marks: i32,
    pub cutoff_marks: i32,
    pub is_exam_set_completed: bool,
    pub question_answers: Vec<AnswerKeyEntry>,
}

/// Result of a student's submission.
#[derive(Debug, Serialize)]
pub struct SubmissionOutcome {
    pub exam_id: i64,
    pub correct_count: usize,
    pub total_mark_achieved: i32,
    pub pass_status: bool,
    /// False when the completion bookkeeping did not commit; safe to retry.
    pub completed: bool,
}
