// src/models/question.rs

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::reference::{Classification, ResolvedInfo};

/// Largest number of options a question may carry.
pub const MAX_OPTIONS: usize = 4;

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,

    /// The text content of the question.
    pub prompt: String,

    /// Options in display order. Option numbers are 1-based.
    pub options: Vec<String>,

    /// 1-based number of the correct option.
    pub correct_option: i32,

    pub creator_id: i64,

    /// True only for questions authored by an admin or creator.
    pub is_public: bool,

    /// How many completed exams have used this question. Only grows.
    pub total_clicked: i64,

    pub meta: Classification,

    pub status: bool,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Question as shown to a student (no correct option).
#[derive(Debug, Clone, Serialize)]
pub struct PublicQuestion {
    pub id: i64,
    pub prompt: String,
    pub options: Vec<String>,
}

impl From<Question> for PublicQuestion {
    fn from(q: Question) -> Self {
        Self {
            id: q.id,
            prompt: q.prompt,
            options: q.options,
        }
    }
}

/// Question with its classification resolved for display.
#[derive(Debug, Serialize)]
pub struct QuestionDetails {
    #[serde(flatten)]
    pub question: Question,
    pub resolved_meta: ResolvedInfo,
}

/// Insert/update payload handed to the question repository.
#[derive(Debug, Clone)]
pub struct NewQuestion {
    pub prompt: String,
    pub options: Vec<String>,
    pub correct_option: i32,
    pub creator_id: i64,
    pub is_public: bool,
    pub meta: Classification,
}

/// DTO for creating or replacing a question.
#[derive(Debug, Deserialize, Validate)]
pub struct QuestionRequest {
    #[validate(length(min = 1, max = 1000))]
    pub question: String,
    #[validate(custom(function = validate_options))]
    pub options: Vec<String>,
    #[validate(range(min = 1, max = 4))]
    pub correct_option: i32,
    #[validate(length(max = 50))]
    pub exam_type: Option<String>,
    pub board_id: Option<i64>,
    pub standard_id: Option<i64>,
    pub subject_id: Option<i64>,
    pub topic_id: Option<i64>,
    pub age_group_id: Option<i64>,
    #[validate(length(max = 50))]
    pub difficulty_level: Option<String>,
}

impl QuestionRequest {
    pub fn classification(&self) -> Classification {
        Classification {
            exam_type: self.exam_type.clone(),
            difficulty_level: self.difficulty_level.clone(),
            board_id: self.board_id,
            standard_id: self.standard_id,
            subject_id: self.subject_id,
            topic_id: self.topic_id,
            age_group_id: self.age_group_id,
        }
    }

    /// The correct option must point at one of the supplied options.
    pub fn correct_option_in_range(&self) -> bool {
        self.correct_option >= 1 && (self.correct_option as usize) <= self.options.len()
    }
}

fn validate_options(options: &[String]) -> Result<(), validator::ValidationError> {
    if options.is_empty() {
        return Err(validator::ValidationError::new("options_cannot_be_empty"));
    }
    if options.len() > MAX_OPTIONS {
        return Err(validator::ValidationError::new("too_many_options"));
    }
    for opt in options {
        if opt.trim().is_empty() {
            return Err(validator::ValidationError::new("option_cannot_be_blank"));
        }
        if opt.len() > 500 {
            return Err(validator::ValidationError::new("option_too_long"));
        }
    }
    Ok(())
}
