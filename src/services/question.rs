// src/services/question.rs

use std::sync::Arc;

use crate::{
    error::AppError,
    models::{
        question::{NewQuestion, Question, QuestionDetails, QuestionRequest},
        user::Role,
    },
    services::classification,
    store::Store,
    utils::html::clean_html,
};

/// Question content management.
#[derive(Clone)]
pub struct QuestionService {
    store: Arc<dyn Store>,
}

impl QuestionService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    fn build(author_id: i64, role: Role, req: &QuestionRequest) -> Result<NewQuestion, AppError> {
        if !req.correct_option_in_range() {
            return Err(AppError::Validation(format!(
                "correct_option {} does not match any of the {} options",
                req.correct_option,
                req.options.len()
            )));
        }

        Ok(NewQuestion {
            prompt: clean_html(&req.question),
            options: req.options.iter().map(|o| clean_html(o)).collect(),
            correct_option: req.correct_option,
            creator_id: author_id,
            is_public: role.publishes_questions(),
            meta: req.classification(),
        })
    }

    async fn details(&self, question: Question) -> Result<QuestionDetails, AppError> {
        let resolved_meta = classification::resolve(&*self.store, &question.meta).await?;
        Ok(QuestionDetails {
            question,
            resolved_meta,
        })
    }

    pub async fn create_question(
        &self,
        author_id: i64,
        role: Role,
        req: QuestionRequest,
    ) -> Result<Question, AppError> {
        let new_question = Self::build(author_id, role, &req)?;
        let question = self.store.insert_question(new_question).await?;

        tracing::info!(question_id = question.id, author_id, "Question created");
        Ok(question)
    }

    /// Replaces a question's content. Only its creator or an admin may.
    /// Visibility follows the editor's role; the click counter is preserved.
    pub async fn update_question(
        &self,
        question_id: i64,
        editor_id: i64,
        role: Role,
        req: QuestionRequest,
    ) -> Result<Question, AppError> {
        let existing = self
            .store
            .find_question(question_id)
            .await?
            .ok_or_else(|| AppError::question_not_found(question_id))?;

        if role != Role::Admin && existing.creator_id != editor_id {
            return Err(AppError::Forbidden(
                "Only the question's creator can edit it".to_string(),
            ));
        }

        let mut new_question = Self::build(editor_id, role, &req)?;
        new_question.creator_id = existing.creator_id;

        self.store
            .update_question(question_id, new_question)
            .await?
            .ok_or_else(|| AppError::question_not_found(question_id))
    }

    pub async fn get_question_details(&self, question_id: i64) -> Result<QuestionDetails, AppError> {
        let question = self
            .store
            .find_question(question_id)
            .await?
            .ok_or_else(|| AppError::question_not_found(question_id))?;

        self.details(question).await
    }

    pub async fn question_list(&self) -> Result<Vec<QuestionDetails>, AppError> {
        let questions = self.store.list_questions().await?;

        let mut list = Vec::with_capacity(questions.len());
        for question in questions {
            list.push(self.details(question).await?);
        }
        Ok(list)
    }
}
