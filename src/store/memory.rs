// src/store/memory.rs

//! In-process backend.
//!
//! All data lives behind one async mutex. A completion unit holds that lock for its
//! whole lifetime and works on a copy of the state, so commit is a single swap and
//! rollback is a drop.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::Arc,
};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::models::{
    exam::{Curation, Exam, NewExam, Reward, SubmissionRecord, apply_bulk_select, apply_curation},
    question::{NewQuestion, Question},
    reference::{AgeGroup, NamedRef, ReferenceKind},
    user::UserSummary,
};
use crate::store::{
    CompletionStore, CompletionUnit, ExamStore, QuestionRepository, ReferenceData, StoreError,
    StoreResult, UserDirectory, distinct,
};

/// Points where a failure can be forced, for exercising the completion rollback paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    /// `begin_completion` errors.
    Begin,
    /// `update_used_questions` reports failure.
    UsedQuestions,
    /// `update_click_multi_questions` reports failure.
    ClickCounts,
    /// `mark_completed` reports failure.
    MarkCompleted,
    /// `commit` errors.
    Commit,
}

#[derive(Debug, Clone)]
struct StoredUser {
    summary: UserSummary,
    used_questions: Vec<i64>,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    exams: BTreeMap<i64, Exam>,
    questions: BTreeMap<i64, Question>,
    users: BTreeMap<i64, StoredUser>,
    named: HashMap<(ReferenceKind, i64), NamedRef>,
    age_groups: HashMap<i64, AgeGroup>,
    next_exam_id: i64,
    next_question_id: i64,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    failures: Arc<Mutex<HashSet<FailPoint>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_user(&self, user: UserSummary) {
        let mut state = self.state.lock().await;
        state.users.insert(
            user.id,
            StoredUser {
                summary: user,
                used_questions: Vec::new(),
            },
        );
    }

    pub async fn add_reference(&self, kind: ReferenceKind, id: i64, name: &str) {
        let mut state = self.state.lock().await;
        state.named.insert(
            (kind, id),
            NamedRef {
                id,
                name: name.to_string(),
            },
        );
    }

    pub async fn add_age_group(&self, group: AgeGroup) {
        let mut state = self.state.lock().await;
        state.age_groups.insert(group.id, group);
    }

    /// Used-question history of a user, empty for unknown users.
    pub async fn used_questions(&self, user_id: i64) -> Vec<i64> {
        let state = self.state.lock().await;
        state
            .users
            .get(&user_id)
            .map(|u| u.used_questions.clone())
            .unwrap_or_default()
    }

    /// Makes every later call through `point` fail until cleared.
    pub async fn fail_at(&self, point: FailPoint) {
        self.failures.lock().await.insert(point);
    }

    pub async fn clear_failures(&self) {
        self.failures.lock().await.clear();
    }

    async fn update_exam<F>(&self, exam_id: i64, apply: F) -> Option<Exam>
    where
        F: FnOnce(&mut Exam),
    {
        let mut state = self.state.lock().await;
        let exam = state.exams.get_mut(&exam_id)?;
        apply(exam);
        Some(exam.clone())
    }
}

#[async_trait]
impl ExamStore for MemoryStore {
    async fn insert_exam(&self, exam: NewExam) -> StoreResult<Exam> {
        let mut state = self.state.lock().await;
        state.next_exam_id += 1;
        let id = state.next_exam_id;

        let exam = Exam {
            id,
            title: exam.title,
            description: exam.description,
            info: exam.info,
            creator_id: exam.creator_id,
            assign_to: distinct(&exam.assign_to),
            time_details: exam.time_details,
            total_question_number: exam.total_question_number,
            question_weightage: exam.question_weightage,
            total_marks: exam.total_marks,
            cutoff_marks: exam.cutoff_marks,
            reward: None,
            question_answers: Vec::new(),
            rejected_questions: Vec::new(),
            total_mark_achieved: None,
            pass_status: None,
            attend_status: None,
            is_exam_set_completed: false,
            created_at: Some(Utc::now()),
        };
        state.exams.insert(id, exam.clone());
        Ok(exam)
    }

    async fn find_exam(&self, exam_id: i64) -> StoreResult<Option<Exam>> {
        Ok(self.state.lock().await.exams.get(&exam_id).cloned())
    }

    async fn set_reward(&self, exam_id: i64, reward: Reward) -> StoreResult<Option<Exam>> {
        Ok(self
            .update_exam(exam_id, |exam| exam.reward = Some(reward))
            .await)
    }

    async fn curate_question(
        &self,
        exam_id: i64,
        question_id: i64,
        decision: Curation,
    ) -> StoreResult<Option<Exam>> {
        Ok(self
            .update_exam(exam_id, |exam| {
                apply_curation(
                    &mut exam.question_answers,
                    &mut exam.rejected_questions,
                    question_id,
                    decision,
                )
            })
            .await)
    }

    async fn append_questions(
        &self,
        exam_id: i64,
        question_ids: &[i64],
    ) -> StoreResult<Option<Exam>> {
        Ok(self
            .update_exam(exam_id, |exam| {
                apply_bulk_select(
                    &mut exam.question_answers,
                    &mut exam.rejected_questions,
                    question_ids,
                )
            })
            .await)
    }

    async fn add_student(&self, exam_id: i64, student_id: i64) -> StoreResult<Option<bool>> {
        let mut state = self.state.lock().await;
        let Some(exam) = state.exams.get_mut(&exam_id) else {
            return Ok(None);
        };
        if exam.assign_to.contains(&student_id) {
            return Ok(Some(false));
        }
        exam.assign_to.push(student_id);
        Ok(Some(true))
    }

    async fn remove_student(&self, exam_id: i64, student_id: i64) -> StoreResult<bool> {
        Ok(self
            .update_exam(exam_id, |exam| exam.assign_to.retain(|id| *id != student_id))
            .await
            .is_some())
    }

    async fn list_by_creator(&self, creator_id: i64) -> StoreResult<Vec<Exam>> {
        let state = self.state.lock().await;
        Ok(state
            .exams
            .values()
            .rev()
            .filter(|exam| exam.creator_id == creator_id)
            .cloned()
            .collect())
    }

    async fn list_by_student(&self, student_id: i64) -> StoreResult<Vec<Exam>> {
        let state = self.state.lock().await;
        let mut exams: Vec<Exam> = state
            .exams
            .values()
            .filter(|exam| exam.is_assigned(student_id))
            .cloned()
            .collect();
        exams.sort_by_key(|exam| exam.time_details.start);
        Ok(exams)
    }

    async fn record_submission(
        &self,
        exam_id: i64,
        submission: &SubmissionRecord,
    ) -> StoreResult<Option<Exam>> {
        let mut state = self.state.lock().await;
        let Some(exam) = state.exams.get_mut(&exam_id) else {
            return Ok(None);
        };
        if exam.is_exam_set_completed {
            return Ok(None);
        }
        exam.question_answers = submission.question_answers.clone();
        exam.total_mark_achieved = Some(submission.total_marks);
        exam.pass_status = Some(submission.pass_status);
        exam.attend_status = Some(submission.attend_status);
        Ok(Some(exam.clone()))
    }

    async fn delete_exam(&self, exam_id: i64) -> StoreResult<bool> {
        Ok(self.state.lock().await.exams.remove(&exam_id).is_some())
    }
}

#[async_trait]
impl QuestionRepository for MemoryStore {
    async fn find_question(&self, question_id: i64) -> StoreResult<Option<Question>> {
        Ok(self.state.lock().await.questions.get(&question_id).cloned())
    }

    async fn find_questions(&self, ids: &[i64]) -> StoreResult<Vec<Question>> {
        let state = self.state.lock().await;
        Ok(distinct(ids)
            .into_iter()
            .filter_map(|id| state.questions.get(&id).cloned())
            .collect())
    }

    async fn insert_question(&self, question: NewQuestion) -> StoreResult<Question> {
        let mut state = self.state.lock().await;
        state.next_question_id += 1;
        let id = state.next_question_id;

        let question = Question {
            id,
            prompt: question.prompt,
            options: question.options,
            correct_option: question.correct_option,
            creator_id: question.creator_id,
            is_public: question.is_public,
            total_clicked: 0,
            meta: question.meta,
            status: false,
            created_at: Some(Utc::now()),
        };
        state.questions.insert(id, question.clone());
        Ok(question)
    }

    async fn update_question(
        &self,
        question_id: i64,
        question: NewQuestion,
    ) -> StoreResult<Option<Question>> {
        let mut state = self.state.lock().await;
        let Some(existing) = state.questions.get_mut(&question_id) else {
            return Ok(None);
        };
        existing.prompt = question.prompt;
        existing.options = question.options;
        existing.correct_option = question.correct_option;
        existing.is_public = question.is_public;
        existing.meta = question.meta;
        Ok(Some(existing.clone()))
    }

    async fn list_questions(&self) -> StoreResult<Vec<Question>> {
        let state = self.state.lock().await;
        Ok(state.questions.values().rev().cloned().collect())
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn lookup_user(&self, user_id: i64) -> StoreResult<Option<UserSummary>> {
        let state = self.state.lock().await;
        Ok(state.users.get(&user_id).map(|u| u.summary.clone()))
    }

    async fn is_email_exist(&self, email: &str) -> StoreResult<bool> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .values()
            .any(|u| u.summary.email.eq_ignore_ascii_case(email)))
    }
}

#[async_trait]
impl ReferenceData for MemoryStore {
    async fn lookup_named(&self, kind: ReferenceKind, id: i64) -> StoreResult<Option<NamedRef>> {
        Ok(self.state.lock().await.named.get(&(kind, id)).cloned())
    }

    async fn lookup_age_group(&self, id: i64) -> StoreResult<Option<AgeGroup>> {
        Ok(self.state.lock().await.age_groups.get(&id).cloned())
    }
}

/// Completion unit over a private copy of the state.
pub struct MemoryCompletion {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
    failures: HashSet<FailPoint>,
}

impl MemoryCompletion {
    fn should_fail(&self, point: FailPoint) -> bool {
        self.failures.contains(&point)
    }
}

#[async_trait]
impl CompletionUnit for MemoryCompletion {
    async fn load_exam(&mut self, exam_id: i64) -> StoreResult<Option<Exam>> {
        Ok(self.working.exams.get(&exam_id).cloned())
    }

    async fn update_used_questions(
        &mut self,
        student_ids: &[i64],
        question_ids: &[i64],
    ) -> StoreResult<bool> {
        let students = distinct(student_ids);
        if self.should_fail(FailPoint::UsedQuestions) || students.is_empty() {
            return Ok(false);
        }
        if !students.iter().all(|id| self.working.users.contains_key(id)) {
            return Ok(false);
        }

        for id in students {
            if let Some(user) = self.working.users.get_mut(&id) {
                for question_id in question_ids {
                    if !user.used_questions.contains(question_id) {
                        user.used_questions.push(*question_id);
                    }
                }
            }
        }
        Ok(true)
    }

    async fn update_click_multi_questions(&mut self, question_ids: &[i64]) -> StoreResult<bool> {
        if self.should_fail(FailPoint::ClickCounts) {
            return Ok(false);
        }
        let questions = distinct(question_ids);
        if !questions
            .iter()
            .all(|id| self.working.questions.contains_key(id))
        {
            return Ok(false);
        }

        for id in questions {
            if let Some(question) = self.working.questions.get_mut(&id) {
                question.total_clicked += 1;
            }
        }
        Ok(true)
    }

    async fn mark_completed(&mut self, exam_id: i64) -> StoreResult<bool> {
        if self.should_fail(FailPoint::MarkCompleted) {
            return Ok(false);
        }
        match self.working.exams.get_mut(&exam_id) {
            Some(exam) if !exam.is_exam_set_completed => {
                exam.is_exam_set_completed = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        if self.should_fail(FailPoint::Commit) {
            return Err(StoreError::Backend("commit failed".to_string()));
        }
        let MemoryCompletion {
            mut guard, working, ..
        } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        Ok(())
    }
}

#[async_trait]
impl CompletionStore for MemoryStore {
    async fn begin_completion(&self) -> StoreResult<Box<dyn CompletionUnit>> {
        let failures = self.failures.lock().await.clone();
        if failures.contains(&FailPoint::Begin) {
            return Err(StoreError::Backend("could not start transaction".to_string()));
        }

        let guard = self.state.clone().lock_owned().await;
        let working = MemoryState::clone(&guard);
        Ok(Box::new(MemoryCompletion {
            guard,
            working,
            failures,
        }))
    }
}
