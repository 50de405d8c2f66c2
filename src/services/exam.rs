// src/services/exam.rs

use std::{collections::HashMap, sync::Arc};

use crate::{
    error::AppError,
    models::{
        exam::{
            AnswerKeyEntry, CreateExamRequest, Curation, Exam, ExamAnswerKey, NewExam,
            QuestionAnswer, Reward, RewardRequest, StudentExamDetails, StudentExamSummary,
            StudentQuestionSlot, SubmissionOutcome, SubmissionRecord,
        },
        question::{PublicQuestion, Question},
        user::{CreatorProfile, Role, UserSummary},
    },
    services::{classification, grading},
    store::{CompletionUnit, Store},
    utils::html::clean_html,
};

/// The exam lifecycle: creation, curation, assignment, submission and completion.
#[derive(Clone)]
pub struct ExamService {
    store: Arc<dyn Store>,
}

impl ExamService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    async fn find(&self, exam_id: i64) -> Result<Exam, AppError> {
        self.store
            .find_exam(exam_id)
            .await?
            .ok_or_else(|| AppError::exam_not_found(exam_id))
    }

    async fn ensure_student(&self, student_id: i64) -> Result<UserSummary, AppError> {
        let user = self
            .store
            .lookup_user(student_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Student {} not found", student_id)))?;

        if user.role != Role::Student {
            return Err(AppError::Validation(format!(
                "User {} is not a student",
                student_id
            )));
        }
        Ok(user)
    }

    async fn ensure_questions_exist(&self, question_ids: &[i64]) -> Result<(), AppError> {
        let found = self.store.find_questions(question_ids).await?;
        if let Some(missing) = question_ids
            .iter()
            .find(|id| !found.iter().any(|q| q.id == **id))
        {
            return Err(AppError::question_not_found(*missing));
        }
        Ok(())
    }

    async fn creator_profile(&self, creator_id: i64) -> Result<Option<CreatorProfile>, AppError> {
        Ok(self
            .store
            .lookup_user(creator_id)
            .await?
            .map(CreatorProfile::from))
    }

    async fn questions_by_id(&self, exam: &Exam) -> Result<HashMap<i64, Question>, AppError> {
        let questions = self.store.find_questions(&exam.question_ids()).await?;
        Ok(questions.into_iter().map(|q| (q.id, q)).collect())
    }

    /// Loads an exam the caller is about to change. Only its creator or an admin may.
    pub async fn ensure_can_manage(
        &self,
        exam_id: i64,
        user_id: i64,
        role: Role,
    ) -> Result<Exam, AppError> {
        let exam = self.find(exam_id).await?;
        if role != Role::Admin && exam.creator_id != user_id {
            return Err(AppError::Forbidden(
                "Only the exam's creator can manage it".to_string(),
            ));
        }
        Ok(exam)
    }

    /// Loads an exam a student is about to read or submit. It must be assigned to them.
    pub async fn ensure_assigned(&self, exam_id: i64, student_id: i64) -> Result<Exam, AppError> {
        let exam = self.find(exam_id).await?;
        if !exam.is_assigned(student_id) {
            return Err(AppError::Forbidden(
                "Exam is not assigned to this student".to_string(),
            ));
        }
        Ok(exam)
    }

    /// Creates an exam owned by `creator_id`. End time and total marks are derived here.
    pub async fn create_exam(
        &self,
        creator_id: i64,
        req: CreateExamRequest,
    ) -> Result<Exam, AppError> {
        let mut new_exam = NewExam::from_request(creator_id, &req);
        if new_exam.cutoff_marks > new_exam.total_marks {
            return Err(AppError::Validation(format!(
                "Cutoff marks {} exceed total marks {}",
                new_exam.cutoff_marks, new_exam.total_marks
            )));
        }
        if let Some(student_id) = req.student_id {
            self.ensure_student(student_id).await?;
        }
        new_exam.title = clean_html(&new_exam.title);
        new_exam.description = clean_html(&new_exam.description);

        let exam = self.store.insert_exam(new_exam).await.map_err(|e| {
            tracing::error!("Failed to create exam: {}", e);
            AppError::from(e)
        })?;

        tracing::info!(exam_id = exam.id, creator_id, "Exam created");
        Ok(exam)
    }

    /// Sets or replaces the exam's reward.
    pub async fn assign_reward(&self, exam_id: i64, req: RewardRequest) -> Result<Exam, AppError> {
        let reward = Reward {
            title: clean_html(&req.title),
            description: clean_html(&req.description),
            image_url: req.image_url,
        };

        self.store
            .set_reward(exam_id, reward)
            .await?
            .ok_or_else(|| AppError::exam_not_found(exam_id))
    }

    /// Records a select/reject decision for one question.
    pub async fn curate_question(
        &self,
        exam_id: i64,
        question_id: i64,
        is_selected: bool,
    ) -> Result<Exam, AppError> {
        self.store
            .find_question(question_id)
            .await?
            .ok_or_else(|| AppError::question_not_found(question_id))?;

        self.store
            .curate_question(exam_id, question_id, Curation::from(is_selected))
            .await?
            .ok_or_else(|| AppError::exam_not_found(exam_id))
    }

    /// Selects several questions at once.
    pub async fn add_questions_to_exam(
        &self,
        exam_id: i64,
        question_ids: Vec<i64>,
    ) -> Result<Exam, AppError> {
        self.ensure_questions_exist(&question_ids).await?;

        self.store
            .append_questions(exam_id, &question_ids)
            .await?
            .ok_or_else(|| AppError::exam_not_found(exam_id))
    }

    /// Assigns or unassigns a student.
    ///
    /// Assigning returns `false` when the student was already assigned. Unassigning
    /// always returns `true`, whether or not the student was assigned.
    pub async fn update_student_assigning(
        &self,
        exam_id: i64,
        student_id: i64,
        is_assigning: bool,
    ) -> Result<bool, AppError> {
        if is_assigning {
            self.ensure_student(student_id).await?;
            let added = self
                .store
                .add_student(exam_id, student_id)
                .await?
                .ok_or_else(|| AppError::exam_not_found(exam_id))?;

            if !added {
                tracing::debug!(exam_id, student_id, "Student already assigned");
            }
            Ok(added)
        } else {
            if !self.store.remove_student(exam_id, student_id).await? {
                return Err(AppError::exam_not_found(exam_id));
            }
            Ok(true)
        }
    }

    /// Full creator view of one exam.
    pub async fn exam_details(&self, exam_id: i64) -> Result<Exam, AppError> {
        self.find(exam_id).await
    }

    /// All exams created by `creator_id`.
    pub async fn list_for_parent(&self, creator_id: i64) -> Result<Vec<Exam>, AppError> {
        Ok(self.store.list_by_creator(creator_id).await?)
    }

    /// Exams assigned to a student, without grading data or the question list.
    pub async fn list_for_student(
        &self,
        student_id: i64,
    ) -> Result<Vec<StudentExamSummary>, AppError> {
        let exams = self.store.list_by_student(student_id).await?;

        let mut summaries = Vec::with_capacity(exams.len());
        for exam in exams {
            let info = classification::resolve(&*self.store, &exam.info).await?;
            let creator = self.creator_profile(exam.creator_id).await?;
            summaries.push(StudentExamSummary {
                id: exam.id,
                title: exam.title,
                description: exam.description,
                info,
                creator,
                assign_to: exam.assign_to,
                time_details: exam.time_details,
                total_question_number: exam.total_question_number,
                total_marks: exam.total_marks,
                cutoff_marks: exam.cutoff_marks,
                reward: exam.reward,
                rejected_questions: exam.rejected_questions,
                attend_status: exam.attend_status,
            });
        }
        Ok(summaries)
    }

    /// One exam as a student sees it: prompts and options, never correct options.
    pub async fn exam_details_for_student(
        &self,
        exam_id: i64,
    ) -> Result<StudentExamDetails, AppError> {
        let exam = self.find(exam_id).await?;
        let info = classification::resolve(&*self.store, &exam.info).await?;
        let creator = self.creator_profile(exam.creator_id).await?;
        let mut questions = self.questions_by_id(&exam).await?;

        let question_answers = exam
            .question_answers
            .iter()
            .map(|qa| StudentQuestionSlot {
                question: questions.remove(&qa.question_id).map(PublicQuestion::from),
                selected_option: qa.selected_option,
            })
            .collect();

        Ok(StudentExamDetails {
            id: exam.id,
            title: exam.title,
            description: exam.description,
            info,
            creator,
            time_details: exam.time_details,
            total_question_number: exam.total_question_number,
            total_marks: exam.total_marks,
            cutoff_marks: exam.cutoff_marks,
            reward: exam.reward,
            question_answers,
            rejected_questions: exam.rejected_questions,
            total_mark_achieved: exam.total_mark_achieved,
            attend_status: exam.attend_status,
        })
    }

    /// The exam with each question reduced to its correct option. Not for students.
    pub async fn question_of_exam(&self, exam_id: i64) -> Result<ExamAnswerKey, AppError> {
        let exam = self.find(exam_id).await?;
        self.answer_key_for(&exam).await
    }

    async fn answer_key_for(&self, exam: &Exam) -> Result<ExamAnswerKey, AppError> {
        let questions = self.questions_by_id(exam).await?;

        let question_answers = exam
            .question_answers
            .iter()
            .map(|qa| AnswerKeyEntry {
                question_id: qa.question_id,
                correct_option: questions.get(&qa.question_id).map(|q| q.correct_option),
                selected_option: qa.selected_option,
            })
            .collect();

        Ok(ExamAnswerKey {
            exam_id: exam.id,
            creator_id: exam.creator_id,
            question_weightage: exam.question_weightage,
            total_marks: exam.total_marks,
            cutoff_marks: exam.cutoff_marks,
            is_exam_set_completed: exam.is_exam_set_completed,
            question_answers,
        })
    }

    /// Persists a graded submission. Grading itself is the caller's job.
    ///
    /// A completed exam is read-only: writing to it is a `Conflict`.
    pub async fn update_exam_for_student(
        &self,
        exam_id: i64,
        submission: SubmissionRecord,
    ) -> Result<Exam, AppError> {
        if let Some(exam) = self.store.record_submission(exam_id, &submission).await? {
            return Ok(exam);
        }

        match self.store.find_exam(exam_id).await? {
            Some(_) => Err(AppError::Conflict("Exam is already completed".to_string())),
            None => Err(AppError::exam_not_found(exam_id)),
        }
    }

    /// Grades a student's answers, stores the result and completes the exam.
    pub async fn submit_answers(
        &self,
        exam_id: i64,
        student_id: i64,
        answers: Vec<QuestionAnswer>,
    ) -> Result<SubmissionOutcome, AppError> {
        let exam = self.ensure_assigned(exam_id, student_id).await?;
        if exam.is_exam_set_completed {
            return Err(AppError::Conflict("Exam is already completed".to_string()));
        }

        let key = self.answer_key_for(&exam).await?;
        let outcome = grading::grade(
            &key.question_answers,
            &answers,
            exam.question_weightage,
            exam.cutoff_marks,
        );

        self.update_exam_for_student(
            exam_id,
            SubmissionRecord {
                question_answers: outcome.question_answers,
                total_marks: outcome.total_marks,
                pass_status: outcome.pass_status,
                attend_status: true,
            },
        )
        .await?;

        tracing::info!(
            exam_id,
            student_id,
            total_marks = outcome.total_marks,
            pass_status = outcome.pass_status,
            "Exam submission graded"
        );

        let completed = self.set_completed(exam_id).await?;

        Ok(SubmissionOutcome {
            exam_id,
            correct_count: outcome.correct_count,
            total_mark_achieved: outcome.total_marks,
            pass_status: outcome.pass_status,
            completed,
        })
    }

    /// Completes an exam: appends its questions to every assignee's used-question
    /// history, bumps each question's click counter and sets the completion flag, all
    /// in one transaction.
    ///
    /// Returns `Ok(false)` when the transaction was aborted; nothing was changed and
    /// the call can be retried. Completing an already completed exam returns `Ok(true)`
    /// and changes nothing. A missing exam is `NotFound`.
    pub async fn set_completed(&self, exam_id: i64) -> Result<bool, AppError> {
        let mut unit = match self.store.begin_completion().await {
            Ok(unit) => unit,
            Err(e) => {
                tracing::error!(exam_id, "Failed to start completion transaction: {}", e);
                return Ok(false);
            }
        };
        tracing::debug!(exam_id, "Completion transaction started");

        let exam = match unit.load_exam(exam_id).await {
            Ok(Some(exam)) => exam,
            Ok(None) => {
                abort(unit, exam_id).await;
                return Err(AppError::exam_not_found(exam_id));
            }
            Err(e) => {
                tracing::error!(exam_id, "Failed to load exam for completion: {}", e);
                abort(unit, exam_id).await;
                return Ok(false);
            }
        };

        if exam.is_exam_set_completed {
            abort(unit, exam_id).await;
            tracing::info!(exam_id, "Exam already completed");
            return Ok(true);
        }

        if let Err(e) = apply_completion(unit.as_mut(), &exam).await {
            tracing::error!(exam_id, "Completion aborted: {}", e);
            abort(unit, exam_id).await;
            return Ok(false);
        }

        if let Err(e) = unit.commit().await {
            tracing::error!(exam_id, "Failed to commit completion: {}", e);
            return Ok(false);
        }

        tracing::info!(
            exam_id,
            questions = exam.question_answers.len(),
            students = exam.assign_to.len(),
            "Exam completed"
        );
        Ok(true)
    }

    /// Hard delete. Referenced questions are shared and stay untouched.
    pub async fn delete(&self, exam_id: i64) -> Result<(), AppError> {
        if !self.store.delete_exam(exam_id).await? {
            return Err(AppError::exam_not_found(exam_id));
        }
        tracing::info!(exam_id, "Exam deleted");
        Ok(())
    }
}

async fn apply_completion(unit: &mut dyn CompletionUnit, exam: &Exam) -> Result<(), AppError> {
    let question_ids = exam.question_ids();

    if !unit
        .update_used_questions(&exam.assign_to, &question_ids)
        .await?
    {
        return Err(AppError::Transaction(
            "failed to update used questions".to_string(),
        ));
    }

    if !unit.update_click_multi_questions(&question_ids).await? {
        return Err(AppError::Transaction("failed to update clicks".to_string()));
    }

    if !unit.mark_completed(exam.id).await? {
        return Err(AppError::Transaction(
            "failed to mark exam completed".to_string(),
        ));
    }

    Ok(())
}

async fn abort(unit: Box<dyn CompletionUnit>, exam_id: i64) {
    if let Err(e) = unit.rollback().await {
        tracing::warn!(exam_id, "Rollback of completion transaction failed: {}", e);
    }
}
