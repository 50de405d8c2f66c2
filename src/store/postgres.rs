// src/store/postgres.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction, types::Json};

use crate::models::{
    exam::{
        Curation, Exam, NewExam, QuestionAnswer, Reward, SubmissionRecord, TimeDetails,
        apply_bulk_select, apply_curation,
    },
    question::{NewQuestion, Question},
    reference::{AgeGroup, Classification, NamedRef, ReferenceKind},
    user::UserSummary,
};
use crate::store::{
    CompletionStore, CompletionUnit, ExamStore, QuestionRepository, ReferenceData, StoreError,
    StoreResult, UserDirectory, distinct,
};

const EXAM_COLUMNS: &str = "\
    id, title, description, exam_type, difficulty_level, board_id, standard_id, subject_id, \
    topic_id, age_group_id, creator_id, assign_to, start_time, duration_minutes, end_time, \
    total_question_number, question_weightage, total_marks, cutoff_marks, reward, \
    question_answers, rejected_questions, total_mark_achieved, pass_status, attend_status, \
    is_exam_set_completed, created_at";

const QUESTION_COLUMNS: &str = "\
    id, prompt, options, correct_option, creator_id, is_public, total_clicked, exam_type, \
    difficulty_level, board_id, standard_id, subject_id, topic_id, age_group_id, status, created_at";

/// Row shape of the 'exams' table.
#[derive(Debug, FromRow)]
struct ExamRow {
    id: i64,
    title: String,
    description: String,
    exam_type: Option<String>,
    difficulty_level: Option<String>,
    board_id: Option<i64>,
    standard_id: Option<i64>,
    subject_id: Option<i64>,
    topic_id: Option<i64>,
    age_group_id: Option<i64>,
    creator_id: i64,
    assign_to: Vec<i64>,
    start_time: DateTime<Utc>,
    duration_minutes: i32,
    end_time: DateTime<Utc>,
    total_question_number: i32,
    question_weightage: i32,
    total_marks: i32,
    cutoff_marks: i32,
    reward: Option<Json<Reward>>,
    question_answers: Json<Vec<QuestionAnswer>>,
    rejected_questions: Vec<i64>,
    total_mark_achieved: Option<i32>,
    pass_status: Option<bool>,
    attend_status: Option<bool>,
    is_exam_set_completed: bool,
    created_at: Option<DateTime<Utc>>,
}

impl From<ExamRow> for Exam {
    fn from(row: ExamRow) -> Self {
        Exam {
            id: row.id,
            title: row.title,
            description: row.description,
            info: Classification {
                exam_type: row.exam_type,
                difficulty_level: row.difficulty_level,
                board_id: row.board_id,
                standard_id: row.standard_id,
                subject_id: row.subject_id,
                topic_id: row.topic_id,
                age_group_id: row.age_group_id,
            },
            creator_id: row.creator_id,
            assign_to: row.assign_to,
            // `end_time` is stored as computed at creation.
            time_details: TimeDetails {
                start: row.start_time,
                duration: row.duration_minutes,
                end: row.end_time,
            },
            total_question_number: row.total_question_number,
            question_weightage: row.question_weightage,
            total_marks: row.total_marks,
            cutoff_marks: row.cutoff_marks,
            reward: row.reward.map(|r| r.0),
            question_answers: row.question_answers.0,
            rejected_questions: row.rejected_questions,
            total_mark_achieved: row.total_mark_achieved,
            pass_status: row.pass_status,
            attend_status: row.attend_status,
            is_exam_set_completed: row.is_exam_set_completed,
            created_at: row.created_at,
        }
    }
}

/// Row shape of the 'questions' table.
#[derive(Debug, FromRow)]
struct QuestionRow {
    id: i64,
    prompt: String,
    options: Json<Vec<String>>,
    correct_option: i32,
    creator_id: i64,
    is_public: bool,
    total_clicked: i64,
    exam_type: Option<String>,
    difficulty_level: Option<String>,
    board_id: Option<i64>,
    standard_id: Option<i64>,
    subject_id: Option<i64>,
    topic_id: Option<i64>,
    age_group_id: Option<i64>,
    status: bool,
    created_at: Option<DateTime<Utc>>,
}

impl From<QuestionRow> for Question {
    fn from(row: QuestionRow) -> Self {
        Question {
            id: row.id,
            prompt: row.prompt,
            options: row.options.0,
            correct_option: row.correct_option,
            creator_id: row.creator_id,
            is_public: row.is_public,
            total_clicked: row.total_clicked,
            meta: Classification {
                exam_type: row.exam_type,
                difficulty_level: row.difficulty_level,
                board_id: row.board_id,
                standard_id: row.standard_id,
                subject_id: row.subject_id,
                topic_id: row.topic_id,
                age_group_id: row.age_group_id,
            },
            status: row.status,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: i64,
    role: String,
    first_name: String,
    last_name: String,
    email: String,
}

impl TryFrom<UserRow> for UserSummary {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = row
            .role
            .parse()
            .map_err(|e| StoreError::Backend(format!("user {}: {}", row.id, e)))?;
        Ok(UserSummary {
            id: row.id,
            role,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
        })
    }
}

/// PostgreSQL backend.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Rewrites both curation lists of one exam under a row lock.
    async fn rewrite_curation<F>(&self, exam_id: i64, apply: F) -> StoreResult<Option<Exam>>
    where
        F: FnOnce(&mut Vec<QuestionAnswer>, &mut Vec<i64>) + Send,
    {
        let mut tx = self.pool.begin().await?;

        let lists = sqlx::query_as::<_, (Json<Vec<QuestionAnswer>>, Vec<i64>)>(
            "SELECT question_answers, rejected_questions FROM exams WHERE id = $1 FOR UPDATE",
        )
        .bind(exam_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((Json(mut answers), mut rejected)) = lists else {
            return Ok(None);
        };

        apply(&mut answers, &mut rejected);

        let row = sqlx::query_as::<_, ExamRow>(&format!(
            "UPDATE exams
             SET question_answers = $2, rejected_questions = $3, updated_at = NOW()
             WHERE id = $1
             RETURNING {EXAM_COLUMNS}"
        ))
        .bind(exam_id)
        .bind(Json(&answers))
        .bind(&rejected)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(row.into()))
    }
}

#[async_trait]
impl ExamStore for PgStore {
    async fn insert_exam(&self, exam: NewExam) -> StoreResult<Exam> {
        let row = sqlx::query_as::<_, ExamRow>(&format!(
            "INSERT INTO exams (
                title, description, exam_type, difficulty_level, board_id, standard_id,
                subject_id, topic_id, age_group_id, creator_id, assign_to, start_time,
                duration_minutes, end_time, total_question_number, question_weightage,
                total_marks, cutoff_marks
             ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18)
             RETURNING {EXAM_COLUMNS}"
        ))
        .bind(&exam.title)
        .bind(&exam.description)
        .bind(&exam.info.exam_type)
        .bind(&exam.info.difficulty_level)
        .bind(exam.info.board_id)
        .bind(exam.info.standard_id)
        .bind(exam.info.subject_id)
        .bind(exam.info.topic_id)
        .bind(exam.info.age_group_id)
        .bind(exam.creator_id)
        .bind(distinct(&exam.assign_to))
        .bind(exam.time_details.start)
        .bind(exam.time_details.duration)
        .bind(exam.time_details.end)
        .bind(exam.total_question_number)
        .bind(exam.question_weightage)
        .bind(exam.total_marks)
        .bind(exam.cutoff_marks)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn find_exam(&self, exam_id: i64) -> StoreResult<Option<Exam>> {
        let row =
            sqlx::query_as::<_, ExamRow>(&format!("SELECT {EXAM_COLUMNS} FROM exams WHERE id = $1"))
                .bind(exam_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(Exam::from))
    }

    async fn set_reward(&self, exam_id: i64, reward: Reward) -> StoreResult<Option<Exam>> {
        let row = sqlx::query_as::<_, ExamRow>(&format!(
            "UPDATE exams SET reward = $2, updated_at = NOW() WHERE id = $1 RETURNING {EXAM_COLUMNS}"
        ))
        .bind(exam_id)
        .bind(Json(reward))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Exam::from))
    }

    async fn curate_question(
        &self,
        exam_id: i64,
        question_id: i64,
        decision: Curation,
    ) -> StoreResult<Option<Exam>> {
        self.rewrite_curation(exam_id, |answers, rejected| {
            apply_curation(answers, rejected, question_id, decision)
        })
        .await
    }

    async fn append_questions(
        &self,
        exam_id: i64,
        question_ids: &[i64],
    ) -> StoreResult<Option<Exam>> {
        let ids = question_ids.to_vec();
        self.rewrite_curation(exam_id, move |answers, rejected| {
            apply_bulk_select(answers, rejected, &ids)
        })
        .await
    }

    async fn add_student(&self, exam_id: i64, student_id: i64) -> StoreResult<Option<bool>> {
        // Single conditional update: concurrent assigns of the same student cannot both land.
        let result = sqlx::query(
            "UPDATE exams
             SET assign_to = array_append(assign_to, $2), updated_at = NOW()
             WHERE id = $1 AND NOT ($2 = ANY(assign_to))",
        )
        .bind(exam_id)
        .bind(student_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(Some(true));
        }

        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM exams WHERE id = $1)")
            .bind(exam_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(exists.then_some(false))
    }

    async fn remove_student(&self, exam_id: i64, student_id: i64) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE exams SET assign_to = array_remove(assign_to, $2), updated_at = NOW() WHERE id = $1",
        )
        .bind(exam_id)
        .bind(student_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn list_by_creator(&self, creator_id: i64) -> StoreResult<Vec<Exam>> {
        let rows = sqlx::query_as::<_, ExamRow>(&format!(
            "SELECT {EXAM_COLUMNS} FROM exams WHERE creator_id = $1 ORDER BY id DESC"
        ))
        .bind(creator_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Exam::from).collect())
    }

    async fn list_by_student(&self, student_id: i64) -> StoreResult<Vec<Exam>> {
        let rows = sqlx::query_as::<_, ExamRow>(&format!(
            "SELECT {EXAM_COLUMNS} FROM exams WHERE $1 = ANY(assign_to) ORDER BY start_time ASC"
        ))
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Exam::from).collect())
    }

    async fn record_submission(
        &self,
        exam_id: i64,
        submission: &SubmissionRecord,
    ) -> StoreResult<Option<Exam>> {
        let row = sqlx::query_as::<_, ExamRow>(&format!(
            "UPDATE exams
             SET question_answers = $2,
                 total_mark_achieved = $3,
                 pass_status = $4,
                 attend_status = $5,
                 updated_at = NOW()
             WHERE id = $1 AND NOT is_exam_set_completed
             RETURNING {EXAM_COLUMNS}"
        ))
        .bind(exam_id)
        .bind(Json(&submission.question_answers))
        .bind(submission.total_marks)
        .bind(submission.pass_status)
        .bind(submission.attend_status)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Exam::from))
    }

    async fn delete_exam(&self, exam_id: i64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM exams WHERE id = $1")
            .bind(exam_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl QuestionRepository for PgStore {
    async fn find_question(&self, question_id: i64) -> StoreResult<Option<Question>> {
        let row = sqlx::query_as::<_, QuestionRow>(&format!(
            "SELECT {QUESTION_COLUMNS} FROM questions WHERE id = $1"
        ))
        .bind(question_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Question::from))
    }

    async fn find_questions(&self, ids: &[i64]) -> StoreResult<Vec<Question>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, QuestionRow>(&format!(
            "SELECT {QUESTION_COLUMNS} FROM questions WHERE id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Question::from).collect())
    }

    async fn insert_question(&self, question: NewQuestion) -> StoreResult<Question> {
        let row = sqlx::query_as::<_, QuestionRow>(&format!(
            "INSERT INTO questions (
                prompt, options, correct_option, creator_id, is_public, exam_type,
                difficulty_level, board_id, standard_id, subject_id, topic_id, age_group_id
             ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12)
             RETURNING {QUESTION_COLUMNS}"
        ))
        .bind(&question.prompt)
        .bind(Json(&question.options))
        .bind(question.correct_option)
        .bind(question.creator_id)
        .bind(question.is_public)
        .bind(&question.meta.exam_type)
        .bind(&question.meta.difficulty_level)
        .bind(question.meta.board_id)
        .bind(question.meta.standard_id)
        .bind(question.meta.subject_id)
        .bind(question.meta.topic_id)
        .bind(question.meta.age_group_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn update_question(
        &self,
        question_id: i64,
        question: NewQuestion,
    ) -> StoreResult<Option<Question>> {
        let row = sqlx::query_as::<_, QuestionRow>(&format!(
            "UPDATE questions
             SET prompt = $2, options = $3, correct_option = $4, is_public = $5,
                 exam_type = $6, difficulty_level = $7, board_id = $8, standard_id = $9,
                 subject_id = $10, topic_id = $11, age_group_id = $12, updated_at = NOW()
             WHERE id = $1
             RETURNING {QUESTION_COLUMNS}"
        ))
        .bind(question_id)
        .bind(&question.prompt)
        .bind(Json(&question.options))
        .bind(question.correct_option)
        .bind(question.is_public)
        .bind(&question.meta.exam_type)
        .bind(&question.meta.difficulty_level)
        .bind(question.meta.board_id)
        .bind(question.meta.standard_id)
        .bind(question.meta.subject_id)
        .bind(question.meta.topic_id)
        .bind(question.meta.age_group_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Question::from))
    }

    async fn list_questions(&self) -> StoreResult<Vec<Question>> {
        let rows = sqlx::query_as::<_, QuestionRow>(&format!(
            "SELECT {QUESTION_COLUMNS} FROM questions ORDER BY id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Question::from).collect())
    }
}

#[async_trait]
impl UserDirectory for PgStore {
    async fn lookup_user(&self, user_id: i64) -> StoreResult<Option<UserSummary>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, role, first_name, last_name, email FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(UserSummary::try_from).transpose()
    }

    async fn is_email_exist(&self, email: &str) -> StoreResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE lower(email) = lower($1))")
                .bind(email)
                .fetch_one(&self.pool)
                .await?;

        Ok(exists)
    }
}

#[async_trait]
impl ReferenceData for PgStore {
    async fn lookup_named(&self, kind: ReferenceKind, id: i64) -> StoreResult<Option<NamedRef>> {
        let row = sqlx::query_as::<_, NamedRef>(&format!(
            "SELECT id, name FROM {} WHERE id = $1",
            kind.table()
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn lookup_age_group(&self, id: i64) -> StoreResult<Option<AgeGroup>> {
        let row = sqlx::query_as::<_, AgeGroup>(
            "SELECT id, start_age, end_age FROM age_groups WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }
}

/// Completion transaction backed by a single database transaction.
pub struct PgCompletion {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl CompletionUnit for PgCompletion {
    async fn load_exam(&mut self, exam_id: i64) -> StoreResult<Option<Exam>> {
        let row = sqlx::query_as::<_, ExamRow>(&format!(
            "SELECT {EXAM_COLUMNS} FROM exams WHERE id = $1 FOR UPDATE"
        ))
        .bind(exam_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(Exam::from))
    }

    async fn update_used_questions(
        &mut self,
        student_ids: &[i64],
        question_ids: &[i64],
    ) -> StoreResult<bool> {
        let students = distinct(student_ids);
        if students.is_empty() {
            return Ok(false);
        }

        let result = sqlx::query(
            "UPDATE users
             SET used_questions = ARRAY(
                 SELECT q
                 FROM unnest(used_questions || $2::BIGINT[]) WITH ORDINALITY AS t(q, n)
                 GROUP BY q
                 ORDER BY MIN(n)
             )
             WHERE id = ANY($1)",
        )
        .bind(&students)
        .bind(question_ids)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected() == students.len() as u64)
    }

    async fn update_click_multi_questions(&mut self, question_ids: &[i64]) -> StoreResult<bool> {
        let questions = distinct(question_ids);
        if questions.is_empty() {
            return Ok(true);
        }

        let result = sqlx::query(
            "UPDATE questions SET total_clicked = total_clicked + 1 WHERE id = ANY($1)",
        )
        .bind(&questions)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected() == questions.len() as u64)
    }

    async fn mark_completed(&mut self, exam_id: i64) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE exams
             SET is_exam_set_completed = TRUE, updated_at = NOW()
             WHERE id = $1 AND NOT is_exam_set_completed",
        )
        .bind(exam_id)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[async_trait]
impl CompletionStore for PgStore {
    async fn begin_completion(&self) -> StoreResult<Box<dyn CompletionUnit>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgCompletion { tx }))
    }
}
