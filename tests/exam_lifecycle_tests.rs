// tests/exam_lifecycle_tests.rs

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use exam_backend::{
    error::AppError,
    models::{
        exam::{CreateExamRequest, Exam, QuestionAnswer, RewardRequest, SubmissionRecord},
        question::QuestionRequest,
        reference::ReferenceKind,
        user::{Role, UserSummary},
    },
    services::{exam::ExamService, question::QuestionService},
    store::memory::{FailPoint, MemoryStore},
};

const CREATOR: i64 = 1;
const STUDENT: i64 = 2;
const OTHER_STUDENT: i64 = 3;
const PARENT: i64 = 4;

struct Fixture {
    store: MemoryStore,
    exams: ExamService,
    questions: QuestionService,
}

fn user(id: i64, role: Role, first_name: &str) -> UserSummary {
    UserSummary {
        id,
        role,
        first_name: first_name.to_string(),
        last_name: "Tester".to_string(),
        email: format!("{}@example.com", first_name.to_lowercase()),
    }
}

async fn setup() -> Fixture {
    let store = MemoryStore::new();
    store.add_user(user(CREATOR, Role::Creator, "Carla")).await;
    store.add_user(user(STUDENT, Role::Student, "Sam")).await;
    store.add_user(user(OTHER_STUDENT, Role::Student, "Tia")).await;
    store.add_user(user(PARENT, Role::Parent, "Pat")).await;
    store.add_reference(ReferenceKind::Board, 1, "CBSE").await;
    store.add_reference(ReferenceKind::Subject, 3, "Mathematics").await;

    let shared = Arc::new(store.clone());
    Fixture {
        exams: ExamService::new(shared.clone()),
        questions: QuestionService::new(shared),
        store,
    }
}

fn exam_request(student_id: Option<i64>) -> CreateExamRequest {
    CreateExamRequest {
        student_id,
        exam_type: "practice".to_string(),
        difficulty_level: "easy".to_string(),
        board_id: Some(1),
        standard_id: None,
        subject_id: Some(3),
        topic_id: None,
        age_group_id: None,
        title: "Fractions".to_string(),
        description: "Weekly check".to_string(),
        start_time: Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
        duration: 90,
        total_question_number: 10,
        question_weightage: 5,
        cutoff_marks: 30,
    }
}

fn question_request(n: usize, correct_option: i32) -> QuestionRequest {
    QuestionRequest {
        question: format!("What is {} + {}?", n, n),
        options: vec![
            format!("{}", n),
            format!("{}", 2 * n),
            format!("{}", 3 * n),
            format!("{}", 4 * n),
        ],
        correct_option,
        exam_type: Some("practice".to_string()),
        board_id: Some(1),
        standard_id: None,
        subject_id: Some(3),
        topic_id: None,
        age_group_id: None,
        difficulty_level: Some("easy".to_string()),
    }
}

/// Creates `count` questions whose correct option is always 2.
async fn seed_questions(fx: &Fixture, count: usize) -> Vec<i64> {
    let mut ids = Vec::with_capacity(count);
    for n in 1..=count {
        let q = fx
            .questions
            .create_question(CREATOR, Role::Creator, question_request(n, 2))
            .await
            .unwrap();
        ids.push(q.id);
    }
    ids
}

/// An exam with ten selected questions, assigned to `STUDENT`.
async fn ready_exam(fx: &Fixture) -> (Exam, Vec<i64>) {
    let question_ids = seed_questions(fx, 10).await;
    let exam = fx
        .exams
        .create_exam(CREATOR, exam_request(Some(STUDENT)))
        .await
        .unwrap();
    let exam = fx
        .exams
        .add_questions_to_exam(exam.id, question_ids.clone())
        .await
        .unwrap();
    (exam, question_ids)
}

async fn clicks(fx: &Fixture, question_ids: &[i64]) -> Vec<i64> {
    let mut out = Vec::new();
    for id in question_ids {
        let details = fx.questions.get_question_details(*id).await.unwrap();
        out.push(details.question.total_clicked);
    }
    out
}

#[tokio::test]
async fn create_exam_derives_end_time_and_total_marks() {
    let fx = setup().await;

    let exam = fx
        .exams
        .create_exam(CREATOR, exam_request(Some(STUDENT)))
        .await
        .unwrap();

    assert_eq!(exam.total_marks, 50);
    assert_eq!(
        exam.time_details.end,
        Utc.with_ymd_and_hms(2026, 3, 1, 10, 30, 0).unwrap()
    );
    assert_eq!(exam.assign_to, vec![STUDENT]);
    assert!(!exam.is_exam_set_completed);
    assert!(exam.question_answers.is_empty());
}

#[tokio::test]
async fn create_exam_rejects_cutoff_above_total() {
    let fx = setup().await;
    let mut req = exam_request(None);
    req.cutoff_marks = 51;

    let result = fx.exams.create_exam(CREATOR, req).await;
    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn create_exam_requires_a_student_assignee() {
    let fx = setup().await;

    let result = fx.exams.create_exam(CREATOR, exam_request(Some(PARENT))).await;
    assert!(matches!(result, Err(AppError::Validation(_))));

    let result = fx.exams.create_exam(CREATOR, exam_request(Some(99))).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn assigning_is_add_if_absent() {
    let fx = setup().await;
    let exam = fx.exams.create_exam(CREATOR, exam_request(None)).await.unwrap();

    assert!(
        fx.exams
            .update_student_assigning(exam.id, STUDENT, true)
            .await
            .unwrap()
    );
    assert!(
        !fx.exams
            .update_student_assigning(exam.id, STUDENT, true)
            .await
            .unwrap()
    );

    let exam = fx.exams.exam_details(exam.id).await.unwrap();
    assert_eq!(exam.assign_to, vec![STUDENT]);
}

#[tokio::test]
async fn unassigning_always_succeeds_on_an_existing_exam() {
    let fx = setup().await;
    let exam = fx
        .exams
        .create_exam(CREATOR, exam_request(Some(STUDENT)))
        .await
        .unwrap();

    assert!(
        fx.exams
            .update_student_assigning(exam.id, STUDENT, false)
            .await
            .unwrap()
    );
    // Not assigned any more, still reported as success.
    assert!(
        fx.exams
            .update_student_assigning(exam.id, STUDENT, false)
            .await
            .unwrap()
    );

    let exam = fx.exams.exam_details(exam.id).await.unwrap();
    assert!(exam.assign_to.is_empty());
}

#[tokio::test]
async fn curation_keeps_selected_and_rejected_disjoint() {
    let fx = setup().await;
    let ids = seed_questions(&fx, 2).await;
    let exam = fx.exams.create_exam(CREATOR, exam_request(None)).await.unwrap();

    let exam_after = fx.exams.curate_question(exam.id, ids[0], true).await.unwrap();
    assert_eq!(exam_after.question_ids(), vec![ids[0]]);

    // Selecting twice does not duplicate.
    let exam_after = fx.exams.curate_question(exam.id, ids[0], true).await.unwrap();
    assert_eq!(exam_after.question_ids(), vec![ids[0]]);

    let exam_after = fx.exams.curate_question(exam.id, ids[0], false).await.unwrap();
    assert!(exam_after.question_answers.is_empty());
    assert_eq!(exam_after.rejected_questions, vec![ids[0]]);

    fx.exams.curate_question(exam.id, ids[1], false).await.unwrap();
    let exam_after = fx.exams.curate_question(exam.id, ids[1], true).await.unwrap();
    assert_eq!(exam_after.question_ids(), vec![ids[1]]);
    assert_eq!(exam_after.rejected_questions, vec![ids[0]]);
}

#[tokio::test]
async fn curating_unknown_question_is_not_found() {
    let fx = setup().await;
    let exam = fx.exams.create_exam(CREATOR, exam_request(None)).await.unwrap();

    let result = fx.exams.curate_question(exam.id, 404, true).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));

    let result = fx.exams.add_questions_to_exam(exam.id, vec![404]).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn submission_grades_and_completes_the_exam() {
    let fx = setup().await;
    let (exam, question_ids) = ready_exam(&fx).await;

    // Seven correct answers (option 2), three wrong.
    let answers: Vec<QuestionAnswer> = question_ids
        .iter()
        .enumerate()
        .map(|(i, id)| QuestionAnswer {
            question_id: *id,
            selected_option: Some(if i < 7 { 2 } else { 1 }),
        })
        .collect();

    let outcome = fx
        .exams
        .submit_answers(exam.id, STUDENT, answers)
        .await
        .unwrap();

    assert_eq!(outcome.correct_count, 7);
    assert_eq!(outcome.total_mark_achieved, 35);
    assert!(outcome.pass_status);
    assert!(outcome.completed);

    let exam = fx.exams.exam_details(exam.id).await.unwrap();
    assert_eq!(exam.total_mark_achieved, Some(35));
    assert_eq!(exam.pass_status, Some(true));
    assert_eq!(exam.attend_status, Some(true));
    assert!(exam.is_exam_set_completed);
    assert_eq!(exam.question_answers[0].selected_option, Some(2));

    assert_eq!(clicks(&fx, &question_ids).await, vec![1; 10]);
    assert_eq!(fx.store.used_questions(STUDENT).await, question_ids);
}

#[tokio::test]
async fn submitting_twice_is_a_conflict() {
    let fx = setup().await;
    let (exam, question_ids) = ready_exam(&fx).await;
    let answers = vec![QuestionAnswer {
        question_id: question_ids[0],
        selected_option: Some(2),
    }];

    let outcome = fx
        .exams
        .submit_answers(exam.id, STUDENT, answers.clone())
        .await
        .unwrap();
    assert_eq!(outcome.total_mark_achieved, 5);
    assert!(!outcome.pass_status);

    let result = fx.exams.submit_answers(exam.id, STUDENT, answers).await;
    assert!(matches!(result, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn unassigned_student_cannot_submit() {
    let fx = setup().await;
    let (exam, question_ids) = ready_exam(&fx).await;

    let result = fx
        .exams
        .submit_answers(exam.id, OTHER_STUDENT, vec![QuestionAnswer::unanswered(question_ids[0])])
        .await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));
}

#[tokio::test]
async fn failed_completion_changes_nothing_and_can_be_retried() {
    let fx = setup().await;
    let (exam, question_ids) = ready_exam(&fx).await;
    fx.exams
        .update_student_assigning(exam.id, OTHER_STUDENT, true)
        .await
        .unwrap();

    fx.store.fail_at(FailPoint::ClickCounts).await;
    assert!(!fx.exams.set_completed(exam.id).await.unwrap());

    // The used-question step ran before the failure and must have been rolled back.
    assert!(fx.store.used_questions(STUDENT).await.is_empty());
    assert!(fx.store.used_questions(OTHER_STUDENT).await.is_empty());
    assert_eq!(clicks(&fx, &question_ids).await, vec![0; 10]);
    assert!(!fx.exams.exam_details(exam.id).await.unwrap().is_exam_set_completed);

    fx.store.clear_failures().await;
    assert!(fx.exams.set_completed(exam.id).await.unwrap());

    assert_eq!(fx.store.used_questions(STUDENT).await, question_ids);
    assert_eq!(fx.store.used_questions(OTHER_STUDENT).await, question_ids);
    assert_eq!(clicks(&fx, &question_ids).await, vec![1; 10]);
    assert!(fx.exams.exam_details(exam.id).await.unwrap().is_exam_set_completed);
}

#[tokio::test]
async fn commit_and_begin_failures_report_false() {
    let fx = setup().await;
    let (exam, question_ids) = ready_exam(&fx).await;

    fx.store.fail_at(FailPoint::Begin).await;
    assert!(!fx.exams.set_completed(exam.id).await.unwrap());
    fx.store.clear_failures().await;

    fx.store.fail_at(FailPoint::Commit).await;
    assert!(!fx.exams.set_completed(exam.id).await.unwrap());
    fx.store.clear_failures().await;

    assert_eq!(clicks(&fx, &question_ids).await, vec![0; 10]);
    assert!(!fx.exams.exam_details(exam.id).await.unwrap().is_exam_set_completed);
}

#[tokio::test]
async fn completing_twice_counts_clicks_once() {
    let fx = setup().await;
    let (exam, question_ids) = ready_exam(&fx).await;

    assert!(fx.exams.set_completed(exam.id).await.unwrap());
    assert!(fx.exams.set_completed(exam.id).await.unwrap());

    assert_eq!(clicks(&fx, &question_ids).await, vec![1; 10]);
    assert_eq!(fx.store.used_questions(STUDENT).await, question_ids);
}

#[tokio::test]
async fn completing_without_assignees_fails() {
    let fx = setup().await;
    let exam = fx.exams.create_exam(CREATOR, exam_request(None)).await.unwrap();

    assert!(!fx.exams.set_completed(exam.id).await.unwrap());
    assert!(!fx.exams.exam_details(exam.id).await.unwrap().is_exam_set_completed);
}

#[tokio::test]
async fn student_view_hides_answers_and_grading() {
    let fx = setup().await;
    let (exam, question_ids) = ready_exam(&fx).await;

    let details = fx.exams.exam_details_for_student(exam.id).await.unwrap();
    assert_eq!(details.question_answers.len(), question_ids.len());
    assert_eq!(details.creator.as_ref().unwrap().first_name, "Carla");
    assert_eq!(details.info.board.as_ref().unwrap().name, "CBSE");
    assert_eq!(details.info.subject.as_ref().unwrap().name, "Mathematics");
    assert!(details.info.standard.is_none());

    let json = serde_json::to_value(&details).unwrap();
    let text = json.to_string();
    assert!(!text.contains("correct_option"));
    assert!(json.get("pass_status").is_none());
    assert!(json.get("assign_to").is_none());
    assert!(json.get("is_exam_set_completed").is_none());
    assert!(json.get("question_weightage").is_none());
}

#[tokio::test]
async fn student_listing_omits_question_list() {
    let fx = setup().await;
    let (exam, _) = ready_exam(&fx).await;

    let list = fx.exams.list_for_student(STUDENT).await.unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].id, exam.id);

    let json = serde_json::to_value(&list[0]).unwrap();
    assert!(json.get("question_answers").is_none());
    assert!(json.get("pass_status").is_none());

    assert!(fx.exams.list_for_student(OTHER_STUDENT).await.unwrap().is_empty());
}

#[tokio::test]
async fn answer_key_carries_correct_options() {
    let fx = setup().await;
    let (exam, question_ids) = ready_exam(&fx).await;

    let key = fx.exams.question_of_exam(exam.id).await.unwrap();
    assert_eq!(key.question_answers.len(), question_ids.len());
    assert!(key.question_answers.iter().all(|e| e.correct_option == Some(2)));
    assert_eq!(key.question_weightage, 5);
}

#[tokio::test]
async fn missing_exam_is_not_found() {
    let fx = setup().await;

    assert!(matches!(
        fx.exams.exam_details(999).await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        fx.exams.set_completed(999).await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        fx.exams.update_student_assigning(999, STUDENT, false).await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        fx.exams.update_student_assigning(999, STUDENT, true).await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(fx.exams.delete(999).await, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn only_creator_or_admin_manages_an_exam() {
    let fx = setup().await;
    let exam = fx.exams.create_exam(CREATOR, exam_request(None)).await.unwrap();

    assert!(fx.exams.ensure_can_manage(exam.id, CREATOR, Role::Creator).await.is_ok());
    assert!(fx.exams.ensure_can_manage(exam.id, 77, Role::Admin).await.is_ok());
    assert!(matches!(
        fx.exams.ensure_can_manage(exam.id, PARENT, Role::Parent).await,
        Err(AppError::Forbidden(_))
    ));
}

#[tokio::test]
async fn parent_questions_are_private() {
    let fx = setup().await;

    let public = fx
        .questions
        .create_question(CREATOR, Role::Creator, question_request(1, 1))
        .await
        .unwrap();
    let private = fx
        .questions
        .create_question(PARENT, Role::Parent, question_request(2, 1))
        .await
        .unwrap();

    assert!(public.is_public);
    assert!(!private.is_public);
    assert_eq!(public.total_clicked, 0);
}

#[tokio::test]
async fn correct_option_must_match_an_option() {
    let fx = setup().await;
    let mut req = question_request(1, 3);
    req.options.truncate(2);

    let result = fx.questions.create_question(CREATOR, Role::Creator, req).await;
    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn deleting_an_exam_keeps_its_questions() {
    let fx = setup().await;
    let (exam, question_ids) = ready_exam(&fx).await;

    fx.exams.delete(exam.id).await.unwrap();

    assert!(matches!(
        fx.exams.exam_details(exam.id).await,
        Err(AppError::NotFound(_))
    ));
    assert!(fx.questions.get_question_details(question_ids[0]).await.is_ok());
}

async fn assert_completion_untouched(fx: &Fixture, exam_id: i64, question_ids: &[i64]) {
    assert!(fx.store.used_questions(STUDENT).await.is_empty());
    assert_eq!(clicks(fx, question_ids).await, vec![0; question_ids.len()]);
    assert!(!fx.exams.exam_details(exam_id).await.unwrap().is_exam_set_completed);
}

#[tokio::test]
async fn used_questions_failure_leaves_clicks_unchanged() {
    let fx = setup().await;
    let (exam, question_ids) = ready_exam(&fx).await;

    fx.store.fail_at(FailPoint::UsedQuestions).await;
    assert!(!fx.exams.set_completed(exam.id).await.unwrap());

    assert_completion_untouched(&fx, exam.id, &question_ids).await;
}

#[tokio::test]
async fn flag_failure_rolls_back_history_and_clicks() {
    let fx = setup().await;
    let (exam, question_ids) = ready_exam(&fx).await;

    fx.store.fail_at(FailPoint::MarkCompleted).await;
    assert!(!fx.exams.set_completed(exam.id).await.unwrap());

    assert_completion_untouched(&fx, exam.id, &question_ids).await;

    fx.store.clear_failures().await;
    assert!(fx.exams.set_completed(exam.id).await.unwrap());
    assert_eq!(clicks(&fx, &question_ids).await, vec![1; 10]);
}

#[tokio::test]
async fn completed_exam_rejects_new_grades() {
    let fx = setup().await;
    let (exam, question_ids) = ready_exam(&fx).await;
    assert!(fx.exams.set_completed(exam.id).await.unwrap());

    let record = SubmissionRecord {
        question_answers: question_ids
            .iter()
            .map(|id| QuestionAnswer {
                question_id: *id,
                selected_option: Some(2),
            })
            .collect(),
        total_marks: 50,
        pass_status: true,
        attend_status: true,
    };

    let result = fx.exams.update_exam_for_student(exam.id, record.clone()).await;
    assert!(matches!(result, Err(AppError::Conflict(_))));

    let stored = fx.exams.exam_details(exam.id).await.unwrap();
    assert_eq!(stored.total_mark_achieved, None);
    assert_eq!(stored.pass_status, None);
    assert!(stored.question_answers.iter().all(|qa| qa.selected_option.is_none()));

    let result = fx.exams.update_exam_for_student(999, record).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

fn reward_request(title: &str) -> RewardRequest {
    RewardRequest {
        title: title.to_string(),
        description: "For a perfect score".to_string(),
        image_url: "https://example.com/badge.png".to_string(),
    }
}

#[tokio::test]
async fn reward_is_set_replaced_and_sanitised() {
    let fx = setup().await;
    let exam = fx.exams.create_exam(CREATOR, exam_request(None)).await.unwrap();
    assert!(exam.reward.is_none());

    let exam = fx
        .exams
        .assign_reward(exam.id, reward_request("<b>Gold</b><script>alert(1)</script>"))
        .await
        .unwrap();
    let reward = exam.reward.unwrap();
    assert_eq!(reward.title, "<b>Gold</b>");
    assert_eq!(reward.image_url, "https://example.com/badge.png");

    let exam = fx
        .exams
        .assign_reward(exam.id, reward_request("Silver"))
        .await
        .unwrap();
    assert_eq!(exam.reward.unwrap().title, "Silver");

    let result = fx.exams.assign_reward(999, reward_request("Bronze")).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn parent_listing_is_scoped_to_the_creator() {
    let fx = setup().await;
    let first = fx.exams.create_exam(CREATOR, exam_request(None)).await.unwrap();
    let second = fx.exams.create_exam(CREATOR, exam_request(None)).await.unwrap();
    let foreign = fx.exams.create_exam(PARENT, exam_request(None)).await.unwrap();

    let ids: Vec<i64> = fx
        .exams
        .list_for_parent(CREATOR)
        .await
        .unwrap()
        .iter()
        .map(|exam| exam.id)
        .collect();
    assert_eq!(ids, vec![second.id, first.id]);

    let ids: Vec<i64> = fx
        .exams
        .list_for_parent(PARENT)
        .await
        .unwrap()
        .iter()
        .map(|exam| exam.id)
        .collect();
    assert_eq!(ids, vec![foreign.id]);

    assert!(fx.exams.list_for_parent(STUDENT).await.unwrap().is_empty());
}

#[tokio::test]
async fn question_update_keeps_owner_and_clicks() {
    let fx = setup().await;
    let (exam, question_ids) = ready_exam(&fx).await;
    assert!(fx.exams.set_completed(exam.id).await.unwrap());
    let id = question_ids[0];

    let mut req = question_request(1, 3);
    req.question = "What is 1 + 1, really?".to_string();
    let updated = fx
        .questions
        .update_question(id, CREATOR, Role::Creator, req)
        .await
        .unwrap();
    assert_eq!(updated.prompt, "What is 1 + 1, really?");
    assert_eq!(updated.correct_option, 3);
    assert_eq!(updated.total_clicked, 1);
    assert_eq!(updated.creator_id, CREATOR);

    // Admins may edit someone else's question; ownership stays put.
    let updated = fx
        .questions
        .update_question(id, 77, Role::Admin, question_request(1, 1))
        .await
        .unwrap();
    assert_eq!(updated.creator_id, CREATOR);
    assert_eq!(updated.total_clicked, 1);

    let result = fx
        .questions
        .update_question(id, PARENT, Role::Parent, question_request(1, 1))
        .await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));

    let result = fx
        .questions
        .update_question(999, CREATOR, Role::Creator, question_request(1, 1))
        .await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}
