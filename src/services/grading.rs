// src/services/grading.rs

use std::collections::HashMap;

use crate::models::exam::{AnswerKeyEntry, QuestionAnswer};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradeOutcome {
    /// The exam's question list with the student's selections filled in.
    pub question_answers: Vec<QuestionAnswer>,
    pub correct_count: usize,
    pub total_marks: i32,
    pub pass_status: bool,
}

/// Grades a submission against the answer key.
///
/// The result follows the key's question order. Selections for questions that are
/// not on the exam are ignored; if a question is answered twice the last selection
/// wins. A question whose correct option is unknown never scores.
pub fn grade(
    key: &[AnswerKeyEntry],
    submitted: &[QuestionAnswer],
    question_weightage: i32,
    cutoff_marks: i32,
) -> GradeOutcome {
    let selections: HashMap<i64, Option<i32>> = submitted
        .iter()
        .map(|qa| (qa.question_id, qa.selected_option))
        .collect();

    let mut correct_count = 0;
    let question_answers: Vec<QuestionAnswer> = key
        .iter()
        .map(|entry| {
            let selected_option = selections.get(&entry.question_id).copied().flatten();
            if selected_option.is_some() && selected_option == entry.correct_option {
                correct_count += 1;
            }
            QuestionAnswer {
                question_id: entry.question_id,
                selected_option,
            }
        })
        .collect();

    let total_marks = correct_count as i32 * question_weightage;

    GradeOutcome {
        question_answers,
        correct_count,
        total_marks,
        pass_status: total_marks >= cutoff_marks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(correct: &[(i64, i32)]) -> Vec<AnswerKeyEntry> {
        correct
            .iter()
            .map(|(id, opt)| AnswerKeyEntry {
                question_id: *id,
                correct_option: Some(*opt),
                selected_option: None,
            })
            .collect()
    }

    fn answer(question_id: i64, selected: i32) -> QuestionAnswer {
        QuestionAnswer {
            question_id,
            selected_option: Some(selected),
        }
    }

    #[test]
    fn test_grade_seven_of_ten_passes() {
        let key = key(&(1..=10).map(|id| (id, 2)).collect::<Vec<_>>());
        let submitted: Vec<QuestionAnswer> = (1..=10)
            .map(|id| answer(id, if id <= 7 { 2 } else { 3 }))
            .collect();

        let outcome = grade(&key, &submitted, 5, 30);
        assert_eq!(outcome.correct_count, 7);
        assert_eq!(outcome.total_marks, 35);
        assert!(outcome.pass_status);
    }

    #[test]
    fn test_grade_below_cutoff_fails() {
        let key = key(&[(1, 1), (2, 1), (3, 1)]);
        let submitted = vec![answer(1, 1), answer(2, 4), answer(3, 4)];

        let outcome = grade(&key, &submitted, 10, 20);
        assert_eq!(outcome.total_marks, 10);
        assert!(!outcome.pass_status);
    }

    #[test]
    fn test_grade_exact_cutoff_passes() {
        let key = key(&[(1, 1), (2, 2)]);
        let submitted = vec![answer(1, 1), answer(2, 2)];

        let outcome = grade(&key, &submitted, 5, 10);
        assert_eq!(outcome.total_marks, 10);
        assert!(outcome.pass_status);
    }

    #[test]
    fn test_grade_ignores_foreign_questions_and_keeps_key_order() {
        let key = key(&[(3, 1), (1, 2)]);
        let submitted = vec![answer(99, 1), answer(1, 2)];

        let outcome = grade(&key, &submitted, 4, 0);
        assert_eq!(outcome.correct_count, 1);
        assert_eq!(
            outcome.question_answers,
            vec![
                QuestionAnswer {
                    question_id: 3,
                    selected_option: None
                },
                answer(1, 2),
            ]
        );
    }

    #[test]
    fn test_grade_unknown_correct_option_never_scores() {
        let key = vec![AnswerKeyEntry {
            question_id: 1,
            correct_option: None,
            selected_option: None,
        }];
        let submitted = vec![QuestionAnswer {
            question_id: 1,
            selected_option: None,
        }];

        let outcome = grade(&key, &submitted, 5, 0);
        assert_eq!(outcome.correct_count, 0);
        assert_eq!(outcome.total_marks, 0);
    }
}
