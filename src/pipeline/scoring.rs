//! Key matching and scoring.
//!
//! Compares detected answers against an answer key, producing per-subject
//! and overall tallies. A question is correct iff the verdict is a single
//! selected option and that option is in the key's correct-set; none-marked
//! and ambiguous verdicts are always incorrect, never partially credited.
//! Questions without a key entry are reported in the answer set but excluded
//! from every tally. Key entries that do not match the resolved questions are
//! reported explicitly and excluded — never silently zeroed.

use std::collections::HashSet;

use crate::domain::answer::{AnswerSet, Verdict};
use crate::domain::key::{AnswerKey, KeyMismatch};
use crate::domain::score::{ScoreResult, SubjectScore};

/// Scores an answer set against a key.
///
/// Returns the tallies together with the structured, non-fatal list of key
/// inconsistencies (unknown question indices, out-of-range correct options).
/// Inconsistent questions are excluded from the tallies.
pub fn score_answers(answers: &AnswerSet, key: &AnswerKey) -> (ScoreResult, Vec<KeyMismatch>) {
    let mismatches = key.mismatches(answers.iter().map(|a| (a.question, a.option_count())));
    let excluded: HashSet<u32> = mismatches.iter().map(|m| m.question()).collect();

    let mut result = ScoreResult::default();
    for answer in answers.iter() {
        if excluded.contains(&answer.question) {
            continue;
        }
        let Some(correct_set) = key.correct_options(answer.question) else {
            continue;
        };

        let correct = matches!(answer.verdict, Verdict::Selected(option) if correct_set.contains(&option));
        let attempted = answer.verdict.is_marked();

        let subject = result
            .subjects
            .entry(answer.subject.clone())
            .or_insert_with(SubjectScore::default);
        subject.total += 1;
        result.total.total += 1;
        if attempted {
            subject.attempted += 1;
            result.total.attempted += 1;
        }
        if correct {
            subject.correct += 1;
            result.total.correct += 1;
        }
    }

    (result, mismatches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::answer::Answer;

    fn answer(question: u32, subject: &str, verdict: Verdict) -> Answer {
        Answer {
            question,
            subject: subject.to_string(),
            verdict,
            fills: vec![0.0; 4],
        }
    }

    fn sample_answers() -> AnswerSet {
        AnswerSet::new(vec![
            answer(0, "Python", Verdict::Selected(1)),
            answer(1, "Python", Verdict::Selected(2)),
            answer(2, "Python", Verdict::AmbiguousMultiple),
            answer(3, "EDA", Verdict::Selected(0)),
            answer(4, "EDA", Verdict::NoneMarked),
        ])
    }

    #[test]
    fn correct_iff_selected_option_is_in_key() {
        let key: AnswerKey = [(0, 1), (1, 3), (2, 0), (3, 0), (4, 2)].into_iter().collect();
        let (result, mismatches) = score_answers(&sample_answers(), &key);
        assert!(mismatches.is_empty());

        let python = result.subject("Python").unwrap();
        // Q0 correct, Q1 wrong option, Q2 ambiguous -> incorrect.
        assert_eq!(python.correct, 1);
        assert_eq!(python.attempted, 3);
        assert_eq!(python.total, 3);

        let eda = result.subject("EDA").unwrap();
        // Q3 correct, Q4 none-marked -> incorrect, not attempted.
        assert_eq!(eda.correct, 1);
        assert_eq!(eda.attempted, 1);
        assert_eq!(eda.total, 2);

        assert_eq!(result.total.correct, 2);
        assert_eq!(result.total.total, 5);
    }

    #[test]
    fn per_subject_corrects_sum_to_total() {
        let key: AnswerKey = [(0, 1), (1, 2), (3, 0), (4, 1)].into_iter().collect();
        let (result, _) = score_answers(&sample_answers(), &key);
        assert_eq!(result.subject_correct_sum(), result.total.correct);
        assert_eq!(
            result.subjects.values().map(|s| s.total).sum::<u32>(),
            result.total.total
        );
        assert_eq!(
            result.subjects.values().map(|s| s.attempted).sum::<u32>(),
            result.total.attempted
        );
    }

    #[test]
    fn multiple_correct_options_accept_any_member() {
        let mut key = AnswerKey::new();
        key.insert(0, 0);
        key.insert(0, 1);
        let answers = AnswerSet::new(vec![answer(0, "Python", Verdict::Selected(1))]);
        let (result, _) = score_answers(&answers, &key);
        assert_eq!(result.total.correct, 1);
    }

    #[test]
    fn ambiguous_never_credits_even_if_key_has_many_options() {
        let mut key = AnswerKey::new();
        key.insert(0, 0);
        key.insert(0, 1);
        let answers = AnswerSet::new(vec![answer(0, "Python", Verdict::AmbiguousMultiple)]);
        let (result, _) = score_answers(&answers, &key);
        assert_eq!(result.total.correct, 0);
        assert_eq!(result.total.attempted, 1);
    }

    #[test]
    fn unkeyed_questions_are_excluded_from_tallies() {
        let key: AnswerKey = [(0, 1)].into_iter().collect();
        let (result, mismatches) = score_answers(&sample_answers(), &key);
        assert!(mismatches.is_empty());
        assert_eq!(result.total.total, 1);
        assert!(result.subject("EDA").is_none());
    }

    #[test]
    fn unknown_key_question_is_reported_not_dropped() {
        let key: AnswerKey = [(0, 1), (99, 0)].into_iter().collect();
        let (result, mismatches) = score_answers(&sample_answers(), &key);
        assert_eq!(
            mismatches,
            vec![KeyMismatch::UnknownQuestion { question: 99 }]
        );
        assert_eq!(result.total.total, 1);
    }

    #[test]
    fn out_of_range_key_option_excludes_the_question() {
        let key: AnswerKey = [(0, 1), (1, 9)].into_iter().collect();
        let (result, mismatches) = score_answers(&sample_answers(), &key);
        assert_eq!(mismatches.len(), 1);
        assert!(matches!(
            mismatches[0],
            KeyMismatch::OptionOutOfRange { question: 1, .. }
        ));
        // Question 1 is excluded, question 0 still scored.
        assert_eq!(result.total.total, 1);
        assert_eq!(result.total.correct, 1);
    }

    #[test]
    fn empty_key_scores_nothing() {
        let (result, mismatches) = score_answers(&sample_answers(), &AnswerKey::new());
        assert!(mismatches.is_empty());
        assert_eq!(result.total, SubjectScore::default());
        assert!(result.subjects.is_empty());
    }
}
