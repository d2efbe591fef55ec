use std::collections::HashSet;

use dskg_common::GradedSubmission;

/// Fraction of the coursework's questions answered exactly right.
///
/// Unanswered questions count as wrong and a repeated answer to the same
/// question counts once. A quiz without questions scores 0.
pub fn quiz_score(submission: &GradedSubmission) -> f64 {
    if submission.question_count == 0 {
        return 0.0;
    }

    let correct: HashSet<i64> = submission
        .answers
        .iter()
        .filter(|a| a.is_correct())
        .map(|a| a.question_id)
        .collect();

    let correct = correct.len().min(submission.question_count);
    correct as f64 / submission.question_count as f64
}
