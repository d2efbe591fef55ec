use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use dskg_common::{DskgError, RemedialAnswer, RemedialQuiz, RemedialResult, StudentId};

use crate::traits::QuizRepository;
use crate::updater::DskgUpdater;

/// Grades submitted remedial quizzes and feeds the result back into the
/// mastery graph as a practice (remedial) write.
pub struct RemedialGrader {
    quizzes: Arc<dyn QuizRepository>,
    updater: DskgUpdater,
}

impl RemedialGrader {
    pub fn new(quizzes: Arc<dyn QuizRepository>, updater: DskgUpdater) -> Self {
        Self { quizzes, updater }
    }

    /// Grade the quiz, record the practice result, then mark the quiz completed.
    ///
    /// The quiz stays locked from lookup to completion. If the graph write
    /// fails the quiz is released unchanged and the error is returned.
    /// A missing quiz, someone else's quiz and an already-completed quiz are
    /// all reported as the same `NotFound`.
    pub async fn grade(
        &self,
        quiz_id: i64,
        student_id: StudentId,
        answers: &[RemedialAnswer],
    ) -> Result<RemedialResult, DskgError> {
        let open = self
            .quizzes
            .begin_completion(quiz_id, student_id)
            .await
            .map_err(DskgError::store)?;
        let Some(open) = open else {
            info!(quiz_id, student_id, "Remedial quiz not available for grading");
            return Err(DskgError::NotFound(format!("remedial quiz {quiz_id}")));
        };

        let quiz = open.quiz();
        let outcomes = grade_answers(quiz, answers);
        let result = summarize(&outcomes);
        let concept = quiz.concept.clone();

        if let Err(e) = self
            .updater
            .apply_remedial(student_id, &concept, &outcomes)
            .await
        {
            if let Err(release_err) = open.abandon().await {
                warn!(quiz_id, error = %release_err, "Failed to release remedial quiz");
            }
            return Err(e);
        }

        open.complete().await.map_err(DskgError::store)?;

        info!(
            quiz_id,
            student_id,
            concept = concept.as_str(),
            correct = result.correct,
            total = result.total,
            "Remedial quiz graded"
        );
        Ok(result)
    }
}

/// 1.0/0.0 per question in quiz order. A question is correct when the
/// selected option is the one flagged correct; unanswered questions score 0.
pub fn grade_answers(quiz: &RemedialQuiz, answers: &[RemedialAnswer]) -> Vec<f64> {
    let selected: HashMap<i64, i64> = answers
        .iter()
        .map(|a| (a.question_id, a.selected_option_id))
        .collect();

    quiz.questions
        .iter()
        .map(|q| {
            let correct = q.correct_option_id();
            match (selected.get(&q.id), correct) {
                (Some(chosen), Some(correct)) if *chosen == correct => 1.0,
                _ => 0.0,
            }
        })
        .collect()
}

fn summarize(outcomes: &[f64]) -> RemedialResult {
    let correct = outcomes.iter().filter(|o| **o > 0.0).count();
    let total = outcomes.len();
    let score = if total == 0 {
        0.0
    } else {
        correct as f64 / total as f64
    };
    RemedialResult {
        correct,
        total,
        score,
    }
}
