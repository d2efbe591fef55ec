use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{info, warn};

use ai_client::Claude;
use dskg_common::{
    DskgError, FeedbackItem, GradedRubric, RubricCriterion, SubmissionStatus,
};

use crate::traits::SubmissionSource;

/// Grades a text submission against a rubric.
///
/// `Ok(None)` and `Err` both mean the submission could not be graded.
#[async_trait]
pub trait RubricGrader: Send + Sync {
    async fn grade(&self, submission_text: &str, rubric: &[RubricCriterion])
        -> Result<Option<GradedRubric>>;
}

// ---------------------------------------------------------------------------
// Claude
// ---------------------------------------------------------------------------

pub struct ClaudeRubricGrader {
    claude: Claude,
}

impl ClaudeRubricGrader {
    pub fn new(claude: Claude) -> Self {
        Self { claude }
    }
}

const GRADER_SYSTEM_PROMPT: &str = "You are a fair and strict teaching assistant. \
Grade the student's submission based only on the provided rubric. For each criterion, \
give a score and a two-sentence justification. Never exceed a criterion's max points.";

fn grader_user_prompt(submission_text: &str, rubric: &[RubricCriterion]) -> String {
    let rubric_lines: Vec<String> = rubric
        .iter()
        .map(|c| format!("- {} (Max Points: {})", c.criterion, c.max_points))
        .collect();
    format!(
        "Please grade the following submission:\n\
         --- SUBMISSION ---\n{submission_text}\n\
         --- RUBRIC ---\n{}\n",
        rubric_lines.join("\n")
    )
}

#[async_trait]
impl RubricGrader for ClaudeRubricGrader {
    async fn grade(
        &self,
        submission_text: &str,
        rubric: &[RubricCriterion],
    ) -> Result<Option<GradedRubric>> {
        let graded = self
            .claude
            .extract::<GradedRubric>(
                GRADER_SYSTEM_PROMPT,
                grader_user_prompt(submission_text, rubric),
            )
            .await?;
        Ok(Some(graded))
    }
}

// ---------------------------------------------------------------------------
// Essay evaluation
// ---------------------------------------------------------------------------

/// Rubric-grades text submissions and stores the feedback for teacher review.
///
/// Status moves SUBMITTED -> GRADING -> PENDING_REVIEW. Failures are returned
/// to the caller, which owns marking the submission ERROR.
pub struct EssayEvaluator {
    submissions: Arc<dyn SubmissionSource>,
    grader: Arc<dyn RubricGrader>,
}

impl EssayEvaluator {
    pub fn new(submissions: Arc<dyn SubmissionSource>, grader: Arc<dyn RubricGrader>) -> Self {
        Self {
            submissions,
            grader,
        }
    }

    /// Returns the overall score stored on the submission.
    pub async fn evaluate(&self, submission_id: i64) -> Result<f64, DskgError> {
        let essay = self
            .submissions
            .load_essay(submission_id)
            .await
            .map_err(DskgError::store)?
            .ok_or_else(|| DskgError::NotFound(format!("submission {submission_id}")))?;

        let text = essay
            .submission_text
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                DskgError::Validation(format!("submission {submission_id} has no text"))
            })?;
        if essay.rubric.is_empty() {
            return Err(DskgError::Validation(format!(
                "submission {submission_id} has no rubric"
            )));
        }

        self.submissions
            .set_status(submission_id, SubmissionStatus::Grading)
            .await
            .map_err(DskgError::store)?;

        let graded = match self.grader.grade(text, &essay.rubric).await {
            Ok(Some(graded)) => graded,
            Ok(None) => {
                return Err(DskgError::Evaluation(format!(
                    "grader returned nothing for submission {submission_id}"
                )))
            }
            Err(e) => {
                warn!(submission_id, error = %e, "Rubric grading failed");
                return Err(DskgError::Evaluation(format!("{e:#}")));
            }
        };

        let feedback = pair_with_rubric(&graded, &essay.rubric);
        let score = rubric_score(&graded, &essay.rubric);

        self.submissions
            .record_evaluation(submission_id, &feedback, score)
            .await
            .map_err(DskgError::store)?;

        info!(submission_id, score, criteria = feedback.len(), "Essay evaluated");
        Ok(score)
    }
}

/// Attach each criterion's rubric maximum to the grader's score.
/// Criteria the rubric doesn't name get no maximum.
pub fn pair_with_rubric(graded: &GradedRubric, rubric: &[RubricCriterion]) -> Vec<FeedbackItem> {
    let max_by_name: HashMap<&str, f64> = rubric
        .iter()
        .map(|c| (c.criterion.as_str(), c.max_points))
        .collect();

    graded
        .feedback
        .iter()
        .map(|g| FeedbackItem {
            criterion: g.criterion.clone(),
            score: Some(g.score as f64),
            max_points: max_by_name.get(g.criterion.as_str()).copied(),
            justification: Some(g.justification.clone()),
        })
        .collect()
}

/// Total awarded over total available, 0 when the rubric carries no points.
pub fn rubric_score(graded: &GradedRubric, rubric: &[RubricCriterion]) -> f64 {
    let awarded: f64 = graded.feedback.iter().map(|g| g.score as f64).sum();
    let available: f64 = rubric.iter().map(|c| c.max_points).sum();
    if available > 0.0 {
        awarded / available
    } else {
        0.0
    }
}
