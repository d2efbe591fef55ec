use std::collections::HashMap;

use anyhow::Result;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::info;

use dskg_common::{
    AnsweredQuestion, CourseworkType, EssaySubmission, FeedbackItem, GradedSubmission,
    QuestionOption, RubricCriterion, SubmissionStatus,
};

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

#[derive(sqlx::FromRow)]
struct SubmissionRow {
    id: i64,
    student_id: i64,
    status: String,
    coursework_type: String,
    question_count: i64,
    ai_feedback: Option<Json<Vec<FeedbackItem>>>,
}

#[derive(sqlx::FromRow)]
struct AnswerRow {
    question_id: i64,
    concept_tags: Vec<String>,
    selected_option_ids: Vec<i64>,
}

#[derive(sqlx::FromRow)]
struct OptionRow {
    id: i64,
    question_id: i64,
    is_correct: bool,
}

#[derive(sqlx::FromRow)]
struct EssayRow {
    id: i64,
    student_id: i64,
    submission_text: Option<String>,
    rubric: Option<Json<Vec<RubricCriterion>>>,
}

// ---------------------------------------------------------------------------
// SubmissionStore
// ---------------------------------------------------------------------------

/// Reads submissions for grading and mastery extraction, and writes grading
/// results and status back.
#[derive(Clone)]
pub struct SubmissionStore {
    pool: PgPool,
}

impl SubmissionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Load a submission with its answers joined to question tags and answer keys.
    pub async fn load(&self, submission_id: i64) -> Result<Option<GradedSubmission>> {
        let row = sqlx::query_as::<_, SubmissionRow>(
            r#"
            SELECT s.id, s.student_id, s.status, c.coursework_type,
                   (SELECT count(*) FROM questions q WHERE q.coursework_id = c.id) AS question_count,
                   s.ai_feedback
            FROM submissions s
            JOIN coursework c ON c.id = s.coursework_id
            WHERE s.id = $1
            "#,
        )
        .bind(submission_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let answers = sqlx::query_as::<_, AnswerRow>(
            r#"
            SELECT a.question_id, q.concept_tags, a.selected_option_ids
            FROM submission_answers a
            JOIN questions q ON q.id = a.question_id
            WHERE a.submission_id = $1
            ORDER BY a.id
            "#,
        )
        .bind(submission_id)
        .fetch_all(&self.pool)
        .await?;

        let options = sqlx::query_as::<_, OptionRow>(
            r#"
            SELECT o.id, o.question_id, o.is_correct
            FROM options o
            WHERE o.question_id IN (
                SELECT question_id FROM submission_answers WHERE submission_id = $1
            )
            ORDER BY o.id
            "#,
        )
        .bind(submission_id)
        .fetch_all(&self.pool)
        .await?;

        let mut options_by_question: HashMap<i64, Vec<QuestionOption>> = HashMap::new();
        for o in options {
            options_by_question
                .entry(o.question_id)
                .or_default()
                .push(QuestionOption {
                    id: o.id,
                    is_correct: o.is_correct,
                });
        }

        let answers = answers
            .into_iter()
            .map(|a| AnsweredQuestion {
                question_id: a.question_id,
                options: options_by_question
                    .get(&a.question_id)
                    .cloned()
                    .unwrap_or_default(),
                concept_tags: a.concept_tags,
                selected_option_ids: a.selected_option_ids,
            })
            .collect();

        // Unknown statuses are treated as not-yet-graded.
        let status = SubmissionStatus::parse(&row.status).unwrap_or(SubmissionStatus::Submitted);

        Ok(Some(GradedSubmission {
            id: row.id,
            student_id: row.student_id,
            coursework_type: CourseworkType::parse(&row.coursework_type),
            status,
            question_count: row.question_count.max(0) as usize,
            answers,
            ai_feedback: row.ai_feedback.map(|j| j.0).unwrap_or_default(),
        }))
    }

    /// Load the text and rubric a rubric grader needs.
    pub async fn load_essay(&self, submission_id: i64) -> Result<Option<EssaySubmission>> {
        let row = sqlx::query_as::<_, EssayRow>(
            r#"
            SELECT s.id, s.student_id, s.submission_text, c.rubric
            FROM submissions s
            JOIN coursework c ON c.id = s.coursework_id
            WHERE s.id = $1
            "#,
        )
        .bind(submission_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| EssaySubmission {
            id: r.id,
            student_id: r.student_id,
            submission_text: r.submission_text,
            rubric: r.rubric.map(|j| j.0).unwrap_or_default(),
        }))
    }

    pub async fn set_status(&self, submission_id: i64, status: SubmissionStatus) -> Result<()> {
        sqlx::query("UPDATE submissions SET status = $2 WHERE id = $1")
            .bind(submission_id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn record_score(&self, submission_id: i64, score: f64) -> Result<()> {
        sqlx::query("UPDATE submissions SET score = $2 WHERE id = $1")
            .bind(submission_id)
            .bind(score)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Store rubric feedback and the overall score, and hand the submission
    /// to the teacher for review.
    pub async fn record_evaluation(
        &self,
        submission_id: i64,
        feedback: &[FeedbackItem],
        score: f64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE submissions
            SET ai_feedback = $2, score = $3, status = $4
            WHERE id = $1
            "#,
        )
        .bind(submission_id)
        .bind(Json(feedback))
        .bind(score)
        .bind(SubmissionStatus::PendingReview.as_str())
        .execute(&self.pool)
        .await?;

        info!(submission_id, score, "Stored rubric evaluation");
        Ok(())
    }
}
