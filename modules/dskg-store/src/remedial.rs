use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use tracing::{info, warn};

use dskg_common::{
    NewRemedialQuiz, RemedialOption, RemedialQuestion, RemedialQuiz, StudentId,
};

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

#[derive(sqlx::FromRow)]
struct QuizRow {
    id: i64,
    student_id: i64,
    concept: String,
    is_completed: bool,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct QuestionRow {
    id: i64,
    quiz_id: i64,
    question_text: String,
    question_type: String,
}

#[derive(sqlx::FromRow)]
struct OptionRow {
    id: i64,
    question_id: i64,
    option_text: String,
    is_correct: bool,
}

// ---------------------------------------------------------------------------
// RemedialQuizStore
// ---------------------------------------------------------------------------

/// Persists generated remedial quizzes and their completion state.
#[derive(Clone)]
pub struct RemedialQuizStore {
    pool: PgPool,
}

impl RemedialQuizStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Whether the student has a quiz they have not submitted yet.
    pub async fn has_outstanding(&self, student_id: StudentId) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(
                SELECT 1 FROM remedial_quizzes
                WHERE student_id = $1 AND is_completed = false
            )",
        )
        .bind(student_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// Insert the quiz, its questions and their options in one transaction.
    /// Any failure rolls the whole quiz back before the error is returned.
    pub async fn create(&self, quiz: &NewRemedialQuiz) -> Result<i64> {
        let mut tx = self.pool.begin().await?;

        match insert_quiz(&mut tx, quiz).await {
            Ok(quiz_id) => {
                tx.commit().await?;
                info!(
                    quiz_id,
                    student_id = quiz.student_id,
                    concept = quiz.concept.as_str(),
                    "Saved remedial quiz"
                );
                Ok(quiz_id)
            }
            Err(e) => {
                warn!(
                    student_id = quiz.student_id,
                    error = %e,
                    "Failed to save remedial quiz, rolling back"
                );
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "Remedial quiz rollback failed");
                }
                Err(e)
            }
        }
    }

    /// Every incomplete quiz of the student, oldest first.
    pub async fn outstanding(&self, student_id: StudentId) -> Result<Vec<RemedialQuiz>> {
        let rows = sqlx::query_as::<_, QuizRow>(
            r#"
            SELECT id, student_id, concept, is_completed, created_at
            FROM remedial_quizzes
            WHERE student_id = $1 AND is_completed = false
            ORDER BY created_at, id
            "#,
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;

        let mut conn = self.pool.acquire().await?;
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let mut questions = load_questions(&mut conn, &ids).await?;

        Ok(rows
            .into_iter()
            .map(|r| {
                let qs = questions.remove(&r.id).unwrap_or_default();
                quiz_from_row(r, qs)
            })
            .collect())
    }

    /// Lock an incomplete quiz owned by `student_id` for grading.
    ///
    /// Returns `None` when the quiz is missing, owned by someone else, or
    /// already completed. The row stays locked until the returned
    /// `QuizCompletion` is completed or dropped, so a concurrent submission
    /// of the same quiz waits and then sees it completed.
    pub async fn begin_completion(
        &self,
        quiz_id: i64,
        student_id: StudentId,
    ) -> Result<Option<QuizCompletion>> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, QuizRow>(
            r#"
            SELECT id, student_id, concept, is_completed, created_at
            FROM remedial_quizzes
            WHERE id = $1 AND student_id = $2
            FOR UPDATE
            "#,
        )
        .bind(quiz_id)
        .bind(student_id)
        .fetch_optional(&mut *tx)
        .await?;

        let row = match row {
            Some(r) if !r.is_completed => r,
            _ => {
                tx.rollback().await?;
                return Ok(None);
            }
        };

        let mut questions = load_questions(&mut tx, &[row.id]).await?;
        let qs = questions.remove(&row.id).unwrap_or_default();

        Ok(Some(QuizCompletion {
            tx,
            quiz: quiz_from_row(row, qs),
        }))
    }
}

// ---------------------------------------------------------------------------
// QuizCompletion
// ---------------------------------------------------------------------------

/// A quiz locked for grading. Dropping it without calling `complete` rolls
/// back and leaves the quiz incomplete.
pub struct QuizCompletion {
    tx: Transaction<'static, Postgres>,
    quiz: RemedialQuiz,
}

impl QuizCompletion {
    pub fn quiz(&self) -> &RemedialQuiz {
        &self.quiz
    }

    /// Flip `is_completed` and release the lock.
    pub async fn complete(mut self) -> Result<()> {
        sqlx::query("UPDATE remedial_quizzes SET is_completed = true WHERE id = $1")
            .bind(self.quiz.id)
            .execute(&mut *self.tx)
            .await?;
        self.tx.commit().await?;
        Ok(())
    }

    pub async fn abandon(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn insert_quiz(tx: &mut Transaction<'static, Postgres>, quiz: &NewRemedialQuiz) -> Result<i64> {
    let quiz_id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO remedial_quizzes (student_id, concept) VALUES ($1, $2) RETURNING id",
    )
    .bind(quiz.student_id)
    .bind(&quiz.concept)
    .fetch_one(&mut **tx)
    .await?;

    for (q_pos, q) in quiz.questions.iter().enumerate() {
        let question_id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO remedial_questions (quiz_id, position, question_text, question_type)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(quiz_id)
        .bind(q_pos as i32)
        .bind(&q.question_text)
        .bind(&q.question_type)
        .fetch_one(&mut **tx)
        .await?;

        for (o_pos, o) in q.options.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO remedial_options (question_id, position, option_text, is_correct)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(question_id)
            .bind(o_pos as i32)
            .bind(&o.option_text)
            .bind(o.is_correct)
            .execute(&mut **tx)
            .await?;
        }
    }

    Ok(quiz_id)
}

/// Questions (with options) for each quiz id, in authored order.
async fn load_questions(
    conn: &mut PgConnection,
    quiz_ids: &[i64],
) -> Result<HashMap<i64, Vec<RemedialQuestion>>> {
    if quiz_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let questions = sqlx::query_as::<_, QuestionRow>(
        r#"
        SELECT id, quiz_id, question_text, question_type
        FROM remedial_questions
        WHERE quiz_id = ANY($1)
        ORDER BY quiz_id, position, id
        "#,
    )
    .bind(quiz_ids)
    .fetch_all(&mut *conn)
    .await?;

    let options = sqlx::query_as::<_, OptionRow>(
        r#"
        SELECT o.id, o.question_id, o.option_text, o.is_correct
        FROM remedial_options o
        JOIN remedial_questions q ON q.id = o.question_id
        WHERE q.quiz_id = ANY($1)
        ORDER BY o.question_id, o.position, o.id
        "#,
    )
    .bind(quiz_ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut options_by_question: HashMap<i64, Vec<RemedialOption>> = HashMap::new();
    for o in options {
        options_by_question
            .entry(o.question_id)
            .or_default()
            .push(RemedialOption {
                id: o.id,
                option_text: o.option_text,
                is_correct: o.is_correct,
            });
    }

    let mut by_quiz: HashMap<i64, Vec<RemedialQuestion>> = HashMap::new();
    for q in questions {
        by_quiz.entry(q.quiz_id).or_default().push(RemedialQuestion {
            id: q.id,
            question_text: q.question_text,
            question_type: q.question_type,
            options: options_by_question.remove(&q.id).unwrap_or_default(),
        });
    }
    Ok(by_quiz)
}

fn quiz_from_row(row: QuizRow, questions: Vec<RemedialQuestion>) -> RemedialQuiz {
    RemedialQuiz {
        id: row.id,
        student_id: row.student_id,
        concept: row.concept,
        is_completed: row.is_completed,
        created_at: row.created_at,
        questions,
    }
}
