// Relational seams for the pipeline.
//
// SubmissionSource covers coursework submissions: reading answers and
// feedback, writing status and scores back.
// QuizRepository covers remedial quizzes: the outstanding-quiz guard,
// transactional creation, and locked completion.
//
// Production impls delegate to dskg-store. Mocks live in testing.rs.

use anyhow::Result;
use async_trait::async_trait;

use dskg_common::{
    EssaySubmission, FeedbackItem, GradedSubmission, NewRemedialQuiz, RemedialQuiz, StudentId,
    SubmissionStatus,
};
use dskg_store::{QuizCompletion, RemedialQuizStore, SubmissionStore};

// ---------------------------------------------------------------------------
// SubmissionSource
// ---------------------------------------------------------------------------

#[async_trait]
pub trait SubmissionSource: Send + Sync {
    /// Submission with answers joined to concept tags and answer keys.
    async fn load(&self, submission_id: i64) -> Result<Option<GradedSubmission>>;

    /// Submission text and the coursework rubric.
    async fn load_essay(&self, submission_id: i64) -> Result<Option<EssaySubmission>>;

    async fn set_status(&self, submission_id: i64, status: SubmissionStatus) -> Result<()>;

    async fn record_score(&self, submission_id: i64, score: f64) -> Result<()>;

    /// Store rubric feedback and score, moving the submission to review.
    async fn record_evaluation(
        &self,
        submission_id: i64,
        feedback: &[FeedbackItem],
        score: f64,
    ) -> Result<()>;
}

#[async_trait]
impl SubmissionSource for SubmissionStore {
    async fn load(&self, submission_id: i64) -> Result<Option<GradedSubmission>> {
        SubmissionStore::load(self, submission_id).await
    }

    async fn load_essay(&self, submission_id: i64) -> Result<Option<EssaySubmission>> {
        SubmissionStore::load_essay(self, submission_id).await
    }

    async fn set_status(&self, submission_id: i64, status: SubmissionStatus) -> Result<()> {
        SubmissionStore::set_status(self, submission_id, status).await
    }

    async fn record_score(&self, submission_id: i64, score: f64) -> Result<()> {
        SubmissionStore::record_score(self, submission_id, score).await
    }

    async fn record_evaluation(
        &self,
        submission_id: i64,
        feedback: &[FeedbackItem],
        score: f64,
    ) -> Result<()> {
        SubmissionStore::record_evaluation(self, submission_id, feedback, score).await
    }
}

// ---------------------------------------------------------------------------
// QuizRepository
// ---------------------------------------------------------------------------

/// A remedial quiz locked for grading. Dropping it without `complete`
/// leaves the quiz incomplete.
#[async_trait]
pub trait OpenQuiz: Send {
    fn quiz(&self) -> &RemedialQuiz;

    /// Mark the quiz completed and release it.
    async fn complete(self: Box<Self>) -> Result<()>;

    /// Release the quiz without completing it.
    async fn abandon(self: Box<Self>) -> Result<()>;
}

#[async_trait]
pub trait QuizRepository: Send + Sync {
    async fn has_outstanding(&self, student_id: StudentId) -> Result<bool>;

    /// Persist quiz, questions and options atomically.
    ///
    /// Returns `None` when the store refused the quiz because the student
    /// already has an outstanding one.
    async fn create(&self, quiz: &NewRemedialQuiz) -> Result<Option<i64>>;

    async fn outstanding(&self, student_id: StudentId) -> Result<Vec<RemedialQuiz>>;

    /// Lock the quiz for grading. `None` when it is missing, belongs to
    /// another student, or is already completed.
    async fn begin_completion(
        &self,
        quiz_id: i64,
        student_id: StudentId,
    ) -> Result<Option<Box<dyn OpenQuiz>>>;
}

#[async_trait]
impl OpenQuiz for QuizCompletion {
    fn quiz(&self) -> &RemedialQuiz {
        QuizCompletion::quiz(self)
    }

    async fn complete(self: Box<Self>) -> Result<()> {
        QuizCompletion::complete(*self).await
    }

    async fn abandon(self: Box<Self>) -> Result<()> {
        QuizCompletion::abandon(*self).await
    }
}

#[async_trait]
impl QuizRepository for RemedialQuizStore {
    async fn has_outstanding(&self, student_id: StudentId) -> Result<bool> {
        RemedialQuizStore::has_outstanding(self, student_id).await
    }

    async fn create(&self, quiz: &NewRemedialQuiz) -> Result<Option<i64>> {
        match RemedialQuizStore::create(self, quiz).await {
            Ok(id) => Ok(Some(id)),
            // The one-outstanding-quiz index rejected a concurrent create.
            Err(e) if is_unique_violation(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn outstanding(&self, student_id: StudentId) -> Result<Vec<RemedialQuiz>> {
        RemedialQuizStore::outstanding(self, student_id).await
    }

    async fn begin_completion(
        &self,
        quiz_id: i64,
        student_id: StudentId,
    ) -> Result<Option<Box<dyn OpenQuiz>>> {
        let completion = RemedialQuizStore::begin_completion(self, quiz_id, student_id).await?;
        Ok(completion.map(|c| Box::new(c) as Box<dyn OpenQuiz>))
    }
}

fn is_unique_violation(e: &anyhow::Error) -> bool {
    e.downcast_ref::<sqlx::Error>()
        .and_then(|e| e.as_database_error())
        .is_some_and(|db| db.is_unique_violation())
}
