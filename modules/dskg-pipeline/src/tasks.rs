//! Task surface: one entry point per background task, plus `run` to dispatch
//! a decoded `TaskRequest`.
//!
//! Submission-bound tasks mark the submission ERROR when they fail, so a
//! failure is always visible on the owning record.

use std::sync::Arc;

use tracing::{info, warn};
use typed_builder::TypedBuilder;

use dskg_common::{
    ConceptMastery, DskgError, RemedialAnswer, RemedialQuiz, RemedialResult, StudentId,
    SubmissionStatus, TaskRequest,
};
use dskg_graph::MasteryGraph;

use crate::evaluation::{EssayEvaluator, RubricGrader};
use crate::extractor::extract_observations;
use crate::generator::QuizGenerator;
use crate::planner::{PlannerOutcome, RemediationPlanner};
use crate::remedial::RemedialGrader;
use crate::scoring::quiz_score;
use crate::selector::WeaknessSelector;
use crate::traits::{QuizRepository, SubmissionSource};
use crate::updater::{DskgUpdate, DskgUpdater};

/// Long-lived collaborators the pipeline is assembled from.
#[derive(Clone, TypedBuilder)]
pub struct PipelineDeps {
    pub graph: Arc<dyn MasteryGraph>,
    pub submissions: Arc<dyn SubmissionSource>,
    pub quizzes: Arc<dyn QuizRepository>,
    pub quiz_generator: Arc<dyn QuizGenerator>,
    pub rubric_grader: Arc<dyn RubricGrader>,
}

/// What a finished task produced.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutput {
    Dskg(DskgUpdate),
    Planner(PlannerOutcome),
    Remedial(RemedialResult),
    Score(f64),
    Approved {
        dskg: DskgUpdate,
        planner: PlannerOutcome,
    },
}

pub struct Pipeline {
    submissions: Arc<dyn SubmissionSource>,
    quizzes: Arc<dyn QuizRepository>,
    updater: DskgUpdater,
    selector: WeaknessSelector,
    planner: RemediationPlanner,
    remedial: RemedialGrader,
    essays: EssayEvaluator,
}

impl Pipeline {
    pub fn new(deps: PipelineDeps) -> Self {
        let updater = DskgUpdater::new(deps.graph.clone());
        let selector = WeaknessSelector::new(deps.graph.clone());
        Self {
            planner: RemediationPlanner::new(
                deps.quizzes.clone(),
                selector.clone(),
                deps.quiz_generator,
            ),
            remedial: RemedialGrader::new(deps.quizzes.clone(), updater.clone()),
            essays: EssayEvaluator::new(deps.submissions.clone(), deps.rubric_grader),
            submissions: deps.submissions,
            quizzes: deps.quizzes,
            updater,
            selector,
        }
    }

    pub async fn run(&self, task: TaskRequest) -> Result<TaskOutput, DskgError> {
        match task {
            TaskRequest::UpdateDskg {
                student_id,
                submission_id,
            } => self
                .update_dskg(student_id, submission_id)
                .await
                .map(TaskOutput::Dskg),
            TaskRequest::RunPlanner { student_id } => {
                self.run_planner(student_id).await.map(TaskOutput::Planner)
            }
            TaskRequest::GradeRemedial {
                quiz_id,
                student_id,
                answers,
            } => self
                .grade_remedial(quiz_id, student_id, &answers)
                .await
                .map(TaskOutput::Remedial),
            TaskRequest::EvaluateEssay { submission_id } => self
                .evaluate_essay(submission_id)
                .await
                .map(TaskOutput::Score),
            TaskRequest::ScoreQuiz { submission_id } => {
                self.score_quiz(submission_id).await.map(TaskOutput::Score)
            }
            TaskRequest::SubmissionApproved {
                student_id,
                submission_id,
            } => {
                let (dskg, planner) = self.submission_approved(student_id, submission_id).await?;
                Ok(TaskOutput::Approved { dskg, planner })
            }
        }
    }

    // --- Mastery ---

    /// Fold a GRADED submission into the student's mastery graph.
    pub async fn update_dskg(
        &self,
        student_id: StudentId,
        submission_id: i64,
    ) -> Result<DskgUpdate, DskgError> {
        match self.try_update_dskg(student_id, submission_id).await {
            Ok(update) => Ok(update),
            // Misrouted task: the submission belongs to someone else, leave it alone.
            Err(e @ DskgError::Validation(_)) => {
                warn!(submission_id, student_id, error = %e, "Rejected DSKG update");
                Err(e)
            }
            Err(e) => Err(self.fail_submission(submission_id, e).await),
        }
    }

    async fn try_update_dskg(
        &self,
        student_id: StudentId,
        submission_id: i64,
    ) -> Result<DskgUpdate, DskgError> {
        let submission = self
            .submissions
            .load(submission_id)
            .await
            .map_err(DskgError::store)?
            .ok_or_else(|| DskgError::NotFound(format!("submission {submission_id}")))?;

        if submission.student_id != student_id {
            return Err(DskgError::Validation(format!(
                "submission {submission_id} does not belong to student {student_id}"
            )));
        }
        if submission.status != SubmissionStatus::Graded {
            info!(
                submission_id,
                status = %submission.status,
                "Submission not graded yet, skipping DSKG update"
            );
            return Ok(DskgUpdate::NotGraded);
        }

        let observations = extract_observations(&submission);
        if observations.is_empty() {
            info!(submission_id, "No concepts found in submission");
            return Ok(DskgUpdate::NothingToUpdate);
        }

        self.updater
            .apply_authoritative(student_id, &observations)
            .await
    }

    pub async fn mastery_profile(
        &self,
        student_id: StudentId,
    ) -> Result<Vec<ConceptMastery>, DskgError> {
        self.selector.profile(student_id).await
    }

    // --- Remediation ---

    pub async fn run_planner(&self, student_id: StudentId) -> Result<PlannerOutcome, DskgError> {
        self.planner.run(student_id).await
    }

    pub async fn grade_remedial(
        &self,
        quiz_id: i64,
        student_id: StudentId,
        answers: &[RemedialAnswer],
    ) -> Result<RemedialResult, DskgError> {
        self.remedial.grade(quiz_id, student_id, answers).await
    }

    pub async fn outstanding_quizzes(
        &self,
        student_id: StudentId,
    ) -> Result<Vec<RemedialQuiz>, DskgError> {
        self.quizzes
            .outstanding(student_id)
            .await
            .map_err(DskgError::store)
    }

    /// Teacher approval: update the graph, then plan remediation.
    ///
    /// Only a failed graph update marks the submission ERROR; a planner
    /// failure leaves the approved submission as it is.
    pub async fn submission_approved(
        &self,
        student_id: StudentId,
        submission_id: i64,
    ) -> Result<(DskgUpdate, PlannerOutcome), DskgError> {
        let dskg = self.update_dskg(student_id, submission_id).await?;
        let planner = self.run_planner(student_id).await?;
        Ok((dskg, planner))
    }

    // --- Grading ---

    pub async fn evaluate_essay(&self, submission_id: i64) -> Result<f64, DskgError> {
        match self.essays.evaluate(submission_id).await {
            Ok(score) => Ok(score),
            Err(e) => Err(self.fail_submission(submission_id, e).await),
        }
    }

    pub async fn score_quiz(&self, submission_id: i64) -> Result<f64, DskgError> {
        match self.try_score_quiz(submission_id).await {
            Ok(score) => Ok(score),
            Err(e) => Err(self.fail_submission(submission_id, e).await),
        }
    }

    async fn try_score_quiz(&self, submission_id: i64) -> Result<f64, DskgError> {
        let submission = self
            .submissions
            .load(submission_id)
            .await
            .map_err(DskgError::store)?
            .ok_or_else(|| DskgError::NotFound(format!("submission {submission_id}")))?;

        let score = quiz_score(&submission);
        self.submissions
            .record_score(submission_id, score)
            .await
            .map_err(DskgError::store)?;
        info!(submission_id, score, "Quiz scored");
        Ok(score)
    }

    /// Mark the submission ERROR and hand the original error back.
    async fn fail_submission(&self, submission_id: i64, error: DskgError) -> DskgError {
        if matches!(error, DskgError::NotFound(_)) {
            warn!(submission_id, "Submission not found");
            return error;
        }
        warn!(submission_id, error = %error, "Task failed, marking submission ERROR");
        if let Err(e) = self
            .submissions
            .set_status(submission_id, SubmissionStatus::Error)
            .await
        {
            warn!(submission_id, error = %e, "Failed to mark submission ERROR");
        }
        error
    }
}
