use serde::{Deserialize, Serialize};

use crate::mastery::StudentId;
use crate::remedial::RemedialAnswer;

/// A unit of background work, as published on the task channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum TaskRequest {
    /// Fold a graded submission into the student's mastery graph.
    UpdateDskg {
        student_id: StudentId,
        submission_id: i64,
    },
    /// Generate a remedial quiz for the student's weakest concept, if any.
    RunPlanner { student_id: StudentId },
    /// Grade a remedial quiz and record the practice result.
    GradeRemedial {
        quiz_id: i64,
        student_id: StudentId,
        answers: Vec<RemedialAnswer>,
    },
    /// Rubric-grade a text submission.
    EvaluateEssay { submission_id: i64 },
    /// Score a multiple-choice submission.
    ScoreQuiz { submission_id: i64 },
    /// A teacher approved a submission: update the graph, then plan.
    SubmissionApproved {
        student_id: StudentId,
        submission_id: i64,
    },
}

impl TaskRequest {
    pub fn name(&self) -> &'static str {
        match self {
            TaskRequest::UpdateDskg { .. } => "update_dskg",
            TaskRequest::RunPlanner { .. } => "run_planner",
            TaskRequest::GradeRemedial { .. } => "grade_remedial",
            TaskRequest::EvaluateEssay { .. } => "evaluate_essay",
            TaskRequest::ScoreQuiz { .. } => "score_quiz",
            TaskRequest::SubmissionApproved { .. } => "submission_approved",
        }
    }
}
