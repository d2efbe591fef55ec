use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::mastery::StudentId;

// --- Coursework ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CourseworkType {
    Quiz,
    Assignment,
    CaseStudy,
    Essay,
}

impl CourseworkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CourseworkType::Quiz => "quiz",
            CourseworkType::Assignment => "assignment",
            CourseworkType::CaseStudy => "case_study",
            CourseworkType::Essay => "essay",
        }
    }

    /// Unknown types are graded by rubric, like every non-quiz coursework.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "quiz" => CourseworkType::Quiz,
            "case_study" => CourseworkType::CaseStudy,
            "essay" => CourseworkType::Essay,
            _ => CourseworkType::Assignment,
        }
    }
}

impl std::fmt::Display for CourseworkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionStatus {
    Submitted,
    Grading,
    PendingReview,
    Graded,
    Error,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Submitted => "SUBMITTED",
            SubmissionStatus::Grading => "GRADING",
            SubmissionStatus::PendingReview => "PENDING_REVIEW",
            SubmissionStatus::Graded => "GRADED",
            SubmissionStatus::Error => "ERROR",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "SUBMITTED" => Some(SubmissionStatus::Submitted),
            "GRADING" => Some(SubmissionStatus::Grading),
            "PENDING_REVIEW" => Some(SubmissionStatus::PendingReview),
            "GRADED" => Some(SubmissionStatus::Graded),
            "ERROR" => Some(SubmissionStatus::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Quiz answers ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub id: i64,
    pub is_correct: bool,
}

/// A student's answer to one coursework question, joined with the question's
/// concept tags and answer key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnsweredQuestion {
    pub question_id: i64,
    pub concept_tags: Vec<String>,
    pub options: Vec<QuestionOption>,
    pub selected_option_ids: Vec<i64>,
}

impl AnsweredQuestion {
    /// Exact set equality between the selection and the answer key.
    /// A subset or superset of the correct options scores nothing.
    pub fn is_correct(&self) -> bool {
        let correct: std::collections::BTreeSet<i64> = self
            .options
            .iter()
            .filter(|o| o.is_correct)
            .map(|o| o.id)
            .collect();
        let selected: std::collections::BTreeSet<i64> =
            self.selected_option_ids.iter().copied().collect();
        selected == correct
    }
}

// --- Rubric feedback ---

/// One rubric line as graded by the evaluation collaborator, paired with the
/// rubric's maximum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackItem {
    pub criterion: String,
    pub score: Option<f64>,
    pub max_points: Option<f64>,
    #[serde(default)]
    pub justification: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RubricCriterion {
    pub criterion: String,
    pub max_points: f64,
}

/// What the rubric grader returns per criterion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GradedCriterion {
    /// The name of the criterion being graded.
    pub criterion: String,
    /// The score given for this criterion.
    pub score: i64,
    /// The reason for giving this score.
    pub justification: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GradedRubric {
    pub feedback: Vec<GradedCriterion>,
}

// --- Submissions ---

/// A submission as the mastery pipeline sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradedSubmission {
    pub id: i64,
    pub student_id: StudentId,
    pub coursework_type: CourseworkType,
    pub status: SubmissionStatus,
    /// Number of questions on the coursework, answered or not.
    pub question_count: usize,
    pub answers: Vec<AnsweredQuestion>,
    pub ai_feedback: Vec<FeedbackItem>,
}

/// Input for rubric evaluation of a text submission.
#[derive(Debug, Clone, PartialEq)]
pub struct EssaySubmission {
    pub id: i64,
    pub student_id: StudentId,
    pub submission_text: Option<String>,
    pub rubric: Vec<RubricCriterion>,
}
