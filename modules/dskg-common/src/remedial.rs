use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::mastery::StudentId;

/// Questions per generated remedial quiz.
pub const REMEDIAL_QUESTION_COUNT: usize = 3;

/// Options per generated question.
pub const REMEDIAL_OPTION_COUNT: usize = 4;

// --- Generated quiz (LLM output) ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GeneratedOption {
    pub option_text: String,
    pub is_correct: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GeneratedQuestion {
    pub question_text: String,
    /// Always "multiple_choice" for remedial quizzes.
    pub question_type: String,
    pub options: Vec<GeneratedOption>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GeneratedQuiz {
    pub questions: Vec<GeneratedQuestion>,
}

impl GeneratedQuiz {
    /// Check the shape the planner requires: `question_count` questions, each
    /// with non-empty text, four options and exactly one correct option.
    pub fn validate(&self, question_count: usize) -> Result<(), String> {
        if self.questions.len() != question_count {
            return Err(format!(
                "expected {question_count} questions, got {}",
                self.questions.len()
            ));
        }
        for (i, q) in self.questions.iter().enumerate() {
            if q.question_text.trim().is_empty() {
                return Err(format!("question {i} has no text"));
            }
            if q.options.len() != REMEDIAL_OPTION_COUNT {
                return Err(format!(
                    "question {i} has {} options, expected {REMEDIAL_OPTION_COUNT}",
                    q.options.len()
                ));
            }
            let correct = q.options.iter().filter(|o| o.is_correct).count();
            if correct != 1 {
                return Err(format!("question {i} has {correct} correct options"));
            }
            if q.options.iter().any(|o| o.option_text.trim().is_empty()) {
                return Err(format!("question {i} has an empty option"));
            }
        }
        Ok(())
    }
}

/// A generated quiz bound to its owner, ready to persist.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRemedialQuiz {
    pub student_id: StudentId,
    pub concept: String,
    pub questions: Vec<GeneratedQuestion>,
}

// --- Persisted quiz ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemedialOption {
    pub id: i64,
    pub option_text: String,
    pub is_correct: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemedialQuestion {
    pub id: i64,
    pub question_text: String,
    pub question_type: String,
    pub options: Vec<RemedialOption>,
}

impl RemedialQuestion {
    pub fn correct_option_id(&self) -> Option<i64> {
        self.options.iter().find(|o| o.is_correct).map(|o| o.id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemedialQuiz {
    pub id: i64,
    pub student_id: StudentId,
    pub concept: String,
    pub is_completed: bool,
    pub created_at: DateTime<Utc>,
    pub questions: Vec<RemedialQuestion>,
}

// --- Submission ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemedialAnswer {
    pub question_id: i64,
    pub selected_option_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RemedialResult {
    pub correct: usize,
    pub total: usize,
    pub score: f64,
}
