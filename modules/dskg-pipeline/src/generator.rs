use anyhow::Result;
use async_trait::async_trait;
use tracing::{info, warn};

use ai_client::Claude;
use dskg_common::{DskgError, GeneratedQuiz, REMEDIAL_QUESTION_COUNT};

/// Produces practice questions for a single concept.
///
/// `Ok(None)` and `Err` both mean "no quiz"; callers treat them the same.
#[async_trait]
pub trait QuizGenerator: Send + Sync {
    async fn generate(&self, concept: &str, question_count: usize)
        -> Result<Option<GeneratedQuiz>>;
}

// ---------------------------------------------------------------------------
// Claude
// ---------------------------------------------------------------------------

pub struct ClaudeQuizGenerator {
    claude: Claude,
}

impl ClaudeQuizGenerator {
    pub fn new(claude: Claude) -> Self {
        Self { claude }
    }
}

fn system_prompt(concept: &str, question_count: usize) -> String {
    format!(
        "You are a helpful tutor. Create a {question_count}-question multiple-choice quiz \
         to help a student practice this single concept: {concept}. \
         Each question has exactly 4 options and exactly one correct option. \
         The questions should be clear and test fundamental understanding."
    )
}

#[async_trait]
impl QuizGenerator for ClaudeQuizGenerator {
    async fn generate(
        &self,
        concept: &str,
        question_count: usize,
    ) -> Result<Option<GeneratedQuiz>> {
        let quiz = self
            .claude
            .extract::<GeneratedQuiz>(
                system_prompt(concept, question_count),
                format!("Please generate the {question_count}-question quiz for {concept}."),
            )
            .await?;
        Ok(Some(quiz))
    }
}

// ---------------------------------------------------------------------------
// Checked generation
// ---------------------------------------------------------------------------

/// Generate a remedial quiz and reject anything that isn't exactly three
/// single-answer questions with four options each.
pub async fn generate_remedial_quiz(
    generator: &dyn QuizGenerator,
    concept: &str,
) -> Result<GeneratedQuiz, DskgError> {
    let quiz = match generator.generate(concept, REMEDIAL_QUESTION_COUNT).await {
        Ok(Some(quiz)) => quiz,
        Ok(None) => {
            warn!(concept, "Quiz generator returned nothing");
            return Err(DskgError::Generation(format!("no quiz generated for {concept}")));
        }
        Err(e) => {
            warn!(concept, error = %e, "Quiz generation failed");
            return Err(DskgError::Generation(format!("{e:#}")));
        }
    };

    if let Err(reason) = quiz.validate(REMEDIAL_QUESTION_COUNT) {
        warn!(concept, reason = reason.as_str(), "Generated quiz rejected");
        return Err(DskgError::Generation(reason));
    }

    let mut quiz = quiz;
    for q in &mut quiz.questions {
        q.question_type = "multiple_choice".to_string();
    }
    info!(concept, questions = quiz.questions.len(), "Generated remedial quiz");
    Ok(quiz)
}
