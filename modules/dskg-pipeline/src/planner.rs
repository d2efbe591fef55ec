// Remediation planner.
//
// guard (outstanding quiz?) -> select weakest concept -> generate -> persist.
//
// At most one outstanding quiz per student: within this process a per-student
// lock covers the whole check-then-create sequence, and across processes the
// store's partial unique index rejects the second create.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::OwnedMutexGuard;
use tracing::info;

use dskg_common::{DskgError, NewRemedialQuiz, StudentId};

use crate::generator::{generate_remedial_quiz, QuizGenerator};
use crate::selector::WeaknessSelector;
use crate::traits::QuizRepository;

#[derive(Debug, Clone, PartialEq)]
pub enum PlannerOutcome {
    /// The student already has an incomplete remedial quiz.
    AlreadyPending,
    /// Nothing below the mastery threshold.
    NoWeakConcepts,
    Created { quiz_id: i64, concept: String },
}

pub struct RemediationPlanner {
    quizzes: Arc<dyn QuizRepository>,
    selector: WeaknessSelector,
    generator: Arc<dyn QuizGenerator>,
    locks: StudentLocks,
}

impl RemediationPlanner {
    pub fn new(
        quizzes: Arc<dyn QuizRepository>,
        selector: WeaknessSelector,
        generator: Arc<dyn QuizGenerator>,
    ) -> Self {
        Self {
            quizzes,
            selector,
            generator,
            locks: StudentLocks::default(),
        }
    }

    pub async fn run(&self, student_id: StudentId) -> Result<PlannerOutcome, DskgError> {
        let _guard = self.locks.acquire(student_id).await;

        let pending = self
            .quizzes
            .has_outstanding(student_id)
            .await
            .map_err(DskgError::store)?;
        if pending {
            info!(student_id, "Remedial quiz already pending, skipping");
            return Ok(PlannerOutcome::AlreadyPending);
        }

        let weak = self.selector.weakest(student_id).await?;
        let Some(concept) = weak.into_iter().next() else {
            info!(student_id, "No weak concepts, nothing to plan");
            return Ok(PlannerOutcome::NoWeakConcepts);
        };

        let generated = generate_remedial_quiz(self.generator.as_ref(), &concept).await?;

        let quiz = NewRemedialQuiz {
            student_id,
            concept: concept.clone(),
            questions: generated.questions,
        };
        match self.quizzes.create(&quiz).await.map_err(DskgError::store)? {
            Some(quiz_id) => {
                info!(student_id, quiz_id, concept = concept.as_str(), "Remedial quiz created");
                Ok(PlannerOutcome::Created { quiz_id, concept })
            }
            None => {
                info!(student_id, "Another planner created a quiz first");
                Ok(PlannerOutcome::AlreadyPending)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Per-student locks
// ---------------------------------------------------------------------------

#[derive(Default)]
struct StudentLocks {
    inner: Mutex<HashMap<StudentId, Arc<tokio::sync::Mutex<()>>>>,
}

impl StudentLocks {
    async fn acquire(&self, student_id: StudentId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(|p| p.into_inner());
            // Entries only the map refers to are idle.
            map.retain(|_, l| Arc::strong_count(l) > 1);
            map.entry(student_id).or_default().clone()
        };
        lock.lock_owned().await
    }
}
