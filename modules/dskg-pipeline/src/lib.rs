pub mod evaluation;
pub mod extractor;
pub mod generator;
pub mod planner;
pub mod remedial;
pub mod scoring;
pub mod selector;
pub mod tasks;
#[cfg(test)]
mod testing;
pub mod traits;
pub mod updater;
pub mod worker;


pub use evaluation::{ClaudeRubricGrader, EssayEvaluator, RubricGrader};
pub use extractor::{extract_observations, Observations};
pub use generator::{ClaudeQuizGenerator, QuizGenerator};
pub use planner::{PlannerOutcome, RemediationPlanner};
pub use remedial::RemedialGrader;
pub use selector::WeaknessSelector;
pub use tasks::{Pipeline, PipelineDeps, TaskOutput};
pub use traits::{OpenQuiz, QuizRepository, SubmissionSource};
pub use updater::{DskgUpdate, DskgUpdater};
pub use worker::{spawn_worker, WorkerHandle};
