use std::sync::Arc;

use tracing::info;

use dskg_common::{
    ConceptMastery, DskgError, StudentId, MASTERY_THRESHOLD, WEAK_CONCEPT_LIMIT,
};
use dskg_graph::MasteryGraph;

/// Reads a student's weakest concepts from the mastery graph.
///
/// Ties on equal scores come back in store order, which is not guaranteed
/// to be stable across stores.
#[derive(Clone)]
pub struct WeaknessSelector {
    graph: Arc<dyn MasteryGraph>,
    threshold: f64,
    limit: usize,
}

impl WeaknessSelector {
    pub fn new(graph: Arc<dyn MasteryGraph>) -> Self {
        Self {
            graph,
            threshold: MASTERY_THRESHOLD,
            limit: WEAK_CONCEPT_LIMIT,
        }
    }

    /// Concepts scored below the mastery threshold, weakest first, at most
    /// three. Empty means no remediation is needed.
    pub async fn weakest(&self, student_id: StudentId) -> Result<Vec<String>, DskgError> {
        let concepts = self
            .graph
            .weakest_concepts(student_id, self.threshold, self.limit)
            .await
            .map_err(|e| DskgError::graph(format!("{e:#}")))?;
        info!(student_id, ?concepts, "Weak concepts");
        Ok(concepts)
    }

    /// Every concept edge of the student, ascending by score.
    pub async fn profile(&self, student_id: StudentId) -> Result<Vec<ConceptMastery>, DskgError> {
        self.graph
            .mastery_profile(student_id)
            .await
            .map_err(|e| DskgError::graph(format!("{e:#}")))
    }
}
