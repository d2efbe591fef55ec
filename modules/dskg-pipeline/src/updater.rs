use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use dskg_common::{DskgError, MasteryWrite, StudentId, UpdateKind};
use dskg_graph::MasteryGraph;

use crate::extractor::Observations;

/// What a DSKG update did for one submission.
#[derive(Debug, Clone, PartialEq)]
pub enum DskgUpdate {
    /// The submission is not in the GRADED state yet.
    NotGraded,
    /// Extraction found no concepts to score.
    NothingToUpdate,
    Updated { concepts: usize },
}

/// Applies averaged observations to the mastery graph.
///
/// All writes for one call go to the graph as a single batch, so a failure
/// on any concept leaves every concept untouched.
#[derive(Clone)]
pub struct DskgUpdater {
    graph: Arc<dyn MasteryGraph>,
}

impl DskgUpdater {
    pub fn new(graph: Arc<dyn MasteryGraph>) -> Self {
        Self { graph }
    }

    /// Overwrite each concept's score with the mean of its observations.
    pub async fn apply_authoritative(
        &self,
        student_id: StudentId,
        observations: &Observations,
    ) -> Result<DskgUpdate, DskgError> {
        let at = Utc::now();
        let writes: Vec<MasteryWrite> = observations
            .iter()
            .filter_map(|(concept, scores)| {
                mean(scores).map(|score| MasteryWrite {
                    concept: concept.to_string(),
                    score,
                    kind: UpdateKind::Authoritative,
                    at,
                })
            })
            .collect();

        if writes.is_empty() {
            info!(student_id, "No concepts to update");
            return Ok(DskgUpdate::NothingToUpdate);
        }

        self.write(student_id, &writes).await?;
        Ok(DskgUpdate::Updated {
            concepts: writes.len(),
        })
    }

    /// Append a practice result to the concept's history. The score is left alone.
    pub async fn apply_remedial(
        &self,
        student_id: StudentId,
        concept: &str,
        outcomes: &[f64],
    ) -> Result<DskgUpdate, DskgError> {
        let Some(score) = mean(outcomes) else {
            info!(student_id, concept, "Empty remedial outcome list, skipping");
            return Ok(DskgUpdate::NothingToUpdate);
        };

        let write = MasteryWrite {
            concept: concept.to_string(),
            score,
            kind: UpdateKind::Remedial,
            at: Utc::now(),
        };
        self.write(student_id, std::slice::from_ref(&write)).await?;
        Ok(DskgUpdate::Updated { concepts: 1 })
    }

    async fn write(&self, student_id: StudentId, writes: &[MasteryWrite]) -> Result<(), DskgError> {
        let kind = writes[0].kind;
        match self.graph.record_mastery(student_id, writes).await {
            Ok(()) => {
                info!(student_id, concepts = writes.len(), %kind, "DSKG updated");
                Ok(())
            }
            Err(e) => {
                warn!(student_id, error = %e, %kind, "DSKG update failed, nothing written");
                Err(DskgError::graph(format!("{e:#}")))
            }
        }
    }
}

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(scores: &[f64]) -> Option<f64> {
    if scores.is_empty() {
        return None;
    }
    Some(scores.iter().sum::<f64>() / scores.len() as f64)
}
