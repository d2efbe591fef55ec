// MasteryGraph: what the pipeline needs from the knowledge graph.
//
// Neo4jMasteryGraph is the production store. InMemoryMasteryGraph (memory.rs)
// mirrors its semantics for tests and local runs without a database.

use anyhow::Result;
use async_trait::async_trait;

use dskg_common::{ConceptMastery, MasteryWrite, StudentId};

use crate::{GraphClient, GraphReader, GraphWriter};

#[async_trait]
pub trait MasteryGraph: Send + Sync {
    /// Upsert Student, Concept and KNOWS edge for each write and append one
    /// history entry per write, all in one transaction.
    async fn record_mastery(&self, student_id: StudentId, writes: &[MasteryWrite]) -> Result<()>;

    /// Concepts with a score strictly below `threshold`, ascending, at most `limit`.
    async fn weakest_concepts(
        &self,
        student_id: StudentId,
        threshold: f64,
        limit: usize,
    ) -> Result<Vec<String>>;

    /// All of the student's edges, ascending by score.
    async fn mastery_profile(&self, student_id: StudentId) -> Result<Vec<ConceptMastery>>;

    async fn concept_mastery(
        &self,
        student_id: StudentId,
        concept: &str,
    ) -> Result<Option<ConceptMastery>>;
}

/// Neo4j-backed mastery graph.
#[derive(Clone)]
pub struct Neo4jMasteryGraph {
    writer: GraphWriter,
    reader: GraphReader,
}

impl Neo4jMasteryGraph {
    pub fn new(client: GraphClient) -> Self {
        Self {
            writer: GraphWriter::new(client.clone()),
            reader: GraphReader::new(client),
        }
    }
}

#[async_trait]
impl MasteryGraph for Neo4jMasteryGraph {
    async fn record_mastery(&self, student_id: StudentId, writes: &[MasteryWrite]) -> Result<()> {
        Ok(self.writer.record_mastery(student_id, writes).await?)
    }

    async fn weakest_concepts(
        &self,
        student_id: StudentId,
        threshold: f64,
        limit: usize,
    ) -> Result<Vec<String>> {
        Ok(self
            .reader
            .weakest_concepts(student_id, threshold, limit)
            .await?)
    }

    async fn mastery_profile(&self, student_id: StudentId) -> Result<Vec<ConceptMastery>> {
        Ok(self.reader.mastery_profile(student_id).await?)
    }

    async fn concept_mastery(
        &self,
        student_id: StudentId,
        concept: &str,
    ) -> Result<Option<ConceptMastery>> {
        Ok(self.reader.concept_mastery(student_id, concept).await?)
    }
}
