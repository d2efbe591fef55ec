use neo4rs::query;

use dskg_common::{parse_timestamp, ConceptMastery, HistoryEntry, StudentId};

use crate::GraphClient;

/// Read-side wrapper for the mastery graph.
#[derive(Clone)]
pub struct GraphReader {
    client: GraphClient,
}

impl GraphReader {
    pub fn new(client: GraphClient) -> Self {
        Self { client }
    }

    /// Names of the student's concepts scored below `threshold`, lowest first.
    /// Edges that have only seen remedial writes carry no score and never match.
    pub async fn weakest_concepts(
        &self,
        student_id: StudentId,
        threshold: f64,
        limit: usize,
    ) -> Result<Vec<String>, neo4rs::Error> {
        let q = query(
            "MATCH (s:Student {student_id: $student_id})-[r:KNOWS]->(c:Concept)
             WHERE r.score < $threshold
             RETURN c.name AS concept
             ORDER BY r.score ASC
             LIMIT $limit",
        )
        .param("student_id", student_id)
        .param("threshold", threshold)
        .param("limit", limit as i64);

        let mut concepts = Vec::new();
        let mut stream = self.client.graph.execute(q).await?;
        while let Some(row) = stream.next().await? {
            if let Ok(name) = row.get::<String>("concept") {
                concepts.push(name);
            }
        }
        Ok(concepts)
    }

    /// Every KNOWS edge of the student, lowest score first.
    pub async fn mastery_profile(
        &self,
        student_id: StudentId,
    ) -> Result<Vec<ConceptMastery>, neo4rs::Error> {
        let q = query(
            "MATCH (s:Student {student_id: $student_id})-[r:KNOWS]->(c:Concept)
             RETURN c.name AS concept, r.score AS score,
                    r.last_assessed AS last_assessed, r.history AS history
             ORDER BY r.score ASC",
        )
        .param("student_id", student_id);

        let mut profile = Vec::new();
        let mut stream = self.client.graph.execute(q).await?;
        while let Some(row) = stream.next().await? {
            if let Some(edge) = row_to_mastery(&row) {
                profile.push(edge);
            }
        }
        Ok(profile)
    }

    /// A single edge, if the student has ever been assessed on `concept`.
    pub async fn concept_mastery(
        &self,
        student_id: StudentId,
        concept: &str,
    ) -> Result<Option<ConceptMastery>, neo4rs::Error> {
        let q = query(
            "MATCH (s:Student {student_id: $student_id})-[r:KNOWS]->(c:Concept {name: $concept})
             RETURN c.name AS concept, r.score AS score,
                    r.last_assessed AS last_assessed, r.history AS history",
        )
        .param("student_id", student_id)
        .param("concept", concept);

        let mut stream = self.client.graph.execute(q).await?;
        match stream.next().await? {
            Some(row) => Ok(row_to_mastery(&row)),
            None => Ok(None),
        }
    }
}

fn row_to_mastery(row: &neo4rs::Row) -> Option<ConceptMastery> {
    let concept: String = row.get("concept").ok()?;
    let score: Option<f64> = row.get::<f64>("score").ok();
    let last_assessed = row
        .get::<String>("last_assessed")
        .ok()
        .and_then(|raw| parse_timestamp(&raw));
    let history = row
        .get::<Vec<String>>("history")
        .unwrap_or_default()
        .iter()
        .filter_map(|raw| HistoryEntry::from_json(raw))
        .collect();

    Some(ConceptMastery {
        concept,
        score,
        last_assessed,
        history,
    })
}
