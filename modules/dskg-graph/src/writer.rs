use neo4rs::{query, Query, Txn};
use tracing::{info, warn};

use dskg_common::{MasteryWrite, StudentId, UpdateKind};

use crate::GraphClient;

/// Authoritative writes replace the current score and extend the history.
const AUTHORITATIVE_CYPHER: &str = "
    MERGE (s:Student {student_id: $student_id})
    MERGE (c:Concept {name: $concept})
    MERGE (s)-[r:KNOWS]->(c)
    SET r.score = $score,
        r.last_assessed = $timestamp,
        r.history = coalesce(r.history, []) + $history_entry";

/// Remedial writes never touch r.score.
const REMEDIAL_CYPHER: &str = "
    MERGE (s:Student {student_id: $student_id})
    MERGE (c:Concept {name: $concept})
    MERGE (s)-[r:KNOWS]->(c)
    SET r.last_assessed = $timestamp,
        r.history = coalesce(r.history, []) + $history_entry";

/// Write-side wrapper for the mastery graph.
#[derive(Clone)]
pub struct GraphWriter {
    client: GraphClient,
}

impl GraphWriter {
    pub fn new(client: GraphClient) -> Self {
        Self { client }
    }

    /// Apply every write for one student inside a single transaction.
    /// Either all edges are updated or none are.
    pub async fn record_mastery(
        &self,
        student_id: StudentId,
        writes: &[MasteryWrite],
    ) -> Result<(), neo4rs::Error> {
        if writes.is_empty() {
            return Ok(());
        }

        let mut txn = self.client.graph.start_txn().await?;

        if let Err(e) = run_writes(&mut txn, student_id, writes).await {
            if let Err(rollback_err) = txn.rollback().await {
                warn!(student_id, error = %rollback_err, "Mastery transaction rollback failed");
            }
            return Err(e);
        }

        txn.commit().await?;
        info!(student_id, edges = writes.len(), "Mastery writes committed");
        Ok(())
    }
}

async fn run_writes(
    txn: &mut Txn,
    student_id: StudentId,
    writes: &[MasteryWrite],
) -> Result<(), neo4rs::Error> {
    for w in writes {
        txn.run(mastery_query(student_id, w)).await?;
    }
    Ok(())
}

fn mastery_query(student_id: StudentId, w: &MasteryWrite) -> Query {
    let cypher = match w.kind {
        UpdateKind::Authoritative => AUTHORITATIVE_CYPHER,
        UpdateKind::Remedial => REMEDIAL_CYPHER,
    };

    let q = query(cypher)
        .param("student_id", student_id)
        .param("concept", w.concept.as_str())
        .param("timestamp", w.timestamp())
        .param("history_entry", w.history_entry().to_json());

    match w.kind {
        UpdateKind::Authoritative => q.param("score", w.score),
        UpdateKind::Remedial => q,
    }
}
