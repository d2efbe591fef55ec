use neo4rs::query;
use tracing::info;

use crate::GraphClient;

/// Idempotent schema setup for the mastery graph.
///
/// Student and Concept are MERGEd on every write, so their keys must be
/// unique or concurrent first-writes could create twin nodes. Concept names
/// are matched exactly as written.
pub async fn migrate(client: &GraphClient) -> Result<(), neo4rs::Error> {
    let g = &client.graph;

    info!("Running graph schema migrations...");

    let constraints = [
        "CREATE CONSTRAINT student_id_unique IF NOT EXISTS
         FOR (s:Student) REQUIRE s.student_id IS UNIQUE",
        "CREATE CONSTRAINT concept_name_unique IF NOT EXISTS
         FOR (c:Concept) REQUIRE c.name IS UNIQUE",
    ];

    for c in &constraints {
        g.run(query(c)).await?;
    }
    info!("Uniqueness constraints created");

    // Range index backing the weakest-concept scan.
    g.run(query(
        "CREATE INDEX knows_score IF NOT EXISTS FOR ()-[r:KNOWS]-() ON (r.score)",
    ))
    .await?;
    info!("Relationship indexes created");

    Ok(())
}
