//! In-memory mastery graph with the same write and query semantics as the
//! Neo4j store. Writes are staged on a copy of the edge list and swapped in
//! only when every write in the batch succeeds.

use std::collections::{BTreeSet, HashSet};
use std::sync::{Mutex, MutexGuard};

use anyhow::{bail, Result};
use async_trait::async_trait;

use dskg_common::{
    parse_timestamp, ConceptMastery, HistoryEntry, MasteryWrite, StudentId, UpdateKind,
};

use crate::MasteryGraph;

#[derive(Debug, Clone)]
struct Edge {
    student_id: StudentId,
    concept: String,
    score: Option<f64>,
    last_assessed: Option<String>,
    history: Vec<String>,
}

impl Edge {
    fn to_mastery(&self) -> ConceptMastery {
        ConceptMastery {
            concept: self.concept.clone(),
            score: self.score,
            last_assessed: self.last_assessed.as_deref().and_then(parse_timestamp),
            history: self
                .history
                .iter()
                .filter_map(|raw| HistoryEntry::from_json(raw))
                .collect(),
        }
    }
}

#[derive(Default)]
struct State {
    students: BTreeSet<StudentId>,
    /// Concept nodes in creation order.
    concepts: Vec<String>,
    /// Edges in creation order, which is also the tie order for equal scores.
    edges: Vec<Edge>,
    failing_concepts: HashSet<String>,
    unavailable: bool,
}

#[derive(Default)]
pub struct InMemoryMasteryGraph {
    state: Mutex<State>,
}

impl InMemoryMasteryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make any batch that touches `concept` fail, as a constraint violation would.
    pub fn fail_writes_for(&self, concept: &str) {
        self.lock().failing_concepts.insert(concept.to_string());
    }

    /// Simulate a lost connection: every call errors until cleared.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    pub fn student_count(&self) -> usize {
        self.lock().students.len()
    }

    pub fn concept_count(&self) -> usize {
        self.lock().concepts.len()
    }

    pub fn edge_count(&self) -> usize {
        self.lock().edges.len()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl MasteryGraph for InMemoryMasteryGraph {
    async fn record_mastery(&self, student_id: StudentId, writes: &[MasteryWrite]) -> Result<()> {
        let mut state = self.lock();
        if state.unavailable {
            bail!("mastery graph unavailable");
        }

        let mut students = state.students.clone();
        let mut concepts = state.concepts.clone();
        let mut edges = state.edges.clone();

        for w in writes {
            if state.failing_concepts.contains(&w.concept) {
                bail!("write rejected for concept {}", w.concept);
            }

            students.insert(student_id);
            if !concepts.contains(&w.concept) {
                concepts.push(w.concept.clone());
            }

            let idx = match edges
                .iter()
                .position(|e| e.student_id == student_id && e.concept == w.concept)
            {
                Some(idx) => idx,
                None => {
                    edges.push(Edge {
                        student_id,
                        concept: w.concept.clone(),
                        score: None,
                        last_assessed: None,
                        history: Vec::new(),
                    });
                    edges.len() - 1
                }
            };

            let edge = &mut edges[idx];
            if w.kind == UpdateKind::Authoritative {
                edge.score = Some(w.score);
            }
            edge.last_assessed = Some(w.timestamp());
            edge.history.push(w.history_entry().to_json());
        }

        state.students = students;
        state.concepts = concepts;
        state.edges = edges;
        Ok(())
    }

    async fn weakest_concepts(
        &self,
        student_id: StudentId,
        threshold: f64,
        limit: usize,
    ) -> Result<Vec<String>> {
        let state = self.lock();
        if state.unavailable {
            bail!("mastery graph unavailable");
        }

        let mut weak: Vec<(&str, f64)> = state
            .edges
            .iter()
            .filter(|e| e.student_id == student_id)
            .filter_map(|e| e.score.map(|s| (e.concept.as_str(), s)))
            .filter(|(_, s)| *s < threshold)
            .collect();
        weak.sort_by(|a, b| a.1.total_cmp(&b.1));

        Ok(weak
            .into_iter()
            .take(limit)
            .map(|(c, _)| c.to_string())
            .collect())
    }

    async fn mastery_profile(&self, student_id: StudentId) -> Result<Vec<ConceptMastery>> {
        let state = self.lock();
        if state.unavailable {
            bail!("mastery graph unavailable");
        }

        let mut profile: Vec<ConceptMastery> = state
            .edges
            .iter()
            .filter(|e| e.student_id == student_id)
            .map(Edge::to_mastery)
            .collect();
        // Unscored edges sort last, as nulls do in Cypher ascending order.
        profile.sort_by(|a, b| match (a.score, b.score) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });
        Ok(profile)
    }

    async fn concept_mastery(
        &self,
        student_id: StudentId,
        concept: &str,
    ) -> Result<Option<ConceptMastery>> {
        let state = self.lock();
        if state.unavailable {
            bail!("mastery graph unavailable");
        }

        Ok(state
            .edges
            .iter()
            .find(|e| e.student_id == student_id && e.concept == concept)
            .map(Edge::to_mastery))
    }
}
