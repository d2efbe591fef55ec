use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Students are keyed by the relational user id.
pub type StudentId = i64;

/// Score below which a concept counts as weak.
pub const MASTERY_THRESHOLD: f64 = 0.7;

/// How many weak concepts the selector returns at most.
pub const WEAK_CONCEPT_LIMIT: usize = 3;

// --- Update kinds ---

/// Which write policy a mastery update follows.
///
/// Authoritative updates come from primary graded coursework and overwrite the
/// edge score. Remedial updates come from practice quizzes and only extend the
/// history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    Authoritative,
    Remedial,
}

impl std::fmt::Display for UpdateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpdateKind::Authoritative => write!(f, "authoritative"),
            UpdateKind::Remedial => write!(f, "remedial"),
        }
    }
}

/// Tag carried by non-authoritative history entries. Authoritative entries
/// carry no tag at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryKind {
    Remedial,
}

// --- History ---

/// One entry of a KNOWS edge's append-only history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub score: f64,
    pub date: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<HistoryKind>,
}

impl HistoryEntry {
    pub fn new(score: f64, at: &DateTime<Utc>, update: UpdateKind) -> Self {
        Self {
            score,
            date: format_timestamp(at),
            kind: match update {
                UpdateKind::Authoritative => None,
                UpdateKind::Remedial => Some(HistoryKind::Remedial),
            },
        }
    }

    pub fn is_remedial(&self) -> bool {
        self.kind == Some(HistoryKind::Remedial)
    }

    /// Serialized form stored on the edge. Graph properties cannot hold maps
    /// inside lists, so each entry is kept as a JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn from_json(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }
}

// --- Writes ---

/// A single averaged write against one (student, concept) edge.
#[derive(Debug, Clone, PartialEq)]
pub struct MasteryWrite {
    pub concept: String,
    pub score: f64,
    pub kind: UpdateKind,
    pub at: DateTime<Utc>,
}

impl MasteryWrite {
    pub fn history_entry(&self) -> HistoryEntry {
        HistoryEntry::new(self.score, &self.at, self.kind)
    }

    pub fn timestamp(&self) -> String {
        format_timestamp(&self.at)
    }
}

// --- Read model ---

/// Current state of a Student -KNOWS-> Concept edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptMastery {
    pub concept: String,
    /// Absent when the edge has only ever received remedial writes.
    pub score: Option<f64>,
    pub last_assessed: Option<DateTime<Utc>>,
    pub history: Vec<HistoryEntry>,
}

/// ISO-8601 UTC timestamp with an explicit offset, as stored on the graph.
pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, false)
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
