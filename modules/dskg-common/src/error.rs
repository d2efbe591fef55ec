use thiserror::Error;

#[derive(Error, Debug)]
pub enum DskgError {
    #[error("Graph error: {0}")]
    Graph(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Quiz generation error: {0}")]
    Generation(String),

    #[error("Evaluation error: {0}")]
    Evaluation(String),

    /// Deliberately vague: callers must not learn whether a record exists
    /// but belongs to someone else.
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl DskgError {
    pub fn graph(e: impl std::fmt::Display) -> Self {
        DskgError::Graph(e.to_string())
    }

    pub fn store(e: impl std::fmt::Display) -> Self {
        DskgError::Store(e.to_string())
    }
}
