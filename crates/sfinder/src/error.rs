//! Error types for sentence search

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid seed: {0}")]
    Seed(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Prover error: {0}")]
    Prover(String),

    #[error("Cell graph error: {0}")]
    CellGraph(String),

    #[error("Cell graph batch mismatch: expected {expected} results, received {received}")]
    CellGraphBatch { expected: usize, received: usize },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Cannot resume: {0}")]
    Resume(String),
}

pub type Result<T> = std::result::Result<T, SearchError>;
