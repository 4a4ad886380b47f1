//! Search configuration

use crate::error::{Result, SearchError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Order in which sentences are expanded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Layer by layer, one layer per literal count
    #[default]
    Bfs,
    /// Sentence by sentence from the base, smallest ultra-canonical form
    /// first, with a closed list of every form seen
    Dfs,
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchMode::Bfs => write!(f, "bfs"),
            SearchMode::Dfs => write!(f, "dfs"),
        }
    }
}

impl FromStr for SearchMode {
    type Err = SearchError;

    fn from_str(text: &str) -> Result<Self> {
        match text.to_ascii_lowercase().as_str() {
            "bfs" => Ok(SearchMode::Bfs),
            "dfs" => Ok(SearchMode::Dfs),
            other => Err(SearchError::Config(format!(
                "unknown search mode {other}, expected bfs or dfs"
            ))),
        }
    }
}

/// Everything that shapes one search run
///
/// The defaults describe a small FO2 search over one unary and one binary
/// predicate with every pruning enabled. Paths to external tools are
/// optional: without a prover the prover-backed filters accept everything,
/// without a cell-graph script no cell-graph hiding takes place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub mode: SearchMode,
    /// Literals over all clauses of a sentence; `None` means
    /// `max_clauses * max_literals_per_clause`
    pub max_overall_literals: Option<usize>,
    pub max_clauses: usize,
    pub max_literals_per_clause: usize,
    pub unary_predicates: usize,
    pub binary_predicates: usize,
    pub variables: usize,
    /// Existential quantifiers enabled
    pub quantifiers: bool,
    /// Largest counting bound `k` of `E=k`; 0 disables counting quantifiers
    pub max_k: u32,
    pub max_counting_clauses: usize,
    pub max_literals_per_counting_clause: usize,
    pub double_counting_exist: bool,
    pub decomposable_components: bool,
    pub trivial_constraints: bool,
    pub quantifiers_reducibility: bool,
    pub language_bias: bool,
    pub subsumption: bool,
    pub naive_tautology: bool,
    pub tautology_filter: bool,
    pub contradiction_filter: bool,
    pub reflexive_atoms: bool,
    pub prover9_path: Option<PathBuf>,
    pub max_prover9_seconds: u64,
    pub cell_graph_script: Option<PathBuf>,
    pub julia_threads: usize,
    /// Hide by equal canonical forms of cell graphs instead of pairwise
    /// isomorphism tests
    pub canonical_cell_graphs: bool,
    /// Seconds the cell-graph tool may spend on one batch
    pub cell_time_limit: u64,
    /// Wall-clock budget in minutes; 0 means no limit
    pub time_limit: Option<u64>,
    pub seed: Option<String>,
    pub states_log: Option<PathBuf>,
    pub resume_from: Option<PathBuf>,
    pub threads: Option<usize>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            mode: SearchMode::Bfs,
            max_overall_literals: None,
            max_clauses: 3,
            max_literals_per_clause: 3,
            unary_predicates: 1,
            binary_predicates: 1,
            variables: 2,
            quantifiers: true,
            max_k: 1,
            max_counting_clauses: 1,
            max_literals_per_counting_clause: 1,
            double_counting_exist: false,
            decomposable_components: true,
            trivial_constraints: true,
            quantifiers_reducibility: true,
            language_bias: true,
            subsumption: true,
            naive_tautology: true,
            tautology_filter: true,
            contradiction_filter: true,
            reflexive_atoms: true,
            prover9_path: None,
            max_prover9_seconds: 30,
            cell_graph_script: None,
            julia_threads: 1,
            canonical_cell_graphs: false,
            cell_time_limit: 3600,
            time_limit: None,
            seed: None,
            states_log: None,
            resume_from: None,
            threads: None,
        }
    }
}

impl SearchConfig {
    /// Reject configurations the search cannot run
    pub fn validate(&self) -> Result<()> {
        if self.variables != 2 {
            return Err(SearchError::Config(format!(
                "only two variables are supported, got {}",
                self.variables
            )));
        }
        if self.unary_predicates + self.binary_predicates == 0 {
            return Err(SearchError::Config(
                "at least one predicate is required".to_string(),
            ));
        }
        if self.max_clauses == 0 {
            return Err(SearchError::Config("max_clauses must be at least 1".to_string()));
        }
        if self.max_literals_per_clause == 0 {
            return Err(SearchError::Config(
                "max_literals_per_clause must be at least 1".to_string(),
            ));
        }
        if self.max_overall_literals == Some(0) {
            return Err(SearchError::Config(
                "max_overall_literals must be at least 1".to_string(),
            ));
        }
        if self.threads == Some(0) || self.julia_threads == 0 {
            return Err(SearchError::Config("thread counts must be positive".to_string()));
        }
        Ok(())
    }

    pub fn overall_literals(&self) -> usize {
        self.max_overall_literals
            .unwrap_or(self.max_clauses * self.max_literals_per_clause)
    }

    /// Counting quantifiers are generated when `max_k > 0`
    pub fn counting(&self) -> bool {
        self.max_k > 0
    }

    pub fn time_limit(&self) -> Option<Duration> {
        self.time_limit
            .filter(|minutes| *minutes > 0)
            .map(|minutes| Duration::from_secs(minutes * 60))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
