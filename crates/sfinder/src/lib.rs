//! sfinder: enumeration of FO2/C2 sentences up to predicate relabeling
//!
//! The search grows sentences layer by layer, one layer per total literal
//! count. Clauses come from a precomputed basis; candidate sentences are
//! deduplicated by their ultra-canonical form, which is invariant under
//! renaming predicates, flipping their signs and argument order, and
//! mirroring decomposable clauses. Redundant sentences are pruned by
//! syntactic filters, an optional Prover9 contradiction check and optional
//! cell-graph isomorphism.

pub mod cell_graph;
pub mod config;
pub mod error;
pub mod fol;
pub mod generating;
pub mod matching;
pub mod prover;
pub mod search;
pub mod sentence;

pub use cell_graph::{CellGraph, CellGraphCache, CellGraphComputer, CellGraphRegistry};
pub use config::{SearchConfig, SearchMode};
pub use error::{Result, SearchError};
pub use fol::{
    Clause, ClauseId, ClauseStore, Interner, Literal, LiteralId, LiteralStore, Predicate,
    Quantifier, QuantifierLattice, Shape, Vocabulary,
};
pub use matching::{Matcher, Matching, Structure};
pub use prover::{NoProver, Prover, Prover9};
pub use search::{Reporter, SearchEngine, SearchStatus, SearchSummary, StatesLog};
pub use sentence::{Canonicalizer, Sentence};
