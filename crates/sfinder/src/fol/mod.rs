//! First-order logic data structures for the two-variable fragment
//!
//! Literals and clauses are interned into shared, append-only stores so that
//! the search compares them by ID; quantifier prefixes are small `Copy`
//! values enumerated once per run by the [`QuantifierLattice`].

pub mod clause;
pub mod interner;
pub mod literal;
pub mod quantifier;
pub mod term;
pub mod vocabulary;

pub use clause::{Clause, ClauseEntry, ClauseId, ClauseStore, LITERALS_DELIMITER};
pub use interner::{ConstantId, Interner, PredicateId};
pub use literal::{Literal, LiteralDisplay, LiteralEntry, LiteralId, LiteralStore, Predicate};
pub use quantifier::{Quantifier, QuantifierLattice, Shape};
pub use term::{Term, TermDisplay, Variable, VariableSet};
pub use vocabulary::Vocabulary;
