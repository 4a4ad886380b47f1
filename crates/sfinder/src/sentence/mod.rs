//! Sentences: conjunctions of interned clauses
//!
//! A [`Sentence`] is the unit of the search. It is grown by appending clauses
//! and carries two memoized signatures: the plain canonical form (clause
//! canonicals, sorted) and the ultra-canonical form computed by
//! [`Canonicalizer`], which is invariant under predicate relabeling, negation
//! and direction flips, and mirroring of decomposable clauses.

pub mod canonical;

pub use canonical::Canonicalizer;

use crate::error::{Result, SearchError};
use crate::fol::{ClauseId, ClauseStore, Predicate, Quantifier};
use indexmap::IndexMap;
use std::sync::OnceLock;

/// Separator between clauses in printed sentences
pub const CLAUSES_DELIMITER: &str = " & ";

/// An ordered list of clauses read as their conjunction
#[derive(Debug, Clone, Default)]
pub struct Sentence {
    clauses: Vec<ClauseId>,
    literal_count: usize,
    canonical: OnceLock<String>,
    ultra: OnceLock<String>,
}

impl Sentence {
    /// The empty sentence, the root of every search
    pub fn empty() -> Self {
        Sentence::default()
    }

    pub fn new(clauses: Vec<ClauseId>, store: &ClauseStore) -> Self {
        let literal_count = clauses.iter().map(|c| store.len_of(*c)).sum();
        Sentence {
            clauses,
            literal_count,
            canonical: OnceLock::new(),
            ultra: OnceLock::new(),
        }
    }

    /// A new sentence with `clause` appended
    pub fn extend(&self, clause: ClauseId, store: &ClauseStore) -> Sentence {
        let mut clauses = Vec::with_capacity(self.clauses.len() + 1);
        clauses.extend_from_slice(&self.clauses);
        clauses.push(clause);
        Sentence {
            clauses,
            literal_count: self.literal_count + store.len_of(clause),
            canonical: OnceLock::new(),
            ultra: OnceLock::new(),
        }
    }

    pub fn clauses(&self) -> &[ClauseId] {
        &self.clauses
    }

    /// Number of clauses
    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Total number of literals over all clauses
    pub fn count_literals(&self) -> usize {
        self.literal_count
    }

    /// Distinct predicates, sorted
    pub fn predicates(&self, store: &ClauseStore) -> Vec<Predicate> {
        let mut predicates: Vec<Predicate> = self
            .clauses
            .iter()
            .flat_map(|c| store.get(*c).predicates().to_vec())
            .collect();
        predicates.sort_unstable();
        predicates.dedup();
        predicates
    }

    pub fn contains_predicate(&self, predicate: &Predicate, store: &ClauseStore) -> bool {
        self.clauses
            .iter()
            .any(|c| store.get(*c).predicates().contains(predicate))
    }

    pub fn has_cliffhanger(&self, store: &ClauseStore) -> bool {
        self.clauses.iter().any(|c| store.get(*c).is_cliffhanger())
    }

    /// Whether some clause factors into two single-variable parts
    pub fn has_decomposable(&self, store: &ClauseStore) -> bool {
        self.clauses.iter().any(|c| store.get(*c).is_decomposable())
    }

    /// How many clauses use each quantifier, in order of first occurrence
    pub fn quantifier_distribution(&self, store: &ClauseStore) -> IndexMap<Quantifier, usize> {
        let mut distribution = IndexMap::new();
        for clause in &self.clauses {
            *distribution.entry(store.get(*clause).quantifier()).or_insert(0) += 1;
        }
        distribution
    }

    /// Clause canonical forms, sorted and joined
    pub fn canonical(&self, store: &ClauseStore) -> &str {
        self.canonical.get_or_init(|| {
            let mut parts: Vec<_> = self.clauses.iter().map(|c| store.canonical(*c)).collect();
            parts.sort();
            parts.join(CLAUSES_DELIMITER)
        })
    }

    /// Smallest canonical form over the whole symmetry group
    pub fn ultra_canonical(&self, canonicalizer: &Canonicalizer) -> &str {
        self.ultra
            .get_or_init(|| canonicalizer.ultra_canonical(&self.clauses))
    }

    /// Clauses in sentence order, e.g. `(V x U0(x)) & (E x V y B0(x,y))`
    pub fn to_fol(&self, store: &ClauseStore) -> String {
        self.clauses
            .iter()
            .map(|c| store.to_fol(*c))
            .collect::<Vec<_>>()
            .join(CLAUSES_DELIMITER)
    }

    /// Parse clauses separated by ` & `; blank text is the empty sentence
    pub fn parse(text: &str, store: &ClauseStore) -> Result<Sentence> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Sentence::empty());
        }
        let clauses = text
            .split(CLAUSES_DELIMITER)
            .map(|part| {
                let part = part.trim();
                if !part.starts_with('(') || !part.ends_with(')') {
                    return Err(SearchError::Parse(format!(
                        "clause must be parenthesized: {part}"
                    )));
                }
                store.parse(part)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Sentence::new(clauses, store))
    }

    /// Drop the memoized signatures
    pub fn free_memory(&mut self) {
        self.canonical = OnceLock::new();
        self.ultra = OnceLock::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fol::{Interner, LiteralStore};
    use std::sync::Arc;

    fn store() -> ClauseStore {
        ClauseStore::new(Arc::new(LiteralStore::new(Arc::new(Interner::new()))))
    }

    #[test]
    fn test_parse_and_print() {
        let store = store();
        let text = "(V x U0(x)) & (E x V y B0(x,y) | ~U0(y))";
        let sentence = Sentence::parse(text, &store).unwrap();
        assert_eq!(sentence.len(), 2);
        assert_eq!(sentence.count_literals(), 3);
        assert_eq!(sentence.to_fol(&store), "(V x U0(x)) & (E x V y B0(x,y) | ~U0(y))");
    }

    #[test]
    fn test_parse_empty() {
        let store = store();
        let sentence = Sentence::parse("  ", &store).unwrap();
        assert!(sentence.is_empty());
        assert_eq!(sentence.to_fol(&store), "");
    }

    #[test]
    fn test_parse_rejects_bare_clause() {
        let store = store();
        assert!(Sentence::parse("V x U0(x)", &store).is_err());
    }

    #[test]
    fn test_canonical_ignores_clause_order() {
        let store = store();
        let a = Sentence::parse("(V x U0(x)) & (E x ~U0(x))", &store).unwrap();
        let b = Sentence::parse("(E x ~U0(x)) & (V x U0(x))", &store).unwrap();
        assert_eq!(a.canonical(&store), b.canonical(&store));
        assert_ne!(a.to_fol(&store), b.to_fol(&store));
    }

    #[test]
    fn test_extend() {
        let store = store();
        let base = Sentence::parse("(V x U0(x))", &store).unwrap();
        let clause = store.parse("(V x V y B0(x,y) | B0(y,x))").unwrap();
        let extended = base.extend(clause, &store);
        assert_eq!(extended.len(), 2);
        assert_eq!(extended.count_literals(), 3);
        assert_eq!(base.len(), 1);
    }

    #[test]
    fn test_predicates_and_distribution() {
        let store = store();
        let sentence =
            Sentence::parse("(V x U0(x)) & (V x ~U0(x) | U1(x)) & (E x V y B0(x,y))", &store)
                .unwrap();
        assert_eq!(sentence.predicates(&store).len(), 3);
        let distribution = sentence.quantifier_distribution(&store);
        assert_eq!(distribution.len(), 2);
        assert_eq!(distribution.get_index(0).map(|(_, n)| *n), Some(2));
    }

    #[test]
    fn test_cliffhanger() {
        let store = store();
        let hanging = Sentence::parse("(V x U0(x)) & (E x V y B0(x,y))", &store).unwrap();
        assert!(hanging.has_cliffhanger(&store));
        let solid = Sentence::parse("(V x U0(x) | U1(x))", &store).unwrap();
        assert!(!solid.has_cliffhanger(&store));
    }

    #[test]
    fn test_free_memory_recomputes() {
        let store = store();
        let mut sentence = Sentence::parse("(V x U0(x))", &store).unwrap();
        let before = sentence.canonical(&store).to_string();
        sentence.free_memory();
        assert_eq!(sentence.canonical(&store), before);
    }
}
