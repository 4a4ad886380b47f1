//! Filters applied while joining clauses into sentences
//!
//! A [`JoiningFilter`] decides whether a basis clause may be appended to a
//! sentence; it is cheap and runs on every candidate pair. A
//! [`SentenceFilter`] judges a finished candidate sentence. Sentence filters
//! are used twice by the search: to drop candidates (contradictions) and to
//! hide survivors from the output while keeping them as search state
//! (reflexive atoms).

use crate::error::Result;
use crate::fol::{ClauseId, ClauseStore, Predicate, Vocabulary};
use crate::prover::Prover;
use crate::sentence::Sentence;
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;

/// Whether `clause` may be appended to `sentence`
pub trait JoiningFilter: Send + Sync {
    fn name(&self) -> &str;

    fn accepts(&self, sentence: &Sentence, clause: ClauseId) -> bool;
}

/// A predicate over whole sentences
pub trait SentenceFilter: Send + Sync {
    fn name(&self) -> &str;

    fn accepts(&self, sentence: &Sentence) -> Result<bool>;
}

/// Run every joining filter; the first rejection wins
pub fn joinable(filters: &[Box<dyn JoiningFilter>], sentence: &Sentence, clause: ClauseId) -> bool {
    filters.iter().all(|f| f.accepts(sentence, clause))
}

/// Never the same clause twice, also up to exchanging `x` and `y` under a
/// swappable quantifier
pub struct DisjunctiveClausesFilter {
    store: Arc<ClauseStore>,
}

impl DisjunctiveClausesFilter {
    pub fn new(store: Arc<ClauseStore>) -> Self {
        DisjunctiveClausesFilter { store }
    }
}

impl JoiningFilter for DisjunctiveClausesFilter {
    fn name(&self) -> &str {
        "DisjunctiveClauses"
    }

    fn accepts(&self, sentence: &Sentence, clause: ClauseId) -> bool {
        let entry = self.store.get(clause);
        let quantifier = entry.quantifier();
        let swapped = quantifier
            .is_swappable()
            .then(|| entry.clause().swap(self.store.literals()));
        sentence.clauses().iter().all(|present| {
            if *present == clause {
                return false;
            }
            let other = self.store.get(*present);
            !(other.quantifier() == quantifier && swapped.as_ref() == Some(other.clause()))
        })
    }
}

/// Predicates enter sentences in vocabulary order
///
/// Within each arity the predicates form a chain `P0 -> P1 -> ...`. A clause
/// may introduce a predicate only when its predecessor in the chain is
/// already in the sentence or is introduced by the same clause (recursively),
/// so `U1` never appears in a sentence without `U0`.
pub struct LanguageBiasFilter {
    store: Arc<ClauseStore>,
    followers: FxHashMap<Predicate, Predicate>,
    predecessors: FxHashMap<Predicate, Predicate>,
    roots: FxHashSet<Predicate>,
}

impl LanguageBiasFilter {
    pub fn new(store: Arc<ClauseStore>, vocabulary: &Vocabulary) -> Self {
        let followers = vocabulary.followers();
        let predecessors: FxHashMap<Predicate, Predicate> =
            followers.iter().map(|(from, to)| (*to, *from)).collect();
        let roots = vocabulary
            .predicates()
            .filter(|p| !predecessors.contains_key(p))
            .collect();
        LanguageBiasFilter {
            store,
            followers,
            predecessors,
            roots,
        }
    }

    fn can_follow(&self, predicate: Predicate, introduced: &[Predicate], inside: &[Predicate]) -> bool {
        let mut current = predicate;
        loop {
            if inside.contains(&current) {
                return true;
            }
            let Some(previous) = self.predecessors.get(&current) else {
                return true;
            };
            if inside.contains(previous) {
                return true;
            }
            if !introduced.contains(previous) {
                return false;
            }
            current = *previous;
        }
    }
}

impl JoiningFilter for LanguageBiasFilter {
    fn name(&self) -> &str {
        "LanguageBias"
    }

    fn accepts(&self, sentence: &Sentence, clause: ClauseId) -> bool {
        let inside = sentence.predicates(&self.store);
        let possible: FxHashSet<Predicate> = inside
            .iter()
            .filter_map(|p| self.followers.get(p).copied())
            .chain(self.roots.iter().copied())
            .collect();
        let entry = self.store.get(clause);
        let introduced = entry.predicates();
        introduced
            .iter()
            .filter(|p| !inside.contains(p) && !possible.contains(p))
            .all(|p| self.can_follow(*p, introduced, &inside))
    }
}

/// At most `max` clauses per sentence
pub struct MaxClausesFilter {
    max: usize,
}

impl MaxClausesFilter {
    pub fn new(max: usize) -> Self {
        MaxClausesFilter { max }
    }
}

impl JoiningFilter for MaxClausesFilter {
    fn name(&self) -> &str {
        "MaxClauses"
    }

    fn accepts(&self, sentence: &Sentence, _clause: ClauseId) -> bool {
        sentence.len() < self.max
    }
}

/// At most `max` literals per sentence
pub struct MaxOverallLiteralsFilter {
    store: Arc<ClauseStore>,
    max: usize,
}

impl MaxOverallLiteralsFilter {
    pub fn new(store: Arc<ClauseStore>, max: usize) -> Self {
        MaxOverallLiteralsFilter { store, max }
    }
}

impl JoiningFilter for MaxOverallLiteralsFilter {
    fn name(&self) -> &str {
        "MaxOverallLiterals"
    }

    fn accepts(&self, sentence: &Sentence, clause: ClauseId) -> bool {
        sentence.count_literals() + self.store.len_of(clause) <= self.max
    }
}

/// A clause joining a non-empty sentence must share a predicate with it
pub struct ConnectedComponentsFilter {
    store: Arc<ClauseStore>,
}

impl ConnectedComponentsFilter {
    pub fn new(store: Arc<ClauseStore>) -> Self {
        ConnectedComponentsFilter { store }
    }
}

impl JoiningFilter for ConnectedComponentsFilter {
    fn name(&self) -> &str {
        "ConnectedComponents"
    }

    fn accepts(&self, sentence: &Sentence, clause: ClauseId) -> bool {
        sentence.is_empty()
            || self
                .store
                .get(clause)
                .predicates()
                .iter()
                .any(|p| sentence.contains_predicate(p, &self.store))
    }
}

/// Cliffhangers never take part in a join
pub struct TrivialConstraintsFilter {
    store: Arc<ClauseStore>,
}

impl TrivialConstraintsFilter {
    pub fn new(store: Arc<ClauseStore>) -> Self {
        TrivialConstraintsFilter { store }
    }
}

impl JoiningFilter for TrivialConstraintsFilter {
    fn name(&self) -> &str {
        "TrivialConstraints"
    }

    fn accepts(&self, sentence: &Sentence, clause: ClauseId) -> bool {
        !self.store.get(clause).is_cliffhanger() && !sentence.has_cliffhanger(&self.store)
    }
}

/// At most `max` clauses under a counting quantifier
pub struct MaxCountingClausesFilter {
    store: Arc<ClauseStore>,
    max: usize,
}

impl MaxCountingClausesFilter {
    pub fn new(store: Arc<ClauseStore>, max: usize) -> Self {
        MaxCountingClausesFilter { store, max }
    }
}

impl JoiningFilter for MaxCountingClausesFilter {
    fn name(&self) -> &str {
        "MaxCountingClauses"
    }

    fn accepts(&self, sentence: &Sentence, clause: ClauseId) -> bool {
        if !self.store.get(clause).quantifier().is_counting() {
            return true;
        }
        let present = sentence
            .clauses()
            .iter()
            .filter(|c| self.store.get(**c).quantifier().is_counting())
            .count();
        present < self.max
    }
}

/// Drops sentences whose non-counting clauses the prover refutes
pub struct ContradictionFilter {
    store: Arc<ClauseStore>,
    prover: Arc<dyn Prover>,
}

impl ContradictionFilter {
    pub fn new(store: Arc<ClauseStore>, prover: Arc<dyn Prover>) -> Self {
        ContradictionFilter { store, prover }
    }

    /// One Prover9 formula per line; empty when every clause counts
    pub fn formulas(&self, sentence: &Sentence) -> String {
        let mut formulas = String::new();
        for formula in sentence.clauses().iter().filter_map(|c| self.store.prover9(*c)) {
            formulas.push_str(&formula);
            formulas.push('\n');
        }
        formulas
    }
}

impl SentenceFilter for ContradictionFilter {
    fn name(&self) -> &str {
        "ContradictionFilter"
    }

    fn accepts(&self, sentence: &Sentence) -> Result<bool> {
        let formulas = self.formulas(sentence);
        if formulas.is_empty() {
            return Ok(true);
        }
        Ok(!self.prover.is_provable(&formulas)?)
    }
}

/// Rejects sentences of two or more literals in which some binary predicate
/// only occurs with equal arguments
pub struct ReflexiveAtomsFilter {
    store: Arc<ClauseStore>,
}

impl ReflexiveAtomsFilter {
    pub fn new(store: Arc<ClauseStore>) -> Self {
        ReflexiveAtomsFilter { store }
    }
}

impl SentenceFilter for ReflexiveAtomsFilter {
    fn name(&self) -> &str {
        "ReflexiveAtoms"
    }

    fn accepts(&self, sentence: &Sentence) -> Result<bool> {
        if sentence.count_literals() < 2 {
            return Ok(true);
        }
        let literals = self.store.literals();
        let mut binary: FxHashSet<Predicate> = FxHashSet::default();
        let mut non_reflexive: FxHashSet<Predicate> = FxHashSet::default();
        for clause in sentence.clauses() {
            for literal in self.store.get(*clause).clause().literals() {
                let entry = literals.get(*literal);
                if entry.predicate().arity != 2 {
                    continue;
                }
                binary.insert(entry.predicate());
                if !entry.literal().is_reflexive() {
                    non_reflexive.insert(entry.predicate());
                }
            }
        }
        Ok(binary.is_subset(&non_reflexive))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fol::{Interner, LiteralStore};

    struct Fixture {
        store: Arc<ClauseStore>,
        vocabulary: Vocabulary,
    }

    fn fixture(unary: usize, binary: usize) -> Fixture {
        let interner = Arc::new(Interner::new());
        let vocabulary = Vocabulary::new(&interner, unary, binary);
        let store = Arc::new(ClauseStore::new(Arc::new(LiteralStore::new(interner))));
        Fixture { store, vocabulary }
    }

    impl Fixture {
        fn sentence(&self, text: &str) -> Sentence {
            Sentence::parse(text, &self.store).unwrap()
        }

        fn clause(&self, text: &str) -> ClauseId {
            self.store.parse(text).unwrap()
        }
    }

    struct AlwaysProves;

    impl Prover for AlwaysProves {
        fn name(&self) -> &str {
            "always"
        }

        fn is_provable(&self, _formulas: &str) -> Result<bool> {
            Ok(true)
        }
    }

    #[test]
    fn test_disjunctive_clauses() {
        let f = fixture(1, 1);
        let filter = DisjunctiveClausesFilter::new(Arc::clone(&f.store));
        let sentence = f.sentence("(V x V y B0(x,y) | U0(x))");
        assert!(!filter.accepts(&sentence, f.clause("(V x V y B0(x,y) | U0(x))")));
        assert!(!filter.accepts(&sentence, f.clause("(V x V y B0(y,x) | U0(y))")));
        assert!(filter.accepts(&sentence, f.clause("(V x E y B0(x,y) | U0(x))")));
    }

    #[test]
    fn test_language_bias() {
        let f = fixture(3, 1);
        let filter = LanguageBiasFilter::new(Arc::clone(&f.store), &f.vocabulary);
        let empty = Sentence::empty();
        assert!(filter.accepts(&empty, f.clause("(V x U0(x))")));
        assert!(!filter.accepts(&empty, f.clause("(V x U1(x))")));
        assert!(filter.accepts(&empty, f.clause("(V x U0(x) | U1(x))")));
        assert!(filter.accepts(&empty, f.clause("(V x U0(x) | U1(x) | U2(x))")));
        assert!(!filter.accepts(&empty, f.clause("(V x U0(x) | U2(x))")));
        let with_u0 = f.sentence("(V x U0(x))");
        assert!(filter.accepts(&with_u0, f.clause("(E x U1(x))")));
        assert!(!filter.accepts(&with_u0, f.clause("(E x U2(x))")));
        assert!(filter.accepts(&with_u0, f.clause("(E x V y B0(x,y))")));
    }

    #[test]
    fn test_limits() {
        let f = fixture(2, 0);
        let sentence = f.sentence("(V x U0(x) | U1(x)) & (E x U0(x))");
        let clause = f.clause("(E x U1(x))");
        assert!(!MaxClausesFilter::new(2).accepts(&sentence, clause));
        assert!(MaxClausesFilter::new(3).accepts(&sentence, clause));
        assert!(MaxOverallLiteralsFilter::new(Arc::clone(&f.store), 4).accepts(&sentence, clause));
        assert!(!MaxOverallLiteralsFilter::new(Arc::clone(&f.store), 3).accepts(&sentence, clause));
    }

    #[test]
    fn test_connected_components() {
        let f = fixture(2, 0);
        let filter = ConnectedComponentsFilter::new(Arc::clone(&f.store));
        assert!(filter.accepts(&Sentence::empty(), f.clause("(E x U1(x))")));
        let sentence = f.sentence("(E x U0(x))");
        assert!(!filter.accepts(&sentence, f.clause("(E x U1(x))")));
        assert!(filter.accepts(&sentence, f.clause("(V x ~U0(x) | U1(x))")));
    }

    #[test]
    fn test_trivial_constraints() {
        let f = fixture(1, 1);
        let filter = TrivialConstraintsFilter::new(Arc::clone(&f.store));
        let plain = f.sentence("(E x U0(x))");
        assert!(!filter.accepts(&plain, f.clause("(V x ~U0(x))")));
        assert!(!filter.accepts(&f.sentence("(V x V y B0(x,y))"), f.clause("(E x U0(x))")));
        assert!(filter.accepts(&plain, f.clause("(V x V y B0(x,x))")));
    }

    #[test]
    fn test_max_counting_clauses() {
        let f = fixture(1, 1);
        let filter = MaxCountingClausesFilter::new(Arc::clone(&f.store), 1);
        let counting = f.sentence("(E=1 x U0(x))");
        assert!(!filter.accepts(&counting, f.clause("(V x E=1 y B0(x,y))")));
        assert!(filter.accepts(&counting, f.clause("(V x E y B0(x,y))")));
        assert!(filter.accepts(&f.sentence("(E x U0(x))"), f.clause("(E=1 x U0(x))")));
    }

    #[test]
    fn test_contradiction_skips_counting_clauses() {
        let f = fixture(1, 0);
        let filter = ContradictionFilter::new(Arc::clone(&f.store), Arc::new(AlwaysProves));
        let counting = f.sentence("(E=1 x U0(x))");
        assert_eq!(filter.formulas(&counting), "");
        assert!(filter.accepts(&counting).unwrap());
        let plain = f.sentence("(V x U0(x)) & (E=1 x U0(x)) & (E x ~U0(x))");
        assert_eq!(
            filter.formulas(&plain),
            "all x (U0(x)).\nexists x (-U0(x)).\n"
        );
        assert!(!filter.accepts(&plain).unwrap());
    }

    #[test]
    fn test_reflexive_atoms() {
        let f = fixture(1, 1);
        let filter = ReflexiveAtomsFilter::new(Arc::clone(&f.store));
        assert!(filter.accepts(&f.sentence("(V x B0(x,x))")).unwrap());
        assert!(!filter.accepts(&f.sentence("(V x B0(x,x) | U0(x))")).unwrap());
        assert!(filter
            .accepts(&f.sentence("(V x B0(x,x) | U0(x)) & (E x E y B0(x,y))"))
            .unwrap());
    }
}
