//! Quantified clauses and the shared clause store

use super::literal::{LiteralId, LiteralStore, Predicate};
use super::quantifier::{Quantifier, Shape};
use super::interner::FxDashMap;
use super::term::VariableSet;
use crate::error::{Result, SearchError};
use crate::matching::Structure;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, OnceLock};

/// Separator between literals in printed clauses
pub const LITERALS_DELIMITER: &str = " | ";

/// A set of literals under one quantifier prefix
///
/// Literals are kept sorted by ID and deduplicated, so two clauses built from
/// the same literals in any order are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Clause {
    quantifier: Quantifier,
    literals: Vec<LiteralId>,
}

impl Clause {
    pub fn new(quantifier: Quantifier, literals: impl IntoIterator<Item = LiteralId>) -> Self {
        let mut literals: Vec<LiteralId> = literals.into_iter().collect();
        literals.sort_unstable();
        literals.dedup();
        Clause {
            quantifier,
            literals,
        }
    }

    pub fn quantifier(&self) -> Quantifier {
        self.quantifier
    }

    pub fn literals(&self) -> &[LiteralId] {
        &self.literals
    }

    pub fn len(&self) -> usize {
        self.literals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.literals.is_empty()
    }

    pub fn contains(&self, literal: LiteralId) -> bool {
        self.literals.binary_search(&literal).is_ok()
    }

    /// Whether every literal of `other` occurs in this clause
    pub fn contains_all(&self, other: &Clause) -> bool {
        other.literals.iter().all(|l| self.contains(*l))
    }

    pub fn is_counting(&self) -> bool {
        self.quantifier.is_counting()
    }

    /// Variables used by the literals
    pub fn variables(&self, store: &LiteralStore) -> VariableSet {
        self.literals
            .iter()
            .fold(VariableSet::EMPTY, |set, l| set.union(store.variables(*l)))
    }

    /// A two-variable clause none of whose literals mentions both variables
    pub fn is_decomposable(&self, store: &LiteralStore) -> bool {
        self.quantifier.variable_count() == 2
            && self.literals.iter().all(|l| store.variables(*l).len() < 2)
    }

    /// Single-literal clauses that carry no constraint worth searching on:
    /// `V x U(x)` (either sign) and `V x V y B(x,y)` over both variables
    pub fn is_cliffhanger(&self, store: &LiteralStore) -> bool {
        if self.len() != 1 || self.is_counting() {
            return false;
        }
        match self.quantifier.shape() {
            Shape::Forall => store.predicate(self.literals[0]).arity == 1,
            Shape::ForallForall => self.variables(store) == VariableSet::BOTH,
            _ => false,
        }
    }

    /// Whether the canonical form also considers the mirrored clause
    fn is_switchable(&self, store: &LiteralStore) -> bool {
        let q = self.quantifier;
        if q.is_counting() {
            return q.shape() == Shape::ExistsExists
                && q.first_cardinality() == q.second_cardinality();
        }
        match q.shape() {
            Shape::ForallForall | Shape::ExistsExists => true,
            Shape::Forall | Shape::Exists => false,
            Shape::ForallExists | Shape::ExistsForall => self.is_decomposable(store),
        }
    }

    /// Canonical printed form: literals sorted by text under the prefix, or
    /// the mirrored clause when that prints smaller and the prefix allows it
    pub fn canonical(&self, store: &LiteralStore) -> String {
        let base = render(&self.quantifier, self.literals.iter().map(|l| store.text(*l)));
        if !self.is_switchable(store) {
            return base;
        }
        let Some(mirror) = self.quantifier.mirror() else {
            return base;
        };
        let mirrored = render(&mirror, self.literals.iter().map(|l| store.text(store.mirror(*l))));
        if mirrored < base {
            mirrored
        } else {
            base
        }
    }

    /// Mirrored quantifier with every literal mirrored; single-variable
    /// clauses are their own mirror
    pub fn mirror(&self, store: &LiteralStore) -> Clause {
        match self.quantifier.mirror() {
            Some(quantifier) => {
                Clause::new(quantifier, self.literals.iter().map(|l| store.mirror(*l)))
            }
            None => self.clone(),
        }
    }

    /// Same quantifier, every literal mirrored
    pub fn swap(&self, store: &LiteralStore) -> Clause {
        Clause::new(self.quantifier, self.literals.iter().map(|l| store.mirror(*l)))
    }

    /// Distinct predicates, sorted
    pub fn predicates(&self, store: &LiteralStore) -> Vec<Predicate> {
        let mut predicates: Vec<Predicate> =
            self.literals.iter().map(|l| store.predicate(*l)).collect();
        predicates.sort_unstable();
        predicates.dedup();
        predicates
    }

    /// Lower to a matching structure over the literal atoms
    pub fn to_structure(&self, store: &LiteralStore) -> Structure {
        Structure::new(self.literals.iter().map(|l| store.get(*l).literal().to_atom()))
    }

    /// Printed form with literals in text order, without mirroring
    pub fn to_fol(&self, store: &LiteralStore) -> String {
        render(&self.quantifier, self.literals.iter().map(|l| store.text(*l)))
    }

    /// Prover9 formula, e.g. `all x exists y (B0(x,y) | -U0(x)).`; `None`
    /// for counting clauses, which Prover9 cannot express
    pub fn prover9(&self, store: &LiteralStore) -> Option<String> {
        let prefix = self.quantifier.prover9_prefix()?;
        let mut literals: Vec<String> = self.literals.iter().map(|l| store.prover9(*l)).collect();
        literals.sort();
        Some(format!("{} ({}).", prefix, literals.join(LITERALS_DELIMITER)))
    }

    /// Parse `(V x V y B0(x,y) | ~U0(x))`; a leading `[id]` tag and the outer
    /// parentheses are optional
    pub fn parse(text: &str, store: &LiteralStore) -> Result<Clause> {
        let mut body = text.trim();
        if body.starts_with('[') {
            let close = body
                .find(']')
                .ok_or_else(|| SearchError::Parse(format!("unterminated clause tag: {text}")))?;
            body = body[close + 1..].trim();
        }
        if let Some(inner) = body.strip_prefix('(').and_then(|b| b.strip_suffix(')')) {
            body = inner.trim();
        }
        let (quantifier, rest) = Quantifier::parse_prefix(body)?;
        if rest.trim().is_empty() {
            return Err(SearchError::Parse(format!("clause without literals: {text}")));
        }
        let literals = rest
            .split('|')
            .map(|literal| store.parse(literal))
            .collect::<Result<Vec<_>>>()?;
        Ok(Clause::new(quantifier, literals))
    }
}

fn render(quantifier: &Quantifier, texts: impl Iterator<Item = Arc<str>>) -> String {
    let mut texts: Vec<Arc<str>> = texts.collect();
    texts.sort();
    let mut out = format!("({} ", quantifier);
    for (i, text) in texts.iter().enumerate() {
        if i > 0 {
            out.push_str(LITERALS_DELIMITER);
        }
        out.push_str(text);
    }
    out.push(')');
    out
}

/// ID of an interned clause
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClauseId(pub(crate) u32);

impl ClauseId {
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ClauseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0)
    }
}

/// An interned clause with its derived properties
#[derive(Debug)]
pub struct ClauseEntry {
    clause: Clause,
    variables: VariableSet,
    decomposable: bool,
    cliffhanger: bool,
    predicates: Vec<Predicate>,
    canonical: OnceLock<Arc<str>>,
}

impl ClauseEntry {
    pub fn clause(&self) -> &Clause {
        &self.clause
    }

    pub fn quantifier(&self) -> Quantifier {
        self.clause.quantifier
    }

    pub fn len(&self) -> usize {
        self.clause.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clause.is_empty()
    }

    pub fn variables(&self) -> VariableSet {
        self.variables
    }

    pub fn is_decomposable(&self) -> bool {
        self.decomposable
    }

    pub fn is_cliffhanger(&self) -> bool {
        self.cliffhanger
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }
}

/// Append-only store of interned clauses, shared by all search threads
#[derive(Debug)]
pub struct ClauseStore {
    literals: Arc<LiteralStore>,
    lookup: FxDashMap<Clause, ClauseId>,
    entries: FxDashMap<ClauseId, Arc<ClauseEntry>>,
    next: AtomicU32,
}

impl ClauseStore {
    pub fn new(literals: Arc<LiteralStore>) -> Self {
        ClauseStore {
            literals,
            lookup: FxDashMap::default(),
            entries: FxDashMap::default(),
            next: AtomicU32::new(0),
        }
    }

    pub fn literals(&self) -> &LiteralStore {
        &self.literals
    }

    /// Intern a clause, returning its ID (get-or-create)
    pub fn intern(&self, clause: Clause) -> ClauseId {
        if let Some(id) = self.lookup.get(&clause) {
            return *id;
        }
        let store = &*self.literals;
        let variables = clause.variables(store);
        let decomposable = clause.is_decomposable(store);
        let cliffhanger = clause.is_cliffhanger(store);
        let predicates = clause.predicates(store);
        *self.lookup.entry(clause.clone()).or_insert_with(|| {
            let id = ClauseId(self.next.fetch_add(1, Ordering::Relaxed));
            let entry = ClauseEntry {
                clause,
                variables,
                decomposable,
                cliffhanger,
                predicates,
                canonical: OnceLock::new(),
            };
            self.entries.insert(id, Arc::new(entry));
            id
        })
    }

    pub fn get(&self, id: ClauseId) -> Arc<ClauseEntry> {
        match self.entries.get(&id) {
            Some(entry) => Arc::clone(entry.value()),
            None => unreachable!("clause {} was never interned", id.0),
        }
    }

    /// Canonical form, computed on first access
    pub fn canonical(&self, id: ClauseId) -> Arc<str> {
        let entry = self.get(id);
        Arc::clone(
            entry
                .canonical
                .get_or_init(|| Arc::from(entry.clause.canonical(&self.literals))),
        )
    }

    pub fn len_of(&self, id: ClauseId) -> usize {
        self.get(id).len()
    }

    pub fn to_fol(&self, id: ClauseId) -> String {
        self.get(id).clause.to_fol(&self.literals)
    }

    pub fn prover9(&self, id: ClauseId) -> Option<String> {
        self.get(id).clause.prover9(&self.literals)
    }

    /// Same quantifier, literals mirrored
    pub fn swap(&self, id: ClauseId) -> ClauseId {
        let swapped = self.get(id).clause.swap(&self.literals);
        self.intern(swapped)
    }

    pub fn mirror(&self, id: ClauseId) -> ClauseId {
        let mirrored = self.get(id).clause.mirror(&self.literals);
        self.intern(mirrored)
    }

    pub fn parse(&self, text: &str) -> Result<ClauseId> {
        Ok(self.intern(Clause::parse(text, &self.literals)?))
    }

    /// Number of interned clauses
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
