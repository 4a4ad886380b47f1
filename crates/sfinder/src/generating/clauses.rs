//! Clause generation by layered refinement
//!
//! Clauses grow one literal at a time from the empty clause. Each layer is
//! filtered by the configured [`ClauseFilter`]s and deduplicated by canonical
//! form; the survivors of all layers form the [`ClauseBasis`] the sentence
//! search joins from.

use crate::error::Result;
use crate::fol::{Clause, ClauseEntry, ClauseId, ClauseStore, LiteralId, QuantifierLattice};
use crate::prover::Prover;
use rayon::prelude::*;
use rustc_hash::FxHashSet;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// A predicate over single clauses
pub trait ClauseFilter: Send + Sync {
    fn name(&self) -> &str;

    fn accepts(&self, clause: ClauseId) -> Result<bool>;
}

/// At most `max` literals
pub struct MaxLiteralsFilter {
    store: Arc<ClauseStore>,
    max: usize,
}

impl MaxLiteralsFilter {
    pub fn new(store: Arc<ClauseStore>, max: usize) -> Self {
        MaxLiteralsFilter { store, max }
    }
}

impl ClauseFilter for MaxLiteralsFilter {
    fn name(&self) -> &str {
        "MaxLiterals"
    }

    fn accepts(&self, clause: ClauseId) -> Result<bool> {
        Ok(self.store.len_of(clause) <= self.max)
    }
}

/// At most `max` literals under a counting quantifier
pub struct MaxLiteralsPerCountingClauseFilter {
    store: Arc<ClauseStore>,
    max: usize,
}

impl MaxLiteralsPerCountingClauseFilter {
    pub fn new(store: Arc<ClauseStore>, max: usize) -> Self {
        MaxLiteralsPerCountingClauseFilter { store, max }
    }
}

impl ClauseFilter for MaxLiteralsPerCountingClauseFilter {
    fn name(&self) -> &str {
        "MaxLiteralsPerCountingClause"
    }

    fn accepts(&self, clause: ClauseId) -> Result<bool> {
        let entry = self.store.get(clause);
        Ok(!entry.quantifier().is_counting() || entry.len() <= self.max)
    }
}

/// Rejects non-counting clauses containing a literal and its negation
pub struct NaiveTautologyFilter {
    store: Arc<ClauseStore>,
}

impl NaiveTautologyFilter {
    pub fn new(store: Arc<ClauseStore>) -> Self {
        NaiveTautologyFilter { store }
    }
}

impl ClauseFilter for NaiveTautologyFilter {
    fn name(&self) -> &str {
        "NaiveTautology"
    }

    fn accepts(&self, clause: ClauseId) -> Result<bool> {
        let entry = self.store.get(clause);
        if entry.quantifier().is_counting() {
            return Ok(true);
        }
        let literals = self.store.literals();
        let clause = entry.clause();
        Ok(!clause
            .literals()
            .iter()
            .any(|l| clause.contains(literals.negation(*l))))
    }
}

/// Rejects non-counting clauses whose negation the prover refutes
pub struct TautologyFilter {
    store: Arc<ClauseStore>,
    prover: Arc<dyn Prover>,
}

impl TautologyFilter {
    pub fn new(store: Arc<ClauseStore>, prover: Arc<dyn Prover>) -> Self {
        TautologyFilter { store, prover }
    }

    /// `-(formula).` for a clause printed as `formula.`
    pub fn negated_formula(&self, clause: ClauseId) -> Option<String> {
        let formula = self.store.prover9(clause)?;
        let body = formula.strip_suffix('.').unwrap_or(&formula);
        Some(format!("-({body}).\n"))
    }
}

impl ClauseFilter for TautologyFilter {
    fn name(&self) -> &str {
        "Tautology"
    }

    fn accepts(&self, clause: ClauseId) -> Result<bool> {
        match self.negated_formula(clause) {
            Some(negated) => Ok(!self.prover.is_provable(&negated)?),
            None => Ok(true),
        }
    }
}

/// Layer sizes and surviving clauses of one generation run
#[derive(Debug, Clone, Default)]
pub struct ClauseGeneration {
    pub clauses: Vec<ClauseId>,
    pub layer_sizes: Vec<usize>,
}

/// Refines clauses over a fixed literal list and quantifier lattice
pub struct ClauseGenerator {
    store: Arc<ClauseStore>,
    literals: Vec<LiteralId>,
    lattice: Arc<QuantifierLattice>,
}

impl ClauseGenerator {
    pub fn new(
        store: Arc<ClauseStore>,
        literals: Vec<LiteralId>,
        lattice: Arc<QuantifierLattice>,
    ) -> Self {
        ClauseGenerator {
            store,
            literals,
            lattice,
        }
    }

    /// Every one-literal extension of `clause` (`None` is the empty clause)
    ///
    /// The empty clause may take any quantifier. A non-empty clause keeps its
    /// quantifier or moves to a successor; a decomposable two-variable clause
    /// may also move to its mirror quantifier (with all literals mirrored)
    /// when the new literal joins both variables. Candidates whose literals do
    /// not use exactly the bound variables are dropped.
    pub fn refinements(&self, clause: Option<&Clause>) -> Vec<Clause> {
        let store = self.store.literals();
        let mut refinements = Vec::new();
        let variables = clause.map(|c| c.variables(store)).unwrap_or_default();
        for literal in &self.literals {
            let literal_variables = store.variables(*literal);
            let mut targets: Vec<_> = Vec::new();
            let mut mirrored = None;
            match clause {
                None => targets.extend_from_slice(self.lattice.quantifiers()),
                Some(clause) => {
                    if clause.contains(*literal) {
                        continue;
                    }
                    let quantifier = clause.quantifier();
                    targets.push(quantifier);
                    targets.extend_from_slice(self.lattice.successors(&quantifier));
                    if clause.is_decomposable(store)
                        && quantifier.variable_count() == 2
                        && literal_variables.len() > 1
                    {
                        if let Some(mirror) = self.lattice.mirror(&quantifier) {
                            if !targets.contains(&mirror) {
                                targets.push(mirror);
                            }
                            mirrored = Some(mirror);
                        }
                    }
                }
            }
            let used = variables.union(literal_variables);
            for quantifier in targets {
                if quantifier.used_variables() != used {
                    continue;
                }
                let mut literals: Vec<LiteralId> =
                    clause.map(|c| c.literals().to_vec()).unwrap_or_default();
                literals.push(*literal);
                if mirrored == Some(quantifier) {
                    literals = literals.iter().map(|l| store.mirror(*l)).collect();
                }
                refinements.push(Clause::new(quantifier, literals));
            }
        }
        refinements
    }

    /// Run at most `max_layers` refinement layers
    pub fn generate(
        &self,
        filters: &[Box<dyn ClauseFilter>],
        max_layers: usize,
    ) -> Result<ClauseGeneration> {
        let mut generation = ClauseGeneration::default();
        let mut layer: Vec<Option<ClauseId>> = vec![None];
        while !layer.is_empty() && generation.layer_sizes.len() < max_layers {
            let candidates: Vec<Option<ClauseId>> = layer
                .par_iter()
                .flat_map_iter(|parent| {
                    let entry = parent.map(|id| self.store.get(id));
                    self.refinements(entry.as_deref().map(ClauseEntry::clause))
                })
                .map(|clause| {
                    let id = self.store.intern(clause);
                    approve(id, filters).map(|approved| approved.then_some(id))
                })
                .collect::<Result<Vec<_>>>()?;

            let mut seen: FxHashSet<Arc<str>> = FxHashSet::default();
            let next: Vec<Option<ClauseId>> = candidates
                .into_iter()
                .flatten()
                .filter(|id| seen.insert(self.store.canonical(*id)))
                .map(Some)
                .collect();
            debug!(
                layer = generation.layer_sizes.len() + 1,
                size = next.len(),
                overall = generation.clauses.len(),
                "clause layer generated"
            );
            generation.layer_sizes.push(next.len());
            generation.clauses.extend(next.iter().flatten());
            layer = next;
        }
        Ok(generation)
    }
}

fn approve(clause: ClauseId, filters: &[Box<dyn ClauseFilter>]) -> Result<bool> {
    for filter in filters {
        if !filter.accepts(clause)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Generated clauses sorted by canonical form and indexed by length
#[derive(Debug, Clone, Default)]
pub struct ClauseBasis {
    clauses: Vec<ClauseId>,
    by_length: BTreeMap<usize, Vec<ClauseId>>,
}

impl ClauseBasis {
    pub fn new(mut clauses: Vec<ClauseId>, store: &ClauseStore) -> Self {
        clauses.sort_by_cached_key(|c| store.canonical(*c));
        clauses.dedup();
        let mut by_length: BTreeMap<usize, Vec<ClauseId>> = BTreeMap::new();
        for clause in &clauses {
            by_length.entry(store.len_of(*clause)).or_default().push(*clause);
        }
        ClauseBasis { clauses, by_length }
    }

    pub fn clauses(&self) -> &[ClauseId] {
        &self.clauses
    }

    /// Clauses with exactly `length` literals
    pub fn of_length(&self, length: usize) -> &[ClauseId] {
        self.by_length
            .get(&length)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn max_length(&self) -> usize {
        self.by_length.keys().next_back().copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}
