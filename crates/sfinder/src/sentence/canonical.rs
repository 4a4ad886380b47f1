//! Ultra-canonical form of sentences
//!
//! The ultra-canonical form is the lexicographically smallest printing of a
//! sentence over the group generated by
//!
//! - permutations of predicate names within each arity,
//! - negation flips of single predicates,
//! - argument-direction flips of single binary predicates,
//! - mirroring of decomposable two-variable clauses.
//!
//! Predicates are first renamed to anonymous placeholders so that pool names
//! never clash with original names. Clauses are grouped by quantifier prefix
//! and the groups are processed in prefix order. Within a group every clause
//! is tried first; for that clause only the still-free renaming, negation and
//! direction choices are enumerated, and the locally minimal configurations
//! become choice points for the remaining clauses. The search runs on an
//! explicit stack of [`Frame`]s, one per placed clause.

use super::CLAUSES_DELIMITER;
use crate::fol::{Clause, ClauseId, ClauseStore, LiteralStore, Predicate, Vocabulary};
use itertools::Itertools;
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;

/// Computes ultra-canonical forms against a fixed predicate-name pool
#[derive(Debug)]
pub struct Canonicalizer {
    clauses: Arc<ClauseStore>,
    unary_pool: Vec<Predicate>,
    binary_pool: Vec<Predicate>,
}

impl Canonicalizer {
    /// The pool holds the vocabulary names of each arity sorted by name
    pub fn new(clauses: Arc<ClauseStore>, vocabulary: &Vocabulary) -> Self {
        let literals = clauses.literals();
        let unary_pool = name_pool(literals, "U", 1, vocabulary.unary().len());
        let binary_pool = name_pool(literals, "B", 2, vocabulary.binary().len());
        Canonicalizer {
            clauses,
            unary_pool,
            binary_pool,
        }
    }

    pub fn clause_store(&self) -> &ClauseStore {
        &self.clauses
    }

    /// Ultra-canonical form of the conjunction of `clauses`
    pub fn ultra_canonical(&self, clauses: &[ClauseId]) -> String {
        if clauses.is_empty() {
            return String::new();
        }
        let store = self.clauses.literals();
        let anonymous = self.anonymize(clauses);
        let (unary, binary) = count_by_arity(&anonymous, store);
        let pools = Pools {
            unary: self.pool(&self.unary_pool, "U", 1, unary),
            binary: self.pool(&self.binary_pool, "B", 2, binary),
        };
        let mut remaining: Vec<Clause> = anonymous
            .into_iter()
            .map(|clause| orient_prefix(clause, store))
            .collect();
        remaining.sort_by_cached_key(|clause| clause.quantifier().prefix());

        let mut stack = vec![Frame::new(remaining, Commitments::default())];
        let mut returned: Option<Vec<String>> = None;
        while let Some(frame) = stack.last_mut() {
            if let Some(rest) = returned.take() {
                frame.accept(rest);
            }
            match frame.step(store, &pools) {
                Step::Descend(remaining, commitments) => {
                    stack.push(Frame::new(remaining, commitments));
                }
                Step::Done(parts) => {
                    stack.pop();
                    returned = Some(parts);
                }
            }
        }
        let mut parts = returned.unwrap_or_default();
        parts.sort();
        parts.join(CLAUSES_DELIMITER)
    }

    /// Rename unary and binary predicates to `a0, a1, ...` in order of first
    /// occurrence
    fn anonymize(&self, clauses: &[ClauseId]) -> Vec<Clause> {
        let store = self.clauses.literals();
        let mut renaming: FxHashMap<Predicate, Predicate> = FxHashMap::default();
        clauses
            .iter()
            .map(|id| {
                let entry = self.clauses.get(*id);
                let literals = entry.clause().literals().iter().map(|literal| {
                    let predicate = store.predicate(*literal);
                    if !matches!(predicate.arity, 1 | 2) {
                        return *literal;
                    }
                    let next = renaming.len();
                    let anonymous = *renaming.entry(predicate).or_insert_with(|| {
                        let id = store.interner().intern_predicate(&format!("a{next}"));
                        Predicate::new(id, predicate.arity)
                    });
                    store.rename(*literal, anonymous)
                });
                Clause::new(entry.quantifier(), literals.collect::<Vec<_>>())
            })
            .collect()
    }

    fn pool(&self, base: &[Predicate], prefix: &str, arity: u8, size: usize) -> Vec<Predicate> {
        if size <= base.len() {
            base[..size].to_vec()
        } else {
            name_pool(self.clauses.literals(), prefix, arity, size)
        }
    }
}

/// `size` predicates named `{prefix}{i}`, sorted by name
fn name_pool(store: &LiteralStore, prefix: &str, arity: u8, size: usize) -> Vec<Predicate> {
    let mut names: Vec<String> = (0..size).map(|i| format!("{prefix}{i}")).collect();
    names.sort();
    names
        .iter()
        .map(|name| Predicate::new(store.interner().intern_predicate(name), arity))
        .collect()
}

fn count_by_arity(clauses: &[Clause], store: &LiteralStore) -> (usize, usize) {
    let predicates: FxHashSet<Predicate> = clauses
        .iter()
        .flat_map(|c| c.literals().iter().map(|l| store.predicate(*l)))
        .collect();
    let unary = predicates.iter().filter(|p| p.arity == 1).count();
    let binary = predicates.iter().filter(|p| p.arity == 2).count();
    (unary, binary)
}

/// Mirror a decomposable clause when its mirrored prefix prints smaller
fn orient_prefix(clause: Clause, store: &LiteralStore) -> Clause {
    if !clause.is_decomposable(store) {
        return clause;
    }
    match clause.quantifier().mirror() {
        Some(mirror) if mirror.prefix() < clause.quantifier().prefix() => clause.mirror(store),
        _ => clause,
    }
}

struct Pools {
    unary: Vec<Predicate>,
    binary: Vec<Predicate>,
}

/// Choices fixed by the clauses placed so far
#[derive(Debug, Clone, Default)]
struct Commitments {
    /// Anonymous predicate to pool predicate
    mapping: FxHashMap<Predicate, Predicate>,
    images: FxHashSet<Predicate>,
    negated: FxHashSet<Predicate>,
    flipped: FxHashSet<Predicate>,
    next_unary: usize,
    next_binary: usize,
}

impl Commitments {
    /// Rewrite the committed predicates of a clause
    fn apply(&self, clause: &Clause, store: &LiteralStore) -> Clause {
        let literals = clause.literals().iter().map(|literal| {
            let Some(image) = self.mapping.get(&store.predicate(*literal)) else {
                return *literal;
            };
            let mut changed = store.rename(*literal, *image);
            if self.negated.contains(image) {
                changed = store.negation(changed);
            }
            if self.flipped.contains(image) {
                changed = store.flip(changed);
            }
            changed
        });
        Clause::new(clause.quantifier(), literals.collect::<Vec<_>>())
    }
}

struct Configuration {
    commitments: Commitments,
    canonical: String,
}

/// All configurations of the free choices that minimize the canonical form
/// of `clause`, which must already be rewritten by `committed`
fn minimal_configurations(
    clause: &Clause,
    committed: &Commitments,
    store: &LiteralStore,
    pools: &Pools,
) -> Vec<Configuration> {
    let mut unset_unary: Vec<Predicate> = Vec::new();
    let mut unset_binary: Vec<Predicate> = Vec::new();
    let mut positive: FxHashSet<Predicate> = FxHashSet::default();
    let mut negative: FxHashSet<Predicate> = FxHashSet::default();
    for literal in clause.literals() {
        let entry = store.get(*literal);
        let predicate = entry.predicate();
        if committed.images.contains(&predicate) || !matches!(predicate.arity, 1 | 2) {
            continue;
        }
        let unset = if predicate.arity == 1 {
            &mut unset_unary
        } else {
            &mut unset_binary
        };
        if !unset.contains(&predicate) {
            unset.push(predicate);
        }
        if entry.is_negated() {
            negative.insert(predicate);
        } else {
            positive.insert(predicate);
        }
    }
    if unset_unary.is_empty() && unset_binary.is_empty() {
        return vec![Configuration {
            commitments: committed.clone(),
            canonical: clause.canonical(store),
        }];
    }

    let unary_images =
        &pools.unary[committed.next_unary..committed.next_unary + unset_unary.len()];
    let binary_images =
        &pools.binary[committed.next_binary..committed.next_binary + unset_binary.len()];
    let both: Vec<Predicate> = positive.intersection(&negative).copied().collect();
    let negative_only: Vec<Predicate> = negative.difference(&positive).copied().collect();

    let mut minimal: Option<String> = None;
    let mut all = Vec::new();
    for unary in permutations(unary_images) {
        for binary in permutations(binary_images) {
            let mut local = Commitments::default();
            for (source, image) in unset_unary.iter().zip(&unary) {
                local.mapping.insert(*source, *image);
            }
            for (source, image) in unset_binary.iter().zip(&binary) {
                local.mapping.insert(*source, *image);
            }
            let renamed = local.apply(clause, store);
            let both_images: Vec<Predicate> = both.iter().map(|p| local.mapping[p]).collect();
            for mut negations in both_images.into_iter().powerset() {
                negations.extend(negative_only.iter().map(|p| local.mapping[p]));
                let signed = rewrite(&renamed, store, |predicate| negations.contains(&predicate), true);
                for flips in binary_images.iter().copied().powerset() {
                    let candidate = rewrite(&signed, store, |predicate| flips.contains(&predicate), false);
                    let canonical = candidate.canonical(store);
                    let better = minimal.as_ref().map_or(true, |m| canonical < *m);
                    if better {
                        minimal = Some(canonical.clone());
                        all.clear();
                    }
                    if better || minimal.as_ref() == Some(&canonical) {
                        let mut commitments = committed.clone();
                        for (source, image) in &local.mapping {
                            commitments.mapping.insert(*source, *image);
                            commitments.images.insert(*image);
                        }
                        commitments.negated.extend(negations.iter().copied());
                        commitments.flipped.extend(flips.iter().copied());
                        commitments.next_unary += unset_unary.len();
                        commitments.next_binary += unset_binary.len();
                        all.push(Configuration {
                            commitments,
                            canonical,
                        });
                    }
                }
            }
        }
    }
    assert!(
        all.windows(2).all(|w| w[0].canonical == w[1].canonical),
        "locally minimal configurations disagree on the clause canonical form"
    );
    all
}

/// Every ordering of `images`; a single empty ordering when there are none
fn permutations(images: &[Predicate]) -> Vec<Vec<Predicate>> {
    if images.is_empty() {
        return vec![Vec::new()];
    }
    images.iter().copied().permutations(images.len()).collect()
}

/// Negate (or, with `negate == false`, flip) the literals whose predicate
/// is selected
fn rewrite(
    clause: &Clause,
    store: &LiteralStore,
    selected: impl Fn(Predicate) -> bool,
    negate: bool,
) -> Clause {
    let literals = clause.literals().iter().map(|literal| {
        if !selected(store.predicate(*literal)) {
            *literal
        } else if negate {
            store.negation(*literal)
        } else {
            store.flip(*literal)
        }
    });
    Clause::new(clause.quantifier(), literals.collect::<Vec<_>>())
}

enum Step {
    Descend(Vec<Clause>, Commitments),
    Done(Vec<String>),
}

/// One choice point: the clauses still to place under fixed commitments
struct Frame {
    /// Sorted by prefix; the leading run of equal prefixes is the current group
    remaining: Vec<Clause>,
    commitments: Commitments,
    /// Indices into `remaining` of the distinct clauses of the current group
    group: Vec<usize>,
    next_clause: usize,
    configurations: Vec<Configuration>,
    next_configuration: usize,
    /// Best completion of the clause being placed, as (joined, parts)
    clause_best: Option<(String, Vec<String>)>,
    best: Option<(String, Vec<String>)>,
}

impl Frame {
    fn new(remaining: Vec<Clause>, commitments: Commitments) -> Self {
        let mut group: Vec<usize> = Vec::new();
        if let Some(first) = remaining.first() {
            let quantifier = first.quantifier();
            for (index, clause) in remaining.iter().enumerate() {
                if clause.quantifier() != quantifier {
                    break;
                }
                if !group.iter().any(|g| remaining[*g] == *clause) {
                    group.push(index);
                }
            }
        }
        Frame {
            remaining,
            commitments,
            group,
            next_clause: 0,
            configurations: Vec::new(),
            next_configuration: 0,
            clause_best: None,
            best: None,
        }
    }

    /// Record the completion returned by a child frame
    fn accept(&mut self, rest: Vec<String>) {
        let joined = joined(&rest);
        if self.clause_best.as_ref().map_or(true, |(best, _)| joined < *best) {
            self.clause_best = Some((joined, rest));
        }
    }

    fn step(&mut self, store: &LiteralStore, pools: &Pools) -> Step {
        if self.remaining.is_empty() {
            return Step::Done(Vec::new());
        }
        loop {
            if self.next_configuration < self.configurations.len() {
                let configuration = &self.configurations[self.next_configuration];
                self.next_configuration += 1;
                let mut rest = self.remaining.clone();
                rest.remove(self.group[self.next_clause - 1]);
                return Step::Descend(rest, configuration.commitments.clone());
            }
            if let Some((_, mut parts)) = self.clause_best.take() {
                if let Some(placed) = self.configurations.first() {
                    parts.push(placed.canonical.clone());
                }
                let key = joined(&parts);
                if self.best.as_ref().map_or(true, |(best, _)| key < *best) {
                    self.best = Some((key, parts));
                }
            }
            if self.next_clause == self.group.len() {
                let parts = self.best.take().map(|(_, parts)| parts).unwrap_or_default();
                return Step::Done(parts);
            }
            let clause = &self.remaining[self.group[self.next_clause]];
            self.next_clause += 1;
            let consistent = self.commitments.apply(clause, store);
            self.configurations =
                minimal_configurations(&consistent, &self.commitments, store, pools);
            self.next_configuration = 0;
        }
    }
}

fn joined(parts: &[String]) -> String {
    let mut sorted: Vec<&str> = parts.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted.join(CLAUSES_DELIMITER)
}
