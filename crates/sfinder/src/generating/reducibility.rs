//! Quantifier reducibility: clause combinations that never need joining
//!
//! Some pairs of clauses are redundant together. One implies the other, or
//! together they can only have a trivial (or empty) model spectrum. Some
//! triples are redundant as well, namely a two-variable clause next to the
//! single-variable clauses it decomposes into. These combinations are
//! precomputed once over the clause basis into [`ForbiddenTuples`] and then
//! checked by two joining filters.
//!
//! The decision tables below cover the counting cases that are known to be
//! sound. The double-existential mirror case of two counting clauses is
//! deliberately left out, which only means fewer prunings.

use super::filters::JoiningFilter;
use crate::fol::{
    Clause, ClauseEntry, ClauseId, ClauseStore, LiteralId, Predicate, Quantifier, Shape, Variable,
};
use crate::sentence::Sentence;
use itertools::Itertools;
use rayon::prelude::*;
use rustc_hash::FxHashSet;
use std::sync::Arc;

fn is_superset(outer: &[Predicate], inner: &[Predicate]) -> bool {
    inner.iter().all(|p| outer.binary_search(p).is_ok())
}

/// Identity substitution `{x -> x, y -> y}` in either direction
fn identity_subsumes(alpha: &Clause, beta: &Clause) -> bool {
    alpha.contains_all(beta) || beta.contains_all(alpha)
}

fn has(clause: &Clause, shape: Shape) -> bool {
    clause.quantifier().shape() == shape
}

fn configuration(alpha: &Clause, beta: &Clause, one: Shape, other: Shape) -> bool {
    (has(alpha, one) && has(beta, other)) || (has(alpha, other) && has(beta, one))
}

/// Whether `alpha` and `beta` never need to occur in one sentence
pub fn is_redundant(alpha: &ClauseEntry, beta: &ClauseEntry, store: &ClauseStore) -> bool {
    if !is_superset(alpha.predicates(), beta.predicates())
        && !is_superset(beta.predicates(), alpha.predicates())
    {
        return false;
    }
    let literals = store.literals();
    let (a, b) = (alpha.clause(), beta.clause());
    let (qa, qb) = (a.quantifier(), b.quantifier());

    if qa == qb {
        return identity_subsumes(a, b)
            || (qb.is_swappable() && identity_subsumes(a, &b.mirror(literals)));
    }
    if qa.variable_count() == 2
        && qb.variable_count() == 2
        && qb.mirror() == Some(qa)
        && (alpha.is_decomposable() || beta.is_decomposable())
        && identity_subsumes(a, &b.mirror(literals))
    {
        return true;
    }

    match (qa.is_counting(), qb.is_counting()) {
        (true, true) => decide_counting_pair(a, b),
        (true, false) => decide_mixed(beta, alpha, store),
        (false, true) => decide_mixed(alpha, beta, store),
        (false, false) => decide_plain_pair(a, b, store),
    }
}

/// Both clauses carry counting quantifiers
fn decide_counting_pair(alpha: &Clause, beta: &Clause) -> bool {
    let (qa, qb) = (alpha.quantifier(), beta.quantifier());
    if qa.variable_count() == 1 && qb.variable_count() == 1 {
        // E=k x phi(x) & E=l x phi(x) with k != l has no model
        return qa.first_cardinality() != qb.first_cardinality()
            && alpha.literals() == beta.literals();
    }
    if qa.variable_count() == 2 && qb.variable_count() == 2 && alpha.len() == 1 {
        if alpha.literals() != beta.literals() {
            return false;
        }
        return (has(alpha, Shape::ForallExists)
            && has(beta, Shape::ForallExists)
            && qa.second_cardinality() != qb.second_cardinality())
            || (has(alpha, Shape::ExistsForall)
                && has(beta, Shape::ExistsForall)
                && qa.first_cardinality() != qb.first_cardinality());
    }
    false
}

/// `alpha` is plain, `beta` counts
fn decide_mixed(alpha: &ClauseEntry, beta: &ClauseEntry, store: &ClauseStore) -> bool {
    let literals = store.literals();
    let (a, b) = (alpha.clause(), beta.clause());
    let (qa, qb) = (a.quantifier(), b.quantifier());
    if qa.is_counting() || !qb.is_counting() {
        return false;
    }
    let equal = a.literals() == b.literals();
    if qa.variable_count() == 1 && qb.variable_count() == 1 {
        if has(a, Shape::Forall) && equal {
            return true;
        }
        // V x phi(x) & E=k x ~phi(x) for a single literal phi
        if has(a, Shape::Forall)
            && a.len() == 1
            && b.len() == 1
            && b.contains(literals.negation(a.literals()[0]))
        {
            return true;
        }
        return has(a, Shape::Exists) && equal;
    }
    if qa.variable_count() == 2 && qb.variable_count() == 2 {
        let mirror_equal = a.swap(literals).literals() == b.literals();
        let beta_has_existential = has(b, Shape::ForallExists)
            || has(b, Shape::ExistsForall)
            || has(b, Shape::ExistsExists);
        if has(a, Shape::ForallForall) && beta_has_existential && (equal || mirror_equal) {
            return true;
        }
        if has(a, Shape::ForallForall) && beta_has_existential && a.len() == 1 && b.len() == 1 {
            let negated = literals.negation(a.literals()[0]);
            if b.contains(negated) || b.contains(literals.mirror(negated)) {
                return true;
            }
        }
        if has(a, Shape::ForallExists)
            && ((equal && has(b, Shape::ForallExists))
                || (mirror_equal
                    && has(b, Shape::ExistsForall)
                    && alpha.is_decomposable()
                    && beta.is_decomposable()))
        {
            return true;
        }
        if has(a, Shape::ExistsForall) && has(b, Shape::ForallExists) && equal {
            return true;
        }
        if has(a, Shape::ExistsForall) && has(b, Shape::ExistsForall) && equal {
            return true;
        }
        if has(a, Shape::ExistsExists) && has(b, Shape::ExistsExists) && (equal || mirror_equal) {
            return true;
        }
        return false;
    }
    if has(a, Shape::Forall) && qb.variable_count() == 2 {
        let alpha_subsumes_beta = b.contains_all(a);
        return (has(b, Shape::ExistsExists) && alpha_subsumes_beta && qb.first_cardinality().is_none())
            || (has(b, Shape::ForallExists) && alpha_subsumes_beta);
    }
    false
}

/// Neither clause counts
fn decide_plain_pair(alpha: &Clause, beta: &Clause, store: &ClauseStore) -> bool {
    if alpha.is_counting() || beta.is_counting() {
        return false;
    }
    let beta_subsumes_alpha = alpha.contains_all(beta);
    let alpha_subsumes_beta = beta.contains_all(alpha);

    // V x phi(x) |= E x phi'(x)
    if configuration(alpha, beta, Shape::Forall, Shape::Exists)
        && ((has(alpha, Shape::Forall) && alpha_subsumes_beta)
            || (has(beta, Shape::Forall) && beta_subsumes_alpha))
    {
        return true;
    }

    let mirrored_alpha = alpha.swap(store.literals());
    let mirror_equal = mirrored_alpha.literals() == beta.literals();
    let beta_subsumes_mirrored_alpha = mirrored_alpha.contains_all(beta);
    let alpha_mirror_subsumes_beta = beta.contains_all(&mirrored_alpha);

    let dominates = |shape: Shape| {
        (has(alpha, shape) && (alpha_subsumes_beta || alpha_mirror_subsumes_beta))
            || (has(beta, shape) && (beta_subsumes_alpha || beta_subsumes_mirrored_alpha))
    };
    // V x phi(x) |= Q x Q' y phi(x) | rho(x,y)
    if (has(alpha, Shape::Forall) || has(beta, Shape::Forall)) && dominates(Shape::Forall) {
        return true;
    }
    // V x V y phi(x,y) |= V x E y, E x V y, E x E y
    if (has(alpha, Shape::ForallForall) || has(beta, Shape::ForallForall))
        && dominates(Shape::ForallForall)
    {
        return true;
    }
    // V x E y phi(x,y) |= E x E y phi'(x,y)
    if configuration(alpha, beta, Shape::ForallExists, Shape::ExistsExists)
        && dominates(Shape::ForallExists)
    {
        return true;
    }
    // E x V y phi(x,y) |= E x E y phi'(x,y)
    if configuration(alpha, beta, Shape::ExistsForall, Shape::ExistsExists)
        && dominates(Shape::ExistsForall)
    {
        return true;
    }
    // E y V x phi(x,y) |= V x E y phi(x,y)
    mirror_equal && configuration(alpha, beta, Shape::ExistsForall, Shape::ForallExists)
}

/// The quantifiers a single-variable part may carry without changing
/// what the decomposed clause expresses
fn redundant_quantifiers(shape: Shape, cardinality: Option<u32>, max_k: u32) -> Vec<Quantifier> {
    let mut quantifiers = vec![Quantifier::counting(shape, cardinality, None)];
    if shape == Shape::Exists && cardinality.is_none() {
        quantifiers.push(Quantifier::plain(Shape::Forall));
        if max_k >= 1 {
            quantifiers.push(Quantifier::counting(Shape::Exists, Some(1), None));
        }
    }
    quantifiers
}

/// x-only literals and mirrored y-only literals of a two-variable clause
fn split(clause: &Clause, store: &ClauseStore) -> (Vec<LiteralId>, Vec<LiteralId>) {
    let literals = store.literals();
    let mut phi = Vec::new();
    let mut rho = Vec::new();
    for literal in clause.literals() {
        let variables = literals.variables(*literal);
        if variables.len() > 1 {
            continue;
        }
        if variables.contains(Variable::X) {
            phi.push(*literal);
        } else {
            rho.push(literals.mirror(*literal));
        }
    }
    (phi, rho)
}

fn non_empty_subsets(literals: &[LiteralId]) -> impl Iterator<Item = Vec<LiteralId>> + '_ {
    literals.iter().copied().powerset().filter(|s| !s.is_empty())
}

fn sorted_pair(a: ClauseId, b: ClauseId) -> (ClauseId, ClauseId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

fn sorted_triple(mut ids: [ClauseId; 3]) -> [ClauseId; 3] {
    ids.sort_unstable();
    ids
}

/// Clause pairs and triples that are pruned from joining
#[derive(Debug, Default)]
pub struct ForbiddenTuples {
    pairs: FxHashSet<(ClauseId, ClauseId)>,
    triples: FxHashSet<[ClauseId; 3]>,
}

impl ForbiddenTuples {
    /// Compute the tables over `basis`, in basis order
    ///
    /// Pairs are tested as `is_redundant(basis[i], basis[j])` for `i < j`.
    /// Triples are only needed when a sentence can hold three clauses and a
    /// clause can hold two literals.
    pub fn precompute(
        basis: &[ClauseId],
        store: &ClauseStore,
        max_clauses: usize,
        max_literals_per_clause: usize,
        max_k: u32,
    ) -> Self {
        let entries: Vec<Arc<ClauseEntry>> = basis.iter().map(|c| store.get(*c)).collect();
        let pairs: FxHashSet<(ClauseId, ClauseId)> = (0..basis.len())
            .into_par_iter()
            .flat_map_iter(|i| {
                let entries = &entries;
                (i + 1..basis.len())
                    .filter(move |j| is_redundant(&entries[i], &entries[*j], store))
                    .map(move |j| sorted_pair(basis[i], basis[j]))
            })
            .collect();

        let mut triples = FxHashSet::default();
        if max_clauses > 2 && max_literals_per_clause > 1 {
            for (id, entry) in basis.iter().zip(&entries) {
                let clause = entry.clause();
                if clause.len() < 2 || clause.quantifier().variable_count() < 2 {
                    continue;
                }
                let (phi, rho) = split(clause, store);
                if phi.is_empty() || rho.is_empty() {
                    continue;
                }
                let quantifier = clause.quantifier();
                let phi_shape = if quantifier.shape().starts_with_forall() {
                    Shape::Forall
                } else {
                    Shape::Exists
                };
                let rho_shape = if quantifier.shape().second_is_forall() {
                    Shape::Forall
                } else {
                    Shape::Exists
                };
                let phi_quantifiers =
                    redundant_quantifiers(phi_shape, quantifier.first_cardinality(), max_k);
                let rho_quantifiers =
                    redundant_quantifiers(rho_shape, quantifier.second_cardinality(), max_k);
                for phi_part in non_empty_subsets(&phi) {
                    for rho_part in non_empty_subsets(&rho) {
                        for phi_quantifier in &phi_quantifiers {
                            let phi_clause =
                                store.intern(Clause::new(*phi_quantifier, phi_part.clone()));
                            for rho_quantifier in &rho_quantifiers {
                                let rho_clause =
                                    store.intern(Clause::new(*rho_quantifier, rho_part.clone()));
                                triples.insert(sorted_triple([*id, phi_clause, rho_clause]));
                            }
                        }
                    }
                }
            }
        }
        ForbiddenTuples { pairs, triples }
    }

    pub fn is_forbidden_pair(&self, a: ClauseId, b: ClauseId) -> bool {
        self.pairs.contains(&sorted_pair(a, b))
    }

    pub fn is_forbidden_triple(&self, ids: [ClauseId; 3]) -> bool {
        self.triples.contains(&sorted_triple(ids))
    }

    pub fn pair_count(&self) -> usize {
        self.pairs.len()
    }

    pub fn triple_count(&self) -> usize {
        self.triples.len()
    }

    /// Number of forbidden tuples of both kinds
    pub fn len(&self) -> usize {
        self.pairs.len() + self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty() && self.triples.is_empty()
    }
}

/// Rejects a clause forming a forbidden pair with some clause of the sentence
pub struct TwoFormulaeFilter {
    forbidden: Arc<ForbiddenTuples>,
}

impl TwoFormulaeFilter {
    pub fn new(forbidden: Arc<ForbiddenTuples>) -> Self {
        TwoFormulaeFilter { forbidden }
    }
}

impl JoiningFilter for TwoFormulaeFilter {
    fn name(&self) -> &str {
        "QuantifiersReducibilityTwoFormulae"
    }

    fn accepts(&self, sentence: &Sentence, clause: ClauseId) -> bool {
        !sentence
            .clauses()
            .iter()
            .any(|c| self.forbidden.is_forbidden_pair(*c, clause))
    }
}

/// Rejects a clause completing a forbidden triple with sentence clauses
///
/// The new clause either is the decomposed clause, with two shorter sentence
/// clauses as its parts, or it is a part, with a longer sentence clause as
/// the decomposed clause.
pub struct TupleFilter {
    store: Arc<ClauseStore>,
    forbidden: Arc<ForbiddenTuples>,
}

impl TupleFilter {
    pub fn new(store: Arc<ClauseStore>, forbidden: Arc<ForbiddenTuples>) -> Self {
        TupleFilter { store, forbidden }
    }
}

impl JoiningFilter for TupleFilter {
    fn name(&self) -> &str {
        "QuantifiersReducibilityNTuple"
    }

    fn accepts(&self, sentence: &Sentence, clause: ClauseId) -> bool {
        let length = self.store.len_of(clause);
        if length < 2 {
            return true;
        }
        let sized: Vec<(ClauseId, usize)> = sentence
            .clauses()
            .iter()
            .map(|c| (*c, self.store.len_of(*c)))
            .collect();
        let shorter: Vec<(ClauseId, usize)> =
            sized.iter().copied().filter(|(_, n)| *n < length).collect();
        for (a, b) in decompositions(&shorter, length) {
            if self.forbidden.is_forbidden_triple([a, b, clause]) {
                return false;
            }
        }
        for (longer, longer_length) in sized.iter().filter(|(_, n)| *n > length) {
            for (part, part_length) in &sized {
                if *part_length <= longer_length - length
                    && self.forbidden.is_forbidden_triple([*part, clause, *longer])
                {
                    return false;
                }
            }
        }
        true
    }
}

/// Pairs of clauses (in sentence order) whose lengths sum to at most `length`
fn decompositions(clauses: &[(ClauseId, usize)], length: usize) -> Vec<(ClauseId, ClauseId)> {
    let mut pairs = Vec::new();
    for (i, (first, first_length)) in clauses.iter().enumerate() {
        if *first_length > length {
            continue;
        }
        for (second, second_length) in &clauses[i + 1..] {
            if *second_length <= length - first_length {
                pairs.push((*first, *second));
            }
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fol::{Interner, LiteralStore};

    fn store() -> Arc<ClauseStore> {
        Arc::new(ClauseStore::new(Arc::new(LiteralStore::new(Arc::new(Interner::new())))))
    }

    fn redundant(store: &ClauseStore, alpha: &str, beta: &str) -> bool {
        let a = store.get(store.parse(alpha).unwrap());
        let b = store.get(store.parse(beta).unwrap());
        is_redundant(&a, &b, store)
    }

    #[test]
    fn test_disjoint_predicates_never_redundant() {
        let store = store();
        assert!(!redundant(&store, "(V x U0(x))", "(E x U1(x))"));
    }

    #[test]
    fn test_same_quantifier_identity_subsumption() {
        let store = store();
        assert!(redundant(&store, "(V x U0(x))", "(V x U0(x) | U1(x))"));
        assert!(!redundant(&store, "(V x U0(x))", "(V x ~U0(x) | U1(x))"));
    }

    #[test]
    fn test_swappable_mirror() {
        let store = store();
        assert!(redundant(&store, "(V x V y B0(x,y))", "(V x V y B0(y,x) | U0(x))"));
    }

    #[test]
    fn test_forall_implies_exists() {
        let store = store();
        assert!(redundant(&store, "(V x U0(x))", "(E x U0(x) | U1(x))"));
        assert!(redundant(&store, "(E x U0(x) | U1(x))", "(V x U0(x))"));
        assert!(!redundant(&store, "(V x U0(x) | U1(x))", "(E x U0(x))"));
    }

    #[test]
    fn test_forall_forall_dominates() {
        let store = store();
        assert!(redundant(&store, "(V x V y B0(x,y))", "(E x V y B0(y,x))"));
    }

    #[test]
    fn test_exists_forall_mirror_of_forall_exists() {
        let store = store();
        assert!(redundant(&store, "(E x V y B0(x,y))", "(V x E y B0(y,x))"));
        assert!(!redundant(&store, "(E x V y B0(x,y))", "(V x E y B0(x,y))"));
    }

    #[test]
    fn test_counting_contradictions() {
        let store = store();
        assert!(redundant(&store, "(E=1 x U0(x))", "(E=2 x U0(x))"));
        assert!(redundant(&store, "(V x U0(x))", "(E=1 x ~U0(x))"));
        assert!(redundant(&store, "(E=1 x ~U0(x))", "(V x U0(x))"));
        assert!(!redundant(&store, "(V x U0(x))", "(E=1 x U1(x) | U0(x))"));
    }

    #[test]
    fn test_counting_two_variable_single_literal() {
        let store = store();
        assert!(redundant(&store, "(V x E=1 y B0(x,y))", "(V x E=2 y B0(x,y))"));
        assert!(!redundant(&store, "(V x E=1 y B0(x,y))", "(V x E=2 y B0(y,x))"));
    }

    #[test]
    fn test_precompute_pairs_and_triples() {
        let store = store();
        let basis: Vec<ClauseId> = ["(V x U0(x))", "(E x U0(x) | U1(x))", "(V x E y U0(x) | U1(y))"]
            .iter()
            .map(|t| store.parse(t).unwrap())
            .collect();
        let forbidden = ForbiddenTuples::precompute(&basis, &store, 3, 2, 0);
        assert!(forbidden.is_forbidden_pair(basis[1], basis[0]));
        // V x E y U0(x) | U1(y) splits into V x U0(x) and E x U1(x)
        let phi = store.parse("(V x U0(x))").unwrap();
        let rho = store.parse("(E x U1(x))").unwrap();
        let rho_forall = store.parse("(V x U1(x))").unwrap();
        assert!(forbidden.is_forbidden_triple([rho, basis[2], phi]));
        assert!(forbidden.is_forbidden_triple([basis[2], phi, rho_forall]));
        assert_eq!(forbidden.triple_count(), 2);
    }

    #[test]
    fn test_triples_need_three_clauses() {
        let store = store();
        let basis = vec![store.parse("(V x E y U0(x) | U1(y))").unwrap()];
        let forbidden = ForbiddenTuples::precompute(&basis, &store, 2, 2, 1);
        assert_eq!(forbidden.triple_count(), 0);
    }

    #[test]
    fn test_tuple_filter() {
        let store = store();
        let basis = vec![store.parse("(V x E y U0(x) | U1(x) | U2(y))").unwrap()];
        let forbidden = Arc::new(ForbiddenTuples::precompute(&basis, &store, 3, 3, 0));
        let filter = TupleFilter::new(Arc::clone(&store), Arc::clone(&forbidden));
        let phi = store.parse("(V x U0(x) | U1(x))").unwrap();
        let rho = store.parse("(E x U2(x))").unwrap();
        assert!(forbidden.is_forbidden_triple([basis[0], phi, rho]));

        // the decomposed clause joining its parts
        let parts = Sentence::parse("(V x U0(x) | U1(x)) & (E x U2(x))", &store).unwrap();
        assert!(!filter.accepts(&parts, basis[0]));

        // a part joining the decomposed clause and the other part
        let whole = Sentence::parse("(V x E y U0(x) | U1(x) | U2(y))", &store).unwrap();
        assert!(filter.accepts(&whole, phi));
        let with_rho = whole.extend(rho, &store);
        assert!(!filter.accepts(&with_rho, phi));
    }

    #[test]
    fn test_tuple_filter_accepts_single_literal_parts() {
        let store = store();
        let basis = vec![store.parse("(V x E y U0(x) | U1(y))").unwrap()];
        let forbidden = Arc::new(ForbiddenTuples::precompute(&basis, &store, 3, 2, 0));
        let filter = TupleFilter::new(Arc::clone(&store), forbidden);
        let whole = Sentence::parse("(V x E y U0(x) | U1(y))", &store).unwrap();
        let phi = store.parse("(V x U0(x))").unwrap();
        let rho = store.parse("(E x U1(x))").unwrap();
        let with_phi = whole.extend(phi, &store);
        assert!(filter.accepts(&with_phi, rho));
    }
}
