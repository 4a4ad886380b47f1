//! Theta-subsumption reduction of single clauses
//!
//! A clause C theta-subsumes D if there is a substitution σ with Cσ ⊆ D. A
//! generated clause is *reducible* when it is equivalent to a strictly
//! shorter clause, and reducible clauses are dropped from the basis. Which
//! reduction applies depends on how the prefix reads the literal set:
//!
//! - `V x V y`: the clause is a disjunction; it is reducible when it
//!   subsumes itself minus one literal.
//! - `E x E y`: the body under two existentials behaves like a conjunction;
//!   it is reducible when two literals of the same predicate and sign
//!   subsume one another.
//! - `V x E y` / `E x V y`: the same tests, with the substitution pinned to
//!   map `x` to itself.
//!
//! Negated literals are matched as distinct relation symbols. Counting and
//! single-variable clauses are never reduced.

use super::clauses::ClauseFilter;
use crate::error::Result;
use crate::fol::{Clause, ClauseId, ClauseStore, LiteralStore, Shape, Variable};
use crate::matching::{Matcher, Node, Structure};
use std::sync::Arc;

/// Whether `clause` is equivalent to one of its proper subsets
pub fn is_reducible(clause: &Clause, store: &LiteralStore, matcher: &dyn Matcher) -> bool {
    let quantifier = clause.quantifier();
    if quantifier.is_counting() || quantifier.variable_count() == 1 {
        return false;
    }
    let decomposable = clause.is_decomposable(store);
    match quantifier.shape() {
        Shape::ForallForall => reducible_disjunction(clause, store, matcher, false),
        Shape::ForallExists if decomposable => {
            reducible_conjunction(clause, store, matcher, true)
                || reducible_disjunction(clause, store, matcher, true)
        }
        Shape::ForallExists => reducible_conjunction(clause, store, matcher, true),
        Shape::ExistsForall if decomposable => {
            reducible_conjunction(clause, store, matcher, true)
                || reducible_disjunction(clause, store, matcher, true)
        }
        Shape::ExistsForall => reducible_disjunction(clause, store, matcher, true),
        Shape::ExistsExists => reducible_conjunction(clause, store, matcher, false),
        Shape::Forall | Shape::Exists => false,
    }
}

/// The clause subsumes itself minus some literal
fn reducible_disjunction(
    clause: &Clause,
    store: &LiteralStore,
    matcher: &dyn Matcher,
    pin_x: bool,
) -> bool {
    let full = clause.to_structure(store);
    let pinned = [(Variable::X.index(), Node::Var(Variable::X.index()))];
    let fixed: &[(u32, Node)] = if pin_x { &pinned } else { &[] };
    clause.literals().iter().any(|removed| {
        let shorter = Structure::new(
            clause
                .literals()
                .iter()
                .filter(|l| *l != removed)
                .map(|l| store.get(*l).literal().to_atom()),
        );
        matcher.subsumes_fixing(&full, &shorter, fixed)
    })
}

/// Two same-sign literals of one predicate where one subsumes the other;
/// with `pin_x` only the substitution `y -> x` is tried
fn reducible_conjunction(
    clause: &Clause,
    store: &LiteralStore,
    matcher: &dyn Matcher,
    pin_x: bool,
) -> bool {
    let literals: Vec<_> = clause.literals().iter().map(|l| store.get(*l)).collect();
    for (i, alpha) in literals.iter().enumerate() {
        for beta in &literals[i + 1..] {
            if alpha.predicate() != beta.predicate() || alpha.is_negated() != beta.is_negated() {
                continue;
            }
            let (a, b) = (alpha.literal(), beta.literal());
            if pin_x {
                if a == b
                    || a.substitute(Variable::Y, Variable::X) == *b
                    || b.substitute(Variable::Y, Variable::X) == *a
                {
                    return true;
                }
            } else {
                let a = Structure::new([a.to_atom()]);
                let b = Structure::new([b.to_atom()]);
                if matcher.subsumes(&a, &b) || matcher.subsumes(&b, &a) {
                    return true;
                }
            }
        }
    }
    false
}

/// Drops theta-reducible clauses
pub struct ThetaSubsumptionFilter {
    store: Arc<ClauseStore>,
    matcher: Arc<dyn Matcher>,
}

impl ThetaSubsumptionFilter {
    pub fn new(store: Arc<ClauseStore>, matcher: Arc<dyn Matcher>) -> Self {
        ThetaSubsumptionFilter { store, matcher }
    }
}

impl ClauseFilter for ThetaSubsumptionFilter {
    fn name(&self) -> &str {
        "ThetaSubsumption"
    }

    fn accepts(&self, clause: ClauseId) -> Result<bool> {
        let entry = self.store.get(clause);
        Ok(!is_reducible(
            entry.clause(),
            self.store.literals(),
            self.matcher.as_ref(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fol::Interner;
    use crate::matching::Matching;

    fn reducible(text: &str) -> bool {
        let store = LiteralStore::new(Arc::new(Interner::new()));
        let clause = Clause::parse(text, &store).unwrap();
        is_reducible(&clause, &store, &Matching::new())
    }

    #[test]
    fn test_reflexive_pair_is_reducible() {
        assert!(reducible("(V x V y B0(x,x) | B0(y,y))"));
    }

    #[test]
    fn test_negated_link_blocks_reduction() {
        assert!(!reducible("(V x V y B0(x,x) | B0(y,y) | ~B0(x,y))"));
    }

    #[test]
    fn test_forall_forall_irreducible() {
        assert!(!reducible("(V x V y B0(x,y) | ~B0(y,x))"));
        assert!(!reducible("(V x V y B0(x,y))"));
    }

    #[test]
    fn test_exists_exists_conjunction() {
        // B0(x,y) subsumes B0(x,x)
        assert!(reducible("(E x E y B0(x,x) | B0(x,y))"));
        assert!(!reducible("(E x E y B0(x,y) | ~B0(x,x))"));
    }

    #[test]
    fn test_forall_exists_pins_x() {
        // y -> x turns U0(y) into U0(x)
        assert!(reducible("(V x E y B0(x,y) | U0(x) | U0(y))"));
        assert!(!reducible("(V x E y B0(x,y) | U0(y))"));
    }

    #[test]
    fn test_exists_forall_disjunction() {
        // B0(x,y) maps onto B0(x,x) with y -> x, so the disjunction shrinks
        assert!(reducible("(E x V y B0(x,x) | B0(x,y))"));
        assert!(!reducible("(E x V y B0(y,x) | B0(x,y))"));
    }

    #[test]
    fn test_counting_and_single_variable_never_reduce() {
        assert!(!reducible("(V x E=1 y B0(x,x) | B0(x,y))"));
        assert!(!reducible("(V x U0(x) | U0(x))"));
    }
}
