//! The predicate vocabulary of a search run

use super::interner::Interner;
use super::literal::{Literal, LiteralId, LiteralStore, Predicate};
use super::term::{Term, Variable};
use itertools::Itertools;
use rustc_hash::FxHashMap;

/// Unary predicates `U0..` and binary predicates `B0..`
#[derive(Debug, Clone)]
pub struct Vocabulary {
    unary: Vec<Predicate>,
    binary: Vec<Predicate>,
}

impl Vocabulary {
    pub fn new(interner: &Interner, unary: usize, binary: usize) -> Self {
        let make = |prefix: &str, count: usize, arity: u8| -> Vec<Predicate> {
            (0..count)
                .map(|i| Predicate::new(interner.intern_predicate(&format!("{prefix}{i}")), arity))
                .collect()
        };
        Vocabulary {
            unary: make("U", unary, 1),
            binary: make("B", binary, 2),
        }
    }

    pub fn unary(&self) -> &[Predicate] {
        &self.unary
    }

    pub fn binary(&self) -> &[Predicate] {
        &self.binary
    }

    /// Predicates of the given arity, in vocabulary order
    pub fn of_arity(&self, arity: u8) -> &[Predicate] {
        match arity {
            1 => &self.unary,
            2 => &self.binary,
            _ => &[],
        }
    }

    pub fn predicates(&self) -> impl Iterator<Item = Predicate> + '_ {
        self.unary.iter().chain(self.binary.iter()).copied()
    }

    pub fn contains(&self, predicate: &Predicate) -> bool {
        self.of_arity(predicate.arity).contains(predicate)
    }

    pub fn len(&self) -> usize {
        self.unary.len() + self.binary.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every literal over the vocabulary: all argument tuples over `x`/`y`
    /// with repetition, both signs, sorted by printed form
    pub fn literals(&self, store: &LiteralStore) -> Vec<LiteralId> {
        let mut literals: Vec<LiteralId> = Vec::new();
        for predicate in self.predicates() {
            let tuples = (0..predicate.arity)
                .map(|_| [Variable::X, Variable::Y].into_iter())
                .multi_cartesian_product();
            for tuple in tuples {
                let args: Vec<Term> = tuple.into_iter().map(Term::Variable).collect();
                for negated in [false, true] {
                    literals.push(store.intern(Literal::new(predicate, negated, args.clone())));
                }
            }
        }
        literals.sort_by_cached_key(|l| store.text(*l));
        literals
    }

    /// Language-bias chain: each predicate maps to the next one of its arity
    pub fn followers(&self) -> FxHashMap<Predicate, Predicate> {
        self.unary
            .iter()
            .tuple_windows()
            .chain(self.binary.iter().tuple_windows())
            .map(|(a, b)| (*a, *b))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_literal_generation() {
        let interner = Arc::new(Interner::new());
        let vocabulary = Vocabulary::new(&interner, 1, 1);
        let store = LiteralStore::new(Arc::clone(&interner));
        let texts: Vec<String> = vocabulary
            .literals(&store)
            .iter()
            .map(|l| store.text(*l).to_string())
            .collect();
        assert_eq!(texts.len(), 2 * 2 + 4 * 2);
        assert_eq!(texts[0], "B0(x,x)");
        assert!(texts.contains(&"~U0(y)".to_string()));
        let mut sorted = texts.clone();
        sorted.sort();
        assert_eq!(texts, sorted);
    }

    #[test]
    fn test_followers() {
        let interner = Interner::new();
        let vocabulary = Vocabulary::new(&interner, 3, 2);
        let followers = vocabulary.followers();
        assert_eq!(followers.len(), 3);
        assert_eq!(followers[&vocabulary.unary()[0]], vocabulary.unary()[1]);
        assert_eq!(followers[&vocabulary.binary()[0]], vocabulary.binary()[1]);
        assert!(!followers.contains_key(&vocabulary.unary()[2]));
    }
}
