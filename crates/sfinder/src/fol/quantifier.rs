//! Quantifier prefixes of the two-variable fragment and their lattice
//!
//! A [`Quantifier`] binds `x`, or `x` and then `y`, each either universally
//! or existentially; an existential position may carry a cardinality bound
//! (`E=k`). The [`QuantifierLattice`] enumerates the prefixes admitted by a
//! configuration together with the successor relation used by clause
//! refinement and the mirror relation between `Qx Jy` and `Jx Qy`.

use super::term::VariableSet;
use crate::error::{Result, SearchError};
use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use std::fmt;

/// The binding pattern of a prefix, ignoring cardinalities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    Forall,
    Exists,
    ForallForall,
    ForallExists,
    ExistsForall,
    ExistsExists,
}

impl Shape {
    pub fn variable_count(self) -> usize {
        match self {
            Shape::Forall | Shape::Exists => 1,
            _ => 2,
        }
    }

    /// Whether `x` is bound universally
    pub fn starts_with_forall(self) -> bool {
        matches!(self, Shape::Forall | Shape::ForallForall | Shape::ForallExists)
    }

    /// Whether `y` is bound universally (false for single-variable shapes)
    pub fn second_is_forall(self) -> bool {
        matches!(self, Shape::ForallForall | Shape::ExistsForall)
    }

    /// Shape after exchanging the roles of `x` and `y`
    pub fn mirror(self) -> Shape {
        match self {
            Shape::ForallExists => Shape::ExistsForall,
            Shape::ExistsForall => Shape::ForallExists,
            other => other,
        }
    }

    fn from_binders(first_forall: bool, second_forall: Option<bool>) -> Shape {
        match (first_forall, second_forall) {
            (true, None) => Shape::Forall,
            (false, None) => Shape::Exists,
            (true, Some(true)) => Shape::ForallForall,
            (true, Some(false)) => Shape::ForallExists,
            (false, Some(true)) => Shape::ExistsForall,
            (false, Some(false)) => Shape::ExistsExists,
        }
    }
}

/// A quantifier prefix, identified by its printed form (e.g. `E=2 x V y`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Quantifier {
    shape: Shape,
    first: Option<u32>,
    second: Option<u32>,
}

impl Quantifier {
    /// A prefix without cardinality bounds
    pub const fn plain(shape: Shape) -> Self {
        Quantifier {
            shape,
            first: None,
            second: None,
        }
    }

    /// A prefix with cardinality bounds
    ///
    /// Bounds on universal positions, or on a second position that the shape
    /// does not bind, are dropped: only `E` can become `E=k`.
    pub fn counting(shape: Shape, first: Option<u32>, second: Option<u32>) -> Self {
        let first = if shape.starts_with_forall() { None } else { first };
        let second = if shape.variable_count() < 2 || shape.second_is_forall() {
            None
        } else {
            second
        };
        Quantifier {
            shape,
            first,
            second,
        }
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn first_cardinality(&self) -> Option<u32> {
        self.first
    }

    pub fn second_cardinality(&self) -> Option<u32> {
        self.second
    }

    pub fn is_counting(&self) -> bool {
        self.first.is_some() || self.second.is_some()
    }

    pub fn variable_count(&self) -> usize {
        self.shape.variable_count()
    }

    /// Variables bound by the prefix
    pub fn used_variables(&self) -> VariableSet {
        if self.variable_count() == 1 {
            VariableSet::X
        } else {
            VariableSet::BOTH
        }
    }

    /// Prefix with the roles of `x` and `y` exchanged; two-variable prefixes only
    pub fn mirror(&self) -> Option<Quantifier> {
        if self.variable_count() < 2 {
            return None;
        }
        Some(Quantifier {
            shape: self.shape.mirror(),
            first: self.second,
            second: self.first,
        })
    }

    /// Whether printing the clause with `x` and `y` exchanged yields an
    /// equivalent clause under the same prefix
    pub fn is_swappable(&self) -> bool {
        matches!(self.shape, Shape::ForallForall | Shape::ExistsExists) && self.first == self.second
    }

    /// Printed prefix, e.g. `V x E=1 y`
    pub fn prefix(&self) -> String {
        self.to_string()
    }

    /// Prover9 prefix such as `all x exists y`; counting prefixes have none
    pub fn prover9_prefix(&self) -> Option<String> {
        if self.is_counting() {
            return None;
        }
        let binder = |forall: bool| if forall { "all" } else { "exists" };
        let mut out = format!("{} x", binder(self.shape.starts_with_forall()));
        if self.variable_count() == 2 {
            out.push_str(&format!(" {} y", binder(self.shape.second_is_forall())));
        }
        Some(out)
    }

    /// Parse a prefix at the start of `text`, returning it with the rest of the input
    pub fn parse_prefix(text: &str) -> Result<(Quantifier, &str)> {
        let mut rest = text.trim_start();
        let mut binders: Vec<(bool, Option<u32>)> = Vec::with_capacity(2);
        loop {
            let token_end = rest.find(char::is_whitespace).unwrap_or(rest.len());
            let token = &rest[..token_end];
            let binder = match token {
                "V" => (true, None),
                "E" => (false, None),
                _ => match token.strip_prefix("E=") {
                    Some(k) => {
                        let k: u32 = k.parse().map_err(|_| {
                            SearchError::Parse(format!("invalid cardinality in prefix: {text}"))
                        })?;
                        (false, Some(k))
                    }
                    None => break,
                },
            };
            let after = rest[token_end..].trim_start();
            let var_end = after.find(char::is_whitespace).unwrap_or(after.len());
            let expected = if binders.is_empty() { "x" } else { "y" };
            if &after[..var_end] != expected {
                return Err(SearchError::Parse(format!(
                    "expected variable {expected} in prefix: {text}"
                )));
            }
            binders.push(binder);
            rest = after[var_end..].trim_start();
            if binders.len() == 2 {
                break;
            }
        }
        let quantifier = match binders.as_slice() {
            [(forall, k)] => Quantifier::counting(Shape::from_binders(*forall, None), *k, None),
            [(f1, k1), (f2, k2)] => {
                Quantifier::counting(Shape::from_binders(*f1, Some(*f2)), *k1, *k2)
            }
            _ => return Err(SearchError::Parse(format!("missing quantifier prefix: {text}"))),
        };
        Ok((quantifier, rest))
    }
}

impl fmt::Display for Quantifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let binder = |f: &mut fmt::Formatter<'_>, forall: bool, k: Option<u32>| match (forall, k) {
            (true, _) => write!(f, "V"),
            (false, None) => write!(f, "E"),
            (false, Some(k)) => write!(f, "E={}", k),
        };
        binder(f, self.shape.starts_with_forall(), self.first)?;
        write!(f, " x")?;
        if self.variable_count() == 2 {
            write!(f, " ")?;
            binder(f, self.shape.second_is_forall(), self.second)?;
            write!(f, " y")?;
        }
        Ok(())
    }
}

/// The quantifier prefixes admitted by a configuration
#[derive(Debug, Clone)]
pub struct QuantifierLattice {
    quantifiers: Vec<Quantifier>,
    successors: IndexMap<Quantifier, Vec<Quantifier>>,
    mirrors: FxHashMap<Quantifier, Quantifier>,
}

impl QuantifierLattice {
    /// Enumerate the prefixes for the given flags
    ///
    /// Without existential quantifiers only `V x` and `V x V y` exist. With
    /// them, the six plain shapes are generated, and when `counting` is set,
    /// `E=k x`, `E=k x V y` and `V x E=k y` for every `k` in `1..=max_k`; with
    /// `double_counting` also `E=k x E y`, `E x E=k y` and `E=k x E=l y`.
    pub fn generate(existential: bool, max_k: u32, counting: bool, double_counting: bool) -> Self {
        let mut lattice = QuantifierLattice {
            quantifiers: Vec::new(),
            successors: IndexMap::new(),
            mirrors: FxHashMap::default(),
        };
        let forall = Quantifier::plain(Shape::Forall);
        let forall_forall = Quantifier::plain(Shape::ForallForall);
        if !existential {
            lattice.quantifiers.extend([forall, forall_forall]);
            lattice.add_successor(forall, forall_forall);
            return lattice;
        }

        let exists = Quantifier::plain(Shape::Exists);
        let forall_exists = Quantifier::plain(Shape::ForallExists);
        let exists_forall = Quantifier::plain(Shape::ExistsForall);
        let exists_exists = Quantifier::plain(Shape::ExistsExists);
        lattice.quantifiers.extend([
            forall,
            exists,
            forall_forall,
            forall_exists,
            exists_forall,
            exists_exists,
        ]);
        lattice.add_successor(forall, forall_forall);
        lattice.add_successor(forall, forall_exists);
        lattice.add_successor(exists, exists_forall);
        lattice.add_successor(exists, exists_exists);
        lattice.add_mirror(forall_exists, exists_forall);

        if !counting {
            return lattice;
        }

        // Each entry counts either the first (0) or the second (1) variable.
        let mut counted = vec![
            (Shape::Exists, 0),
            (Shape::ExistsForall, 0),
            (Shape::ForallExists, 1),
        ];
        if double_counting {
            counted.extend([(Shape::ExistsExists, 0), (Shape::ExistsExists, 1)]);
        }
        let mut counting_exists: Vec<Quantifier> = Vec::new();
        let mut first_counted: FxHashMap<u32, Quantifier> = FxHashMap::default();
        for (shape, position) in counted {
            for k in 1..=max_k {
                let quantifier = if position == 0 {
                    Quantifier::counting(shape, Some(k), None)
                } else {
                    Quantifier::counting(shape, None, Some(k))
                };
                let previous = if shape == Shape::Exists {
                    counting_exists.push(quantifier);
                    None
                } else if position == 0 {
                    counting_exists.get(k as usize - 1).copied()
                } else if shape.starts_with_forall() {
                    Some(forall)
                } else {
                    Some(exists)
                };
                lattice.quantifiers.push(quantifier);
                if let Some(previous) = previous {
                    lattice.add_successor(previous, quantifier);
                }
                if quantifier.variable_count() == 2 {
                    if position == 0 {
                        first_counted.insert(k, quantifier);
                    } else if let Some(&partner) = first_counted.get(&k) {
                        lattice.add_mirror(partner, quantifier);
                    }
                }
            }
        }
        if double_counting {
            for (k, &single) in (1..=max_k).zip(&counting_exists) {
                for j in 1..=max_k {
                    let both = Quantifier::counting(Shape::ExistsExists, Some(k), Some(j));
                    lattice.quantifiers.push(both);
                    lattice.add_successor(single, both);
                    if k < j {
                        let swapped = Quantifier::counting(Shape::ExistsExists, Some(j), Some(k));
                        lattice.add_mirror(both, swapped);
                    }
                }
            }
        }
        lattice
    }

    fn add_successor(&mut self, from: Quantifier, to: Quantifier) {
        self.successors.entry(from).or_default().push(to);
    }

    fn add_mirror(&mut self, a: Quantifier, b: Quantifier) {
        self.mirrors.insert(a, b);
        self.mirrors.insert(b, a);
    }

    pub fn quantifiers(&self) -> &[Quantifier] {
        &self.quantifiers
    }

    pub fn len(&self) -> usize {
        self.quantifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quantifiers.is_empty()
    }

    pub fn contains(&self, quantifier: &Quantifier) -> bool {
        self.quantifiers.contains(quantifier)
    }

    /// Prefixes a clause under `quantifier` may be specialized to
    pub fn successors(&self, quantifier: &Quantifier) -> &[Quantifier] {
        self.successors
            .get(quantifier)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Mirror partner within the lattice, if the lattice contains one
    pub fn mirror(&self, quantifier: &Quantifier) -> Option<Quantifier> {
        self.mirrors.get(quantifier).copied()
    }

    pub fn is_swappable(&self, quantifier: &Quantifier) -> bool {
        quantifier.is_swappable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn distinct(lattice: &QuantifierLattice) -> usize {
        lattice
            .quantifiers()
            .iter()
            .map(|q| q.prefix())
            .collect::<HashSet<_>>()
            .len()
    }

    #[test]
    fn test_quantifier_counts() {
        let cases = [
            (0, false, false, 6),
            (1, true, false, 9),
            (1, true, true, 12),
            (2, true, false, 12),
            (2, true, true, 20),
        ];
        for (k, counting, double, expected) in cases {
            let lattice = QuantifierLattice::generate(true, k, counting, double);
            assert_eq!(lattice.len(), expected, "k={k} double={double}");
            assert_eq!(distinct(&lattice), expected);
        }
        assert_eq!(QuantifierLattice::generate(false, 2, true, true).len(), 2);
    }

    #[test]
    fn test_prefix_printing() {
        let q = Quantifier::counting(Shape::ExistsForall, Some(2), None);
        assert_eq!(q.prefix(), "E=2 x V y");
        assert_eq!(q.mirror().unwrap().prefix(), "V x E=2 y");
        assert_eq!(Quantifier::plain(Shape::Exists).prefix(), "E x");
        assert_eq!(Quantifier::plain(Shape::Forall).mirror(), None);
    }

    #[test]
    fn test_forall_never_counts() {
        let q = Quantifier::counting(Shape::ForallForall, Some(1), Some(2));
        assert!(!q.is_counting());
        assert_eq!(q, Quantifier::plain(Shape::ForallForall));
    }

    #[test]
    fn test_swappable() {
        assert!(Quantifier::plain(Shape::ForallForall).is_swappable());
        assert!(Quantifier::plain(Shape::ExistsExists).is_swappable());
        assert!(!Quantifier::plain(Shape::ForallExists).is_swappable());
        assert!(Quantifier::counting(Shape::ExistsExists, Some(1), Some(1)).is_swappable());
        assert!(!Quantifier::counting(Shape::ExistsExists, Some(1), Some(2)).is_swappable());
        assert!(!Quantifier::counting(Shape::ExistsExists, Some(1), None).is_swappable());
    }

    #[test]
    fn test_parse_prefix() {
        let (q, rest) = Quantifier::parse_prefix("V x E=1 y B0(x,y) | U0(x)").unwrap();
        assert_eq!(q, Quantifier::counting(Shape::ForallExists, None, Some(1)));
        assert_eq!(rest, "B0(x,y) | U0(x)");
        let (q, rest) = Quantifier::parse_prefix("E x U0(x)").unwrap();
        assert_eq!(q, Quantifier::plain(Shape::Exists));
        assert_eq!(rest, "U0(x)");
        assert!(Quantifier::parse_prefix("V y U0(y)").is_err());
        assert!(Quantifier::parse_prefix("U0(x)").is_err());
        assert!(Quantifier::parse_prefix("E=a x U0(x)").is_err());
    }

    #[test]
    fn test_successors_and_mirrors() {
        let lattice = QuantifierLattice::generate(true, 1, true, false);
        let forall = Quantifier::plain(Shape::Forall);
        let succ: Vec<String> = lattice.successors(&forall).iter().map(|q| q.prefix()).collect();
        assert_eq!(succ, vec!["V x V y", "V x E y", "V x E=1 y"]);
        let fe = Quantifier::plain(Shape::ForallExists);
        assert_eq!(lattice.mirror(&fe), Some(Quantifier::plain(Shape::ExistsForall)));
        assert_eq!(lattice.mirror(&Quantifier::plain(Shape::ForallForall)), None);
        let single = Quantifier::counting(Shape::Exists, Some(1), None);
        let succ: Vec<String> = lattice.successors(&single).iter().map(|q| q.prefix()).collect();
        assert_eq!(succ, vec!["E=1 x V y"]);
        for q in lattice.quantifiers() {
            if !lattice.successors(q).is_empty() {
                assert!(lattice.mirror(q).is_none());
            }
        }
    }
}
