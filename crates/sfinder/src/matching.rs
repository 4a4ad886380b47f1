//! Matching oracle over small relational structures
//!
//! Clauses and cell graphs are both lowered to a [`Structure`]: a set of
//! atoms whose arguments are variables or constants. The [`Matcher`] trait
//! answers the two questions the search asks of such structures:
//!
//! - **isomorphism**: is there a bijective renaming of variables (constants
//!   fixed) that maps one atom set onto the other?
//! - **theta-subsumption**: is there a substitution of variables (to
//!   variables or constants) mapping every query atom into the target?
//!
//! [`Matching`] implements both with trail-based backtracking over atoms,
//! ordering query atoms by their number of candidate images.

use rustc_hash::{FxHashMap, FxHashSet, FxHasher};
use std::hash::{Hash, Hasher};

/// An argument position: a variable or a constant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Node {
    Var(u32),
    Const(u32),
}

/// A relation symbol applied to nodes
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Atom {
    pub symbol: u32,
    pub args: Vec<Node>,
}

impl Atom {
    pub fn new(symbol: u32, args: Vec<Node>) -> Self {
        Atom { symbol, args }
    }
}

/// A finite set of atoms
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Structure {
    atoms: Vec<Atom>,
}

impl Structure {
    pub fn new(atoms: impl IntoIterator<Item = Atom>) -> Self {
        let mut atoms: Vec<Atom> = atoms.into_iter().collect();
        atoms.sort();
        atoms.dedup();
        Structure { atoms }
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// Distinct variables, sorted
    pub fn variables(&self) -> Vec<u32> {
        let mut vars: Vec<u32> = self
            .atoms
            .iter()
            .flat_map(|a| a.args.iter())
            .filter_map(|n| match n {
                Node::Var(v) => Some(*v),
                Node::Const(_) => None,
            })
            .collect();
        vars.sort_unstable();
        vars.dedup();
        vars
    }

    /// Fingerprint preserved by isomorphism
    ///
    /// Each atom contributes its symbol, its constants and the pattern of
    /// repeated variables inside it; each variable contributes the multiset
    /// of `(symbol, position)` slots it occupies.
    pub fn invariant(&self) -> u64 {
        let mut atom_signatures: Vec<(u32, Vec<(bool, u32)>)> = self
            .atoms
            .iter()
            .map(|atom| {
                let mut first_seen: Vec<u32> = Vec::new();
                let args = atom
                    .args
                    .iter()
                    .map(|node| match node {
                        Node::Const(c) => (true, *c),
                        Node::Var(v) => {
                            let idx = match first_seen.iter().position(|seen| seen == v) {
                                Some(idx) => idx,
                                None => {
                                    first_seen.push(*v);
                                    first_seen.len() - 1
                                }
                            };
                            (false, idx as u32)
                        }
                    })
                    .collect();
                (atom.symbol, args)
            })
            .collect();
        atom_signatures.sort_unstable();

        let mut slots: FxHashMap<u32, Vec<(u32, usize)>> = FxHashMap::default();
        for atom in &self.atoms {
            for (position, node) in atom.args.iter().enumerate() {
                if let Node::Var(v) = node {
                    slots.entry(*v).or_default().push((atom.symbol, position));
                }
            }
        }
        let mut colors: Vec<Vec<(u32, usize)>> = slots
            .into_values()
            .map(|mut slots| {
                slots.sort_unstable();
                slots
            })
            .collect();
        colors.sort_unstable();

        let mut hasher = FxHasher::default();
        atom_signatures.hash(&mut hasher);
        colors.hash(&mut hasher);
        hasher.finish()
    }
}

/// Isomorphism and subsumption queries between structures
pub trait Matcher: Send + Sync {
    /// Whether a bijective variable renaming maps `a` onto `b`
    fn isomorphic(&self, a: &Structure, b: &Structure) -> bool;

    /// Whether some substitution maps every atom of `query` into `target`
    fn subsumes(&self, query: &Structure, target: &Structure) -> bool {
        self.subsumes_fixing(query, target, &[])
    }

    /// Like [`Matcher::subsumes`], with some query variables bound up front
    fn subsumes_fixing(&self, query: &Structure, target: &Structure, fixed: &[(u32, Node)])
        -> bool;
}

/// Backtracking matcher
#[derive(Debug, Default, Clone, Copy)]
pub struct Matching;

impl Matching {
    pub fn new() -> Self {
        Matching
    }
}

impl Matcher for Matching {
    fn isomorphic(&self, a: &Structure, b: &Structure) -> bool {
        if a.len() != b.len() || a.variables().len() != b.variables().len() {
            return false;
        }
        if a.invariant() != b.invariant() {
            return false;
        }
        let mut binding = Binding::new(true);
        search(a, b, &mut binding)
    }

    fn subsumes_fixing(
        &self,
        query: &Structure,
        target: &Structure,
        fixed: &[(u32, Node)],
    ) -> bool {
        let mut binding = Binding::new(false);
        for (var, node) in fixed {
            if !binding.try_bind(*var, *node) {
                return false;
            }
        }
        search(query, target, &mut binding)
    }
}

/// Variable assignment with an undo trail
struct Binding {
    values: FxHashMap<u32, Node>,
    images: FxHashSet<Node>,
    trail: Vec<u32>,
    injective: bool,
}

impl Binding {
    fn new(injective: bool) -> Self {
        Binding {
            values: FxHashMap::default(),
            images: FxHashSet::default(),
            trail: Vec::new(),
            injective,
        }
    }

    fn mark(&self) -> usize {
        self.trail.len()
    }

    fn backtrack(&mut self, mark: usize) {
        while self.trail.len() > mark {
            if let Some(var) = self.trail.pop() {
                if let Some(node) = self.values.remove(&var) {
                    self.images.remove(&node);
                }
            }
        }
    }

    /// Bind `var` to `node`, or check an existing binding
    fn try_bind(&mut self, var: u32, node: Node) -> bool {
        if let Some(bound) = self.values.get(&var) {
            return *bound == node;
        }
        if self.injective {
            // Isomorphisms rename variables to variables, one to one.
            if matches!(node, Node::Const(_)) || self.images.contains(&node) {
                return false;
            }
        }
        self.values.insert(var, node);
        self.images.insert(node);
        self.trail.push(var);
        true
    }
}

fn match_atom(query: &Atom, target: &Atom, binding: &mut Binding) -> bool {
    if query.symbol != target.symbol || query.args.len() != target.args.len() {
        return false;
    }
    query.args.iter().zip(&target.args).all(|(q, t)| match q {
        Node::Const(c) => *t == Node::Const(*c),
        Node::Var(v) => binding.try_bind(*v, *t),
    })
}

fn search(query: &Structure, target: &Structure, binding: &mut Binding) -> bool {
    let mut candidates: FxHashMap<(u32, usize), Vec<&Atom>> = FxHashMap::default();
    for atom in target.atoms() {
        candidates
            .entry((atom.symbol, atom.args.len()))
            .or_default()
            .push(atom);
    }
    let mut order: Vec<(&Atom, &[&Atom])> = Vec::with_capacity(query.len());
    for atom in query.atoms() {
        match candidates.get(&(atom.symbol, atom.args.len())) {
            Some(images) => order.push((atom, images.as_slice())),
            None => return false,
        }
    }
    order.sort_by_key(|(_, images)| images.len());
    extend(&order, 0, binding)
}

fn extend(order: &[(&Atom, &[&Atom])], idx: usize, binding: &mut Binding) -> bool {
    let Some((atom, images)) = order.get(idx) else {
        return true;
    };
    for image in images.iter() {
        let mark = binding.mark();
        if match_atom(atom, image, binding) && extend(order, idx + 1, binding) {
            return true;
        }
        binding.backtrack(mark);
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atom(symbol: u32, args: &[Node]) -> Atom {
        Atom::new(symbol, args.to_vec())
    }

    use Node::{Const, Var};

    #[test]
    fn test_isomorphic_renaming() {
        let a = Structure::new([atom(0, &[Var(0), Var(1)]), atom(1, &[Var(1)])]);
        let b = Structure::new([atom(0, &[Var(7), Var(3)]), atom(1, &[Var(3)])]);
        let c = Structure::new([atom(0, &[Var(7), Var(3)]), atom(1, &[Var(7)])]);
        let m = Matching::new();
        assert!(m.isomorphic(&a, &b));
        assert!(!m.isomorphic(&a, &c));
        assert_eq!(a.invariant(), b.invariant());
    }

    #[test]
    fn test_isomorphism_respects_constants() {
        let a = Structure::new([atom(0, &[Var(0), Const(1)])]);
        let b = Structure::new([atom(0, &[Var(0), Const(2)])]);
        let m = Matching::new();
        assert!(!m.isomorphic(&a, &b));
        assert!(m.isomorphic(&a, &a.clone()));
    }

    #[test]
    fn test_isomorphism_is_injective() {
        let a = Structure::new([atom(0, &[Var(0)]), atom(0, &[Var(1)])]);
        let b = Structure::new([atom(0, &[Var(0)]), atom(1, &[Var(0)])]);
        assert!(!Matching.isomorphic(&a, &b));
    }

    #[test]
    fn test_subsumption_collapses_variables() {
        // {P(x,x), P(y,y)} subsumes {P(x,x)} with y -> x
        let full = Structure::new([atom(0, &[Var(0), Var(0)]), atom(0, &[Var(1), Var(1)])]);
        let shorter = Structure::new([atom(0, &[Var(0), Var(0)])]);
        assert!(Matching.subsumes(&full, &shorter));
        // y must stay fixed: only P(x,x) may map onto itself
        assert!(!Matching.subsumes_fixing(&full, &shorter, &[(1, Var(1))]));
        assert!(Matching.subsumes_fixing(&full, &shorter, &[(0, Var(0))]));
    }

    #[test]
    fn test_subsumption_fails_on_missing_symbol() {
        let query = Structure::new([atom(3, &[Var(0)])]);
        let target = Structure::new([atom(0, &[Var(0)])]);
        assert!(!Matching.subsumes(&query, &target));
        assert!(Matching.subsumes(&Structure::default(), &target));
    }
}
