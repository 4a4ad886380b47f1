//! Predicates, literals and the shared literal store

use super::interner::{FxDashMap, Interner, PredicateId};
use super::term::{Term, Variable, VariableSet};
use crate::error::{Result, SearchError};
use crate::matching::{Atom, Node};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, OnceLock};

/// A predicate symbol with arity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Predicate {
    pub id: PredicateId,
    pub arity: u8,
}

impl Predicate {
    pub fn new(id: PredicateId, arity: u8) -> Self {
        Predicate { id, arity }
    }

    /// Get the name of this predicate from the interner
    pub fn name(&self, interner: &Interner) -> Arc<str> {
        interner.resolve_predicate(self.id)
    }
}

/// A possibly negated predicate application
///
/// Literals are plain values; the [`LiteralStore`] interns them so that the
/// rest of the crate handles `LiteralId`s and compares by ID.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Literal {
    pub predicate: Predicate,
    pub negated: bool,
    pub args: Vec<Term>,
}

impl Literal {
    pub fn new(predicate: Predicate, negated: bool, args: Vec<Term>) -> Self {
        debug_assert_eq!(predicate.arity as usize, args.len());
        Literal {
            predicate,
            negated,
            args,
        }
    }

    pub fn arity(&self) -> usize {
        self.args.len()
    }

    /// Variables occurring in the argument list
    pub fn variables(&self) -> VariableSet {
        self.args
            .iter()
            .filter_map(|t| t.as_variable())
            .fold(VariableSet::EMPTY, |set, v| set.union(VariableSet::of(v)))
    }

    /// Same atom with the opposite sign
    pub fn negation(&self) -> Literal {
        Literal {
            predicate: self.predicate,
            negated: !self.negated,
            args: self.args.clone(),
        }
    }

    /// Swap the two argument positions of a binary literal
    ///
    /// # Panics
    ///
    /// Panics when the literal is not binary.
    pub fn flip(&self) -> Literal {
        assert_eq!(self.arity(), 2, "only binary literals can be flipped");
        Literal {
            predicate: self.predicate,
            negated: self.negated,
            args: vec![self.args[1], self.args[0]],
        }
    }

    /// Exchange `x` and `y` in every argument position
    pub fn mirror(&self) -> Literal {
        Literal {
            predicate: self.predicate,
            negated: self.negated,
            args: self.args.iter().map(|t| t.mirror()).collect(),
        }
    }

    pub fn substitute(&self, from: Variable, to: Variable) -> Literal {
        Literal {
            predicate: self.predicate,
            negated: self.negated,
            args: self.args.iter().map(|t| t.substitute(from, to)).collect(),
        }
    }

    /// Same sign and arguments under another predicate of equal arity
    pub fn rename(&self, predicate: Predicate) -> Literal {
        debug_assert_eq!(self.predicate.arity, predicate.arity);
        Literal {
            predicate,
            negated: self.negated,
            args: self.args.clone(),
        }
    }

    /// Lower to a matching atom; the sign is folded into the relation symbol
    /// so negated literals only ever match negated literals
    pub fn to_atom(&self) -> Atom {
        let symbol = self.predicate.id.as_u32() * 2 + u32::from(self.negated);
        let args = self
            .args
            .iter()
            .map(|t| match t {
                Term::Variable(v) => Node::Var(v.index()),
                Term::Constant(c) => Node::Const(c.as_u32()),
            })
            .collect();
        Atom::new(symbol, args)
    }

    /// A binary literal whose two arguments coincide, e.g. `B0(x,x)`
    pub fn is_reflexive(&self) -> bool {
        self.arity() == 2 && self.args[0] == self.args[1]
    }

    /// Format this literal with `~` as the negation sign
    pub fn display<'a>(&'a self, interner: &'a Interner) -> LiteralDisplay<'a> {
        LiteralDisplay {
            literal: self,
            interner,
            negation_sign: "~",
        }
    }

    /// Format this literal in Prover9 syntax (`-` as the negation sign)
    pub fn prover9<'a>(&'a self, interner: &'a Interner) -> LiteralDisplay<'a> {
        LiteralDisplay {
            literal: self,
            interner,
            negation_sign: "-",
        }
    }

    /// Parse `P(x,y)` or `~P(x,y)`; arguments other than `x`/`y` become constants
    pub fn parse(text: &str, interner: &Interner) -> Result<Literal> {
        let text = text.trim();
        let (negated, atom) = match text.strip_prefix('~') {
            Some(rest) => (true, rest.trim_start()),
            None => (false, text),
        };
        let open = atom
            .find('(')
            .ok_or_else(|| SearchError::Parse(format!("literal without arguments: {text}")))?;
        let inner = atom[open + 1..]
            .strip_suffix(')')
            .ok_or_else(|| SearchError::Parse(format!("unbalanced literal: {text}")))?;
        let name = atom[..open].trim();
        if name.is_empty() || inner.trim().is_empty() {
            return Err(SearchError::Parse(format!("malformed literal: {text}")));
        }
        let args: Vec<Term> = inner
            .split(',')
            .map(|arg| Term::parse(arg.trim(), interner))
            .collect();
        let arity = u8::try_from(args.len())
            .map_err(|_| SearchError::Parse(format!("too many arguments: {text}")))?;
        let predicate = Predicate::new(interner.intern_predicate(name), arity);
        Ok(Literal::new(predicate, negated, args))
    }
}

/// Display wrapper for Literal that includes an interner for name resolution
pub struct LiteralDisplay<'a> {
    literal: &'a Literal,
    interner: &'a Interner,
    negation_sign: &'static str,
}

impl<'a> fmt::Display for LiteralDisplay<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.literal.negated {
            f.write_str(self.negation_sign)?;
        }
        write!(f, "{}(", self.literal.predicate.name(self.interner))?;
        for (i, arg) in self.literal.args.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", arg.display(self.interner))?;
        }
        write!(f, ")")
    }
}

/// ID of an interned literal
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LiteralId(pub(crate) u32);

impl LiteralId {
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

/// An interned literal with its printed form and memoized siblings
#[derive(Debug)]
pub struct LiteralEntry {
    literal: Literal,
    text: Arc<str>,
    variables: VariableSet,
    negation: OnceLock<LiteralId>,
    flip: OnceLock<LiteralId>,
    mirror: OnceLock<LiteralId>,
}

impl LiteralEntry {
    pub fn literal(&self) -> &Literal {
        &self.literal
    }

    /// Printed form, e.g. `~B0(x,y)`
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn variables(&self) -> VariableSet {
        self.variables
    }

    pub fn predicate(&self) -> Predicate {
        self.literal.predicate
    }

    pub fn is_negated(&self) -> bool {
        self.literal.negated
    }
}

/// Append-only store of interned literals
///
/// Interning the same value twice, from any thread, returns the same ID, so
/// ID equality is literal equality. Negation, flip and mirror are computed
/// once per literal and shared.
#[derive(Debug)]
pub struct LiteralStore {
    interner: Arc<Interner>,
    lookup: FxDashMap<Literal, LiteralId>,
    entries: FxDashMap<LiteralId, Arc<LiteralEntry>>,
    next: AtomicU32,
}

impl LiteralStore {
    pub fn new(interner: Arc<Interner>) -> Self {
        LiteralStore {
            interner,
            lookup: FxDashMap::default(),
            entries: FxDashMap::default(),
            next: AtomicU32::new(0),
        }
    }

    pub fn interner(&self) -> &Interner {
        &self.interner
    }

    /// Intern a literal, returning its ID (get-or-create)
    pub fn intern(&self, literal: Literal) -> LiteralId {
        if let Some(id) = self.lookup.get(&literal) {
            return *id;
        }
        let text: Arc<str> = Arc::from(literal.display(&self.interner).to_string());
        let variables = literal.variables();
        // The entry is published before the ID escapes the shard lock.
        *self.lookup.entry(literal.clone()).or_insert_with(|| {
            let id = LiteralId(self.next.fetch_add(1, Ordering::Relaxed));
            let entry = LiteralEntry {
                literal,
                text,
                variables,
                negation: OnceLock::new(),
                flip: OnceLock::new(),
                mirror: OnceLock::new(),
            };
            self.entries.insert(id, Arc::new(entry));
            id
        })
    }

    /// Look up an interned literal
    pub fn get(&self, id: LiteralId) -> Arc<LiteralEntry> {
        match self.entries.get(&id) {
            Some(entry) => Arc::clone(entry.value()),
            None => unreachable!("literal {} was never interned", id.0),
        }
    }

    pub fn text(&self, id: LiteralId) -> Arc<str> {
        Arc::clone(&self.get(id).text)
    }

    pub fn predicate(&self, id: LiteralId) -> Predicate {
        self.get(id).literal.predicate
    }

    pub fn variables(&self, id: LiteralId) -> VariableSet {
        self.get(id).variables
    }

    pub fn negation(&self, id: LiteralId) -> LiteralId {
        let entry = self.get(id);
        *entry
            .negation
            .get_or_init(|| self.intern(entry.literal.negation()))
    }

    /// Argument-swapped sibling of a binary literal
    ///
    /// # Panics
    ///
    /// Panics when the literal is not binary.
    pub fn flip(&self, id: LiteralId) -> LiteralId {
        let entry = self.get(id);
        *entry.flip.get_or_init(|| self.intern(entry.literal.flip()))
    }

    pub fn mirror(&self, id: LiteralId) -> LiteralId {
        let entry = self.get(id);
        *entry.mirror.get_or_init(|| self.intern(entry.literal.mirror()))
    }

    /// The literal with its predicate replaced
    pub fn rename(&self, id: LiteralId, predicate: Predicate) -> LiteralId {
        let entry = self.get(id);
        if entry.literal.predicate == predicate {
            return id;
        }
        self.intern(entry.literal.rename(predicate))
    }

    /// Prover9 rendering, e.g. `-B0(x,y)`
    pub fn prover9(&self, id: LiteralId) -> String {
        self.get(id).literal.prover9(&self.interner).to_string()
    }

    pub fn parse(&self, text: &str) -> Result<LiteralId> {
        Ok(self.intern(Literal::parse(text, &self.interner)?))
    }

    /// Number of interned literals
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> LiteralStore {
        LiteralStore::new(Arc::new(Interner::new()))
    }

    #[test]
    fn test_parse_and_print() {
        let store = store();
        let id = store.parse("~B0(x, y)").unwrap();
        assert_eq!(&*store.text(id), "~B0(x,y)");
        assert_eq!(store.prover9(id), "-B0(x,y)");
        assert_eq!(store.variables(id), VariableSet::BOTH);
        assert!(store.get(id).is_negated());
        assert_eq!(store.predicate(id).arity, 2);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        let store = store();
        assert!(store.parse("U0").is_err());
        assert!(store.parse("U0(x").is_err());
        assert!(store.parse("(x)").is_err());
        assert!(store.parse("U0()").is_err());
    }

    #[test]
    fn test_interning_is_idempotent() {
        let store = store();
        let a = store.parse("U0(x)").unwrap();
        let b = store.parse("U0( x )").unwrap();
        assert_eq!(a, b);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_siblings() {
        let store = store();
        let lit = store.parse("B0(x,x)").unwrap();
        assert_eq!(&*store.text(store.mirror(lit)), "B0(y,y)");
        assert_eq!(store.flip(lit), lit);
        let lit = store.parse("~B0(x,y)").unwrap();
        assert_eq!(&*store.text(store.flip(lit)), "~B0(y,x)");
        assert_eq!(&*store.text(store.negation(lit)), "B0(x,y)");
    }

    #[test]
    #[should_panic(expected = "only binary literals can be flipped")]
    fn test_flip_unary_panics() {
        let store = store();
        let lit = store.parse("U0(x)").unwrap();
        store.flip(lit);
    }

    #[test]
    fn test_reflexive() {
        let interner = Interner::new();
        assert!(Literal::parse("B0(y,y)", &interner).unwrap().is_reflexive());
        assert!(!Literal::parse("B0(x,y)", &interner).unwrap().is_reflexive());
        assert!(!Literal::parse("U0(x)", &interner).unwrap().is_reflexive());
    }
}
