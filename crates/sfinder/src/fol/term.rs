//! Variables and terms of the two-variable fragment

use super::interner::{ConstantId, Interner};
use std::fmt;

/// One of the two variables a sentence may bind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Variable {
    /// The first variable, printed `x`
    X,
    /// The second variable, printed `y`
    Y,
}

impl Variable {
    pub fn name(self) -> &'static str {
        match self {
            Variable::X => "x",
            Variable::Y => "y",
        }
    }

    /// The other variable of the pair
    pub fn other(self) -> Variable {
        match self {
            Variable::X => Variable::Y,
            Variable::Y => Variable::X,
        }
    }

    pub fn parse(name: &str) -> Option<Variable> {
        match name {
            "x" => Some(Variable::X),
            "y" => Some(Variable::Y),
            _ => None,
        }
    }

    pub(crate) fn index(self) -> u32 {
        match self {
            Variable::X => 0,
            Variable::Y => 1,
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Set of variables, stored as a two-bit mask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct VariableSet(u8);

impl VariableSet {
    pub const EMPTY: VariableSet = VariableSet(0);
    pub const X: VariableSet = VariableSet(1);
    pub const Y: VariableSet = VariableSet(2);
    pub const BOTH: VariableSet = VariableSet(3);

    pub fn of(variable: Variable) -> Self {
        match variable {
            Variable::X => VariableSet::X,
            Variable::Y => VariableSet::Y,
        }
    }

    pub fn union(self, other: VariableSet) -> Self {
        VariableSet(self.0 | other.0)
    }

    pub fn contains(self, variable: Variable) -> bool {
        self.0 & VariableSet::of(variable).0 != 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Exchange the roles of `x` and `y`
    pub fn mirror(self) -> Self {
        VariableSet(((self.0 & 1) << 1) | ((self.0 & 2) >> 1))
    }
}

/// A term: either one of the two variables or a constant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Term {
    Variable(Variable),
    Constant(ConstantId),
}

impl Term {
    pub fn as_variable(self) -> Option<Variable> {
        match self {
            Term::Variable(v) => Some(v),
            Term::Constant(_) => None,
        }
    }

    /// Substitute `x` for `y` and `y` for `x`; constants are unchanged
    pub fn mirror(self) -> Term {
        match self {
            Term::Variable(v) => Term::Variable(v.other()),
            constant => constant,
        }
    }

    /// Replace `from` by `to`, leaving other terms untouched
    pub fn substitute(self, from: Variable, to: Variable) -> Term {
        match self {
            Term::Variable(v) if v == from => Term::Variable(to),
            other => other,
        }
    }

    /// Parse an argument: `x` and `y` are variables, anything else a constant
    pub fn parse(text: &str, interner: &Interner) -> Term {
        match Variable::parse(text) {
            Some(v) => Term::Variable(v),
            None => Term::Constant(interner.intern_constant(text)),
        }
    }

    /// Format this term with an interner for name resolution
    pub fn display<'a>(&'a self, interner: &'a Interner) -> TermDisplay<'a> {
        TermDisplay { term: self, interner }
    }
}

/// Display wrapper for Term that includes an interner for name resolution
pub struct TermDisplay<'a> {
    term: &'a Term,
    interner: &'a Interner,
}

impl<'a> fmt::Display for TermDisplay<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.term {
            Term::Variable(v) => write!(f, "{}", v),
            Term::Constant(c) => write!(f, "{}", self.interner.resolve_constant(*c)),
        }
    }
}
