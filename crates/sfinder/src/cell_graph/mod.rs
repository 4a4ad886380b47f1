//! Cell graphs of sentences and cell-graph based hiding
//!
//! A cell graph is the weighted graph a WFOMC tool builds for a sentence.
//! Sentences with isomorphic cell graphs have the same weighted model count,
//! so only one of them needs to be shown. This module holds the flattened
//! relational form of a cell graph ([`CellGraph`]), the parser for the tool
//! output ([`parser`]), the tool boundary ([`CellGraphComputer`]), an
//! optional result cache ([`CellGraphCache`]) and the isomorphism registry
//! that decides what gets hidden ([`CellGraphRegistry`]), optionally keyed
//! by [`canonical`] forms.
//!
//! The flattened form prints as comma-separated relations such as
//! `L(n0, 4, 1, g0), E(n0, n1, m0, g0), M(m0, 2), G(g0)`. Arguments starting
//! with a lowercase letter are variables; everything else is a constant.

pub mod cache;
pub mod canonical;
pub mod computer;
pub mod parser;
pub mod registry;

pub use cache::{CellGraphCache, MemoryCache, CACHE_PREFIX};
pub use computer::{CellGraphComputer, JuliaComputer};
pub use registry::{CellGraphRegistry, Partition};

use crate::error::{Result, SearchError};
use crate::fol::Interner;
use crate::matching::{Atom, Node, Structure};
use rustc_hash::FxHashMap;
use std::fmt;

/// A relation argument
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Arg {
    Var(String),
    Const(String),
}

impl Arg {
    /// Lowercase-initial names are variables
    pub fn parse(text: &str) -> Arg {
        let text = text.trim();
        if text.starts_with(|c: char| c.is_ascii_lowercase()) {
            Arg::Var(text.to_string())
        } else {
            Arg::Const(text.to_string())
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Arg::Var(name) | Arg::Const(name) => name,
        }
    }
}

/// One relation of a flattened cell graph
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Relation {
    pub name: String,
    pub args: Vec<Arg>,
}

impl Relation {
    pub fn new(name: impl Into<String>, args: Vec<Arg>) -> Self {
        Relation {
            name: name.into(),
            args,
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", arg.name())?;
        }
        write!(f, ")")
    }
}

/// A flattened cell graph; the empty graph marks a sentence the tool
/// rejected (a contradiction, or one too expensive to compute)
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CellGraph {
    relations: Vec<Relation>,
}

impl CellGraph {
    pub fn new(relations: Vec<Relation>) -> Self {
        CellGraph { relations }
    }

    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }

    /// Parse the printed flattened form
    pub fn parse(text: &str) -> Result<CellGraph> {
        let relations = split_top_level(text.trim(), ',')?
            .into_iter()
            .filter(|part| !part.trim().is_empty())
            .map(parse_relation)
            .collect::<Result<Vec<_>>>()?;
        Ok(CellGraph { relations })
    }

    /// Lower to a matching structure; relation names and constants are
    /// interned so that structures of different graphs are comparable
    pub fn to_structure(&self, interner: &Interner) -> Structure {
        let mut variables: FxHashMap<&str, u32> = FxHashMap::default();
        let atoms: Vec<Atom> = self
            .relations
            .iter()
            .map(|relation| {
                let symbol = interner.intern_predicate(&relation.name).as_u32();
                let args = relation
                    .args
                    .iter()
                    .map(|arg| match arg {
                        Arg::Var(name) => {
                            let next = variables.len() as u32;
                            Node::Var(*variables.entry(name.as_str()).or_insert(next))
                        }
                        Arg::Const(name) => Node::Const(interner.intern_constant(name).as_u32()),
                    })
                    .collect();
                Atom::new(symbol, args)
            })
            .collect();
        Structure::new(atoms)
    }
}

impl fmt::Display for CellGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, relation) in self.relations.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", relation)?;
        }
        Ok(())
    }
}

/// `Name(a, b, c)`
pub(crate) fn parse_relation(text: &str) -> Result<Relation> {
    let text = text.trim();
    let open = text
        .find('(')
        .ok_or_else(|| SearchError::CellGraph(format!("relation without arguments: {text}")))?;
    let inner = text[open + 1..]
        .strip_suffix(')')
        .ok_or_else(|| SearchError::CellGraph(format!("unterminated relation: {text}")))?;
    let name = text[..open].trim();
    if name.is_empty() {
        return Err(SearchError::CellGraph(format!("relation without a name: {text}")));
    }
    let args = split_top_level(inner, ',')?
        .into_iter()
        .map(Arg::parse)
        .collect();
    Ok(Relation::new(name, args))
}

/// Split at `separator` outside of parentheses and single quotes
pub(crate) fn split_top_level(text: &str, separator: char) -> Result<Vec<&str>> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quoted = false;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '\'' => quoted = !quoted,
            '(' if !quoted => depth += 1,
            ')' if !quoted => {
                depth = depth.checked_sub(1).ok_or_else(|| {
                    SearchError::CellGraph(format!("unbalanced parentheses: {text}"))
                })?;
            }
            c if c == separator && depth == 0 && !quoted => {
                parts.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    if depth != 0 || quoted {
        return Err(SearchError::CellGraph(format!("unbalanced input: {text}")));
    }
    if !text.is_empty() {
        parts.push(&text[start..]);
    }
    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::{Matcher, Matching};

    #[test]
    fn test_display_and_parse() {
        let text = "L(n0, 4, 1, g0), E(n0, n1, m0, g0), M(m0, -2), G(g0)";
        let graph = CellGraph::parse(text).unwrap();
        assert_eq!(graph.relations().len(), 4);
        assert_eq!(graph.relations()[2].args[1], Arg::Const("-2".to_string()));
        assert_eq!(graph.to_string(), text);
    }

    #[test]
    fn test_empty_graph() {
        let graph = CellGraph::parse("").unwrap();
        assert!(graph.is_empty());
        assert_eq!(graph.to_string(), "");
    }

    #[test]
    fn test_structure_isomorphism() {
        let interner = Interner::new();
        let a = CellGraph::parse("L(n0, 1, 2, g0), L(n1, 3, 2, g0), E(n0, n1, 5, g0), G(g0)").unwrap();
        let b = CellGraph::parse("L(n7, 3, 2, g1), L(n2, 1, 2, g1), E(n2, n7, 5, g1), G(g1)").unwrap();
        let c = CellGraph::parse("L(n0, 1, 2, g0), L(n1, 3, 2, g0), E(n1, n0, 5, g0), G(g0)").unwrap();
        let matching = Matching::new();
        assert!(matching.isomorphic(&a.to_structure(&interner), &b.to_structure(&interner)));
        assert!(!matching.isomorphic(&a.to_structure(&interner), &c.to_structure(&interner)));
    }

    #[test]
    fn test_split_rejects_unbalanced() {
        assert!(split_top_level("L(n0, 1", ',').is_err());
        assert_eq!(split_top_level("a, 'b, c', d", ',').unwrap().len(), 3);
    }
}
