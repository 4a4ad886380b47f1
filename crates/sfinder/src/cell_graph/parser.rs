//! Parser for the cell graphs printed by the WFOMC tool
//!
//! One result line is `[...]` holding `;`-separated graphs. Each graph is a
//! comma-separated list of relations from four families:
//!
//! - `L(cell, w1, w2)`: a cell with its weights
//! - `E(cell1, cell2, w)`: a weighted edge
//! - `W(w)`: a global weight
//! - `C(cell, w1, w2, k, w3)`: a clique of size `k`
//!
//! Cell names become graph-local variables `n*`. A weight is a scalar
//! constant or a quoted polynomial such as `'12*x^2*x2^3-4'`; polynomials
//! are unfolded into sum relations `M(m, term)` / `Md(m, term)` (added or
//! subtracted term) and product relations `P(p, factor)` /
//! `P(p, x, exponent)`, so that isomorphic graphs with equal polynomials
//! stay isomorphic. Every graph gets a `G(g)` marker that ties its
//! relations together.

use super::{parse_relation, split_top_level, Arg, CellGraph, Relation};
use crate::error::{Result, SearchError};
use rustc_hash::FxHashMap;

/// Hands out fresh names `{prefix}{i}`, reusing the name of a known key
struct NameSupply {
    prefix: &'static str,
    names: FxHashMap<String, String>,
    next: usize,
}

impl NameSupply {
    fn new(prefix: &'static str) -> Self {
        NameSupply {
            prefix,
            names: FxHashMap::default(),
            next: 0,
        }
    }

    fn fresh(&mut self) -> String {
        let name = format!("{}{}", self.prefix, self.next);
        self.next += 1;
        name
    }

    fn get(&mut self, key: &str) -> String {
        if let Some(name) = self.names.get(key) {
            return name.clone();
        }
        let name = self.fresh();
        self.names.insert(key.to_string(), name.clone());
        name
    }
}

/// State shared by all graphs of one result line
struct LineParser {
    cells: NameSupply,
    sums: NameSupply,
    products: NameSupply,
    weights: NameSupply,
    expressions: FxHashMap<String, Arg>,
    relations: Vec<Relation>,
}

/// Parse the content of one result line, without the surrounding brackets
pub fn parse_output(content: &str) -> Result<CellGraph> {
    if content.trim().is_empty() {
        return Ok(CellGraph::default());
    }
    let mut parser = LineParser {
        cells: NameSupply::new("n"),
        sums: NameSupply::new("m"),
        products: NameSupply::new("p"),
        weights: NameSupply::new("x"),
        expressions: FxHashMap::default(),
        relations: Vec::new(),
    };
    for (index, graph) in split_top_level(content, ';')?.into_iter().enumerate() {
        parser.graph(graph, index)?;
    }
    Ok(CellGraph::new(parser.relations))
}

/// Parse a whole output line `[...]`; `None` for lines that carry no result
pub fn parse_line(line: &str) -> Option<Result<CellGraph>> {
    let inner = line.trim().strip_prefix('[')?;
    let inner = inner.strip_suffix(']').unwrap_or(inner);
    Some(parse_output(inner))
}

impl LineParser {
    fn graph(&mut self, text: &str, index: usize) -> Result<()> {
        let marker = Arg::Var(format!("g{index}"));
        for part in split_top_level(text.trim(), ',')? {
            if part.trim().is_empty() {
                continue;
            }
            let relation = parse_relation(part)?;
            let raw: Vec<String> = relation.args.iter().map(|a| a.name().to_string()).collect();
            let family = relation.name.chars().next();
            let mut args = match (family, raw.as_slice()) {
                (Some('L'), [cell, w1, w2]) => {
                    vec![self.cell(cell, index), self.weight(w1)?, self.weight(w2)?]
                }
                (Some('E'), [c1, c2, w]) => {
                    vec![self.cell(c1, index), self.cell(c2, index), self.weight(w)?]
                }
                (Some('W'), [w]) => vec![self.weight(w)?],
                (Some('C'), [cell, w1, w2, k, w3]) => vec![
                    self.cell(cell, index),
                    self.weight(w1)?,
                    self.weight(w2)?,
                    self.weight(k)?,
                    self.weight(w3)?,
                ],
                _ => {
                    return Err(SearchError::CellGraph(format!(
                        "unknown relation in cell graph: {}",
                        part.trim()
                    )))
                }
            };
            args.push(marker.clone());
            self.relations.push(Relation::new(relation.name, args));
        }
        self.relations.push(Relation::new("G", vec![marker]));
        Ok(())
    }

    fn cell(&mut self, name: &str, graph: usize) -> Arg {
        Arg::Var(self.cells.get(&format!("{name}-{graph}")))
    }

    /// A scalar stays a constant; a quoted polynomial becomes a sum variable
    fn weight(&mut self, text: &str) -> Result<Arg> {
        let text = text.trim();
        let Some(expression) = text.strip_prefix('\'') else {
            return Ok(Arg::Const(text.to_string()));
        };
        if let Some(known) = self.expressions.get(text) {
            return Ok(known.clone());
        }
        let mut expression = expression
            .strip_suffix('\'')
            .ok_or_else(|| SearchError::CellGraph(format!("unterminated weight: {text}")))?;
        let sum = Arg::Var(self.sums.fresh());
        let mut terms: Vec<(Arg, bool)> = Vec::new();
        while !expression.is_empty() {
            let negative = expression.starts_with('-');
            let body_start = usize::from(negative);
            let end = expression[body_start..]
                .find(&['+', '-'][..])
                .map_or(expression.len(), |i| i + body_start);
            let term = &expression[body_start..end];
            expression = &expression[end..];
            if term.contains('x') {
                let product = Arg::Var(self.products.fresh());
                for factor in term.split('*') {
                    if factor.contains('x') {
                        let (base, exponent) = factor.split_once('^').unwrap_or((factor, "1"));
                        let weight = Arg::Var(self.weights.get(base));
                        self.relations.push(Relation::new(
                            "P",
                            vec![product.clone(), weight, Arg::Const(exponent.to_string())],
                        ));
                    } else {
                        self.relations.push(Relation::new(
                            "P",
                            vec![product.clone(), Arg::Const(factor.to_string())],
                        ));
                    }
                }
                terms.push((product, negative));
            } else {
                terms.push((Arg::Const(term.to_string()), negative));
            }
            if let Some(rest) = expression.strip_prefix('+') {
                expression = rest;
            }
        }
        for (term, negative) in terms {
            let name = if negative { "Md" } else { "M" };
            self.relations.push(Relation::new(name, vec![sum.clone(), term]));
        }
        self.expressions.insert(text.to_string(), sum.clone());
        Ok(sum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(graph: &CellGraph) -> Vec<String> {
        graph.relations().iter().map(|r| r.to_string()).collect()
    }

    #[test]
    fn test_empty_result() {
        assert!(parse_line("[]").unwrap().unwrap().is_empty());
        assert!(parse_line("computing...").is_none());
    }

    #[test]
    fn test_scalar_graph() {
        let graph = parse_line("[L(x1, 4, 1), E(x1, x2, 2), L(x2, 1, 1), W(1)]")
            .unwrap()
            .unwrap();
        assert_eq!(
            names(&graph),
            vec![
                "L(n0, 4, 1, g0)",
                "E(n0, n1, 2, g0)",
                "L(n1, 1, 1, g0)",
                "W(1, g0)",
                "G(g0)"
            ]
        );
    }

    #[test]
    fn test_cells_are_local_to_graphs() {
        let graph = parse_output("L(x1, 1, 1); L(x1, 1, 1)").unwrap();
        assert_eq!(
            names(&graph),
            vec!["L(n0, 1, 1, g0)", "G(g0)", "L(n1, 1, 1, g1)", "G(g1)"]
        );
    }

    #[test]
    fn test_symbolic_weight() {
        let graph = parse_output("W('2*x^2-3+x2'), L(c, '2*x^2-3+x2', 1)").unwrap();
        assert_eq!(
            names(&graph),
            vec![
                "P(p0, 2)",
                "P(p0, x0, 2)",
                "P(p1, x1, 1)",
                "M(m0, p0)",
                "Md(m0, 3)",
                "M(m0, p1)",
                "W(m0, g0)",
                "L(n0, m0, 1, g0)",
                "G(g0)"
            ]
        );
    }

    #[test]
    fn test_unknown_family_is_fatal() {
        assert!(matches!(
            parse_output("Q(x1, 1)"),
            Err(SearchError::CellGraph(_))
        ));
        assert!(parse_output("L(x1, 1)").is_err());
    }
}
