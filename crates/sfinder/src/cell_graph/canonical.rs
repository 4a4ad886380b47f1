//! Canonical forms of cell graphs
//!
//! Two cell graphs are isomorphic exactly when their canonical forms are
//! equal strings, which turns the registry lookup into a set lookup. The
//! form is found by colour refinement of the graph variables followed by
//! individualization of the smallest ambiguous colour class; every leaf of
//! that search names each variable by its colour, and the smallest printed
//! leaf is the canonical form.

use super::{Arg, CellGraph};
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Slot<'a> {
    Const(&'a str),
    Var(usize),
}

struct Indexed<'a> {
    relations: Vec<(&'a str, Vec<Slot<'a>>)>,
    /// Relations and argument positions of every variable
    occurrences: Vec<Vec<(usize, usize)>>,
}

impl<'a> Indexed<'a> {
    fn new(graph: &'a CellGraph) -> Self {
        let mut variables: FxHashMap<&str, usize> = FxHashMap::default();
        let mut occurrences: Vec<Vec<(usize, usize)>> = Vec::new();
        let relations = graph
            .relations()
            .iter()
            .enumerate()
            .map(|(r, relation)| {
                let slots = relation
                    .args
                    .iter()
                    .enumerate()
                    .map(|(position, arg)| match arg {
                        Arg::Const(name) => Slot::Const(name),
                        Arg::Var(name) => {
                            let next = variables.len();
                            let v = *variables.entry(name.as_str()).or_insert(next);
                            if v == occurrences.len() {
                                occurrences.push(Vec::new());
                            }
                            occurrences[v].push((r, position));
                            Slot::Var(v)
                        }
                    })
                    .collect();
                (relation.name.as_str(), slots)
            })
            .collect();
        Indexed {
            relations,
            occurrences,
        }
    }

    /// Split colour classes until no variable can tell its class members
    /// apart; colours stay dense and keep their relative order
    fn refine(&self, mut colors: Vec<usize>) -> Vec<usize> {
        let mut classes = count_classes(&colors);
        loop {
            let signatures: Vec<(usize, Vec<(&str, usize, Vec<Slot<'_>>)>)> = self
                .occurrences
                .iter()
                .enumerate()
                .map(|(v, occurrences)| {
                    let mut signature: Vec<(&str, usize, Vec<Slot<'_>>)> = occurrences
                        .iter()
                        .map(|(r, position)| {
                            let (name, slots) = &self.relations[*r];
                            let colored = slots
                                .iter()
                                .map(|slot| match slot {
                                    Slot::Var(u) => Slot::Var(colors[*u]),
                                    other => *other,
                                })
                                .collect();
                            (*name, *position, colored)
                        })
                        .collect();
                    signature.sort();
                    (colors[v], signature)
                })
                .collect();
            let mut ranked: Vec<&(usize, Vec<(&str, usize, Vec<Slot<'_>>)>)> =
                signatures.iter().collect();
            ranked.sort();
            ranked.dedup();
            colors = signatures
                .iter()
                .map(|signature| ranked.partition_point(|known| *known < signature))
                .collect();
            let refined = count_classes(&colors);
            if refined == classes {
                return colors;
            }
            classes = refined;
        }
    }

    fn render(&self, colors: &[usize]) -> String {
        let mut printed: Vec<String> = self
            .relations
            .iter()
            .map(|(name, slots)| {
                let args: Vec<String> = slots
                    .iter()
                    .map(|slot| match slot {
                        Slot::Const(name) => name.to_string(),
                        Slot::Var(v) => format!("v{}", colors[*v]),
                    })
                    .collect();
                format!("{}({})", name, args.join(", "))
            })
            .collect();
        printed.sort();
        printed.join(", ")
    }

    fn search(&self, colors: Vec<usize>, best: &mut Option<String>) {
        let colors = self.refine(colors);
        let mut sizes = vec![0usize; colors.len()];
        for color in &colors {
            sizes[*color] += 1;
        }
        let Some(target) = sizes.iter().position(|size| *size > 1) else {
            let leaf = self.render(&colors);
            if best.as_ref().map_or(true, |known| leaf < *known) {
                *best = Some(leaf);
            }
            return;
        };
        for chosen in (0..colors.len()).filter(|v| colors[*v] == target) {
            let individualized = colors
                .iter()
                .enumerate()
                .map(|(v, color)| 2 * color + usize::from(*color == target && v != chosen))
                .collect();
            self.search(individualized, best);
        }
    }
}

fn count_classes(colors: &[usize]) -> usize {
    let mut seen = colors.to_vec();
    seen.sort_unstable();
    seen.dedup();
    seen.len()
}

/// The canonical form of a cell graph; the empty graph maps to the empty
/// string
pub fn canonical_form(graph: &CellGraph) -> String {
    let indexed = Indexed::new(graph);
    let mut best = None;
    indexed.search(vec![0; indexed.occurrences.len()], &mut best);
    best.unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(text: &str) -> String {
        canonical_form(&CellGraph::parse(text).unwrap())
    }

    #[test]
    fn test_renaming_and_order_do_not_matter() {
        let a = form("L(n0, 1, 2, g0), L(n1, 3, 2, g0), E(n0, n1, 5, g0), G(g0)");
        let b = form("G(g1), E(n2, n7, 5, g1), L(n7, 3, 2, g1), L(n2, 1, 2, g1)");
        assert_eq!(a, b);
        let c = form("L(n0, 1, 2, g0), L(n1, 3, 2, g0), E(n1, n0, 5, g0), G(g0)");
        assert_ne!(a, c);
    }

    #[test]
    fn test_symmetric_graphs() {
        // a directed 4-cycle read from two different starting nodes
        let a = form("E(a, b, 1), E(b, c, 1), E(c, d, 1), E(d, a, 1)");
        let b = form("E(c, d, 1), E(d, a, 1), E(b, c, 1), E(a, b, 1)");
        let c = form("E(p, q, 1), E(q, r, 1), E(r, s, 1), E(s, p, 1)");
        assert_eq!(a, b);
        assert_eq!(a, c);
        // two 2-cycles have the same colour refinement as one 4-cycle
        let d = form("E(a, b, 1), E(b, a, 1), E(c, d, 1), E(d, c, 1)");
        assert_ne!(a, d);
    }

    #[test]
    fn test_constants_are_kept() {
        assert_ne!(form("W(1, g0), G(g0)"), form("W(2, g0), G(g0)"));
        assert_eq!(form("W(1)"), "W(1)");
        assert_eq!(form(""), "");
    }
}
