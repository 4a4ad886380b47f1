//! Cell graphs seen so far, bucketed by isomorphism invariant or keyed by
//! canonical form

use super::canonical::canonical_form;
use super::CellGraph;
use crate::fol::Interner;
use crate::matching::{Matcher, Structure};
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;

/// How the cell graphs of one layer relate to each other and to the
/// graphs of earlier layers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    /// Sentences whose graphs are new, grouped by isomorphic graph
    pub groups: Vec<Vec<usize>>,
    /// Sentences whose graph is empty or already registered
    pub hidden: Vec<usize>,
}

pub struct CellGraphRegistry {
    interner: Arc<Interner>,
    matcher: Arc<dyn Matcher>,
    buckets: FxHashMap<u64, Vec<Structure>>,
    /// Set when graphs are compared by canonical form
    canonical: Option<FxHashSet<String>>,
    len: usize,
}

impl CellGraphRegistry {
    pub fn new(interner: Arc<Interner>, matcher: Arc<dyn Matcher>) -> Self {
        CellGraphRegistry {
            interner,
            matcher,
            buckets: FxHashMap::default(),
            canonical: None,
            len: 0,
        }
    }

    /// Compare graphs by their canonical forms rather than by pairwise
    /// isomorphism tests within invariant buckets
    pub fn with_canonical_forms(mut self) -> Self {
        self.canonical = Some(FxHashSet::default());
        self
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Register a graph unless an isomorphic one is known; empty graphs are
    /// never registered. Returns whether the graph was added.
    pub fn incorporate(&mut self, graph: &CellGraph) -> bool {
        if graph.is_empty() {
            return false;
        }
        if let Some(known) = &mut self.canonical {
            let added = known.insert(canonical_form(graph));
            self.len += usize::from(added);
            return added;
        }
        let structure = graph.to_structure(&self.interner);
        let invariant = structure.invariant();
        if self.find(invariant, &structure) {
            return false;
        }
        self.buckets.entry(invariant).or_default().push(structure);
        self.len += 1;
        true
    }

    /// Whether an isomorphic graph is registered
    pub fn contains(&self, graph: &CellGraph) -> bool {
        if let Some(known) = &self.canonical {
            return !graph.is_empty() && known.contains(&canonical_form(graph));
        }
        let structure = graph.to_structure(&self.interner);
        self.find(structure.invariant(), &structure)
    }

    fn find(&self, invariant: u64, structure: &Structure) -> bool {
        self.buckets.get(&invariant).is_some_and(|bucket| {
            bucket
                .iter()
                .any(|known| self.matcher.isomorphic(known, structure))
        })
    }

    /// Split the graphs of a layer, then register the new ones
    ///
    /// A graph isomorphic to one registered before the call hides its
    /// sentence. Graphs new to the registry are grouped with the isomorphic
    /// graphs of the same call, in input order.
    pub fn partition(&mut self, graphs: &[(usize, &CellGraph)]) -> Partition {
        if self.canonical.is_some() {
            return self.partition_canonical(graphs);
        }
        let lowered: Vec<(usize, Option<(u64, Structure)>)> = graphs
            .par_iter()
            .map(|(index, graph)| {
                if graph.is_empty() {
                    return (*index, None);
                }
                let structure = graph.to_structure(&self.interner);
                (*index, Some((structure.invariant(), structure)))
            })
            .collect();

        let mut partition = Partition::default();
        let mut fresh: FxHashMap<u64, Vec<(Structure, usize)>> = FxHashMap::default();
        for (index, lowered) in lowered {
            let Some((invariant, structure)) = lowered else {
                partition.hidden.push(index);
                continue;
            };
            if self.find(invariant, &structure) {
                partition.hidden.push(index);
                continue;
            }
            let bucket = fresh.entry(invariant).or_default();
            match bucket
                .iter()
                .find(|(known, _)| self.matcher.isomorphic(known, &structure))
            {
                Some((_, group)) => partition.groups[*group].push(index),
                None => {
                    bucket.push((structure, partition.groups.len()));
                    partition.groups.push(vec![index]);
                }
            }
        }

        for (invariant, structures) in fresh {
            self.len += structures.len();
            self.buckets
                .entry(invariant)
                .or_default()
                .extend(structures.into_iter().map(|(structure, _)| structure));
        }
        partition
    }

    fn partition_canonical(&mut self, graphs: &[(usize, &CellGraph)]) -> Partition {
        let forms: Vec<(usize, Option<String>)> = graphs
            .par_iter()
            .map(|(index, graph)| (*index, (!graph.is_empty()).then(|| canonical_form(graph))))
            .collect();
        let mut partition = Partition::default();
        let Some(known) = &mut self.canonical else {
            return partition;
        };
        let mut fresh: FxHashMap<String, usize> = FxHashMap::default();
        for (index, form) in forms {
            let Some(form) = form else {
                partition.hidden.push(index);
                continue;
            };
            if known.contains(&form) {
                partition.hidden.push(index);
                continue;
            }
            match fresh.get(&form) {
                Some(group) => partition.groups[*group].push(index),
                None => {
                    fresh.insert(form, partition.groups.len());
                    partition.groups.push(vec![index]);
                }
            }
        }
        self.len += fresh.len();
        known.extend(fresh.into_keys());
        partition
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::Matching;

    fn registry() -> CellGraphRegistry {
        CellGraphRegistry::new(Arc::new(Interner::new()), Arc::new(Matching::new()))
    }

    fn graph(text: &str) -> CellGraph {
        CellGraph::parse(text).unwrap()
    }

    #[test]
    fn test_incorporate_up_to_isomorphism() {
        let mut registry = registry();
        assert!(registry.incorporate(&graph("L(n0, 1, 2, g0), G(g0)")));
        assert!(!registry.incorporate(&graph("L(n5, 1, 2, g3), G(g3)")));
        assert!(registry.incorporate(&graph("L(n0, 2, 2, g0), G(g0)")));
        assert!(!registry.incorporate(&CellGraph::default()));
        assert_eq!(registry.len(), 2);
        assert!(registry.contains(&graph("L(n1, 2, 2, g1), G(g1)")));
    }

    #[test]
    fn test_partition() {
        let mut registry = registry();
        registry.incorporate(&graph("W(1, g0), G(g0)"));

        let earlier = graph("W(1, g0), G(g0)");
        let a = graph("L(n0, 3, 1, g0), G(g0)");
        let b = graph("W(2, g0), G(g0)");
        let a_again = graph("L(n4, 3, 1, g0), G(g0)");
        let empty = CellGraph::default();
        let partition = registry.partition(&[(0, &earlier), (1, &a), (2, &b), (3, &a_again), (4, &empty)]);

        assert_eq!(partition.hidden, vec![0, 4]);
        assert_eq!(partition.groups, vec![vec![1, 3], vec![2]]);
        assert_eq!(registry.len(), 3);

        let next = registry.partition(&[(0, &a_again)]);
        assert_eq!(next.hidden, vec![0]);
        assert!(next.groups.is_empty());
    }

    #[test]
    fn test_canonical_forms_partition_like_isomorphism() {
        let layer = [
            graph("W(1, g0), G(g0)"),
            graph("L(n0, 3, 1, g0), E(n0, n1, 2, g0), L(n1, 4, 1, g0), G(g0)"),
            graph("W(2, g0), G(g0)"),
            graph("L(n5, 4, 1, g2), E(n7, n5, 2, g2), L(n7, 3, 1, g2), G(g2)"),
            CellGraph::default(),
        ];
        let indexed: Vec<(usize, &CellGraph)> = layer.iter().enumerate().collect();

        let mut isomorphic = registry();
        isomorphic.incorporate(&graph("W(1, g5), G(g5)"));
        let mut canonical = registry().with_canonical_forms();
        assert!(canonical.incorporate(&graph("W(1, g5), G(g5)")));
        assert!(!canonical.incorporate(&graph("W(1, g0), G(g0)")));

        let expected = isomorphic.partition(&indexed);
        assert_eq!(expected.hidden, vec![0, 4]);
        assert_eq!(expected.groups, vec![vec![1, 3], vec![2]]);
        assert_eq!(canonical.partition(&indexed), expected);
        assert_eq!(canonical.len(), isomorphic.len());
        assert!(canonical.contains(&graph("W(2, g9), G(g9)")));
        assert!(!canonical.contains(&CellGraph::default()));
    }
}
