//! Symbol interning shared by every thread of a search run
//!
//! Predicate and constant names are interned into `u32` IDs so that literals
//! compare and hash by value without touching strings. Both arenas are
//! append-only and safe for concurrent get-or-create: cell-graph parsing
//! interns weight constants from worker threads while the search reads
//! predicate names.

use dashmap::{DashMap, DashSet};
use rustc_hash::FxHasher;
use std::fmt;
use std::hash::BuildHasherDefault;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

pub(crate) type FxBuildHasher = BuildHasherDefault<FxHasher>;
pub(crate) type FxDashMap<K, V> = DashMap<K, V, FxBuildHasher>;
pub(crate) type FxDashSet<K> = DashSet<K, FxBuildHasher>;

/// ID for an interned constant name
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConstantId(pub(crate) u32);

/// ID for an interned predicate name
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PredicateId(pub(crate) u32);

impl ConstantId {
    /// Get the raw ID value
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl PredicateId {
    /// Get the raw ID value
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

/// Concurrent string arena for a single symbol kind
#[derive(Debug, Default)]
struct StringArena {
    lookup: FxDashMap<Arc<str>, u32>,
    strings: FxDashMap<u32, Arc<str>>,
    next: AtomicU32,
}

impl StringArena {
    /// Intern a string, returning its ID (get-or-create)
    fn intern(&self, name: &str) -> u32 {
        if let Some(id) = self.lookup.get(name) {
            return *id;
        }
        *self.lookup.entry(Arc::from(name)).or_insert_with(|| {
            let id = self.next.fetch_add(1, Ordering::Relaxed);
            self.strings.insert(id, Arc::from(name));
            id
        })
    }

    /// Resolve an ID to its string
    fn resolve(&self, id: u32) -> Arc<str> {
        match self.strings.get(&id) {
            Some(name) => Arc::clone(name.value()),
            None => unreachable!("symbol {id} was never interned"),
        }
    }

    fn get(&self, name: &str) -> Option<u32> {
        self.lookup.get(name).map(|id| *id)
    }

    fn len(&self) -> usize {
        self.strings.len()
    }
}

/// Symbol interner for predicates and constants
///
/// One interner is scoped to one search run and passed by reference (behind
/// an `Arc`) into the literal store; there is no process-wide state.
#[derive(Debug, Default)]
pub struct Interner {
    constants: StringArena,
    predicates: StringArena,
}

impl Interner {
    /// Create a new empty interner
    pub fn new() -> Self {
        Interner::default()
    }

    /// Intern a constant name, returning its ID (get-or-create)
    pub fn intern_constant(&self, name: &str) -> ConstantId {
        ConstantId(self.constants.intern(name))
    }

    /// Resolve a constant ID to its name
    pub fn resolve_constant(&self, id: ConstantId) -> Arc<str> {
        self.constants.resolve(id.0)
    }

    /// Number of interned constants
    pub fn constant_count(&self) -> usize {
        self.constants.len()
    }

    /// Intern a predicate name, returning its ID (get-or-create)
    pub fn intern_predicate(&self, name: &str) -> PredicateId {
        PredicateId(self.predicates.intern(name))
    }

    /// Resolve a predicate ID to its name
    pub fn resolve_predicate(&self, id: PredicateId) -> Arc<str> {
        self.predicates.resolve(id.0)
    }

    /// Get the ID for an already-interned predicate
    pub fn get_predicate(&self, name: &str) -> Option<PredicateId> {
        self.predicates.get(name).map(PredicateId)
    }

    /// Number of interned predicates
    pub fn predicate_count(&self) -> usize {
        self.predicates.len()
    }
}

impl fmt::Display for ConstantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

impl fmt::Display for PredicateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;

    #[test]
    fn test_intern_and_resolve() {
        let interner = Interner::new();
        let u0 = interner.intern_predicate("U0");
        let b0 = interner.intern_predicate("B0");
        assert_ne!(u0, b0);
        assert_eq!(interner.intern_predicate("U0"), u0);
        assert_eq!(&*interner.resolve_predicate(b0), "B0");
        assert_eq!(interner.get_predicate("U1"), None);
        assert_eq!(interner.predicate_count(), 2);
    }

    #[test]
    fn test_constants_are_separate_from_predicates() {
        let interner = Interner::new();
        let p = interner.intern_predicate("a");
        let c = interner.intern_constant("a");
        assert_eq!(p.as_u32(), c.as_u32());
        assert_eq!(&*interner.resolve_constant(c), "a");
        assert_eq!(interner.constant_count(), 1);
    }

    #[test]
    fn test_concurrent_interning_is_idempotent() {
        let interner = Interner::new();
        let ids: Vec<ConstantId> = (0..1000)
            .into_par_iter()
            .map(|i| interner.intern_constant(&format!("w{}", i % 17)))
            .collect();
        assert_eq!(interner.constant_count(), 17);
        for (i, id) in ids.iter().enumerate() {
            assert_eq!(&*interner.resolve_constant(*id), format!("w{}", i % 17));
        }
    }
}
