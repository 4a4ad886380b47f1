//! Clause basis generation and the filters of the sentence search

pub mod clauses;
pub mod filters;
pub mod reducibility;
pub mod subsumption;

pub use clauses::{
    ClauseBasis, ClauseFilter, ClauseGeneration, ClauseGenerator, MaxLiteralsFilter,
    MaxLiteralsPerCountingClauseFilter, NaiveTautologyFilter, TautologyFilter,
};
pub use filters::{
    joinable, ConnectedComponentsFilter, ContradictionFilter, DisjunctiveClausesFilter,
    JoiningFilter, LanguageBiasFilter, MaxClausesFilter, MaxCountingClausesFilter,
    MaxOverallLiteralsFilter, ReflexiveAtomsFilter, SentenceFilter, TrivialConstraintsFilter,
};
pub use reducibility::{is_redundant, ForbiddenTuples, TupleFilter, TwoFormulaeFilter};
pub use subsumption::{is_reducible, ThetaSubsumptionFilter};
