//! The layered search, its output protocol and resuming from a states log

pub mod engine;
pub mod reporter;
pub mod resume;

pub use engine::{SearchEngine, SearchEngineBuilder, SearchStatus, SearchSummary};
pub use reporter::{Reporter, SharedBuffer};
pub use resume::{LoggedSentence, StatesLog};
