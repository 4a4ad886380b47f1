//! Reading a states log back in

use super::reporter::{
    BASIS_END, BASIS_START, COMMENT_PREFIX, ENDED, ENDED_ON_TIME_LIMIT, FIELD_DELIMITER,
    NO_CELL_GRAPH, SEEDS_END, SEEDS_START, SETUP_PREFIX,
};
use crate::error::{Result, SearchError};
use std::path::Path;

/// One `ultra ; fol ; cellgraph` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggedSentence {
    pub sentence: String,
    /// Printed cell graph, `None` when the log holds none
    pub cell_graph: Option<String>,
}

/// The content of a states log that resuming needs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatesLog {
    /// JSON of the last recorded setup
    pub setup: Option<String>,
    pub seed: Option<String>,
    /// `(id, canonical)` of the last recorded clause basis
    pub basis: Vec<(u32, String)>,
    pub sentences: Vec<LoggedSentence>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    Layers,
    Basis,
    Seeds,
}

impl StatesLog {
    pub fn read(path: &Path) -> Result<Self> {
        Self::parse(&std::fs::read_to_string(path)?)
    }

    /// Parse a complete log
    ///
    /// A log is resumable only when the search did not end and the last
    /// line is a comment, i.e. no layer was cut off while being written.
    pub fn parse(text: &str) -> Result<Self> {
        let mut log = StatesLog::default();
        let mut section = Section::Layers;
        let mut last_is_comment = false;
        for line in text.lines() {
            let line = line.trim_end();
            if line.is_empty() {
                continue;
            }
            if let Some(comment) = line.strip_prefix(COMMENT_PREFIX.trim_end()) {
                last_is_comment = true;
                let comment = comment.trim();
                if comment == ENDED || comment == ENDED_ON_TIME_LIMIT {
                    return Err(SearchError::Resume("the logged search has already ended".to_string()));
                }
                match comment {
                    BASIS_START => {
                        log.basis.clear();
                        section = Section::Basis;
                    }
                    SEEDS_START => {
                        log.seed = None;
                        section = Section::Seeds;
                    }
                    BASIS_END | SEEDS_END => section = Section::Layers,
                    _ => {
                        if let Some(setup) = comment.strip_prefix(SETUP_PREFIX) {
                            log.setup = Some(setup.to_string());
                        }
                    }
                }
                continue;
            }
            last_is_comment = false;
            match section {
                Section::Basis => log.basis.push(parse_basis_line(line)?),
                Section::Seeds => log.seed = Some(line.trim().to_string()),
                Section::Layers => log.sentences.push(parse_sentence_line(line)),
            }
        }
        if !text.trim().is_empty() && !last_is_comment {
            return Err(SearchError::Resume(
                "the log ends in the middle of a layer".to_string(),
            ));
        }
        Ok(log)
    }
}

fn parse_basis_line(line: &str) -> Result<(u32, String)> {
    let malformed = || SearchError::Resume(format!("malformed basis clause line: {line}"));
    let rest = line.trim().strip_prefix('[').ok_or_else(malformed)?;
    let (id, canonical) = rest.split_once(']').ok_or_else(malformed)?;
    let id = id.trim().parse().map_err(|_| malformed())?;
    Ok((id, canonical.trim().to_string()))
}

/// The sentence is the first field, the cell graph the last
fn parse_sentence_line(line: &str) -> LoggedSentence {
    let fields: Vec<&str> = line.split(FIELD_DELIMITER.trim()).map(str::trim).collect();
    let sentence = fields.first().copied().unwrap_or_default().to_string();
    let cell_graph = match fields.as_slice() {
        [_, .., last] if !last.is_empty() && *last != NO_CELL_GRAPH => Some(last.to_string()),
        _ => None,
    };
    LoggedSentence {
        sentence,
        cell_graph,
    }
}
