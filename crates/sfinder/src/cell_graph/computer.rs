//! The WFOMC tool boundary

use super::parser::parse_line;
use super::CellGraph;
use crate::error::{Result, SearchError};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, warn};

/// Computes the cell graphs of a batch of sentences
///
/// The result has one graph per input, in input order. An empty graph
/// means the tool rejected the sentence.
pub trait CellGraphComputer: Send + Sync {
    fn name(&self) -> &str;

    fn compute(&self, sentences: &[String]) -> Result<Vec<CellGraph>>;
}

/// FastWFOMC run through `julia --threads T <script> <file> <time limit>`
#[derive(Debug, Clone)]
pub struct JuliaComputer {
    julia: PathBuf,
    script: PathBuf,
    threads: usize,
    time_limit: u64,
}

impl JuliaComputer {
    pub fn new(script: impl Into<PathBuf>, threads: usize, time_limit: u64) -> Self {
        JuliaComputer {
            julia: PathBuf::from("julia"),
            script: script.into(),
            threads,
            time_limit,
        }
    }

    /// Use a specific julia executable instead of the one on `PATH`
    pub fn with_julia(mut self, julia: impl Into<PathBuf>) -> Self {
        self.julia = julia.into();
        self
    }

    pub fn script(&self) -> &Path {
        &self.script
    }

    fn run(&self, sentences: &[String]) -> Result<Vec<CellGraph>> {
        let mut file = tempfile::Builder::new()
            .prefix("sentences")
            .suffix(".in")
            .tempfile()?;
        file.write_all(sentences.join("\n").as_bytes())?;
        file.write_all(b"\n")?;
        file.flush()?;

        let output = Command::new(&self.julia)
            .arg("--threads")
            .arg(self.threads.to_string())
            .arg(&self.script)
            .arg(file.path())
            .arg(self.time_limit.to_string())
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                SearchError::CellGraph(format!("failed to run {}: {}", self.julia.display(), e))
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut graphs = Vec::with_capacity(sentences.len());
        for line in stdout.lines() {
            match parse_line(line) {
                Some(graph) => graphs.push(graph?),
                None if line.trim().is_empty() => {}
                None => warn!(line, parsed = graphs.len(), "unparseable line from the cell graph tool"),
            }
        }
        if graphs.len() != sentences.len() {
            debug!(
                stderr = %String::from_utf8_lossy(&output.stderr),
                status = ?output.status.code(),
                "cell graph tool output incomplete"
            );
            return Err(SearchError::CellGraphBatch {
                expected: sentences.len(),
                received: graphs.len(),
            });
        }
        Ok(graphs)
    }
}

impl CellGraphComputer for JuliaComputer {
    fn name(&self) -> &str {
        "julia"
    }

    fn compute(&self, sentences: &[String]) -> Result<Vec<CellGraph>> {
        if sentences.is_empty() {
            return Ok(Vec::new());
        }
        debug!(count = sentences.len(), script = %self.script.display(), "computing cell graphs");
        // off the rayon pool, like the prover
        std::thread::scope(|scope| scope.spawn(|| self.run(sentences)).join())
            .map_err(|_| SearchError::CellGraph("cell graph thread panicked".to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_batch_skips_the_tool() {
        let computer = JuliaComputer::new("/nonexistent/script.jl", 1, 10)
            .with_julia("/definitely/not/julia");
        assert!(computer.compute(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_missing_tool_is_an_error() {
        let computer = JuliaComputer::new("/nonexistent/script.jl", 1, 10)
            .with_julia("/definitely/not/julia");
        let result = computer.compute(&["(V x U0(x))".to_string()]);
        assert!(matches!(result, Err(SearchError::CellGraph(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_batch_mismatch_is_fatal() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let tool = dir.path().join("fake-julia");
        std::fs::write(&tool, "#!/bin/sh\necho 'warming up'\necho '[W(1)]'\n").unwrap();
        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();
        let computer = JuliaComputer::new("script.jl", 1, 10).with_julia(&tool);

        let one = computer.compute(&["(V x U0(x))".to_string()]).unwrap();
        assert_eq!(one[0].to_string(), "W(1, g0), G(g0)");

        let two = computer.compute(&["(V x U0(x))".to_string(), "(E x U0(x))".to_string()]);
        assert!(matches!(
            two,
            Err(SearchError::CellGraphBatch {
                expected: 2,
                received: 1
            })
        ));
    }
}
