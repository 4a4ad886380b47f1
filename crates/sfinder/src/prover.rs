//! Provability checks through an external first-order prover
//!
//! The search asks two questions of a prover: is a clause a tautology (its
//! negation is refutable) and is a sentence a contradiction. Both reduce to
//! "is this set of formulas refutable", answered by [`Prover::is_provable`].
//! [`Prover9`] runs the Prover9 binary on a temporary input file; a timeout
//! inside Prover9 counts as "not provable".

use crate::error::{Result, SearchError};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, warn};

/// A refutation oracle over Prover9-syntax formulas
pub trait Prover: Send + Sync {
    fn name(&self) -> &str;

    /// Whether the formulas (each terminated by `.`, one per line) are
    /// refutable
    fn is_provable(&self, formulas: &str) -> Result<bool>;
}

/// Stand-in used when no prover is configured: nothing is provable, so the
/// prover-backed filters accept everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProver;

impl Prover for NoProver {
    fn name(&self) -> &str {
        "none"
    }

    fn is_provable(&self, _formulas: &str) -> Result<bool> {
        Ok(false)
    }
}

const FATAL_ERROR: i32 = 1;
const SIGINT: i32 = 101;
const SIGSEGV: i32 = 102;

/// The Prover9 binary invoked as `prover9 -f <file>`
#[derive(Debug, Clone)]
pub struct Prover9 {
    path: PathBuf,
    max_seconds: u64,
}

impl Prover9 {
    pub fn new(path: impl Into<PathBuf>, max_seconds: u64) -> Self {
        Prover9 {
            path: path.into(),
            max_seconds,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Complete Prover9 input for a set of formulas
    pub fn input(&self, formulas: &str) -> String {
        let mut input = format!(
            "set(quiet).\nassign(max_seconds, {}).\nassign(max_proofs, 0).\nformulas(sos).\n",
            self.max_seconds
        );
        input.push_str(formulas);
        if !formulas.is_empty() && !formulas.ends_with('\n') {
            input.push('\n');
        }
        input.push_str("end_of_list.\n");
        input
    }

    fn run(&self, formulas: &str) -> Result<bool> {
        let mut file = tempfile::Builder::new()
            .prefix("problem")
            .suffix(".in")
            .tempfile()?;
        file.write_all(self.input(formulas).as_bytes())?;
        file.flush()?;

        let output = Command::new(&self.path)
            .arg("-f")
            .arg(file.path())
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                SearchError::Prover(format!("failed to run {}: {}", self.path.display(), e))
            })?;
        // exit 1 is a fatal input error, 101/102 and no code mean a signal;
        // the remaining codes report an exhausted search, e.g. 4 for max_seconds
        let code = output.status.code();
        if matches!(code, None | Some(FATAL_ERROR) | Some(SIGINT) | Some(SIGSEGV)) {
            return Err(SearchError::Prover(format!(
                "{} failed with {}: {}",
                self.path.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let proved = stdout.lines().any(|line| line.contains("THEOREM PROVED"));
        debug!(proved, status = ?output.status.code(), "prover9 finished");
        Ok(proved)
    }
}

impl Prover for Prover9 {
    fn name(&self) -> &str {
        "prover9"
    }

    /// Runs on a dedicated thread, outside the rayon pool
    fn is_provable(&self, formulas: &str) -> Result<bool> {
        let prover = self.clone();
        let formulas = formulas.to_string();
        std::thread::spawn(move || prover.run(&formulas))
            .join()
            .map_err(|_| SearchError::Prover("prover thread panicked".to_string()))?
    }
}

/// Prover9 when `path` points at an existing file, [`NoProver`] otherwise
pub fn from_path(path: Option<&Path>, max_seconds: u64) -> Box<dyn Prover> {
    match path {
        Some(path) if path.is_file() => Box::new(Prover9::new(path, max_seconds)),
        Some(path) => {
            warn!(path = %path.display(), "prover9 not found, prover filters are disabled");
            Box::new(NoProver)
        }
        None => Box::new(NoProver),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_layout() {
        let prover = Prover9::new("/usr/bin/prover9", 30);
        let input = prover.input("all x (U0(x)).\n");
        assert_eq!(
            input,
            "set(quiet).\nassign(max_seconds, 30).\nassign(max_proofs, 0).\nformulas(sos).\nall x (U0(x)).\nend_of_list.\n"
        );
    }

    #[test]
    fn test_input_adds_trailing_newline() {
        let prover = Prover9::new("prover9", 5);
        assert!(prover.input("-(all x (U0(x))).").ends_with("-(all x (U0(x))).\nend_of_list.\n"));
    }

    #[test]
    fn test_no_prover_proves_nothing() {
        assert!(!NoProver.is_provable("all x (U0(x)).\n").unwrap());
    }

    #[test]
    fn test_missing_binary_disables_prover() {
        let prover = from_path(Some(Path::new("/definitely/not/a/prover9")), 1);
        assert_eq!(prover.name(), "none");
    }

    #[cfg(unix)]
    fn fake_prover(dir: &Path, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let tool = dir.join(name);
        std::fs::write(&tool, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();
        tool
    }

    #[cfg(unix)]
    #[test]
    fn test_fatal_exit_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let tool = fake_prover(dir.path(), "fatal", "echo '%%ERROR: syntax error' >&2\nexit 1");
        let result = Prover9::new(tool, 5).is_provable("all x (U0(x)).\n");
        match result {
            Err(SearchError::Prover(message)) => assert!(message.contains("syntax error")),
            other => panic!("expected a prover error, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_killed_prover_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let tool = fake_prover(dir.path(), "killed", "kill -9 $$");
        assert!(matches!(
            Prover9::new(tool, 5).is_provable("all x (U0(x)).\n"),
            Err(SearchError::Prover(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_exhausted_search_is_not_provable() {
        let dir = tempfile::tempdir().unwrap();
        let timeout = fake_prover(dir.path(), "timeout", "echo 'SEARCH FAILED'\nexit 4");
        assert!(!Prover9::new(timeout, 5).is_provable("all x (U0(x)).\n").unwrap());
        let proved = fake_prover(dir.path(), "proved", "echo 'THEOREM PROVED'\nexit 0");
        assert!(Prover9::new(proved, 5).is_provable("all x (U0(x)).\n").unwrap());
    }

    #[test]
    fn test_spawn_failure_is_an_error() {
        let prover = Prover9::new("/definitely/not/a/prover9", 1);
        assert!(matches!(
            prover.is_provable("all x (U0(x)).\n"),
            Err(SearchError::Prover(_))
        ));
    }
}
