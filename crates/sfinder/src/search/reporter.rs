//! The output protocol of a search run
//!
//! Standard output carries the found sentences, one ultra-canonical form per
//! line, interleaved with `#`-prefixed comments. The optional states log
//! repeats every comment and additionally records the clause basis and each
//! layer as `ultra ; fol ; cellgraph` lines, which is what resuming reads.

use crate::error::Result;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

pub const COMMENT_PREFIX: &str = "# ";
pub const BASIS_START: &str = "basic clauses";
pub const BASIS_END: &str = "end of basic clauses";
pub const SEEDS_START: &str = "seeds follow";
pub const SEEDS_END: &str = "end of seeds";
pub const SETUP_PREFIX: &str = "starting search with setup: ";
pub const ENDED: &str = "the search has ended!";
pub const ENDED_ON_TIME_LIMIT: &str = "the search has ended because of the time limit!";
/// Separator of the fields of a states-log sentence line
pub const FIELD_DELIMITER: &str = " ; ";
/// Cell-graph field of a sentence whose graph was never computed
pub const NO_CELL_GRAPH: &str = "-";

pub struct Reporter {
    out: Box<dyn Write + Send>,
    log: Option<BufWriter<File>>,
}

impl Reporter {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Reporter { out, log: None }
    }

    pub fn stdout() -> Self {
        Reporter::new(Box::new(io::stdout()))
    }

    /// Also write a states log; `append` continues an existing one
    pub fn with_log(mut self, path: &Path, append: bool) -> Result<Self> {
        let file = if append {
            OpenOptions::new().create(true).append(true).open(path)?
        } else {
            File::create(path)?
        };
        self.log = Some(BufWriter::new(file));
        Ok(self)
    }

    pub fn has_log(&self) -> bool {
        self.log.is_some()
    }

    /// `# message` on both streams
    pub fn comment(&mut self, message: &str) -> Result<()> {
        let line = format!("{COMMENT_PREFIX}{message}\n");
        self.out.write_all(line.as_bytes())?;
        self.out.flush()?;
        self.log_raw(&line)
    }

    /// A found sentence, on standard output only
    pub fn candidate(&mut self, ultra: &str) -> Result<()> {
        writeln!(self.out, "{ultra}")?;
        Ok(())
    }

    /// A states-log line
    pub fn record(&mut self, line: &str) -> Result<()> {
        self.log_raw(&format!("{line}\n"))
    }

    pub fn seed(&mut self, fol: &str) -> Result<()> {
        self.comment(SEEDS_START)?;
        writeln!(self.out, "{fol}")?;
        self.log_raw(&format!("{fol}\n"))?;
        self.comment(SEEDS_END)
    }

    /// The clause basis as `[id] canonical`, states log only
    pub fn basis<'a>(&mut self, clauses: impl IntoIterator<Item = (u32, &'a str)>) -> Result<()> {
        if self.log.is_none() {
            return Ok(());
        }
        self.log_raw(&format!("{COMMENT_PREFIX}{BASIS_START}\n"))?;
        for (id, canonical) in clauses {
            self.log_raw(&format!("[{id}] {canonical}\n"))?;
        }
        self.log_raw(&format!("{COMMENT_PREFIX}{BASIS_END}\n"))
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        if let Some(log) = self.log.as_mut() {
            log.flush()?;
        }
        Ok(())
    }

    fn log_raw(&mut self, text: &str) -> Result<()> {
        if let Some(log) = self.log.as_mut() {
            log.write_all(text.as_bytes())?;
            if text.starts_with(COMMENT_PREFIX) {
                log.flush()?;
            }
        }
        Ok(())
    }
}

/// An in-memory sink that can be read back while the reporter holds a clone
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        match self.inner.lock() {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(poisoned) => String::from_utf8_lossy(&poisoned.into_inner()).into_owned(),
        }
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut bytes = self
            .inner
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "buffer poisoned"))?;
        bytes.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_streams() {
        let buffer = SharedBuffer::new();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("states.log");
        let mut reporter = Reporter::new(Box::new(buffer.clone()))
            .with_log(&path, false)
            .unwrap();
        reporter.comment("hello").unwrap();
        reporter.candidate("(V x U0(x))").unwrap();
        reporter.basis([(3, "(V x U0(x))")]).unwrap();
        reporter.record("(V x U0(x)) ; (V x U0(x)) ; -").unwrap();
        reporter.flush().unwrap();

        assert_eq!(buffer.contents(), "# hello\n(V x U0(x))\n");
        let log = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            log,
            "# hello\n# basic clauses\n[3] (V x U0(x))\n# end of basic clauses\n(V x U0(x)) ; (V x U0(x)) ; -\n"
        );
    }

    #[test]
    fn test_append_keeps_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("states.log");
        std::fs::write(&path, "# first\n").unwrap();
        let mut reporter = Reporter::new(Box::new(io::sink())).with_log(&path, true).unwrap();
        reporter.comment("second").unwrap();
        reporter.flush().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# first\n# second\n");
    }
}
