use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::core::record::DocumentData;
use crate::core::settings::RecognitionSettings;

/// Per-target diagnostics, one block per ladder pass.
#[derive(Debug, Clone)]
pub struct DebugTrace {
    id: String,
    body: String,
}

impl DebugTrace {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            body: String::new(),
        }
    }

    pub fn record_pass(
        &mut self,
        iteration: usize,
        completeness: u8,
        settings: &RecognitionSettings,
        data: &DocumentData,
        extractor_debug: &str,
    ) {
        let _ = writeln!(self.body, "iteration: {iteration}\tcompleteness: {completeness}");
        let _ = writeln!(self.body, "{settings}");
        let _ = writeln!(self.body, "{data:#}");
        if !extractor_debug.is_empty() {
            self.body.push_str(extractor_debug);
            if !extractor_debug.ends_with('\n') {
                self.body.push('\n');
            }
        }
        self.body.push('\n');
    }

    pub fn note(&mut self, line: &str) {
        let _ = writeln!(self.body, "{line}");
    }

    pub fn contents(&self) -> &str {
        &self.body
    }

    /// Writes `<dir>/<id>.txt`, replacing any earlier trace for the id.
    pub fn write_to(&self, dir: &Path) -> io::Result<PathBuf> {
        let path = dir.join(format!("{}.txt", self.id));
        fs::write(&path, &self.body)?;
        Ok(path)
    }
}
