// Transcript manifest: `path|text` lines appended from concurrent workers.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::{HarvestError, HarvestResult};

/// Field separator between path and transcript.
pub const SEPARATOR: char = '|';

/// Stand-in for a literal separator inside transcript text.
const SEPARATOR_SUBSTITUTE: char = '｜';

/// One manifest file, opened on first append and closed once per run.
pub struct ManifestWriter {
    path: PathBuf,
    handle: Mutex<Option<BufWriter<File>>>,
}

impl ManifestWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            handle: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `<file_path>|<text>` followed by a newline.
    pub fn append(&self, file_path: &Path, text: &str) -> HarvestResult<()> {
        let line = format_line(file_path, text);
        let mut guard = self.handle.lock();

        if guard.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .map_err(|source| self.io_error(source))?;
            debug!("manifest opened at {}", self.path.display());
            *guard = Some(BufWriter::new(file));
        }

        if let Some(writer) = guard.as_mut() {
            writer
                .write_all(line.as_bytes())
                .and_then(|_| writer.flush())
                .map_err(|source| self.io_error(source))?;
        }
        Ok(())
    }

    /// Flush and release the handle. Safe to call when nothing was written.
    pub fn close(&self) -> HarvestResult<()> {
        if let Some(mut writer) = self.handle.lock().take() {
            writer.flush().map_err(|source| self.io_error(source))?;
            debug!("manifest closed at {}", self.path.display());
        }
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.handle.lock().is_some()
    }

    fn io_error(&self, source: std::io::Error) -> HarvestError {
        HarvestError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl Drop for ManifestWriter {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("manifest flush on drop failed: {}", e);
        }
    }
}

/// Build one manifest line. Line breaks are dropped and literal separators
/// in the text are substituted so each line holds exactly one field break.
pub fn format_line(file_path: &Path, text: &str) -> String {
    let text: String = text
        .chars()
        .filter(|c| *c != '\n' && *c != '\r')
        .map(|c| if c == SEPARATOR { SEPARATOR_SUBSTITUTE } else { c })
        .collect();
    format!("{}{}{}\n", file_path.display(), SEPARATOR, text)
}
