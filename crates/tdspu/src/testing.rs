//! Test doubles shared by unit and integration tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::reader::{ArrayReader, ReadError, TIME, TimeCoordinate};

/// An [`ArrayReader`] answering from a table instead of real files.
///
/// Paths that were never registered are unreadable. Every call is counted
/// so tests can check that fixed-field files are never opened.
#[derive(Debug, Default)]
pub struct MemoryReader {
    entries: HashMap<PathBuf, Result<Option<TimeCoordinate>, ReadError>>,
    opened: Mutex<Vec<PathBuf>>,
}

impl MemoryReader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a file whose time axis starts at `first` with step `step`.
    pub fn with_time<P: Into<PathBuf>>(
        mut self,
        path: P,
        units: &str,
        length: usize,
        first: f64,
        step: f64,
    ) -> Self {
        let second = (length > 1).then_some(first + step);
        _ = self.entries.insert(
            path.into(),
            Ok(Some(TimeCoordinate {
                units: units.to_string(),
                length,
                first,
                second,
            })),
        );
        self
    }

    /// Register a file without a time variable.
    pub fn without_time<P: Into<PathBuf>>(mut self, path: P) -> Self {
        _ = self.entries.insert(path.into(), Ok(None));
        self
    }

    /// Register a file whose read fails.
    pub fn failing<P: Into<PathBuf>>(mut self, path: P, error: ReadError) -> Self {
        _ = self.entries.insert(path.into(), Err(error));
        self
    }

    /// Paths handed to the reader so far, in call order.
    pub fn opened(&self) -> Vec<PathBuf> {
        self.opened
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    fn lookup(&self, path: &Path) -> Result<Option<TimeCoordinate>, ReadError> {
        if let Ok(mut opened) = self.opened.lock() {
            opened.push(path.to_path_buf());
        }
        self.entries
            .get(path)
            .cloned()
            .unwrap_or_else(|| Err(ReadError::FileUnreadable(path.display().to_string())))
    }
}

impl ArrayReader for MemoryReader {
    fn dimension_size(&self, path: &Path, dimension: &str) -> Result<usize, ReadError> {
        match self.lookup(path)? {
            Some(tc) if dimension == TIME => Ok(tc.length),
            _ => Err(ReadError::DimensionMissing(dimension.to_string())),
        }
    }

    fn time_coordinate(&self, path: &Path) -> Result<Option<TimeCoordinate>, ReadError> {
        self.lookup(path)
    }
}
