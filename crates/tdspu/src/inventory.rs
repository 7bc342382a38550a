//! The inventory: one record per accepted data file under a root.
//!
//! Candidates come from a [`FileEnumerator`], are filtered by extension and
//! exclusion rules, get their facets from the DRS, and are then stat'ed and
//! opened concurrently on the blocking pool. Per-file failures are recorded
//! as rejections and never abort the scan.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;

use crate::config::RunConfig;
use crate::error::{Error, Result};
use crate::facet::{Drs, FacetMap, TimeDescriptor, extract_facets, read_time_coordinate};
use crate::grouping::FixedVariables;
use crate::reader::{ArrayReader, TimeCoordinate};
use crate::walk::FileEnumerator;

/// One accepted file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InventoryRecord {
    pub path: PathBuf,
    pub facets: FacetMap,
    pub size: u64,
    pub modified: DateTime<Utc>,
    /// Present for time-varying files read with time enabled
    pub time: Option<TimeCoordinate>,
}

impl InventoryRecord {
    /// A record without time metadata, modified at the epoch.
    pub fn new<P: Into<PathBuf>>(path: P, facets: FacetMap, size: u64) -> Self {
        Self {
            path: path.into(),
            facets,
            size,
            modified: DateTime::<Utc>::from(SystemTime::UNIX_EPOCH),
            time: None,
        }
    }

    #[must_use]
    pub fn with_time(mut self, time: TimeCoordinate) -> Self {
        self.time = Some(time);
        self
    }

    #[must_use]
    pub fn facet(&self, name: &str) -> Option<&str> {
        self.facets.get(name).map(String::as_str)
    }

    /// The file's own time descriptor, if its time axis was read.
    #[must_use]
    pub fn time_descriptor(&self) -> Option<TimeDescriptor> {
        self.time
            .as_ref()
            .map(|t| TimeDescriptor::from_samples(&t.units, t.first, t.second))
    }
}

/// A candidate that did not make it into the inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rejection {
    pub path: PathBuf,
    pub kind: &'static str,
    pub reason: String,
}

impl Rejection {
    fn new(path: &Path, error: &Error) -> Self {
        Self {
            path: path.to_path_buf(),
            kind: error.kind(),
            reason: error.to_string(),
        }
    }
}

/// Scan parameters, usually derived from a [`RunConfig`].
#[derive(Debug, Clone)]
pub struct InventoryOptions {
    pub drs: Drs,
    pub extension: String,
    pub fixed: FixedVariables,
    pub exclude: BTreeMap<String, Vec<String>>,
    pub concurrency: usize,
    /// Open time-varying files to read their time axis
    pub read_time: bool,
}

impl InventoryOptions {
    #[must_use]
    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            drs: config.drs.clone(),
            extension: config.extension.clone(),
            fixed: config.fixed(),
            exclude: config.exclude.clone(),
            concurrency: config.concurrency.max(1),
            read_time: true,
        }
    }

    #[must_use]
    pub fn without_time(mut self) -> Self {
        self.read_time = false;
        self
    }

    fn has_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case(&self.extension))
            .unwrap_or(false)
    }

    fn is_excluded(&self, facets: &FacetMap) -> bool {
        self.exclude.iter().any(|(facet, values)| {
            facets
                .get(facet)
                .map(|v| values.contains(v))
                .unwrap_or(false)
        })
    }
}

/// Accepted records sorted by path, plus what was turned away.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Inventory {
    pub root: PathBuf,
    pub records: Vec<InventoryRecord>,
    pub rejected: Vec<Rejection>,
    /// Candidates with the configured extension
    pub scanned: usize,
    /// Candidates dropped by exclusion rules
    pub excluded: usize,
}

impl Inventory {
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Fail when nothing usable was found.
    ///
    /// An empty inventory whose every candidate was rejected for its
    /// directory depth points at the schema, not at the files.
    pub fn ensure_usable(&self) -> Result<()> {
        if !self.records.is_empty() {
            return Ok(());
        }
        let mismatched = self
            .rejected
            .iter()
            .filter(|r| r.kind == "SchemaMismatch")
            .count();
        if mismatched > 0 && mismatched == self.rejected.len() {
            return Err(Error::SchemaMisconfigured {
                root: self.root.clone(),
                rejected: mismatched,
            });
        }
        Err(Error::NoFilesFound {
            root: self.root.clone(),
        })
    }
}

struct Candidate {
    path: PathBuf,
    facets: FacetMap,
    read_time: bool,
}

fn ingest(candidate: Candidate, reader: &dyn ArrayReader) -> Result<InventoryRecord> {
    let meta = std::fs::metadata(&candidate.path)
        .map_err(|e| Error::metadata_read(&candidate.path, e))?;
    let modified = meta
        .modified()
        .map(DateTime::<Utc>::from)
        .map_err(|e| Error::metadata_read(&candidate.path, e))?;
    let time = if candidate.read_time {
        read_time_coordinate(reader, &candidate.path)?
    } else {
        None
    };
    Ok(InventoryRecord {
        path: candidate.path,
        facets: candidate.facets,
        size: meta.len(),
        modified,
        time,
    })
}

/// Build the inventory of `root`.
///
/// Fixed-variable files are never opened. At most `options.concurrency`
/// files are read at once.
pub async fn build_inventory(
    root: &Path,
    enumerator: &dyn FileEnumerator,
    reader: Arc<dyn ArrayReader>,
    options: &InventoryOptions,
) -> Result<Inventory> {
    let mut inventory = Inventory {
        root: root.to_path_buf(),
        ..Inventory::default()
    };

    let mut paths = BTreeSet::new();
    for entry in enumerator.files(root) {
        match entry {
            Ok(path) if options.has_extension(&path) => {
                _ = paths.insert(path);
            }
            Ok(_) => {}
            Err(e) => inventory.rejected.push(Rejection::new(root, &e)),
        }
    }
    inventory.scanned = paths.len();

    let mut candidates = Vec::new();
    for path in paths {
        match extract_facets(&path, root, &options.drs) {
            Ok(facets) if options.is_excluded(&facets) => inventory.excluded += 1,
            Ok(facets) => {
                let read_time = options.read_time && !options.fixed.is_fixed(&facets);
                candidates.push(Candidate {
                    path,
                    facets,
                    read_time,
                });
            }
            Err(e) => {
                let root_str = root.display().to_string();
                let path_str = path.display().to_string();
                diagnostics::log_debug!("Rejected {path} under {root}", path: path_str, root: root_str);
                inventory.rejected.push(Rejection::new(&path, &e));
            }
        }
    }

    let concurrency = options.concurrency.max(1);
    let results: Vec<(PathBuf, Result<InventoryRecord>)> = stream::iter(candidates)
        .map(|candidate| {
            let reader = reader.clone();
            let path = candidate.path.clone();
            async move {
                let result = tokio::task::spawn_blocking(move || ingest(candidate, reader.as_ref()))
                    .await
                    .unwrap_or_else(|e| Err(Error::metadata_read(&path, e)));
                (path, result)
            }
        })
        .buffer_unordered(concurrency)
        .collect()
        .await;

    for (path, result) in results {
        match result {
            Ok(record) => inventory.records.push(record),
            Err(e) => {
                let path_str = path.display().to_string();
                let reason = e.to_string();
                diagnostics::log_warn!("Skipping {path}: {reason}", path: path_str, reason: reason);
                inventory.rejected.push(Rejection::new(&path, &e));
            }
        }
    }

    inventory.records.sort_by(|a, b| a.path.cmp(&b.path));
    inventory.rejected.sort_by(|a, b| a.path.cmp(&b.path));

    let root_str = root.display().to_string();
    diagnostics::log_info!(
        "Inventory of {root}: {accepted} accepted, {rejected} rejected, {excluded} excluded",
        root: root_str,
        accepted: inventory.records.len(),
        rejected: inventory.rejected.len(),
        excluded: inventory.excluded
    );
    Ok(inventory)
}
