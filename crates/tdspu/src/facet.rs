//! Facet extraction: turning a path under a DRS root into named facet values.
//!
//! A DRS (Directory Reference Syntax) is the ordered list of facet names
//! encoded by the directory levels under a dataset root, for example
//! `project/product/institute/model/experiment/frequency/realm/table/ensemble/version/variable`.
//! The file name itself is not a facet level.

use std::collections::BTreeMap;
use std::path::{Component, Path};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::reader::{ArrayReader, TimeCoordinate};

/// Facet name to facet value, ordered by name.
pub type FacetMap = BTreeMap<String, String>;

/// Ordered facet names, one per directory level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Drs {
    facets: Vec<String>,
}

impl Drs {
    pub fn new<I, S>(facets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            facets: facets.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a slash-separated schema such as `project/model/experiment`.
    pub fn parse(schema: &str) -> Self {
        Self::new(schema.split('/').filter(|s| !s.is_empty()))
    }

    #[must_use]
    pub fn facets(&self) -> &[String] {
        &self.facets
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.facets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.facets.is_empty()
    }

    #[must_use]
    pub fn contains(&self, facet: &str) -> bool {
        self.facets.iter().any(|f| f == facet)
    }
}

impl std::fmt::Display for Drs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.facets.join("/"))
    }
}

/// Compute the facets of `path`, a file somewhere below `root`.
///
/// The directory levels between `root` and the file are zipped against the
/// schema. A different number of levels is a `SchemaMismatch`.
pub fn extract_facets(path: &Path, root: &Path, schema: &Drs) -> Result<FacetMap> {
    let rel = path
        .strip_prefix(root)
        .map_err(|_| Error::schema_mismatch(path, schema.len(), 0))?;

    let segments: Vec<String> = rel
        .parent()
        .map(|dir| {
            dir.components()
                .filter_map(|c| match c {
                    Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();

    if segments.len() != schema.len() {
        return Err(Error::schema_mismatch(path, schema.len(), segments.len()));
    }

    Ok(schema.facets().iter().cloned().zip(segments).collect())
}

/// Leading underscore-separated tokens of the file name.
///
/// `tas_day_GFDL-ESM2M_historical_r1i1p1_18610101-18651231.nc` with `n = 2`
/// yields `["tas", "day"]`. Fewer tokens than requested yields what exists.
#[must_use]
pub fn filename_tokens(path: &Path, n: usize) -> Vec<String> {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    stem.split('_').take(n).map(str::to_string).collect()
}

/// Time-axis description: units, first value and the constant step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeDescriptor {
    pub units: String,
    pub start: f64,
    pub increment: Option<f64>,
}

impl TimeDescriptor {
    /// Descriptor of a series whose first two samples are `first` and `second`.
    #[must_use]
    pub fn from_samples(units: &str, first: f64, second: Option<f64>) -> Self {
        Self {
            units: units.to_string(),
            start: first,
            increment: second.map(|v| v - first),
        }
    }
}

/// Read the time coordinate of one file.
///
/// `Ok(None)` means the file has no `time` variable. Reader failures become
/// `MetadataRead` errors naming the file.
pub fn read_time_coordinate(reader: &dyn ArrayReader, path: &Path) -> Result<Option<TimeCoordinate>> {
    reader
        .time_coordinate(path)
        .map_err(|e| Error::metadata_read(path, e))
}
