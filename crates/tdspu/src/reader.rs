//! Array-file metadata access.
//!
//! Only two questions are ever asked of a data file: how long is a
//! dimension, and what does its time coordinate look like. Everything else
//! about the file format stays behind [`ArrayReader`].

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Name of the coordinate variable and dimension describing time.
pub const TIME: &str = "time";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReadError {
    #[error("file unreadable: {0}")]
    FileUnreadable(String),

    #[error("dimension missing: {0}")]
    DimensionMissing(String),
}

/// What a file's `time` variable holds: units, length and its first two values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeCoordinate {
    pub units: String,
    pub length: usize,
    pub first: f64,
    pub second: Option<f64>,
}

/// Metadata reader for array files.
///
/// Each call opens and closes the file exactly once. Implementations are
/// shared across the inventory's worker tasks.
pub trait ArrayReader: Send + Sync {
    /// Size of `dimension` in the file.
    fn dimension_size(&self, path: &Path, dimension: &str) -> Result<usize, ReadError>;

    /// The time coordinate, or `None` when the file has no `time` variable.
    fn time_coordinate(&self, path: &Path) -> Result<Option<TimeCoordinate>, ReadError>;
}

/// Reader used when the crate is built without a file-format backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedReader;

impl ArrayReader for UnsupportedReader {
    fn dimension_size(&self, _path: &Path, _dimension: &str) -> Result<usize, ReadError> {
        Err(ReadError::FileUnreadable(
            "built without netcdf support".to_string(),
        ))
    }

    fn time_coordinate(&self, _path: &Path) -> Result<Option<TimeCoordinate>, ReadError> {
        Err(ReadError::FileUnreadable(
            "built without netcdf support".to_string(),
        ))
    }
}

#[cfg(feature = "netcdf")]
pub use self::nc::NetcdfReader;

#[cfg(feature = "netcdf")]
mod nc {
    use super::{ArrayReader, ReadError, TIME, TimeCoordinate};
    use std::path::Path;

    /// Reads netCDF-3 and netCDF-4 files through libnetcdf.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct NetcdfReader;

    fn open(path: &Path) -> Result<netcdf::File, ReadError> {
        netcdf::open(path).map_err(|e| ReadError::FileUnreadable(e.to_string()))
    }

    impl ArrayReader for NetcdfReader {
        fn dimension_size(&self, path: &Path, dimension: &str) -> Result<usize, ReadError> {
            let file = open(path)?;
            file.dimension(dimension)
                .map(|d| d.len())
                .ok_or_else(|| ReadError::DimensionMissing(dimension.to_string()))
        }

        fn time_coordinate(&self, path: &Path) -> Result<Option<TimeCoordinate>, ReadError> {
            let file = open(path)?;
            let Some(var) = file.variable(TIME) else {
                return Ok(None);
            };

            let length = var.len();
            if length == 0 {
                return Err(ReadError::DimensionMissing(format!("{TIME} (empty)")));
            }

            let units = match var.attribute("units").map(|a| a.value()) {
                Some(Ok(netcdf::AttributeValue::Str(units))) => units,
                Some(Ok(other)) => {
                    return Err(ReadError::FileUnreadable(format!(
                        "{TIME}:units is not a string: {other:?}"
                    )));
                }
                Some(Err(e)) => return Err(ReadError::FileUnreadable(e.to_string())),
                None => String::new(),
            };

            let first: f64 = var
                .get_value([0usize])
                .map_err(|e| ReadError::FileUnreadable(e.to_string()))?;
            let second = if length > 1 {
                Some(
                    var.get_value::<f64, _>([1usize])
                        .map_err(|e| ReadError::FileUnreadable(e.to_string()))?,
                )
            } else {
                None
            };

            Ok(Some(TimeCoordinate {
                units,
                length,
                first,
                second,
            }))
        }
    }
}

/// The best reader this build supports.
#[must_use]
pub fn default_reader() -> std::sync::Arc<dyn ArrayReader> {
    #[cfg(feature = "netcdf")]
    {
        std::sync::Arc::new(NetcdfReader)
    }
    #[cfg(not(feature = "netcdf"))]
    {
        std::sync::Arc::new(UnsupportedReader)
    }
}
