use std::path::{Path, PathBuf};

pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while building inventories, grouping and writing documents.
///
/// Per-file variants (`SchemaMismatch`, `MetadataRead`) are collected into the
/// inventory's rejections; per-output variants (`OutputWrite`, `Template`) are
/// isolated to that output. `NoFilesFound` and `SchemaMisconfigured` abort a run.
/// `InsufficientSamples`, `NoTimeAxis` and `DocumentMissing` are notices.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Path {} has {found} directory levels, DRS expects {expected}", .path.display())]
    SchemaMismatch {
        path: PathBuf,
        expected: usize,
        found: usize,
    },

    #[error("Cannot read metadata of {}: {reason}", .path.display())]
    MetadataRead { path: PathBuf, reason: String },

    #[error("Group {group} has fewer than two time samples, increment left undefined")]
    InsufficientSamples { group: String },

    #[error("Group {group} has no time axis, time metadata left out")]
    NoTimeAxis { group: String },

    #[error("Aggregation document {} has not been written", .path.display())]
    DocumentMissing { path: PathBuf },

    #[error("No files found under {}", .root.display())]
    NoFilesFound { root: PathBuf },

    #[error("No file under {} matches the DRS ({rejected} rejected); check the configured schema", .root.display())]
    SchemaMisconfigured { root: PathBuf, rejected: usize },

    #[error("Cannot write {}: {reason}", .path.display())]
    OutputWrite { path: PathBuf, reason: String },

    #[error("Template error: {0}")]
    Template(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown grouping strategy '{name}' (known: {known})")]
    UnknownStrategy { name: String, known: String },

    #[error("Unknown facet '{facet}' referenced by {context}")]
    UnknownFacet { facet: String, context: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn schema_mismatch<P: AsRef<Path>>(path: P, expected: usize, found: usize) -> Self {
        Error::SchemaMismatch {
            path: path.as_ref().to_path_buf(),
            expected,
            found,
        }
    }

    pub fn metadata_read<P: AsRef<Path>, S: ToString>(path: P, reason: S) -> Self {
        Error::MetadataRead {
            path: path.as_ref().to_path_buf(),
            reason: reason.to_string(),
        }
    }

    pub fn output_write<P: AsRef<Path>, S: ToString>(path: P, reason: S) -> Self {
        Error::OutputWrite {
            path: path.as_ref().to_path_buf(),
            reason: reason.to_string(),
        }
    }

    pub fn unknown_facet<F: AsRef<str>, C: AsRef<str>>(facet: F, context: C) -> Self {
        Error::UnknownFacet {
            facet: facet.as_ref().to_string(),
            context: context.as_ref().to_string(),
        }
    }

    pub fn config<S: ToString>(msg: S) -> Self {
        Error::Config(msg.to_string())
    }

    /// Short machine-friendly name of the variant, used in run reports.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Error::SchemaMismatch { .. } => "SchemaMismatch",
            Error::MetadataRead { .. } => "MetadataReadError",
            Error::InsufficientSamples { .. } => "InsufficientSamples",
            Error::NoTimeAxis { .. } => "NoTimeAxis",
            Error::DocumentMissing { .. } => "DocumentMissing",
            Error::NoFilesFound { .. } => "NoFilesFound",
            Error::SchemaMisconfigured { .. } => "SchemaMisconfigured",
            Error::OutputWrite { .. } => "OutputWriteFailure",
            Error::Template(_) => "TemplateError",
            Error::Config(_) => "ConfigError",
            Error::UnknownStrategy { .. } => "UnknownStrategy",
            Error::UnknownFacet { .. } => "UnknownFacet",
            Error::Io(_) => "IoError",
        }
    }
}

impl From<tera::Error> for Error {
    fn from(err: tera::Error) -> Error {
        // tera keeps the useful part of the message in the source chain
        let mut msg = err.to_string();
        let mut source = std::error::Error::source(&err);
        while let Some(inner) = source {
            msg.push_str(": ");
            msg.push_str(&inner.to_string());
            source = inner.source();
        }
        Error::Template(msg)
    }
}

impl From<serde_yaml_ng::Error> for Error {
    fn from(err: serde_yaml_ng::Error) -> Error {
        Error::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_mismatch_message() {
        let err = Error::schema_mismatch("/data/a/b/x.nc", 3, 2);
        assert_eq!(err.kind(), "SchemaMismatch");
        let msg = err.to_string();
        assert!(msg.contains("/data/a/b/x.nc"));
        assert!(msg.contains("2 directory levels"));
        assert!(msg.contains("expects 3"));
    }

    #[test]
    fn test_tera_error_keeps_chain() {
        let mut tera = tera::Tera::default();
        let err = tera
            .add_raw_template("broken", "{{ unclosed")
            .expect_err("template should not parse");
        let converted = Error::from(err);
        assert_eq!(converted.kind(), "TemplateError");
        assert!(converted.to_string().contains("broken"));
    }
}
