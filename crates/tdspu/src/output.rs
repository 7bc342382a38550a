//! Output naming and writing.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};
use crate::facet::FacetMap;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_-]*)\}").expect("placeholder regex"));

/// A relative path with `{facet}` placeholders, e.g.
/// `{project}/{model}/{variable}_{table}.ncml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    pattern: String,
}

impl PathTemplate {
    pub fn new<S: Into<String>>(pattern: S) -> Self {
        Self {
            pattern: pattern.into(),
        }
    }

    /// Facet names referenced by the template, in order of appearance.
    #[must_use]
    pub fn placeholders(&self) -> Vec<String> {
        PLACEHOLDER
            .captures_iter(&self.pattern)
            .filter_map(|cap| cap.get(1).map(|m| m.as_str().to_string()))
            .collect()
    }

    /// Substitute every placeholder from `facets`.
    pub fn expand(&self, facets: &FacetMap) -> Result<PathBuf> {
        let mut out = String::new();
        let mut start = 0;

        for cap in PLACEHOLDER.captures_iter(&self.pattern) {
            let (Some(whole), Some(name)) = (cap.get(0), cap.get(1)) else {
                continue;
            };
            let value = facets
                .get(name.as_str())
                .ok_or_else(|| Error::unknown_facet(name.as_str(), format!("path template '{}'", self.pattern)))?;

            out.push_str(&self.pattern[start..whole.start()]);
            out.push_str(value);
            start = whole.end();
        }
        out.push_str(&self.pattern[start..]);
        Ok(PathBuf::from(out))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.pattern
    }
}

/// Write `contents` to `path` so readers never see a partial file.
///
/// Missing parent directories are created. The data goes to a temporary
/// file in the same directory, is synced, then renamed over `path`.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(|e| Error::output_write(path, e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(|e| Error::output_write(path, e))?;
    tmp.write_all(contents)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| Error::output_write(path, e))?;
    _ = tmp
        .persist(path)
        .map_err(|e| Error::output_write(path, e.error))?;

    let path_str = path.display().to_string();
    diagnostics::log_debug!("Wrote {path} ({bytes} bytes)", path: path_str, bytes: contents.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facets() -> FacetMap {
        FacetMap::from([
            ("model".to_string(), "GFDL-ESM2M".to_string()),
            ("variable".to_string(), "tas".to_string()),
            ("table".to_string(), "day".to_string()),
        ])
    }

    #[test]
    fn test_expand() -> Result<()> {
        let template = PathTemplate::new("{model}/{variable}_{table}.ncml");
        assert_eq!(template.placeholders(), vec!["model", "variable", "table"]);
        assert_eq!(
            template.expand(&facets())?,
            PathBuf::from("GFDL-ESM2M/tas_day.ncml")
        );
        assert_eq!(
            PathTemplate::new("catalog.xml").expand(&facets())?,
            PathBuf::from("catalog.xml")
        );
        Ok(())
    }

    #[test]
    fn test_expand_unknown_facet() {
        let err = PathTemplate::new("{realm}/x.ncml")
            .expand(&facets())
            .expect_err("realm is not a facet");
        assert!(matches!(err, Error::UnknownFacet { ref facet, .. } if facet == "realm"));
    }

    #[test]
    fn test_write_atomic_creates_parents_and_replaces() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let path = tmp.path().join("a/b/out.ncml");
        write_atomic(&path, b"first")?;
        write_atomic(&path, b"second")?;
        assert_eq!(std::fs::read_to_string(&path)?, "second");
        assert_eq!(std::fs::read_dir(tmp.path().join("a/b"))?.count(), 1);
        Ok(())
    }

    #[test]
    fn test_write_atomic_failure_is_output_write() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let blocker = tmp.path().join("file");
        std::fs::write(&blocker, b"x")?;
        let err = write_atomic(&blocker.join("below.ncml"), b"data").expect_err("parent is a file");
        assert_eq!(err.kind(), "OutputWriteFailure");
        Ok(())
    }
}
