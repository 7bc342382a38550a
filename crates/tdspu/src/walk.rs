//! Candidate file enumeration.

use std::fs;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Source of candidate file paths.
///
/// Each call to `files` starts over, so an enumerator may be walked more than
/// once. Callers assume no ordering.
pub trait FileEnumerator: Send + Sync {
    fn files(&self, root: &Path) -> Box<dyn Iterator<Item = Result<PathBuf>> + '_>;
}

/// Recursive directory walk. Symlinks are followed, hidden entries skipped.
#[derive(Debug, Default, Clone)]
pub struct WalkDirEnumerator {
    pub follow_links: bool,
}

impl WalkDirEnumerator {
    #[must_use]
    pub fn new() -> Self {
        Self { follow_links: true }
    }

    fn is_hidden(entry: &walkdir::DirEntry) -> bool {
        entry.depth() > 0
            && entry
                .file_name()
                .to_str()
                .map(|s| s.starts_with('.'))
                .unwrap_or(false)
    }
}

impl FileEnumerator for WalkDirEnumerator {
    fn files(&self, root: &Path) -> Box<dyn Iterator<Item = Result<PathBuf>> + '_> {
        let walk = walkdir::WalkDir::new(root)
            .follow_links(self.follow_links)
            .into_iter()
            .filter_entry(|e| !Self::is_hidden(e))
            .filter_map(|entry| match entry {
                Ok(entry) if entry.file_type().is_file() => Some(Ok(entry.into_path())),
                Ok(_) => None,
                Err(e) => Some(Err(Error::Io(e.into()))),
            });
        Box::new(walk)
    }
}

/// A fixed list of paths, e.g. read from stdin.
///
/// Relative entries are resolved against the root handed to `files`.
#[derive(Debug, Default, Clone)]
pub struct ListEnumerator {
    paths: Vec<PathBuf>,
}

impl ListEnumerator {
    #[must_use]
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }

    /// One path per line; blank lines are ignored.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut paths = Vec::new();
        for line in BufReader::new(reader).lines() {
            let line = line?;
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                paths.push(PathBuf::from(trimmed));
            }
        }
        Ok(Self { paths })
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        Self::from_reader(fs::File::open(path)?)
    }
}

impl FileEnumerator for ListEnumerator {
    fn files(&self, root: &Path) -> Box<dyn Iterator<Item = Result<PathBuf>> + '_> {
        let root = root.to_path_buf();
        Box::new(self.paths.iter().map(move |p| {
            if p.is_absolute() {
                Ok(p.clone())
            } else {
                Ok(root.join(p))
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_walkdir_enumerator_skips_hidden() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        fs::create_dir_all(tmp.path().join("a/b"))?;
        fs::create_dir_all(tmp.path().join(".snapshot"))?;
        fs::write(tmp.path().join("a/b/x.nc"), b"x")?;
        fs::write(tmp.path().join("a/y.nc"), b"y")?;
        fs::write(tmp.path().join(".snapshot/z.nc"), b"z")?;
        fs::write(tmp.path().join("a/.hidden.nc"), b"h")?;

        let mut found: Vec<PathBuf> = WalkDirEnumerator::new()
            .files(tmp.path())
            .collect::<Result<_>>()?;
        found.sort();

        assert_eq!(
            found,
            vec![tmp.path().join("a/b/x.nc"), tmp.path().join("a/y.nc")]
        );
        Ok(())
    }

    #[test]
    fn test_list_enumerator_is_restartable() -> Result<()> {
        let list = ListEnumerator::from_reader("rel/a.nc\n\n/abs/b.nc\n".as_bytes())?;
        let root = Path::new("/root");
        let first: Vec<PathBuf> = list.files(root).collect::<Result<_>>()?;
        let second: Vec<PathBuf> = list.files(root).collect::<Result<_>>()?;

        assert_eq!(first, vec![PathBuf::from("/root/rel/a.nc"), PathBuf::from("/abs/b.nc")]);
        assert_eq!(first, second);
        Ok(())
    }
}
