//! Pack file discovery
//!
//! Lists the files directly under a build root whose names follow the
//! canonical `<NN>_<Title>_v<major>.json` pattern. The sequence is lazy
//! (one directory entry at a time), finite, sorted by file name, and
//! restartable: every call to [`PackDiscovery::iter`] walks the directory
//! afresh.

use crate::error::{PackError, Result};
use crate::pack::PackName;
use std::fmt;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A discovered pack file
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct PackFile {
    /// Parsed pack name
    pub name: PackName,
    /// Full path of the file
    pub path: PathBuf,
}

/// Restartable view over the pack files of one build root
#[derive(Debug, Clone)]
pub struct PackDiscovery {
    root: PathBuf,
}

impl PackDiscovery {
    /// # Errors
    ///
    /// `MissingBuildRoot` when `root` is not a directory
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(PackError::MissingBuildRoot(root.to_path_buf()));
        }
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    /// Directory being listed
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Start a fresh walk
    pub fn iter(&self) -> DiscoveryIter {
        DiscoveryIter {
            root: self.root.clone(),
            inner: WalkDir::new(&self.root)
                .min_depth(1)
                .max_depth(1)
                .sort_by_file_name()
                .into_iter(),
        }
    }
}

impl<'a> IntoIterator for &'a PackDiscovery {
    type Item = Result<PackFile>;
    type IntoIter = DiscoveryIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// One pass over a build root
pub struct DiscoveryIter {
    root: PathBuf,
    inner: walkdir::IntoIter,
}

impl fmt::Debug for DiscoveryIter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscoveryIter").field("root", &self.root).finish()
    }
}

impl Iterator for DiscoveryIter {
    type Item = Result<PackFile>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.inner.next()? {
                Ok(entry) => entry,
                Err(err) => {
                    let context = format!("walking {}", self.root.display());
                    return Some(Err(PackError::from(std::io::Error::from(err)).context(context)));
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().and_then(PackName::from_file_name) else {
                continue;
            };
            return Some(Ok(PackFile {
                name,
                path: entry.into_path(),
            }));
        }
    }
}

/// Collect every pack file under `root`, in file-name order
pub fn discover(root: impl AsRef<Path>) -> Result<Vec<PackFile>> {
    PackDiscovery::new(root)?.iter().collect()
}
