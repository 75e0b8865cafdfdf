//! Project root resolution with a sticky single-slot cache.

use super::library::LibraryRegistry;
use super::path_codec::{encode_db_location, nearest_ancestor_with_marker};
use super::{FsProbe, RealFs, INDEX_FILE};
use crate::error::StoreResult;
use crate::utils::{absolutize, has_text_prefix};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Outcome of resolving a source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRoot {
    /// Project root directory.
    pub root: PathBuf,
    /// Database directory for `root`.
    pub db_path: PathBuf,
    /// Whether a primary tag file already exists in `db_path`.
    pub index_exists: bool,
}

/// Maps source files to project roots and database locations.
///
/// The last marker-based root is cached. Any later file whose path text
/// starts with the cached root reuses it without touching the filesystem;
/// the cache only changes when a different root is discovered.
pub struct RootResolver<P: FsProbe = RealFs> {
    markers: Vec<String>,
    db_root: PathBuf,
    cached_root: Option<PathBuf>,
    working_dir: Option<PathBuf>,
    probe: P,
}

impl RootResolver<RealFs> {
    pub fn new(markers: Vec<String>, db_root: PathBuf) -> Self {
        Self::with_probe(markers, db_root, RealFs)
    }
}

impl<P: FsProbe> RootResolver<P> {
    pub fn with_probe(markers: Vec<String>, db_root: PathBuf, probe: P) -> Self {
        Self {
            markers,
            db_root,
            cached_root: None,
            working_dir: None,
            probe,
        }
    }

    /// Pin the working directory used for relative paths and as the fallback
    /// root. Without it the process working directory is read on each call.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn cached_root(&self) -> Option<&Path> {
        self.cached_root.as_deref()
    }

    pub fn db_root(&self) -> &Path {
        &self.db_root
    }

    /// Database directory for an arbitrary root under this resolver's cache.
    pub fn db_location(&self, root: &Path) -> PathBuf {
        encode_db_location(&self.db_root, root)
    }

    /// `path` made absolute against the working directory and normalized.
    pub fn absolute(&self, path: &Path) -> PathBuf {
        absolutize(path, &self.working_dir())
    }

    fn working_dir(&self) -> PathBuf {
        match &self.working_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/")),
        }
    }

    fn cached_root_for(&self, filename: &Path) -> Option<PathBuf> {
        self.cached_root
            .as_ref()
            .filter(|root| has_text_prefix(filename, root))
            .cloned()
    }

    /// Walk up from the file's directory looking for a marker; caches a hit.
    fn discover_from_file(&mut self, filename: &Path) -> Option<PathBuf> {
        let start = filename.parent().unwrap_or(filename);
        let found = nearest_ancestor_with_marker(&self.probe, &self.markers, start)?;
        debug!(root = %found.display(), "Discovered project root");
        self.cached_root = Some(found.clone());
        Some(found)
    }

    /// Resolve the project root, database location and index presence for
    /// `filename`.
    ///
    /// Order: cached root if it prefixes the file, marker walk from the file's
    /// directory, marker walk from the working directory, and finally the
    /// working directory itself. Always yields a usable root.
    pub fn resolve(&mut self, filename: &Path) -> ResolvedRoot {
        let cwd = self.working_dir();
        let filename = absolutize(filename, &cwd);

        let root = if let Some(root) = self.cached_root_for(&filename) {
            root
        } else if let Some(root) = self.discover_from_file(&filename) {
            root
        } else if let Some(root) = nearest_ancestor_with_marker(&self.probe, &self.markers, &cwd) {
            debug!(root = %root.display(), "Project root found from working directory");
            self.cached_root = Some(root.clone());
            root
        } else {
            debug!(cwd = %cwd.display(), "No root marker found, using working directory");
            cwd
        };

        let db_path = self.db_location(&root);
        let index_exists = self.probe.exists(&db_path.join(INDEX_FILE));
        ResolvedRoot {
            root,
            db_path,
            index_exists,
        }
    }

    /// Whether `filename` lives under a marker-based project root.
    ///
    /// Unlike [`resolve`](Self::resolve) there is no working-directory
    /// fallback; a hit still refreshes the cached root.
    pub fn is_under_marker_root(&mut self, filename: &Path) -> bool {
        let filename = self.absolute(filename);
        self.cached_root_for(&filename).is_some() || self.discover_from_file(&filename).is_some()
    }

    /// Pick the database that covers `filename`.
    ///
    /// Files inside `primary_root` use the primary pair. Otherwise the library
    /// registry of `primary_db` is scanned and the first library whose root
    /// prefixes the file wins; with no match the primary pair is returned.
    pub fn resolve_across_libraries(
        &self,
        filename: &Path,
        primary_root: &Path,
        primary_db: &Path,
    ) -> StoreResult<(PathBuf, PathBuf)> {
        let filename = absolutize(filename, &self.working_dir());
        if has_text_prefix(&filename, primary_root) {
            return Ok((primary_root.to_path_buf(), primary_db.to_path_buf()));
        }

        match LibraryRegistry::at(primary_db).first_match(&filename)? {
            Some(entry) => {
                debug!(library = %entry.root.display(), "File resolved to library database");
                Ok((entry.root, entry.db_path))
            }
            None => Ok((primary_root.to_path_buf(), primary_db.to_path_buf())),
        }
    }
}
