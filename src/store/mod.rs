//! Project root discovery and on-disk database layout.
//!
//! A source file maps to a project root (nearest ancestor holding a marker
//! such as `.git`), and a project root maps to a database directory under the
//! cache root. Auxiliary library databases are linked from the primary one
//! through a sidecar registry.

pub mod library;
pub mod path_codec;
pub mod resolver;

pub use library::{LibraryEntries, LibraryEntry, LibraryRegistry, LIBRARY_REGISTRY_FILE};
pub use path_codec::{encode_db_location, encode_db_name, nearest_ancestor_with_marker};
pub use resolver::{ResolvedRoot, RootResolver};

use std::path::Path;

/// Name of the primary tag file whose presence marks a usable database.
pub const INDEX_FILE: &str = "GTAGS";

/// Existence probe used by root discovery.
///
/// Root discovery only ever asks "does this path exist", so the probe is the
/// single seam between the resolver and the filesystem.
pub trait FsProbe: Send + Sync {
    fn exists(&self, path: &Path) -> bool;
}

/// Probe backed by the real filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFs;

impl FsProbe for RealFs {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

impl<P: FsProbe + ?Sized> FsProbe for &P {
    fn exists(&self, path: &Path) -> bool {
        (**self).exists(path)
    }
}

impl<P: FsProbe + ?Sized> FsProbe for std::sync::Arc<P> {
    fn exists(&self, path: &Path) -> bool {
        (**self).exists(path)
    }
}
