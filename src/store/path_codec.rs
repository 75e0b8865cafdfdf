//! Pure mapping from project roots to database directory names.
//!
//! The database for `/home/dev/proj` lives in `<cache>/%home%dev%proj`; on
//! Windows `C:\src\proj` becomes `C%src%proj`. Platform differences stay in
//! this file.

use super::FsProbe;
use crate::utils::absolutize_from_cwd;
use std::path::{Path, PathBuf};

/// Character substituted for path separators in database directory names.
pub const RESERVED: char = '%';

/// Return the nearest ancestor of `start_dir` (itself included) that contains
/// one of `markers` as a direct child.
///
/// Returns `None` once the filesystem root (`/`, or the drive root on
/// Windows) has been checked without a match.
pub fn nearest_ancestor_with_marker<P>(
    probe: &P,
    markers: &[String],
    start_dir: &Path,
) -> Option<PathBuf>
where
    P: FsProbe + ?Sized,
{
    let mut dir = absolutize_from_cwd(start_dir);
    loop {
        if markers.iter().any(|marker| probe.exists(&dir.join(marker))) {
            return Some(dir);
        }
        // `pop` refuses to go above `/` or `C:\`, which ends the walk
        if !dir.pop() {
            return None;
        }
    }
}

/// Database directory for `project_root` under `cache_root`.
pub fn encode_db_location(cache_root: &Path, project_root: &Path) -> PathBuf {
    cache_root.join(encode_db_name(project_root))
}

/// Directory name for `project_root` with separators replaced by [`RESERVED`].
///
/// The plain form never contains two reserved characters in a row. Roots for
/// which that would not hold (a literal `%` in the path, or a UNC prefix) use
/// an escaped form instead: `%%` followed by the path with `%`, `:` and
/// separators percent-encoded. The two forms cannot collide, and each is
/// injective on its own.
pub fn encode_db_name(project_root: &Path) -> String {
    let text = project_root.to_string_lossy();
    if !text.contains(RESERVED) {
        let plain = plain_name(&text);
        if !plain.contains("%%") {
            return plain;
        }
    }
    escaped_name(&text)
}

#[cfg(windows)]
fn plain_name(text: &str) -> String {
    text.replacen(":\\", "%", 1).replace(['\\', '/'], "%")
}

#[cfg(not(windows))]
fn plain_name(text: &str) -> String {
    text.replace('/', "%")
}

fn escaped_name(text: &str) -> String {
    let mut name = String::with_capacity(text.len() + 8);
    name.push(RESERVED);
    name.push(RESERVED);
    for c in text.chars() {
        if c == RESERVED || c == ':' || std::path::is_separator(c) {
            name.push_str(&format!("%{:02X}", c as u32));
        } else {
            name.push(c);
        }
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Probe over a fixed set of existing paths that records every query.
    struct FakeFs {
        existing: HashSet<PathBuf>,
        probes: Mutex<Vec<PathBuf>>,
    }

    impl FakeFs {
        fn new(paths: &[&str]) -> Self {
            Self {
                existing: paths.iter().map(PathBuf::from).collect(),
                probes: Mutex::new(Vec::new()),
            }
        }
    }

    impl FsProbe for FakeFs {
        fn exists(&self, path: &Path) -> bool {
            self.probes.lock().unwrap().push(path.to_path_buf());
            self.existing.contains(path)
        }
    }

    fn markers() -> Vec<String> {
        vec![".git".to_string(), ".hg".to_string()]
    }

    #[cfg(unix)]
    #[test]
    fn test_encode_unix_root() {
        assert_eq!(
            encode_db_location(Path::new("/cache"), Path::new("/home/dev/proj")),
            PathBuf::from("/cache/%home%dev%proj")
        );
        assert_eq!(encode_db_name(Path::new("/")), "%");
    }

    #[cfg(windows)]
    #[test]
    fn test_encode_windows_drive() {
        assert_eq!(encode_db_name(Path::new(r"C:\src\proj")), "C%src%proj");
    }

    #[cfg(unix)]
    #[test]
    fn test_encode_is_injective_with_reserved_character() {
        let roots = [
            "/a/b",
            "/a%b",
            "/a/%b",
            "/a%/b",
            "/a%%b",
            "/a/25b",
            "/a%25b",
            "/a/b/c",
            "/a/b%c",
            "/",
            "/%",
        ];
        let names: HashSet<String> = roots
            .iter()
            .map(|r| encode_db_name(Path::new(r)))
            .collect();
        assert_eq!(names.len(), roots.len());
    }

    #[cfg(unix)]
    #[test]
    fn test_encode_escaped_form() {
        assert_eq!(encode_db_name(Path::new("/a%b")), "%%%2Fa%25b");
    }

    #[test]
    fn test_encode_is_stable() {
        let root = Path::new("/srv/code/project");
        let first = encode_db_location(Path::new("/cache"), root);
        for _ in 0..3 {
            assert_eq!(encode_db_location(Path::new("/cache"), root), first);
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_nearest_ancestor_includes_start_dir() {
        let fs = FakeFs::new(&["/proj/.git"]);
        assert_eq!(
            nearest_ancestor_with_marker(&fs, &markers(), Path::new("/proj")),
            Some(PathBuf::from("/proj"))
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_nearest_ancestor_picks_deepest() {
        let fs = FakeFs::new(&["/proj/.git", "/proj/vendor/lib/.hg"]);
        assert_eq!(
            nearest_ancestor_with_marker(&fs, &markers(), Path::new("/proj/vendor/lib/src")),
            Some(PathBuf::from("/proj/vendor/lib"))
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_nearest_ancestor_checks_filesystem_root() {
        let fs = FakeFs::new(&["/.git"]);
        assert_eq!(
            nearest_ancestor_with_marker(&fs, &markers(), Path::new("/a/b")),
            Some(PathBuf::from("/"))
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_nearest_ancestor_not_found_after_root() {
        let fs = FakeFs::new(&[]);
        assert_eq!(
            nearest_ancestor_with_marker(&fs, &markers(), Path::new("/a/b")),
            None
        );
        let probed = fs.probes.lock().unwrap();
        // Every level from /a/b up to / is probed for every marker
        assert_eq!(probed.len(), 3 * markers().len());
        assert_eq!(probed.last(), Some(&PathBuf::from("/.hg")));
    }
}
