//! Utility functions shared across modules

use std::path::{Component, Path, PathBuf};

/// Make a path absolute against `base` and normalize it lexically.
///
/// `.` components are dropped and `..` pops the previous component; the
/// filesystem is never consulted, so symlinks are not resolved. Trailing and
/// repeated separators disappear as a side effect of component iteration.
///
/// # Examples
///
/// ```
/// use std::path::{Path, PathBuf};
/// use tagdb::utils::absolutize;
///
/// assert_eq!(
///     absolutize(Path::new("src/../lib/./x.c"), Path::new("/proj")),
///     PathBuf::from("/proj/lib/x.c")
/// );
/// assert_eq!(absolutize(Path::new("/a//b/"), Path::new("/")), PathBuf::from("/a/b"));
/// ```
pub fn absolutize(path: &Path, base: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    };

    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::Prefix(_) | Component::RootDir | Component::Normal(_) => {
                normalized.push(component.as_os_str())
            }
            Component::CurDir => {}
            Component::ParentDir => {
                // Never pop past the root (or drive prefix)
                if normalized.file_name().is_some() {
                    normalized.pop();
                }
            }
        }
    }
    normalized
}

/// Absolutize against the process working directory.
pub fn absolutize_from_cwd(path: &Path) -> PathBuf {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
    absolutize(path, &cwd)
}

/// Textual prefix test on the string form of two paths.
///
/// Unlike [`Path::starts_with`], `/proj` prefixes `/project/x.c` too. Root
/// caching and library lookup compare raw path text.
pub fn has_text_prefix(path: &Path, prefix: &Path) -> bool {
    let prefix = prefix.to_string_lossy();
    !prefix.is_empty() && path.to_string_lossy().starts_with(prefix.as_ref())
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Format a duration in milliseconds for log messages (e.g., 1520 -> "1.52s")
pub fn format_millis(millis: u128) -> String {
    if millis >= 1000 {
        format!("{:.2}s", millis as f64 / 1000.0)
    } else {
        format!("{}ms", millis)
    }
}
