//! Index-mutation jobs and the indexer switches they carry.

use crate::store::LibraryEntry;
use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;

/// A project root together with its database directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbTarget {
    pub root: PathBuf,
    pub db_path: PathBuf,
}

impl DbTarget {
    pub fn new(root: impl Into<PathBuf>, db_path: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            db_path: db_path.into(),
        }
    }
}

/// Switches passed to every `gtags` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexerOptions {
    /// `--accept-dotfiles`
    pub accept_dotfiles: bool,
    /// `--skip-unreadable`
    pub skip_unreadable: bool,
    /// `--skip-symlink[=TYPE]`; an empty type means the bare switch.
    pub skip_symlink: Option<String>,
    /// `--gtagsconf FILE`
    pub gtagsconf: Option<PathBuf>,
    /// `--gtagslabel LABEL`
    pub gtagslabel: String,
    /// Export `GTAGSFORCECPP` so `.h` headers are parsed as C++.
    pub force_cpp: bool,
}

impl Default for IndexerOptions {
    fn default() -> Self {
        Self {
            accept_dotfiles: false,
            skip_unreadable: false,
            skip_symlink: None,
            gtagsconf: None,
            gtagslabel: "default".to_string(),
            force_cpp: true,
        }
    }
}

impl IndexerOptions {
    /// Command-line switches, in the order `gtags` documents them.
    pub fn to_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::new();
        if self.accept_dotfiles {
            args.push("--accept-dotfiles".into());
        }
        if self.skip_unreadable {
            args.push("--skip-unreadable".into());
        }
        match self.skip_symlink.as_deref() {
            Some("") => args.push("--skip-symlink".into()),
            Some(kind) => args.push(format!("--skip-symlink={}", kind).into()),
            None => {}
        }
        if let Some(conf) = &self.gtagsconf {
            args.push("--gtagsconf".into());
            args.push(conf.clone().into_os_string());
        }
        args.push("--gtagslabel".into());
        args.push(self.gtagslabel.clone().into());
        args
    }
}

/// One index-mutating operation, executed by the update worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateJob {
    /// Rebuild the whole database; the worker waits for the indexer.
    FullBuild {
        target: DbTarget,
        options: IndexerOptions,
    },
    /// Re-index one file in an existing database; launched detached.
    SingleUpdate {
        target: DbTarget,
        file: PathBuf,
        options: IndexerOptions,
    },
    /// Record the library registry, then build each library database.
    LibraryBuild {
        primary_db: PathBuf,
        libraries: Vec<LibraryEntry>,
        options: IndexerOptions,
    },
    /// Delete the database directory after confirmation.
    Remove { target: DbTarget },
}

impl UpdateJob {
    /// Short kind name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            UpdateJob::FullBuild { .. } => "full-build",
            UpdateJob::SingleUpdate { .. } => "single-update",
            UpdateJob::LibraryBuild { .. } => "library-build",
            UpdateJob::Remove { .. } => "remove",
        }
    }

    /// Database directory the job writes to.
    pub fn db_path(&self) -> &std::path::Path {
        match self {
            UpdateJob::FullBuild { target, .. }
            | UpdateJob::SingleUpdate { target, .. }
            | UpdateJob::Remove { target } => &target.db_path,
            UpdateJob::LibraryBuild { primary_db, .. } => primary_db,
        }
    }
}

impl fmt::Display for UpdateJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.db_path().display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options_args() {
        let args = IndexerOptions::default().to_args();
        assert_eq!(args, vec![OsString::from("--gtagslabel"), "default".into()]);
    }

    #[test]
    fn test_all_options_args() {
        let options = IndexerOptions {
            accept_dotfiles: true,
            skip_unreadable: true,
            skip_symlink: Some("f".to_string()),
            gtagsconf: Some(PathBuf::from("/etc/gtags.conf")),
            gtagslabel: "native-pygments".to_string(),
            force_cpp: false,
        };
        let args: Vec<String> = options
            .to_args()
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec![
                "--accept-dotfiles",
                "--skip-unreadable",
                "--skip-symlink=f",
                "--gtagsconf",
                "/etc/gtags.conf",
                "--gtagslabel",
                "native-pygments",
            ]
        );
    }

    #[test]
    fn test_bare_skip_symlink() {
        let options = IndexerOptions {
            skip_symlink: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(options.to_args()[0], OsString::from("--skip-symlink"));
    }

    #[test]
    fn test_job_display() {
        let job = UpdateJob::Remove {
            target: DbTarget::new("/proj", "/cache/%proj"),
        };
        assert_eq!(job.to_string(), "remove /cache/%proj");
    }
}
