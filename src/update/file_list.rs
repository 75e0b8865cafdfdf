//! File-list commands piped into the indexer during a full build.
//!
//! When a command is available its output replaces the indexer's own tree
//! walk, so ignore rules of the VCS or search tool apply to the index.

use crate::config::FileListConfig;
use crate::error::{StoreError, StoreResult};
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

/// Listing tools probed on `PATH`, in order of preference.
pub const LISTING_TOOLS: &[&str] = &["rg", "ag", "find"];

/// Builds the shell command that lists indexable files under a root.
#[derive(Debug, Clone)]
pub struct FileListBuilder {
    config: FileListConfig,
    available: HashSet<String>,
}

impl FileListBuilder {
    /// Probe `PATH` for the listing tools.
    ///
    /// An explicitly configured `default_tool` that cannot be found is a
    /// configuration error, reported now rather than at the first build.
    pub fn new(config: FileListConfig) -> StoreResult<Self> {
        let available = LISTING_TOOLS
            .iter()
            .filter(|tool| which::which(tool).is_ok())
            .map(|tool| tool.to_string())
            .collect();
        Self::with_available(config, available)
    }

    /// Use a fixed set of available tools instead of probing `PATH`.
    pub fn with_available(config: FileListConfig, available: HashSet<String>) -> StoreResult<Self> {
        if let Some(tool) = config.default_tool.as_deref() {
            if !LISTING_TOOLS.contains(&tool) {
                return Err(StoreError::Configuration(format!(
                    "unsupported default tool '{}' (expected one of {})",
                    tool,
                    LISTING_TOOLS.join(", ")
                )));
            }
            if !available.contains(tool) {
                return Err(StoreError::Configuration(format!(
                    "executable '{}' can not be found",
                    tool
                )));
            }
        }
        Ok(Self { config, available })
    }

    /// Shell command listing files under `root`, or `None` to let the
    /// indexer walk the tree itself.
    pub fn command_for(&self, root: &Path) -> Option<String> {
        if !self.config.files_from_explorer {
            return self.configured_command(root);
        }

        let dir = root.to_string_lossy();
        if !dir.is_ascii() {
            debug!(root = %dir, "Non-ASCII root, letting the indexer walk the tree");
            return None;
        }

        if let Some(external) = &self.config.external_command {
            return Some(external.replace("%s", &format!("\"{}\"", dir)));
        }

        if self.config.use_version_control_tool {
            if exists_upward(root, ".git") {
                return Some(self.git_command(&dir));
            }
            if exists_upward(root, ".hg") {
                return Some(self.hg_command(&dir));
            }
        }

        let wanted = |tool: &str| {
            self.config
                .default_tool
                .as_deref()
                .map_or(true, |chosen| chosen == tool)
                && self.available.contains(tool)
        };

        if wanted("rg") {
            Some(self.rg_command(&dir))
        } else if wanted("ag") && !cfg!(windows) {
            Some(self.ag_command(&dir))
        } else if wanted("find") && !cfg!(windows) {
            Some(self.find_command(&dir))
        } else {
            None
        }
    }

    /// Per-VCS command from `files_cmd`, keyed by `.git`, `.hg` or `default`.
    fn configured_command(&self, root: &Path) -> Option<String> {
        let key = if root.join(".git").is_dir() {
            ".git"
        } else if root.join(".hg").is_dir() {
            ".hg"
        } else {
            "default"
        };
        self.config.files_cmd.get(key).cloned()
    }

    /// Wildignore entries, dropping dotted ones unless hidden files are shown.
    fn visible_ignores(&self) -> impl Iterator<Item = &String> {
        let show_hidden = self.config.show_hidden;
        self.config
            .wildignore_dirs
            .iter()
            .chain(self.config.wildignore_files.iter())
            .filter(move |pattern| show_hidden || !pattern.starts_with('.'))
    }

    fn git_command(&self, dir: &str) -> String {
        let ignore: String = self
            .config
            .wildignore_dirs
            .iter()
            .chain(self.config.wildignore_files.iter())
            .filter(|pattern| pattern.as_str() != ".git")
            .map(|pattern| format!(" -x \"{}\"", pattern))
            .collect();
        let recurse = if self.config.recurse_submodules {
            " --recurse-submodules"
        } else {
            ""
        };
        format!(
            "git ls-files{} \"{}\" && git ls-files --others --exclude-standard{} \"{}\"",
            recurse, dir, ignore, dir
        )
    }

    fn hg_command(&self, dir: &str) -> String {
        let ignore: String = self
            .config
            .wildignore_dirs
            .iter()
            .filter(|pattern| pattern.as_str() != ".hg")
            .map(|pattern| format!(" -X \"glob:**/{}/**\"", pattern))
            .chain(
                self.config
                    .wildignore_files
                    .iter()
                    .map(|pattern| format!(" -X \"glob:**/{}\"", pattern)),
            )
            .collect();
        format!("hg files{} \"{}\"", ignore, dir)
    }

    fn rg_command(&self, dir: &str) -> String {
        let mut cmd = String::from("rg --no-messages --files");
        if !cfg!(windows) {
            cmd.push_str(" --color never");
        }
        for pattern in self.visible_ignores() {
            if cfg!(windows) {
                cmd.push_str(&format!(" -g \"!{}\"", pattern));
            } else {
                cmd.push_str(&format!(" -g '!{}'", pattern));
            }
        }
        if self.config.follow_links {
            cmd.push_str(" -L");
        }
        if self.config.show_hidden {
            cmd.push_str(" --hidden");
        }
        if dir != "." {
            cmd.push_str(&format!(" \"{}\"", dir));
        }
        cmd
    }

    fn ag_command(&self, dir: &str) -> String {
        let mut cmd = String::from("ag --nocolor --silent");
        for pattern in self.visible_ignores() {
            cmd.push_str(&format!(" --ignore \"{}\"", pattern));
        }
        if self.config.follow_links {
            cmd.push_str(" -f");
        }
        if self.config.show_hidden {
            cmd.push_str(" --hidden");
        }
        cmd.push_str(&format!(" -g \"\" \"{}\"", dir));
        cmd
    }

    fn find_command(&self, dir: &str) -> String {
        let mut cmd = String::from("find");
        if self.config.follow_links {
            cmd.push_str(" -L");
        }
        cmd.push_str(&format!(" \"{}\" -name \".\" -o", dir));
        for pattern in &self.config.wildignore_dirs {
            cmd.push_str(&format!(" -type d -name \"{}\" -prune -o", pattern));
        }
        for pattern in &self.config.wildignore_files {
            cmd.push_str(&format!(" -type f -name \"{}\" -o", pattern));
        }
        if !self.config.show_hidden {
            cmd.push_str(" -name \".*\" -prune -o");
        }
        cmd.push_str(" -type f -print 2>/dev/null");
        cmd
    }
}

/// Whether a directory named `name` exists in `path` or any ancestor.
fn exists_upward(path: &Path, name: &str) -> bool {
    path.ancestors().any(|dir| dir.join(name).is_dir())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn available(tools: &[&str]) -> HashSet<String> {
        tools.iter().map(|t| t.to_string()).collect()
    }

    fn plain_config() -> FileListConfig {
        FileListConfig {
            use_version_control_tool: false,
            wildignore_dirs: vec![".git".to_string(), "build".to_string()],
            wildignore_files: vec!["*.o".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_default_tool_is_configuration_error() {
        let config = FileListConfig {
            default_tool: Some("ag".to_string()),
            ..Default::default()
        };
        let err = FileListBuilder::with_available(config, available(&["rg"])).unwrap_err();
        assert!(matches!(err, StoreError::Configuration(_)));
    }

    #[test]
    fn test_unknown_default_tool_is_configuration_error() {
        let config = FileListConfig {
            default_tool: Some("fd".to_string()),
            ..Default::default()
        };
        assert!(FileListBuilder::with_available(config, available(&["fd"])).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_rg_command_skips_hidden_ignores() {
        let temp = TempDir::new().unwrap();
        let builder = FileListBuilder::with_available(plain_config(), available(&["rg"])).unwrap();
        let cmd = builder.command_for(temp.path()).unwrap();
        assert!(cmd.starts_with("rg --no-messages --files --color never"));
        assert!(cmd.contains("-g '!build'"));
        assert!(cmd.contains("-g '!*.o'"));
        assert!(!cmd.contains(".git"));
        assert!(cmd.ends_with(&format!("\"{}\"", temp.path().display())));
    }

    #[cfg(unix)]
    #[test]
    fn test_default_tool_restricts_choice() {
        let temp = TempDir::new().unwrap();
        let config = FileListConfig {
            default_tool: Some("find".to_string()),
            ..plain_config()
        };
        let builder = FileListBuilder::with_available(config, available(&["rg", "find"])).unwrap();
        let cmd = builder.command_for(temp.path()).unwrap();
        assert!(cmd.starts_with("find \""));
        assert!(cmd.contains("-type d -name \"build\" -prune -o"));
        assert!(cmd.ends_with("-type f -print 2>/dev/null"));
    }

    #[test]
    fn test_no_tool_available() {
        let temp = TempDir::new().unwrap();
        let builder = FileListBuilder::with_available(plain_config(), HashSet::new()).unwrap();
        assert_eq!(builder.command_for(temp.path()), None);
    }

    #[test]
    fn test_git_repository_uses_ls_files() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join(".git")).unwrap();
        let config = FileListConfig {
            use_version_control_tool: true,
            ..plain_config()
        };
        let builder = FileListBuilder::with_available(config, available(&["rg"])).unwrap();
        let cmd = builder.command_for(temp.path()).unwrap();
        assert!(cmd.starts_with("git ls-files \""));
        assert!(cmd.contains("--others --exclude-standard -x \"build\" -x \"*.o\""));
    }

    #[test]
    fn test_external_command_substitutes_root() {
        let temp = TempDir::new().unwrap();
        let config = FileListConfig {
            external_command: Some("fd --type f . %s".to_string()),
            ..plain_config()
        };
        let builder = FileListBuilder::with_available(config, HashSet::new()).unwrap();
        assert_eq!(
            builder.command_for(temp.path()).unwrap(),
            format!("fd --type f . \"{}\"", temp.path().display())
        );
    }

    #[test]
    fn test_configured_files_cmd_by_vcs() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join(".hg")).unwrap();
        let mut files_cmd = HashMap::new();
        files_cmd.insert(".git".to_string(), "git ls-files".to_string());
        files_cmd.insert(".hg".to_string(), "hg files".to_string());
        let config = FileListConfig {
            files_from_explorer: false,
            files_cmd,
            ..Default::default()
        };
        let builder = FileListBuilder::with_available(config, HashSet::new()).unwrap();
        assert_eq!(builder.command_for(temp.path()).as_deref(), Some("hg files"));
    }
}
