//! Configuration management for tagdb
//!
//! Supports loading configuration from TOML files with environment and CLI
//! overrides.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::update::{FileListBuilder, IndexerOptions};
use crate::utils::expand_tilde;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub gtags: GtagsConfig,

    #[serde(default)]
    pub file_list: FileListConfig,
}

/// Where databases live and how project roots are recognised
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Base cache directory; databases go under `<cache_directory>/tagdb/gtags`.
    /// Defaults to the platform cache directory.
    /// Can be overridden by env var TAGDB_CACHE_DIR
    #[serde(default)]
    pub cache_directory: Option<String>,

    /// Entries whose presence marks a project root
    #[serde(default = "default_root_markers")]
    pub root_markers: Vec<String>,
}

/// Settings for the `gtags` indexer and `global` search tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GtagsConfig {
    /// Index files whose names start with a dot
    #[serde(default)]
    pub accept_dotfiles: bool,

    /// Skip unreadable files instead of failing
    #[serde(default)]
    pub skip_unreadable: bool,

    /// Skip symbolic links: "" for all, or a type such as "f", "d" or "a"
    #[serde(default)]
    pub skip_symlink: Option<String>,

    /// Alternate gtags.conf
    #[serde(default)]
    pub gtagsconf: Option<String>,

    /// Label in gtags.conf selecting the parser
    #[serde(default = "default_gtagslabel")]
    pub gtagslabel: String,

    /// Library directories indexed next to every project
    #[serde(default)]
    pub lib_paths: Vec<String>,

    /// Parse `.h` headers as C++
    #[serde(default = "default_true")]
    pub force_cpp: bool,

    /// Indexer executable
    #[serde(default = "default_indexer_program")]
    pub indexer_program: String,

    /// Search executable
    #[serde(default = "default_query_program")]
    pub query_program: String,
}

/// How the file list fed to the indexer is produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileListConfig {
    /// Derive the list from VCS / search tools. When false, `files_cmd` is used.
    #[serde(default = "default_true")]
    pub files_from_explorer: bool,

    /// Commands keyed by ".git", ".hg" or "default"
    #[serde(default)]
    pub files_cmd: HashMap<String, String>,

    /// Custom listing command; `%s` is replaced by the quoted project root
    #[serde(default)]
    pub external_command: Option<String>,

    /// Prefer `git ls-files` / `hg files` inside repositories
    #[serde(default = "default_true")]
    pub use_version_control_tool: bool,

    #[serde(default)]
    pub recurse_submodules: bool,

    /// Force one of "rg", "ag" or "find"
    #[serde(default)]
    pub default_tool: Option<String>,

    #[serde(default)]
    pub show_hidden: bool,

    #[serde(default)]
    pub follow_links: bool,

    #[serde(default = "default_wildignore_dirs")]
    pub wildignore_dirs: Vec<String>,

    #[serde(default = "default_wildignore_files")]
    pub wildignore_files: Vec<String>,
}

fn default_root_markers() -> Vec<String> {
    vec![".git".to_string(), ".hg".to_string(), ".svn".to_string()]
}

fn default_gtagslabel() -> String {
    "default".to_string()
}

fn default_indexer_program() -> String {
    "gtags".to_string()
}

fn default_query_program() -> String {
    "global".to_string()
}

fn default_wildignore_dirs() -> Vec<String> {
    vec![".svn".to_string(), ".git".to_string(), ".hg".to_string()]
}

fn default_wildignore_files() -> Vec<String> {
    ["*.sw?", "~$*", "*.bak", "*.exe", "*.o", "*.so", "*.py[co]"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_true() -> bool {
    true
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            cache_directory: None,
            root_markers: default_root_markers(),
        }
    }
}

impl Default for GtagsConfig {
    fn default() -> Self {
        Self {
            accept_dotfiles: false,
            skip_unreadable: false,
            skip_symlink: None,
            gtagsconf: None,
            gtagslabel: default_gtagslabel(),
            lib_paths: Vec::new(),
            force_cpp: true,
            indexer_program: default_indexer_program(),
            query_program: default_query_program(),
        }
    }
}

impl Default for FileListConfig {
    fn default() -> Self {
        Self {
            files_from_explorer: true,
            files_cmd: HashMap::new(),
            external_command: None,
            use_version_control_tool: true,
            recurse_submodules: false,
            default_tool: None,
            show_hidden: false,
            follow_links: false,
            wildignore_dirs: default_wildignore_dirs(),
            wildignore_files: default_wildignore_files(),
        }
    }
}

impl StoreConfig {
    /// Directory holding one database directory per project root
    pub fn db_root(&self) -> PathBuf {
        let base = match &self.cache_directory {
            Some(dir) => expand_tilde(dir),
            None => dirs::cache_dir()
                .or_else(dirs::home_dir)
                .unwrap_or_else(std::env::temp_dir),
        };
        base.join("tagdb").join("gtags")
    }
}

impl GtagsConfig {
    /// Indexer switches derived from this configuration.
    ///
    /// On Windows without an explicit `gtagsconf`, the configuration shipped
    /// next to the indexer (`<bin>/../share/gtags/gtags.conf`) is used.
    pub fn indexer_options(&self) -> IndexerOptions {
        IndexerOptions {
            accept_dotfiles: self.accept_dotfiles,
            skip_unreadable: self.skip_unreadable,
            skip_symlink: self.skip_symlink.clone(),
            gtagsconf: self.resolved_gtagsconf(),
            gtagslabel: self.gtagslabel.clone(),
            force_cpp: self.force_cpp,
        }
    }

    pub fn resolved_gtagsconf(&self) -> Option<PathBuf> {
        match self.gtagsconf.as_deref() {
            Some(conf) if !conf.is_empty() => Some(expand_tilde(conf)),
            _ if cfg!(windows) => self.bundled_gtagsconf(),
            _ => None,
        }
    }

    fn bundled_gtagsconf(&self) -> Option<PathBuf> {
        let exe = which::which(&self.indexer_program).ok()?;
        let bin_dir = exe.parent()?;
        let install_dir = bin_dir.parent()?;
        Some(install_dir.join("share").join("gtags").join("gtags.conf"))
    }

    /// Library paths with `~` expanded. Relative paths are made absolute by
    /// the store.
    pub fn library_paths(&self) -> Vec<PathBuf> {
        self.lib_paths.iter().map(|p| expand_tilde(p)).collect()
    }
}

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from default locations
    ///
    /// Search order:
    /// 1. TAGDB_CONFIG environment variable
    /// 2. ./tagdb.toml (current directory)
    /// 3. ~/.config/tagdb/config.toml (user config)
    pub fn from_default_locations() -> Result<Option<(Self, PathBuf)>> {
        if let Ok(env_path) = std::env::var("TAGDB_CONFIG") {
            let path = PathBuf::from(&env_path);
            if path.exists() {
                let config = Self::from_file(&path)?;
                return Ok(Some((config, path)));
            }
        }

        let local_path = PathBuf::from("tagdb.toml");
        if local_path.exists() {
            let config = Self::from_file(&local_path)?;
            return Ok(Some((config, local_path)));
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_path = config_dir.join("tagdb").join("config.toml");
            if user_path.exists() {
                let config = Self::from_file(&user_path)?;
                return Ok(Some((config, user_path)));
            }
        }

        Ok(None)
    }

    /// Generate a template configuration file
    pub fn generate_template() -> String {
        r#"# tagdb Configuration
# Generated template - customize as needed

[store]
# Base cache directory (default: platform cache directory)
# Databases are stored under <cache_directory>/tagdb/gtags
# Env override: TAGDB_CACHE_DIR
# cache_directory = "~/.cache"

# Files or directories marking a project root
root_markers = [".git", ".hg", ".svn"]

[gtags]
# Index dot files and dot directories
accept_dotfiles = false

# Ignore unreadable files instead of failing the build
skip_unreadable = false

# Skip symbolic links ("" = all, or "f", "d", "a")
# skip_symlink = ""

# Alternate configuration file and parser label
# gtagsconf = "/usr/local/share/gtags/gtags.conf"
gtagslabel = "default"

# Library directories indexed alongside every project
lib_paths = [
    # "/usr/include",
    # "~/src/vendor-sdk",
]

# Parse .h headers as C++
force_cpp = true

indexer_program = "gtags"
query_program = "global"

[file_list]
# Build the file list from VCS or search tools.
# When false, the command in files_cmd matching ".git", ".hg" or "default" is used.
files_from_explorer = true

# [file_list.files_cmd]
# ".git" = "git ls-files --recurse-submodules"
# ".hg" = "hg files"
# "default" = "rg --no-messages --files"

# Custom listing command, %s is replaced by the project root
# external_command = "fd --type f . %s"

use_version_control_tool = true
recurse_submodules = false

# Force one of "rg", "ag" or "find"
# default_tool = "rg"

show_hidden = false
follow_links = false

wildignore_dirs = [".svn", ".git", ".hg"]
wildignore_files = ["*.sw?", "~$*", "*.bak", "*.exe", "*.o", "*.so", "*.py[co]"]
"#
        .to_string()
    }

    /// Write template config to the specified path
    pub fn write_template(path: &Path) -> Result<()> {
        let template = Self::generate_template();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        std::fs::write(path, template)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Merge CLI overrides into the configuration
    pub fn with_overrides(
        mut self,
        cache_directory: Option<String>,
        gtagsconf: Option<String>,
        gtagslabel: Option<String>,
        extra_lib_paths: Vec<String>,
    ) -> Self {
        if let Some(dir) = cache_directory {
            self.store.cache_directory = Some(dir);
        }
        if let Some(conf) = gtagsconf {
            self.gtags.gtagsconf = Some(conf);
        }
        if let Some(label) = gtagslabel {
            self.gtags.gtagslabel = label;
        }
        self.gtags.lib_paths.extend(extra_lib_paths);
        self
    }

    /// Apply environment variable overrides.
    /// Env vars take precedence over TOML config values.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var("TAGDB_CACHE_DIR") {
            if !val.is_empty() {
                self.store.cache_directory = Some(val);
            }
        }
        self
    }

    /// Check settings that would otherwise fail at the first build.
    pub fn validate(&self) -> Result<()> {
        if self.store.root_markers.iter().any(|m| m.is_empty()) {
            anyhow::bail!("root_markers must not contain empty entries");
        }
        if self.gtags.gtagslabel.is_empty() {
            anyhow::bail!("gtagslabel must not be empty");
        }
        if self.file_list.default_tool.is_some() {
            FileListBuilder::new(self.file_list.clone())
                .context("Invalid [file_list] configuration")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.store.root_markers, [".git", ".hg", ".svn"]);
        assert_eq!(config.gtags.gtagslabel, "default");
        assert_eq!(config.gtags.indexer_program, "gtags");
        assert_eq!(config.gtags.query_program, "global");
        assert!(config.gtags.force_cpp);
        assert!(config.file_list.files_from_explorer);
        assert!(config.file_list.wildignore_files.contains(&"*.o".to_string()));
    }

    #[test]
    fn test_parse_minimal_config() {
        let toml = r#"
[store]
cache_directory = "/var/cache"

[gtags]
lib_paths = ["/usr/include"]
skip_symlink = "f"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.store.db_root(), PathBuf::from("/var/cache/tagdb/gtags"));
        assert_eq!(config.store.root_markers, [".git", ".hg", ".svn"]);
        assert_eq!(config.gtags.library_paths(), [PathBuf::from("/usr/include")]);
        assert_eq!(config.gtags.skip_symlink.as_deref(), Some("f"));
        assert_eq!(config.gtags.gtagslabel, "default");
    }

    #[test]
    fn test_parse_files_cmd_table() {
        let toml = r#"
[file_list]
files_from_explorer = false

[file_list.files_cmd]
".git" = "git ls-files"
"default" = "rg --files"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert!(!config.file_list.files_from_explorer);
        assert_eq!(config.file_list.files_cmd[".git"], "git ls-files");
        assert_eq!(config.file_list.files_cmd.len(), 2);
    }

    #[test]
    fn test_generate_template() {
        let template = Config::generate_template();
        assert!(template.contains("[store]"));
        assert!(template.contains("[gtags]"));
        assert!(template.contains("[file_list]"));

        let config: Config = toml::from_str(&template).unwrap();
        assert_eq!(config.store.root_markers, [".git", ".hg", ".svn"]);
        assert_eq!(config.file_list.wildignore_dirs, [".svn", ".git", ".hg"]);
    }

    #[test]
    fn test_write_template_round_trip() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("nested").join("tagdb.toml");
        Config::write_template(&path).unwrap();
        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.gtags.gtagslabel, "default");
    }

    #[test]
    fn test_with_overrides() {
        let config = Config::default().with_overrides(
            Some("/tmp/cache".to_string()),
            None,
            Some("native".to_string()),
            vec!["/opt/lib".to_string()],
        );
        assert_eq!(config.store.cache_directory.as_deref(), Some("/tmp/cache"));
        assert_eq!(config.gtags.gtagslabel, "native");
        assert_eq!(config.gtags.lib_paths, ["/opt/lib"]);
    }

    #[cfg(not(windows))]
    #[test]
    fn test_indexer_options_follow_config() {
        let gtags = GtagsConfig {
            accept_dotfiles: true,
            gtagsconf: Some("/etc/gtags.conf".to_string()),
            force_cpp: false,
            ..Default::default()
        };
        let options = gtags.indexer_options();
        assert!(options.accept_dotfiles);
        assert!(!options.force_cpp);
        assert_eq!(options.gtagsconf, Some(PathBuf::from("/etc/gtags.conf")));

        assert_eq!(GtagsConfig::default().indexer_options().gtagsconf, None);
    }

    #[test]
    fn test_validate_rejects_empty_marker() {
        let mut config = Config::default();
        config.store.root_markers.push(String::new());
        assert!(config.validate().is_err());
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_unknown_default_tool() {
        let mut config = Config::default();
        config.file_list.default_tool = Some("pt".to_string());
        assert!(config.validate().is_err());
    }
}
