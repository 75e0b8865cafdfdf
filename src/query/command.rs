//! `global` command lines.

use crate::update::Invocation;
use crate::utils::absolutize_from_cwd;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Project root the search tool reports paths against.
pub const ROOT_ENV: &str = "GTAGSROOT";
/// Database directory the search tool reads.
pub const DBPATH_ENV: &str = "GTAGSDBPATH";

/// What to look up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryMode {
    Definition(String),
    Reference(String),
    /// Symbols without a definition in the database.
    Symbol(String),
    Grep(String),
    /// Definition or reference of `word`, decided by the context at
    /// `file:line`.
    FromHere {
        line: usize,
        file: PathBuf,
        word: String,
    },
    /// Tags defined in the given files.
    FileTags { files: Vec<PathBuf> },
}

impl QueryMode {
    /// The pattern to highlight in results, if the mode has one.
    pub fn pattern(&self) -> Option<&str> {
        match self {
            Self::Definition(p) | Self::Reference(p) | Self::Symbol(p) | Self::Grep(p) => Some(p),
            Self::FromHere { word, .. } => Some(word),
            Self::FileTags { .. } => None,
        }
    }

    pub fn is_grep(&self) -> bool {
        matches!(self, Self::Grep(_))
    }

    fn to_args(&self) -> Vec<OsString> {
        let pattern_args = |flag: &str, pattern: &str| -> Vec<OsString> {
            vec![flag.into(), "-e".into(), pattern.into()]
        };
        match self {
            Self::Definition(p) => pattern_args("-d", p),
            Self::Reference(p) => pattern_args("-r", p),
            Self::Symbol(p) => pattern_args("-s", p),
            Self::Grep(p) => pattern_args("-g", p),
            Self::FromHere { line, file, word } => vec![
                "--from-here".into(),
                format!("{}:{}", line, file.display()).into(),
                word.into(),
            ],
            Self::FileTags { files } => {
                let mut args: Vec<OsString> = vec!["-f".into()];
                args.extend(files.iter().map(|f| f.as_os_str().to_os_string()));
                args.push("-q".into());
                args
            }
        }
    }
}

/// Path format of result lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathStyle {
    Relative,
    Absolute,
    Shorter,
    /// Absolute for library results, relative otherwise.
    Abslib,
    Through,
}

impl PathStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Relative => "relative",
            Self::Absolute => "absolute",
            Self::Shorter => "shorter",
            Self::Abslib => "abslib",
            Self::Through => "through",
        }
    }
}

impl fmt::Display for PathStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PathStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "relative" => Ok(Self::Relative),
            "absolute" => Ok(Self::Absolute),
            "shorter" => Ok(Self::Shorter),
            "abslib" => Ok(Self::Abslib),
            "through" => Ok(Self::Through),
            other => Err(format!("unknown path style '{}'", other)),
        }
    }
}

/// Flags shared by every database a query touches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    pub path_style: Option<PathStyle>,
    /// Restrict results to this directory.
    pub scope: Option<PathBuf>,
    pub literal: bool,
    pub ignore_case: bool,
    /// Keep the highlight patterns of previous queries.
    pub append: bool,
}

/// One `global` query, runnable against the primary or a library database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalQuery {
    program: OsString,
    gtagsconf: Option<PathBuf>,
    gtagslabel: String,
    mode: QueryMode,
    options: QueryOptions,
}

impl GlobalQuery {
    pub fn new(program: impl Into<OsString>, mode: QueryMode, options: QueryOptions) -> Self {
        let mut options = options;
        options.scope = options.scope.map(|scope| absolutize_from_cwd(&scope));
        Self {
            program: program.into(),
            gtagsconf: None,
            gtagslabel: "default".to_string(),
            mode,
            options,
        }
    }

    pub fn with_gtagsconf(mut self, gtagsconf: Option<PathBuf>) -> Self {
        self.gtagsconf = gtagsconf;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.gtagslabel = label.into();
        self
    }

    pub fn mode(&self) -> &QueryMode {
        &self.mode
    }

    pub fn options(&self) -> &QueryOptions {
        &self.options
    }

    /// Argument vector. Library databases get `-q` and report `abslib`
    /// paths as absolute.
    pub fn to_args(&self, library: bool) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::new();
        if let Some(conf) = &self.gtagsconf {
            args.push("--gtagsconf".into());
            args.push(conf.as_os_str().to_os_string());
        }
        args.push(format!("--gtagslabel={}", self.gtagslabel).into());
        args.extend(self.mode.to_args());

        if let Some(style) = self.options.path_style {
            let style = match style {
                PathStyle::Abslib if library => PathStyle::Absolute,
                other => other,
            };
            args.push("--path-style".into());
            args.push(style.as_str().into());
        }

        if self.mode.pattern().is_some() {
            if let Some(scope) = &self.options.scope {
                args.push("--scope".into());
                args.push(scope.as_os_str().to_os_string());
            }
            if self.options.literal {
                args.push("--literal".into());
            }
            if self.options.ignore_case {
                args.push("-i".into());
            }
        }

        args.push("--color=never".into());
        args.push("--result=ctags-mod".into());
        if library {
            args.push("-q".into());
        }
        args
    }

    /// Invocation against the database at `db_path` for project `root`.
    pub fn invocation(&self, root: &Path, db_path: &Path, library: bool) -> Invocation {
        Invocation::new(&self.program)
            .args(self.to_args(library))
            .env(ROOT_ENV, root)
            .env(DBPATH_ENV, db_path)
    }
}
