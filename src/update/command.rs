//! Construction of external command lines.
//!
//! Building an invocation is pure; running it is left to the executor and
//! the query session. Keeping the two apart lets the exact command lines be
//! unit tested without the tools installed.

use super::job::{DbTarget, IndexerOptions};
use crate::error::StoreError;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Environment variable that forces `.h` files to be parsed as C++.
pub const FORCE_CPP_ENV: &str = "GTAGSFORCECPP";

/// A program, its arguments, working directory and extra environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: OsString,
    pub args: Vec<OsString>,
    pub current_dir: Option<PathBuf>,
    pub envs: Vec<(OsString, OsString)>,
}

impl Invocation {
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        Self {
            program: program.as_ref().to_os_string(),
            args: Vec::new(),
            current_dir: None,
            envs: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl AsRef<OsStr>, value: impl AsRef<OsStr>) -> Self {
        self.envs
            .push((key.as_ref().to_os_string(), value.as_ref().to_os_string()));
        self
    }

    /// Shell invocation for a user-supplied command string.
    pub fn shell(command: &str) -> Self {
        if cfg!(windows) {
            Self::new("cmd").arg("/C").arg(command)
        } else {
            Self::new("sh").arg("-c").arg(command)
        }
    }

    pub fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }
        for (key, value) in &self.envs {
            command.env(key, value);
        }
        command
    }

    /// Human-readable command line for logs and error messages.
    pub fn command_line(&self) -> String {
        let mut line = self.program.to_string_lossy().into_owned();
        for arg in &self.args {
            let arg = arg.to_string_lossy();
            line.push(' ');
            if arg.contains(char::is_whitespace) || arg.is_empty() {
                line.push('"');
                line.push_str(&arg);
                line.push('"');
            } else {
                line.push_str(&arg);
            }
        }
        line
    }

    /// Spawning or talking to the process failed.
    pub(crate) fn io_error(&self, e: std::io::Error) -> StoreError {
        StoreError::ExternalProcess {
            command: self.command_line(),
            message: e.to_string(),
        }
    }

    /// The process ran but reported failure.
    pub(crate) fn failure(&self, message: impl Into<String>) -> StoreError {
        StoreError::ExternalProcess {
            command: self.command_line(),
            message: message.into(),
        }
    }
}

fn indexer_base(program: &OsStr, root: &Path, options: &IndexerOptions) -> Invocation {
    let mut invocation = Invocation::new(program)
        .current_dir(root)
        .args(options.to_args());
    if options.force_cpp {
        invocation = invocation.env(FORCE_CPP_ENV, "");
    }
    invocation
}

/// `gtags [opts] [-f-] DBPATH`, run in the project root.
///
/// With `files_from_stdin` the indexer reads the file list from standard
/// input instead of walking the tree itself.
pub fn build_invocation(
    program: &OsStr,
    target: &DbTarget,
    options: &IndexerOptions,
    files_from_stdin: bool,
) -> Invocation {
    let mut invocation = indexer_base(program, &target.root, options);
    if files_from_stdin {
        invocation = invocation.arg("-f-");
    }
    invocation.arg(&target.db_path)
}

/// `gtags [opts] --single-update FILE DBPATH`, run in the project root.
pub fn single_update_invocation(
    program: &OsStr,
    target: &DbTarget,
    file: &Path,
    options: &IndexerOptions,
) -> Invocation {
    indexer_base(program, &target.root, options)
        .arg("--single-update")
        .arg(file)
        .arg(&target.db_path)
}
