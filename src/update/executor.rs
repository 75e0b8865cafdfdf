//! Execution of a single update job against the external indexer.

use super::command::{build_invocation, single_update_invocation, Invocation};
use super::file_list::FileListBuilder;
use super::job::{DbTarget, IndexerOptions, UpdateJob};
use crate::error::{StoreError, StoreResult};
use crate::store::{LibraryEntry, LibraryRegistry, INDEX_FILE};
use crate::utils::format_millis;
use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Stdio};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// What a successfully handled job did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// The job ran to completion.
    Completed,
    /// An indexer process was started and left running.
    Launched,
    /// Nothing to do, with the reason.
    Skipped(String),
}

/// Runs one job. Implementations are called from the update worker only,
/// so they never run concurrently with each other.
pub trait JobExecutor: Send + Sync {
    fn execute(&self, job: &UpdateJob) -> StoreResult<JobOutcome>;
}

/// Yes/no question asked before destructive operations.
pub trait Confirm: Send + Sync {
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F> Confirm for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

/// Executor driving the real `gtags` binary.
pub struct GtagsExecutor {
    program: OsString,
    file_list: Option<FileListBuilder>,
    confirm: Arc<dyn Confirm>,
}

impl GtagsExecutor {
    pub fn new(
        program: impl Into<OsString>,
        file_list: Option<FileListBuilder>,
        confirm: Arc<dyn Confirm>,
    ) -> Self {
        Self {
            program: program.into(),
            file_list,
            confirm,
        }
    }

    fn full_build(&self, target: &DbTarget, options: &IndexerOptions) -> StoreResult<JobOutcome> {
        create_db_dir(&target.db_path)?;

        let lister = self
            .file_list
            .as_ref()
            .and_then(|builder| builder.command_for(&target.root))
            .map(|cmd| Invocation::shell(&cmd).current_dir(&target.root));
        let indexer = build_invocation(&self.program, target, options, lister.is_some());

        info!(root = %target.root.display(), db = %target.db_path.display(), "Building tag database");
        run_to_completion(&indexer, lister.as_ref())?;
        info!(db = %target.db_path.display(), "Tag database generated successfully");
        Ok(JobOutcome::Completed)
    }

    fn single_update(
        &self,
        target: &DbTarget,
        file: &Path,
        options: &IndexerOptions,
    ) -> StoreResult<JobOutcome> {
        if !target.db_path.join(INDEX_FILE).exists() {
            return Ok(JobOutcome::Skipped(format!(
                "no database at {}",
                target.db_path.display()
            )));
        }

        let invocation = single_update_invocation(&self.program, target, file, options);
        debug!(command = %invocation.command_line(), "Launching single-file update");
        let child = invocation
            .to_command()
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| invocation.io_error(e))?;
        reap_detached(child, file.to_path_buf());
        Ok(JobOutcome::Launched)
    }

    fn library_build(
        &self,
        primary_db: &Path,
        libraries: &[LibraryEntry],
        options: &IndexerOptions,
    ) -> StoreResult<JobOutcome> {
        let written = LibraryRegistry::at(primary_db).write(libraries)?;
        if written.is_empty() {
            return Ok(JobOutcome::Skipped("no existing library roots".to_string()));
        }

        let mut failures = Vec::new();
        for library in &written {
            let target = DbTarget::new(&library.root, &library.db_path);
            let result = create_db_dir(&target.db_path).and_then(|_| {
                let invocation = build_invocation(&self.program, &target, options, false);
                info!(library = %target.root.display(), "Building library tag database");
                run_to_completion(&invocation, None)
            });
            if let Err(e) = result {
                error!(library = %library.root.display(), error = %e, "Library build failed");
                failures.push(library.root.display().to_string());
            }
        }

        if failures.is_empty() {
            Ok(JobOutcome::Completed)
        } else {
            Err(StoreError::ExternalProcess {
                command: "library build".to_string(),
                message: format!("failed for {}", failures.join(", ")),
            })
        }
    }

    fn remove(&self, target: &DbTarget) -> StoreResult<JobOutcome> {
        let prompt = format!(
            "Are you sure you want to remove directory `{}`?[Ny] ",
            target.db_path.display()
        );
        if !self.confirm.confirm(&prompt) {
            return Err(StoreError::UserDeclinedConfirmation {
                path: target.db_path.clone(),
            });
        }
        std::fs::remove_dir_all(&target.db_path)
            .map_err(|e| StoreError::fs(&target.db_path, e))?;
        info!(db = %target.db_path.display(), "Removed tag database");
        Ok(JobOutcome::Completed)
    }
}

impl JobExecutor for GtagsExecutor {
    fn execute(&self, job: &UpdateJob) -> StoreResult<JobOutcome> {
        match job {
            UpdateJob::FullBuild { target, options } => self.full_build(target, options),
            UpdateJob::SingleUpdate {
                target,
                file,
                options,
            } => self.single_update(target, file, options),
            UpdateJob::LibraryBuild {
                primary_db,
                libraries,
                options,
            } => self.library_build(primary_db, libraries, options),
            UpdateJob::Remove { target } => self.remove(target),
        }
    }
}

fn create_db_dir(db_path: &Path) -> StoreResult<()> {
    std::fs::create_dir_all(db_path).map_err(|e| StoreError::fs(db_path, e))
}

/// Run `indexer` (optionally fed by `lister`'s stdout) and wait for both.
///
/// Fails on a non-zero exit or on any standard error output from the indexer.
fn run_to_completion(indexer: &Invocation, lister: Option<&Invocation>) -> StoreResult<()> {
    let start = Instant::now();
    let mut command = indexer.to_command();
    command.stdout(Stdio::null()).stderr(Stdio::piped());

    let mut lister_child = match lister {
        Some(lister) => {
            debug!(command = %lister.command_line(), "Listing files");
            let mut child = lister
                .to_command()
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::null())
                .spawn()
                .map_err(|e| lister.io_error(e))?;
            if let Some(stdout) = child.stdout.take() {
                command.stdin(Stdio::from(stdout));
            }
            Some(child)
        }
        None => {
            command.stdin(Stdio::null());
            None
        }
    };

    debug!(command = %indexer.command_line(), "Running indexer");
    let result = command
        .spawn()
        .map_err(|e| indexer.io_error(e))
        .and_then(|child| wait_for_indexer(indexer, child));

    if let Some(mut child) = lister_child.take() {
        if result.is_err() {
            let _ = child.kill();
        }
        if let Err(e) = child.wait() {
            warn!(error = %e, "Failed to wait for file lister");
        }
    }

    if result.is_ok() {
        debug!(
            elapsed = %format_millis(start.elapsed().as_millis()),
            "Indexer finished"
        );
    }
    result
}

fn wait_for_indexer(invocation: &Invocation, mut child: Child) -> StoreResult<()> {
    let mut bytes = Vec::new();
    let read = match child.stderr.take() {
        Some(mut pipe) => pipe.read_to_end(&mut bytes).map(|_| ()),
        None => Ok(()),
    };
    let status = child.wait().map_err(|e| invocation.io_error(e))?;
    read.map_err(|e| invocation.io_error(e))?;

    let stderr = String::from_utf8_lossy(&bytes);
    let stderr = stderr.trim();
    if !stderr.is_empty() {
        return Err(invocation.failure(stderr));
    }
    if !status.success() {
        return Err(invocation.failure(format!("exited with {}", status)));
    }
    Ok(())
}

/// Wait for a detached indexer on a helper thread so it does not linger as a
/// zombie; the update worker has already moved on.
fn reap_detached(mut child: Child, file: PathBuf) {
    let spawned = std::thread::Builder::new()
        .name("tagdb-single-update".to_string())
        .spawn(move || match child.wait() {
            Ok(status) if status.success() => {
                debug!(file = %file.display(), "Single-file update finished")
            }
            Ok(status) => warn!(file = %file.display(), %status, "Single-file update failed"),
            Err(e) => warn!(file = %file.display(), error = %e, "Failed to wait for single-file update"),
        });
    if let Err(e) = spawned {
        warn!(error = %e, "Failed to spawn reaper thread for single-file update");
    }
}
