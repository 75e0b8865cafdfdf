//! Caller-facing facade over root resolution, the update worker and queries.
//!
//! A [`TagStore`] owns one [`RootResolver`] (behind a mutex, since its cache
//! is mutated on every resolution), one [`UpdateScheduler`] and one
//! [`QuerySession`]. All index mutations go through the scheduler; queries
//! run on the caller's thread.

use crate::config::Config;
use crate::error::StoreResult;
use crate::highlight::{self, Dialect};
use crate::query::{GlobalQuery, QueryMode, QueryOptions, QuerySession, QueryTarget, ResultLine};
use crate::store::{FsProbe, LibraryEntry, LibraryRegistry, RealFs, ResolvedRoot, RootResolver};
use crate::update::{
    Confirm, DbTarget, FileListBuilder, GtagsExecutor, IndexerOptions, JobExecutor, UpdateJob,
    UpdateScheduler,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

/// Why an update was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateRequest {
    /// Explicit rebuild of the project database.
    Build,
    /// A file was saved; re-index just that file if a database exists.
    SingleFile,
    /// A file was opened; build only if it belongs to a marker-based project
    /// that has no database yet.
    AutoGenerate,
}

/// Settings a store needs besides the resolver and executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    pub indexer_options: IndexerOptions,
    pub library_paths: Vec<PathBuf>,
    pub query_program: String,
}

impl StoreSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            indexer_options: config.gtags.indexer_options(),
            library_paths: config.gtags.library_paths(),
            query_program: config.gtags.query_program.clone(),
        }
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            indexer_options: IndexerOptions::default(),
            library_paths: Vec::new(),
            query_program: "global".to_string(),
        }
    }
}

pub struct TagStore<P: FsProbe = RealFs> {
    resolver: Mutex<RootResolver<P>>,
    scheduler: UpdateScheduler,
    session: QuerySession,
    settings: StoreSettings,
}

impl TagStore<RealFs> {
    /// Store backed by the real filesystem and the `gtags` / `global` tools.
    pub fn open(config: &Config, confirm: Arc<dyn Confirm>) -> StoreResult<Self> {
        let file_list = FileListBuilder::new(config.file_list.clone())?;
        let executor = GtagsExecutor::new(
            config.gtags.indexer_program.clone(),
            Some(file_list),
            confirm,
        );
        let resolver = RootResolver::new(config.store.root_markers.clone(), config.store.db_root());
        Self::with_parts(resolver, Arc::new(executor), StoreSettings::from_config(config))
    }
}

impl<P: FsProbe> TagStore<P> {
    /// Assemble a store from its parts and start the update worker.
    pub fn with_parts(
        resolver: RootResolver<P>,
        executor: Arc<dyn JobExecutor>,
        settings: StoreSettings,
    ) -> StoreResult<Self> {
        let scheduler = UpdateScheduler::start(executor)?;
        info!(
            db_root = %resolver.db_root().display(),
            libraries = settings.library_paths.len(),
            "Tag store ready"
        );
        Ok(Self {
            resolver: Mutex::new(resolver),
            scheduler,
            session: QuerySession::new(),
            settings,
        })
    }

    fn resolver(&self) -> MutexGuard<'_, RootResolver<P>> {
        self.resolver.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Project root, database location and index presence for `filename`.
    pub fn resolve(&self, filename: &Path) -> ResolvedRoot {
        self.resolver().resolve(filename)
    }

    /// Queue the jobs `request` calls for. Returns the number queued.
    pub fn submit_update(&self, filename: &Path, request: UpdateRequest) -> StoreResult<usize> {
        if filename.as_os_str().is_empty() {
            return Ok(0);
        }

        let (resolved, wants_build) = {
            let mut resolver = self.resolver();
            let resolved = resolver.resolve(filename);
            let wants_build = match request {
                UpdateRequest::Build => true,
                UpdateRequest::SingleFile => false,
                UpdateRequest::AutoGenerate => {
                    !resolved.index_exists && resolver.is_under_marker_root(filename)
                }
            };
            (resolved, wants_build)
        };
        let target = DbTarget::new(&resolved.root, &resolved.db_path);
        let options = self.settings.indexer_options.clone();

        if request == UpdateRequest::SingleFile {
            if !resolved.index_exists {
                debug!(file = %filename.display(), "No database yet, skipping single-file update");
                return Ok(0);
            }
            self.scheduler.submit(UpdateJob::SingleUpdate {
                target,
                file: filename.to_path_buf(),
                options,
            })?;
            return Ok(1);
        }

        if !wants_build {
            debug!(file = %filename.display(), ?request, "Nothing to generate");
            return Ok(0);
        }

        let mut queued = 0;
        let libraries = self.library_entries();
        if !libraries.is_empty() {
            self.scheduler.submit(UpdateJob::LibraryBuild {
                primary_db: resolved.db_path.clone(),
                libraries,
                options: options.clone(),
            })?;
            queued += 1;
        }
        self.scheduler.submit(UpdateJob::FullBuild { target, options })?;
        Ok(queued + 1)
    }

    /// Queue deletion of the database covering `filename`. The executor asks
    /// for confirmation before deleting.
    pub fn submit_removal(&self, filename: &Path) -> StoreResult<()> {
        let resolved = self.resolve(filename);
        self.scheduler.submit(UpdateJob::Remove {
            target: DbTarget::new(resolved.root, resolved.db_path),
        })
    }

    /// Translate a search pattern into a Vim highlight pattern.
    pub fn translate(&self, pattern: &str, dialect: Dialect) -> String {
        highlight::translate(pattern, dialect)
    }

    /// A query using this store's search program and indexer settings.
    pub fn new_query(&self, mode: QueryMode, options: QueryOptions) -> GlobalQuery {
        GlobalQuery::new(&self.settings.query_program, mode, options)
            .with_gtagsconf(self.settings.indexer_options.gtagsconf.clone())
            .with_label(self.settings.indexer_options.gtagslabel.clone())
    }

    /// Databases `query` runs against when issued from `filename`.
    ///
    /// File-tag queries use the single database covering the file. Pattern
    /// queries use the project database followed by every registered library.
    pub fn query_targets(&self, filename: &Path, query: &GlobalQuery) -> StoreResult<Vec<QueryTarget>> {
        let resolved = {
            let mut resolver = self.resolver();
            let resolved = resolver.resolve(filename);
            if matches!(query.mode(), QueryMode::FileTags { .. }) {
                let (root, db) =
                    resolver.resolve_across_libraries(filename, &resolved.root, &resolved.db_path)?;
                return Ok(vec![QueryTarget::primary(root, db)]);
            }
            resolved
        };

        let mut targets = vec![QueryTarget::primary(&resolved.root, &resolved.db_path)];
        targets.extend(
            LibraryRegistry::at(&resolved.db_path)
                .valid_entries()?
                .into_iter()
                .map(|entry| QueryTarget::library(entry.root, entry.db_path)),
        );
        Ok(targets)
    }

    /// Run `query` on behalf of `filename`.
    pub fn query(&self, filename: &Path, query: &GlobalQuery) -> StoreResult<Vec<ResultLine>> {
        let targets = self.query_targets(filename, query)?;
        self.session.run(query, &targets)
    }

    /// Highlight patterns of the latest query (plus appended ones).
    pub fn highlight_patterns(&self) -> Vec<String> {
        self.session.highlights()
    }

    /// Handle for cancelling running queries from another thread.
    pub fn session(&self) -> &QuerySession {
        &self.session
    }

    /// Kill running queries, let queued updates finish and stop the worker.
    pub fn shutdown(&mut self) {
        self.session.cleanup();
        self.scheduler.shutdown();
    }

    fn library_entries(&self) -> Vec<LibraryEntry> {
        let resolver = self.resolver();
        self.settings
            .library_paths
            .iter()
            .map(|path| {
                let root = resolver.absolute(path);
                let db_path = resolver.db_location(&root);
                LibraryEntry::new(root, db_path)
            })
            .collect()
    }
}

impl<P: FsProbe> Drop for TagStore<P> {
    fn drop(&mut self) {
        self.session.cleanup();
    }
}
