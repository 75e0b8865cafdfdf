//! Integration tests for tagdb
//!
//! These tests drive the public API against real temporary directories:
//! root resolution, the library registry, the update worker behind a
//! `TagStore`, and pattern translation.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tagdb::highlight::{highlight_pattern, translate, Dialect, HighlightOptions};
use tagdb::store::{LibraryEntry, LibraryRegistry, RootResolver, INDEX_FILE};
use tagdb::update::{JobExecutor, JobOutcome, UpdateJob};
use tagdb::{StoreError, StoreResult, StoreSettings, TagStore, UpdateRequest};
use tempfile::TempDir;

/// Temporary project tree: `<tmp>/project/.git`, `<tmp>/project/src/main.c`,
/// `<tmp>/vendor/lib.h` and a cache directory.
struct Workspace {
    _temp: TempDir,
    project: PathBuf,
    vendor: PathBuf,
    cache: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let project = temp.path().join("project");
        let vendor = temp.path().join("vendor");
        let cache = temp.path().join("cache");
        std::fs::create_dir_all(project.join(".git")).unwrap();
        std::fs::create_dir_all(project.join("src")).unwrap();
        std::fs::create_dir_all(&vendor).unwrap();
        std::fs::write(project.join("src").join("main.c"), "int main(void) { return 0; }\n").unwrap();
        std::fs::write(vendor.join("lib.h"), "int helper(void);\n").unwrap();
        Self {
            _temp: temp,
            project,
            vendor,
            cache,
        }
    }

    fn resolver(&self) -> RootResolver {
        RootResolver::new(vec![".git".to_string()], self.cache.clone()).with_working_dir(&self.project)
    }
}

/// Executor that records jobs and creates the index file for builds, so the
/// on-disk effects of a build can be observed without the real indexer.
#[derive(Default)]
struct FakeIndexer {
    jobs: Mutex<Vec<String>>,
}

impl JobExecutor for FakeIndexer {
    fn execute(&self, job: &UpdateJob) -> StoreResult<JobOutcome> {
        self.jobs.lock().unwrap().push(job.kind().to_string());
        match job {
            UpdateJob::FullBuild { target, .. } => {
                std::fs::create_dir_all(&target.db_path).unwrap();
                std::fs::write(target.db_path.join(INDEX_FILE), b"").unwrap();
                Ok(JobOutcome::Completed)
            }
            UpdateJob::LibraryBuild {
                primary_db,
                libraries,
                ..
            } => {
                LibraryRegistry::at(primary_db).write(libraries)?;
                Ok(JobOutcome::Completed)
            }
            UpdateJob::SingleUpdate { .. } => Ok(JobOutcome::Launched),
            UpdateJob::Remove { target } => {
                std::fs::remove_dir_all(&target.db_path).map_err(|e| StoreError::FileSystem {
                    path: target.db_path.clone(),
                    source: e,
                })?;
                Ok(JobOutcome::Completed)
            }
        }
    }
}

#[test]
fn test_resolve_finds_marker_root_and_caches_it() {
    let ws = Workspace::new();
    let mut resolver = ws.resolver();

    let resolved = resolver.resolve(&ws.project.join("src").join("main.c"));
    assert_eq!(resolved.root, ws.project);
    assert!(resolved.db_path.starts_with(&ws.cache));
    assert!(!resolved.index_exists);
    assert_eq!(resolver.cached_root(), Some(ws.project.as_path()));

    // Database directory names are distinct per root
    let other = resolver.db_location(&ws.vendor);
    assert_ne!(other, resolved.db_path);
}

#[test]
fn test_resolve_falls_back_to_working_directory() {
    let ws = Workspace::new();
    let mut resolver =
        RootResolver::new(vec![".git".to_string()], ws.cache.clone()).with_working_dir(&ws.vendor);

    let resolved = resolver.resolve(&ws.vendor.join("lib.h"));
    assert_eq!(resolved.root, ws.vendor);
    assert_eq!(resolver.cached_root(), None);
}

#[test]
fn test_library_registry_lookup_across_databases() {
    let ws = Workspace::new();
    let mut resolver = ws.resolver();
    let resolved = resolver.resolve(&ws.project.join("src").join("main.c"));

    let vendor_db = resolver.db_location(&ws.vendor);
    let missing = ws.project.parent().unwrap().join("missing");
    let written = LibraryRegistry::at(&resolved.db_path)
        .write(&[
            LibraryEntry::new(&missing, resolver.db_location(&missing)),
            LibraryEntry::new(&ws.vendor, &vendor_db),
        ])
        .unwrap();
    // Libraries whose roots do not exist are not recorded
    assert_eq!(written, [LibraryEntry::new(&ws.vendor, &vendor_db)]);

    let (root, db) = resolver
        .resolve_across_libraries(&ws.vendor.join("lib.h"), &resolved.root, &resolved.db_path)
        .unwrap();
    assert_eq!((root, db), (ws.vendor.clone(), vendor_db));

    let main = ws.project.join("src").join("main.c");
    let (root, _) = resolver
        .resolve_across_libraries(&main, &resolved.root, &resolved.db_path)
        .unwrap();
    assert_eq!(root, ws.project);
}

#[test]
fn test_registry_reports_malformed_lines_individually() {
    let ws = Workspace::new();
    let db = ws.cache.join("db");
    std::fs::create_dir_all(&db).unwrap();
    let registry = LibraryRegistry::at(&db);
    std::fs::write(
        registry.path(),
        format!("{}\t/cache/%vendor\n\nno-tab-here\n", ws.vendor.display()),
    )
    .unwrap();

    let records: Vec<_> = registry.read_all().unwrap().collect();
    assert_eq!(records.len(), 2);
    assert!(records[0].is_ok());
    assert!(matches!(
        records[1],
        Err(StoreError::MalformedRegistryRecord { line_number: 3, .. })
    ));

    // The sequence can be read again from the start
    assert_eq!(registry.read_all().unwrap().count(), 2);
}

#[test]
fn test_store_auto_generate_builds_libraries_first() {
    let ws = Workspace::new();
    let executor = Arc::new(FakeIndexer::default());
    let settings = StoreSettings {
        library_paths: vec![ws.vendor.clone()],
        ..Default::default()
    };
    let mut store = TagStore::with_parts(ws.resolver(), executor.clone(), settings).unwrap();
    let main = ws.project.join("src").join("main.c");

    // Nothing to update before a database exists
    assert_eq!(store.submit_update(&main, UpdateRequest::SingleFile).unwrap(), 0);
    assert_eq!(store.submit_update(&main, UpdateRequest::AutoGenerate).unwrap(), 2);
    store.shutdown();

    assert_eq!(*executor.jobs.lock().unwrap(), ["library-build", "full-build"]);

    let resolved = store.resolve(&main);
    assert!(resolved.index_exists);
    let registry = LibraryRegistry::at(&resolved.db_path).valid_entries().unwrap();
    assert_eq!(registry.len(), 1);
    assert_eq!(registry[0].root, ws.vendor);
}

#[test]
fn test_store_removal_after_build() {
    let ws = Workspace::new();
    let executor = Arc::new(FakeIndexer::default());
    let store = TagStore::with_parts(ws.resolver(), executor.clone(), StoreSettings::default()).unwrap();
    let main = ws.project.join("src").join("main.c");

    store.submit_update(&main, UpdateRequest::Build).unwrap();
    store.submit_removal(&main).unwrap();
    let db_path = store.resolve(&main).db_path;
    drop(store);

    let jobs = executor.jobs.lock().unwrap().clone();
    assert_eq!(jobs.first().map(String::as_str), Some("full-build"));
    assert_eq!(jobs.last().map(String::as_str), Some("remove"));
    assert!(!db_path.exists());
}

#[test]
fn test_translation_scenarios() {
    assert_eq!(translate(r"\Cfoo\bbar", Dialect::Pcre), r"\v\Cfoo(<|>)bar");
    assert_eq!(translate("(?i)TODO", Dialect::Pcre), r"\v\cTODO");
    assert_eq!(translate("hello", Dialect::Pcre), r"\vhello");
    assert_eq!(
        translate(r"(?<=fn )\w+?(?=\()", Dialect::PerlExtended),
        r"\v(fn )@<=\w{-1,}(\()@="
    );
}

#[test]
fn test_highlight_for_symbol_query() {
    let options = HighlightOptions {
        ignore_case: true,
        ..Default::default()
    };
    assert_eq!(highlight_pattern("'std.io'", options), r"\v\cstd\wio");
}

#[test]
fn test_db_names_do_not_collide() {
    let ws = Workspace::new();
    let resolver = ws.resolver();
    let a = resolver.db_location(Path::new("/a%b"));
    let b = resolver.db_location(Path::new("/a/b"));
    assert_ne!(a, b);
}
