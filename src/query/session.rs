//! Running queries and cancelling them.
//!
//! Queries do not go through the update worker; several may run at once.
//! Every spawned search process is tracked until it exits so that
//! [`QuerySession::cleanup`] can kill all of them.

use super::command::GlobalQuery;
use super::result::ResultLine;
use crate::error::StoreResult;
use crate::highlight::{highlight_pattern, HighlightOptions, HighlightSet};
use crate::update::Invocation;
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Child, Stdio};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// A database a query runs against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTarget {
    pub root: PathBuf,
    pub db_path: PathBuf,
    /// Library databases add `-q` and tolerate failure.
    pub library: bool,
}

impl QueryTarget {
    pub fn primary(root: impl Into<PathBuf>, db_path: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            db_path: db_path.into(),
            library: false,
        }
    }

    pub fn library(root: impl Into<PathBuf>, db_path: impl Into<PathBuf>) -> Self {
        Self {
            library: true,
            ..Self::primary(root, db_path)
        }
    }
}

/// Tracks running search processes and the highlight patterns of past
/// queries. Clones share both.
#[derive(Debug, Clone, Default)]
pub struct QuerySession {
    children: Arc<Mutex<HashMap<u32, Child>>>,
    highlights: Arc<Mutex<HighlightSet>>,
}

impl QuerySession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `query` against each target in order and collect the results.
    ///
    /// A failing primary database fails the query; a failing library
    /// database is logged and skipped.
    pub fn run(&self, query: &GlobalQuery, targets: &[QueryTarget]) -> StoreResult<Vec<ResultLine>> {
        if let Some(pattern) = query.mode().pattern() {
            let options = HighlightOptions {
                literal: query.options().literal,
                ignore_case: query.options().ignore_case,
                grep: query.mode().is_grep(),
            };
            lock(&self.highlights).record(
                highlight_pattern(pattern, options),
                query.options().append,
            );
        }

        let mut results = Vec::new();
        for target in targets {
            let invocation = query.invocation(&target.root, &target.db_path, target.library);
            match self.execute(&invocation) {
                Ok(lines) => results.extend(lines.iter().filter_map(|line| {
                    let parsed = ResultLine::parse(line);
                    if parsed.is_none() {
                        debug!(line = %line, "Skipping unparseable result line");
                    }
                    parsed
                })),
                Err(e) if target.library => {
                    warn!(db = %target.db_path.display(), error = %e, "Library query failed");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(results)
    }

    /// Run one process to completion and return its standard output lines.
    ///
    /// If the process is killed by [`cleanup`](Self::cleanup) the lines read
    /// so far are returned.
    pub fn execute(&self, invocation: &Invocation) -> StoreResult<Vec<String>> {
        debug!(command = %invocation.command_line(), "Running query");
        // Spawn and register under one lock so cleanup never misses a child.
        let (pid, stdout, stderr) = {
            let mut children = lock(&self.children);
            let mut child = invocation
                .to_command()
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .spawn()
                .map_err(|e| invocation.io_error(e))?;
            let pid = child.id();
            let stdout = child.stdout.take();
            let stderr = child.stderr.take();
            children.insert(pid, child);
            (pid, stdout, stderr)
        };
        let stderr = stderr.map(|mut pipe| {
            std::thread::spawn(move || {
                let mut bytes = Vec::new();
                let _ = pipe.read_to_end(&mut bytes);
                String::from_utf8_lossy(&bytes).into_owned()
            })
        });

        let mut lines = Vec::new();
        let mut read_error = None;
        if let Some(stdout) = stdout {
            for chunk in BufReader::new(stdout).split(b'\n') {
                match chunk {
                    Ok(bytes) => {
                        let line = String::from_utf8_lossy(&bytes);
                        lines.push(line.trim_end_matches('\r').to_string());
                    }
                    Err(e) => {
                        read_error = Some(e);
                        break;
                    }
                }
            }
        }
        let stderr = stderr
            .and_then(|reader| reader.join().ok())
            .unwrap_or_default();

        let Some(mut child) = lock(&self.children).remove(&pid) else {
            debug!(command = %invocation.command_line(), "Query cancelled");
            return Ok(lines);
        };
        if let Some(e) = read_error {
            let _ = child.kill();
            let _ = child.wait();
            return Err(invocation.io_error(e));
        }

        let status = child.wait().map_err(|e| invocation.io_error(e))?;
        let stderr = stderr.trim();
        if !status.success() {
            let message = if stderr.is_empty() {
                format!("exited with {}", status)
            } else {
                stderr.to_string()
            };
            return Err(invocation.failure(message));
        }
        if !stderr.is_empty() {
            warn!(command = %invocation.command_line(), stderr = %stderr, "Query reported warnings");
        }
        Ok(lines)
    }

    /// Kill every tracked search process. Returns how many were killed.
    pub fn cleanup(&self) -> usize {
        let children: Vec<(u32, Child)> = lock(&self.children).drain().collect();
        let count = children.len();
        for (pid, mut child) in children {
            if let Err(e) = child.kill() {
                debug!(pid, error = %e, "Search process already exited");
            }
            let _ = child.wait();
        }
        if count > 0 {
            debug!(count, "Killed running queries");
        }
        count
    }

    /// Number of search processes still running.
    pub fn live_processes(&self) -> usize {
        lock(&self.children).len()
    }

    /// Highlight patterns of the current query (and appended ones).
    pub fn highlights(&self) -> Vec<String> {
        lock(&self.highlights).patterns().to_vec()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::query::{QueryMode, QueryOptions};
    use crate::error::StoreError;
    use std::time::{Duration, Instant};

    #[test]
    fn test_execute_collects_lines() {
        let session = QuerySession::new();
        let lines = session
            .execute(&Invocation::shell("printf 'a.c\\t1\\tx\\nb.c\\t2\\ty\\n'"))
            .unwrap();
        assert_eq!(lines, ["a.c\t1\tx", "b.c\t2\ty"]);
        assert_eq!(session.live_processes(), 0);
    }

    #[test]
    fn test_execute_failure_reports_stderr() {
        let session = QuerySession::new();
        let err = session
            .execute(&Invocation::shell("echo 'GTAGS not found.' >&2; exit 3"))
            .unwrap_err();
        match err {
            StoreError::ExternalProcess { message, .. } => assert_eq!(message, "GTAGS not found."),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_cleanup_kills_running_queries() {
        let session = QuerySession::new();
        let worker = {
            let session = session.clone();
            std::thread::spawn(move || session.execute(&Invocation::shell("exec sleep 30")))
        };

        let deadline = Instant::now() + Duration::from_secs(5);
        while session.live_processes() == 0 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(session.cleanup(), 1);

        let result = worker.join().unwrap().unwrap();
        assert!(result.is_empty());
        assert_eq!(session.live_processes(), 0);
    }

    #[test]
    fn test_cleanup_kills_every_concurrent_query() {
        let session = QuerySession::new();
        let workers: Vec<_> = (0..4)
            .map(|_| {
                let session = session.clone();
                std::thread::spawn(move || session.execute(&Invocation::shell("exec sleep 30")))
            })
            .collect();

        let deadline = Instant::now() + Duration::from_secs(5);
        while session.live_processes() < 4 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(session.cleanup(), 4);

        let started = Instant::now();
        for worker in workers {
            assert!(worker.join().unwrap().unwrap().is_empty());
        }
        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(session.live_processes(), 0);
    }

    #[test]
    fn test_run_records_highlights() {
        let session = QuerySession::new();
        // `true` prints nothing and succeeds whatever the arguments
        let query = |pattern: &str, append: bool| {
            GlobalQuery::new(
                "true",
                QueryMode::Definition(pattern.to_string()),
                QueryOptions {
                    append,
                    ..Default::default()
                },
            )
        };
        let target = [QueryTarget::primary("/tmp", "/tmp")];

        session.run(&query("foo", false), &target).unwrap();
        session.run(&query("bar", true), &target).unwrap();
        assert_eq!(session.highlights(), [r"\v\Cfoo", r"\v\Cbar"]);

        session.run(&query("baz", false), &target).unwrap();
        assert_eq!(session.highlights(), [r"\v\Cbaz"]);
    }

    #[test]
    fn test_library_failure_is_skipped() {
        let session = QuerySession::new();
        let query = GlobalQuery::new(
            "false",
            QueryMode::Symbol("x".to_string()),
            QueryOptions::default(),
        );
        let libraries = [QueryTarget::library("/lib", "/cache/%lib")];
        assert!(session.run(&query, &libraries).unwrap().is_empty());

        let primary = [QueryTarget::primary("/p", "/cache/%p")];
        assert!(session.run(&query, &primary).is_err());
    }
}
