//! Index updates: job definitions, indexer command lines and the serialized
//! worker that executes them.

pub mod command;
pub mod executor;
pub mod file_list;
pub mod job;
pub mod scheduler;

pub use command::Invocation;
pub use executor::{Confirm, GtagsExecutor, JobExecutor, JobOutcome};
pub use file_list::FileListBuilder;
pub use job::{DbTarget, IndexerOptions, UpdateJob};
pub use scheduler::UpdateScheduler;
