//! tagdb: per-project GNU GLOBAL tag databases.
//!
//! Maps source files to project roots and cache-side database directories,
//! serializes index updates through a single worker, runs symbol queries and
//! translates search patterns into Vim highlight patterns.

pub mod config;
pub mod error;
pub mod highlight;
pub mod query;
pub mod store;
pub mod tag_store;
pub mod telemetry;
pub mod update;
pub mod utils;

pub use error::{StoreError, StoreResult};
pub use tag_store::{StoreSettings, TagStore, UpdateRequest};
