//! Symbol queries through the external `global` tool.

pub mod command;
pub mod result;
pub mod session;

pub use command::{GlobalQuery, PathStyle, QueryMode, QueryOptions, DBPATH_ENV, ROOT_ENV};
pub use result::ResultLine;
pub use session::{QuerySession, QueryTarget};
