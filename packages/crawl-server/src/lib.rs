// Crawl Core - crawl session lifecycle, worker claiming and page analytics
//
// Crawl workers claim sessions, report progress and finish them; readers list
// pages, sample audit-check matches and aggregate statistics. All state lives
// in PostgreSQL and every operation is a function over `kernel::CoreDeps`.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;

pub use config::*;
