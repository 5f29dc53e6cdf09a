//! Crawling domain - crawl session lifecycle and the worker claim protocol
//!
//! # Lifecycle
//!
//! ```text
//! pending --(claim)--> processing --(mark done)--> done
//!                          ^   |
//!                          +---+ (stalled: reclaimed by another worker)
//! ```
//!
//! # Components
//!
//! - `models/` - CrawlingSession and its SQL
//! - `actions/` - create, claim, progress and completion

pub mod actions;
pub mod models;

pub use models::{CrawlingSession, CrawlingSessionStatus, NewCrawlingSession, ProgressDelta, SiteInfo};
