//! Pages domain - read access to crawled pages
//!
//! Page rows are written by crawl workers; this crate only reads them.
//! Every query goes through a `PageSelection`, which both store backends
//! understand, so filtering behaves the same against PostgreSQL and in memory.

pub mod actions;
pub mod models;

pub use models::{Page, PageImage, PageSelection, PageWindow, SortDirection};
