pub mod audits;
pub mod crawling;
pub mod filters;
pub mod pages;
pub mod stats;
pub mod views;
