//! Stats domain - bucketed page counts and site health for a crawl

pub mod aggregator;
pub mod buckets;

pub use aggregator::{fetch_stats, site_health, StatsError, StatsReport, StatsRequest};
pub use buckets::{Bucket, PageBuckets};
