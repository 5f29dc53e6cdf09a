pub mod crawling_session;

pub use crawling_session::{
    CrawlingSession, CrawlingSessionStatus, NewCrawlingSession, ProgressDelta, SiteInfo,
    MAX_STALL_THRESHOLD, ONE_ACTIVE_PER_SKU_CONSTRAINT,
};
