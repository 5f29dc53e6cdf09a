//! Typed ID definitions for all domain entities.
//!
//! ```rust
//! use crawl_core::common::{PageId, SessionId};
//!
//! let session_id = SessionId::from_i64(1);
//! let page_id = PageId::from_i64(1);
//!
//! // This would be a compile error:
//! // let wrong: PageId = session_id;
//! # let _ = (session_id, page_id);
//! ```

pub use super::id::Id;

// ============================================================================
// Entity marker types
// ============================================================================

/// Marker type for CrawlingSession entities.
pub struct CrawlingSessionEntity;

/// Marker type for the search keyword URL a session belongs to (the "SKU").
pub struct SearchKeywordUrl;

/// Marker type for crawled Page entities.
pub struct PageEntity;

/// Marker type for PageImage entities.
pub struct PageImageEntity;

/// Marker type for AuditCheck entities.
pub struct AuditCheckEntity;

/// Marker type for saved View entities.
pub struct ViewEntity;

// ============================================================================
// Type aliases - the primary API
// ============================================================================

pub type SessionId = Id<CrawlingSessionEntity>;

/// Search keyword URL id. Sessions, audit checks and views are all keyed by it.
pub type SkuId = Id<SearchKeywordUrl>;

pub type PageId = Id<PageEntity>;

pub type PageImageId = Id<PageImageEntity>;

pub type AuditCheckId = Id<AuditCheckEntity>;

pub type ViewId = Id<ViewEntity>;
