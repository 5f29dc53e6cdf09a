// Trait definitions for dependency injection
//
// These are STORAGE traits only - no business logic. Actions in domains/*/actions
// take a CoreDeps and talk to these traits, so every operation runs unchanged
// against PostgreSQL or the in-memory stores in test_dependencies.
//
// Naming convention: Base* for trait names (e.g., BaseSessionStore)

use async_trait::async_trait;
use std::time::Duration;

use crate::common::{CoreError, PageId, SessionId, SkuId, ViewId};
use crate::domains::audits::models::{AuditCheck, NewAuditCheck};
use crate::domains::crawling::models::{CrawlingSession, NewCrawlingSession, ProgressDelta, SiteInfo};
use crate::domains::filters::FilterEntry;
use crate::domains::pages::models::{Page, PageImage, PageSelection, PageWindow};
use crate::domains::views::models::{NewView, View};

// =============================================================================
// Crawling sessions
// =============================================================================

#[async_trait]
pub trait BaseSessionStore: Send + Sync {
    async fn find_session(&self, id: SessionId) -> Result<Option<CrawlingSession>, CoreError>;

    /// Whether the SKU has a pending or processing session
    async fn has_active_session(&self, sku: SkuId) -> Result<bool, CoreError>;

    /// Persist a pending session. Must fail with `SessionAlreadyRunning` when
    /// another active session exists for the SKU, even under concurrency.
    async fn create_session(&self, input: &NewCrawlingSession) -> Result<CrawlingSession, CoreError>;

    /// Atomically move up to `limit` oldest pending sessions of `queue` to
    /// processing. Concurrent callers receive disjoint sets.
    async fn claim_pending(&self, queue: i32, limit: i64) -> Result<Vec<CrawlingSession>, CoreError>;

    /// Atomically re-stamp up to `limit` processing sessions of `queue` whose
    /// `started_at` is older than `stall_threshold`, never returning `exclude`.
    async fn claim_stalled(
        &self,
        queue: i32,
        exclude: &[SessionId],
        stall_threshold: Duration,
        limit: i64,
    ) -> Result<Vec<CrawlingSession>, CoreError>;

    async fn mark_done(&self, id: SessionId, reason: &str) -> Result<CrawlingSession, CoreError>;

    async fn update_site_info(&self, id: SessionId, info: &SiteInfo) -> Result<(), CoreError>;

    async fn update_progress(&self, id: SessionId, delta: &ProgressDelta) -> Result<(), CoreError>;
}

// =============================================================================
// Pages (read-only)
// =============================================================================

#[async_trait]
pub trait BasePageStore: Send + Sync {
    async fn find_page(&self, id: PageId) -> Result<Option<Page>, CoreError>;

    async fn count_pages(&self, selection: &PageSelection) -> Result<i64, CoreError>;

    async fn find_pages(
        &self,
        selection: &PageSelection,
        window: &PageWindow,
    ) -> Result<Vec<Page>, CoreError>;

    /// Total of the selection and, per bucket, how many selected pages match
    /// any of the bucket's entries.
    async fn count_buckets(
        &self,
        selection: &PageSelection,
        buckets: &[Vec<FilterEntry>],
    ) -> Result<(i64, Vec<i64>), CoreError>;

    async fn page_images(&self, page_id: PageId, limit: i64) -> Result<Vec<PageImage>, CoreError>;

    async fn broken_link_targets(&self, page_id: PageId, limit: i64) -> Result<Vec<Page>, CoreError>;

    async fn referrers(&self, page_id: PageId, limit: i64) -> Result<Vec<Page>, CoreError>;
}

// =============================================================================
// Audit checks and views
// =============================================================================

#[async_trait]
pub trait BaseAuditCheckStore: Send + Sync {
    async fn create_audit_check(&self, input: &NewAuditCheck) -> Result<AuditCheck, CoreError>;

    /// All checks of a SKU in id order
    async fn audit_checks_for_sku(&self, sku: SkuId) -> Result<Vec<AuditCheck>, CoreError>;

    async fn audit_checks_in_category(
        &self,
        sku: SkuId,
        category: &str,
    ) -> Result<Vec<AuditCheck>, CoreError>;
}

#[async_trait]
pub trait BaseViewStore: Send + Sync {
    async fn create_view(&self, input: &NewView) -> Result<View, CoreError>;

    async fn find_view(&self, id: ViewId) -> Result<Option<View>, CoreError>;
}
