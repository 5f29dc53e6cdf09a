// PostgresStore - implements the Base* storage traits on top of the model queries
//
// The SQL itself lives in domains/*/models; this adapter only routes trait
// calls to it with the shared pool.

use async_trait::async_trait;
use sqlx::PgPool;
use std::time::Duration;

use super::{BaseAuditCheckStore, BasePageStore, BaseSessionStore, BaseViewStore};
use crate::common::{CoreError, PageId, SessionId, SkuId, ViewId};
use crate::domains::audits::models::{AuditCheck, NewAuditCheck};
use crate::domains::crawling::models::{CrawlingSession, NewCrawlingSession, ProgressDelta, SiteInfo};
use crate::domains::filters::FilterEntry;
use crate::domains::pages::models::{Page, PageImage, PageSelection, PageWindow};
use crate::domains::views::models::{NewView, View};

#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BaseSessionStore for PostgresStore {
    async fn find_session(&self, id: SessionId) -> Result<Option<CrawlingSession>, CoreError> {
        CrawlingSession::find_by_id(id, &self.pool).await
    }

    async fn has_active_session(&self, sku: SkuId) -> Result<bool, CoreError> {
        CrawlingSession::has_active_for_sku(sku, &self.pool).await
    }

    async fn create_session(&self, input: &NewCrawlingSession) -> Result<CrawlingSession, CoreError> {
        CrawlingSession::create(input, &self.pool).await
    }

    async fn claim_pending(&self, queue: i32, limit: i64) -> Result<Vec<CrawlingSession>, CoreError> {
        CrawlingSession::claim_pending(queue, limit, &self.pool).await
    }

    async fn claim_stalled(
        &self,
        queue: i32,
        exclude: &[SessionId],
        stall_threshold: Duration,
        limit: i64,
    ) -> Result<Vec<CrawlingSession>, CoreError> {
        CrawlingSession::claim_stalled(queue, exclude, stall_threshold, limit, &self.pool).await
    }

    async fn mark_done(&self, id: SessionId, reason: &str) -> Result<CrawlingSession, CoreError> {
        CrawlingSession::mark_done(id, reason, &self.pool).await
    }

    async fn update_site_info(&self, id: SessionId, info: &SiteInfo) -> Result<(), CoreError> {
        CrawlingSession::update_site_info(id, info, &self.pool).await
    }

    async fn update_progress(&self, id: SessionId, delta: &ProgressDelta) -> Result<(), CoreError> {
        CrawlingSession::update_progress(id, delta, &self.pool).await
    }
}

#[async_trait]
impl BasePageStore for PostgresStore {
    async fn find_page(&self, id: PageId) -> Result<Option<Page>, CoreError> {
        Page::find_by_id(id, &self.pool).await
    }

    async fn count_pages(&self, selection: &PageSelection) -> Result<i64, CoreError> {
        Page::count(selection, &self.pool).await
    }

    async fn find_pages(
        &self,
        selection: &PageSelection,
        window: &PageWindow,
    ) -> Result<Vec<Page>, CoreError> {
        Page::find_window(selection, window, &self.pool).await
    }

    async fn count_buckets(
        &self,
        selection: &PageSelection,
        buckets: &[Vec<FilterEntry>],
    ) -> Result<(i64, Vec<i64>), CoreError> {
        Page::count_buckets(selection, buckets, &self.pool).await
    }

    async fn page_images(&self, page_id: PageId, limit: i64) -> Result<Vec<PageImage>, CoreError> {
        Page::images(page_id, limit, &self.pool).await
    }

    async fn broken_link_targets(&self, page_id: PageId, limit: i64) -> Result<Vec<Page>, CoreError> {
        Page::broken_link_targets(page_id, limit, &self.pool).await
    }

    async fn referrers(&self, page_id: PageId, limit: i64) -> Result<Vec<Page>, CoreError> {
        Page::referrers(page_id, limit, &self.pool).await
    }
}

#[async_trait]
impl BaseAuditCheckStore for PostgresStore {
    async fn create_audit_check(&self, input: &NewAuditCheck) -> Result<AuditCheck, CoreError> {
        AuditCheck::create(input, &self.pool).await
    }

    async fn audit_checks_for_sku(&self, sku: SkuId) -> Result<Vec<AuditCheck>, CoreError> {
        AuditCheck::find_by_sku(sku, &self.pool).await
    }

    async fn audit_checks_in_category(
        &self,
        sku: SkuId,
        category: &str,
    ) -> Result<Vec<AuditCheck>, CoreError> {
        AuditCheck::find_by_sku_and_category(sku, category, &self.pool).await
    }
}

#[async_trait]
impl BaseViewStore for PostgresStore {
    async fn create_view(&self, input: &NewView) -> Result<View, CoreError> {
        View::create(input, &self.pool).await
    }

    async fn find_view(&self, id: ViewId) -> Result<Option<View>, CoreError> {
        View::find_by_id(id, &self.pool).await
    }
}
