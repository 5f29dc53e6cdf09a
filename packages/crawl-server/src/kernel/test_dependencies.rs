// TestDependencies - in-memory store implementations for testing
//
// Each store implements the same Base* trait as PostgresStore and keeps the
// same guarantees: claims are exclusive (one lock around select+update), the
// one-active-session-per-SKU rule is checked and applied under that lock, and
// page filtering goes through the filter evaluator instead of SQL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use typed_builder::TypedBuilder;

use super::{BaseAuditCheckStore, BasePageStore, BaseSessionStore, BaseViewStore, CoreDeps};
use crate::common::{AuditCheckId, CoreError, PageId, PageImageId, SessionId, SkuId, ViewId};
use crate::domains::audits::models::{AuditCheck, NewAuditCheck};
use crate::domains::crawling::models::{
    CrawlingSession, CrawlingSessionStatus, NewCrawlingSession, ProgressDelta, SiteInfo,
    MAX_STALL_THRESHOLD,
};
use crate::domains::filters::{matches_any, FilterEntry, FilterRow, FilterScalar};
use crate::domains::pages::models::{Page, PageImage, PageSelection, PageWindow, SortDirection};
use crate::domains::views::models::{NewView, View};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// In-memory Session Store
// =============================================================================

#[derive(Default)]
struct SessionState {
    next_id: i64,
    last_created_at: Option<DateTime<Utc>>,
    sessions: BTreeMap<SessionId, CrawlingSession>,
}

#[derive(Default)]
pub struct InMemorySessionStore {
    state: Mutex<SessionState>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored session in id order
    pub fn sessions(&self) -> Vec<CrawlingSession> {
        lock(&self.state).sessions.values().cloned().collect()
    }

    /// Move `started_at` into the past so the session looks stalled
    pub fn backdate_started_at(&self, id: SessionId, by: Duration) {
        let mut state = lock(&self.state);
        if let Some(session) = state.sessions.get_mut(&id) {
            if let (Some(started_at), Ok(by)) = (session.started_at, chrono::Duration::from_std(by)) {
                session.started_at = Some(started_at - by);
            }
        }
    }
}

#[async_trait]
impl BaseSessionStore for InMemorySessionStore {
    async fn find_session(&self, id: SessionId) -> Result<Option<CrawlingSession>, CoreError> {
        Ok(lock(&self.state).sessions.get(&id).cloned())
    }

    async fn has_active_session(&self, sku: SkuId) -> Result<bool, CoreError> {
        Ok(lock(&self.state)
            .sessions
            .values()
            .any(|s| s.search_keyword_url_id == sku && s.status.is_active()))
    }

    async fn create_session(&self, input: &NewCrawlingSession) -> Result<CrawlingSession, CoreError> {
        let mut state = lock(&self.state);
        if state
            .sessions
            .values()
            .any(|s| s.search_keyword_url_id == input.search_keyword_url_id && s.status.is_active())
        {
            return Err(CoreError::SessionAlreadyRunning(input.search_keyword_url_id));
        }

        // Strictly increasing so oldest-first ordering is never a tie
        let mut now = Utc::now();
        if let Some(last) = state.last_created_at {
            if now <= last {
                now = last + chrono::Duration::microseconds(1);
            }
        }
        state.last_created_at = Some(now);
        state.next_id += 1;
        let id = SessionId::from_i64(state.next_id);

        let session = CrawlingSession {
            id,
            search_keyword_url_id: input.search_keyword_url_id,
            url: input.url.trim().to_string(),
            status: CrawlingSessionStatus::Pending,
            queue: input.queue,
            version: 1,
            started_at: None,
            ended_at: None,
            end_reason: None,
            error: None,
            ips: None,
            dns_servers: None,
            aliases: None,
            location: None,
            sitemap: false,
            robots: false,
            ssl_valid: false,
            ssl_valid_until: None,
            pages_count: 0,
            internal_urls_count: 0,
            ignored_urls_count: 0,
            external_urls_count: 0,
            internal_resources_count: 0,
            external_resources_count: 0,
            options: input.options.clone().map(serde_json::Value::Object),
            created_at: now,
            updated_at: now,
        };
        state.sessions.insert(id, session.clone());
        Ok(session)
    }

    async fn claim_pending(&self, queue: i32, limit: i64) -> Result<Vec<CrawlingSession>, CoreError> {
        if limit <= 0 {
            return Ok(Vec::new());
        }
        let mut state = lock(&self.state);

        let mut candidates: Vec<(DateTime<Utc>, SessionId)> = state
            .sessions
            .values()
            .filter(|s| s.status == CrawlingSessionStatus::Pending && s.queue == queue)
            .map(|s| (s.created_at, s.id))
            .collect();
        candidates.sort();

        let now = Utc::now();
        let mut claimed = Vec::new();
        for (_, id) in candidates.into_iter().take(limit as usize) {
            if let Some(session) = state.sessions.get_mut(&id) {
                session.status = CrawlingSessionStatus::Processing;
                session.started_at = Some(now);
                session.updated_at = now;
                claimed.push(session.clone());
            }
        }
        Ok(claimed)
    }

    async fn claim_stalled(
        &self,
        queue: i32,
        exclude: &[SessionId],
        stall_threshold: Duration,
        limit: i64,
    ) -> Result<Vec<CrawlingSession>, CoreError> {
        if limit <= 0 {
            return Ok(Vec::new());
        }
        let now = Utc::now();
        let Some(cutoff) = chrono::Duration::from_std(stall_threshold.min(MAX_STALL_THRESHOLD))
            .ok()
            .and_then(|threshold| now.checked_sub_signed(threshold))
        else {
            return Ok(Vec::new());
        };

        let mut state = lock(&self.state);
        let mut candidates: Vec<(DateTime<Utc>, SessionId)> = state
            .sessions
            .values()
            .filter(|s| {
                s.status == CrawlingSessionStatus::Processing
                    && s.queue == queue
                    && !exclude.contains(&s.id)
            })
            .filter_map(|s| s.started_at.filter(|t| *t < cutoff).map(|t| (t, s.id)))
            .collect();
        candidates.sort();

        let mut claimed = Vec::new();
        for (_, id) in candidates.into_iter().take(limit as usize) {
            if let Some(session) = state.sessions.get_mut(&id) {
                session.started_at = Some(now);
                session.updated_at = now;
                claimed.push(session.clone());
            }
        }
        crate::domains::crawling::models::crawling_session::sort_oldest_first(&mut claimed);
        Ok(claimed)
    }

    async fn mark_done(&self, id: SessionId, reason: &str) -> Result<CrawlingSession, CoreError> {
        let mut state = lock(&self.state);
        let session = state
            .sessions
            .get_mut(&id)
            .ok_or(CoreError::SessionNotFound(id))?;
        let now = Utc::now();
        session.status = CrawlingSessionStatus::Done;
        session.end_reason = Some(reason.to_string());
        session.ended_at.get_or_insert(now);
        session.updated_at = now;
        Ok(session.clone())
    }

    async fn update_site_info(&self, id: SessionId, info: &SiteInfo) -> Result<(), CoreError> {
        let mut state = lock(&self.state);
        let session = state
            .sessions
            .get_mut(&id)
            .ok_or(CoreError::SessionNotFound(id))?;
        session.ips = Some(info.ips.clone());
        session.dns_servers = Some(info.dns_servers.clone());
        session.aliases = Some(info.aliases.clone());
        session.location = info.location.clone();
        session.sitemap = info.sitemap;
        session.robots = info.robots;
        session.ssl_valid = info.ssl_valid;
        session.ssl_valid_until = info.ssl_valid_until;
        session.updated_at = Utc::now();
        Ok(())
    }

    async fn update_progress(&self, id: SessionId, delta: &ProgressDelta) -> Result<(), CoreError> {
        let mut state = lock(&self.state);
        let session = state
            .sessions
            .get_mut(&id)
            .ok_or(CoreError::SessionNotFound(id))?;
        session.pages_count += delta.pages_increment();
        session.internal_urls_count += delta.internal_urls;
        session.ignored_urls_count += delta.ignored_urls;
        session.external_urls_count += delta.external_urls;
        session.updated_at = Utc::now();
        Ok(())
    }
}

// =============================================================================
// In-memory Page Store
// =============================================================================

/// Test input for a crawled page. `extra` holds attributes beyond the typed
/// `Page` fields, addressable by filters.
#[derive(Debug, Clone, TypedBuilder)]
pub struct PageFixture {
    pub session_id: SessionId,
    #[builder(default = "https://example.com/".to_string(), setter(into))]
    pub url: String,
    #[builder(default = 200)]
    pub response_code: i32,
    #[builder(default, setter(strip_option))]
    pub redirect_code: Option<i32>,
    #[builder(default, setter(strip_option))]
    pub depth: Option<i32>,
    #[builder(default, setter(strip_option, into))]
    pub og_title: Option<String>,
    #[builder(default, setter(strip_option, into))]
    pub og_description: Option<String>,
    #[builder(default)]
    pub extra: BTreeMap<String, FilterScalar>,
}

#[derive(Debug, Clone)]
struct PageRecord {
    page: Page,
    extra: BTreeMap<String, FilterScalar>,
}

impl FilterRow for PageRecord {
    fn attribute(&self, column: &str) -> Option<FilterScalar> {
        match self.extra.get(column) {
            Some(value) => Some(value.clone()),
            None => self.page.attribute(column),
        }
    }
}

#[derive(Default)]
struct PageState {
    next_page_id: i64,
    next_image_id: i64,
    pages: BTreeMap<PageId, PageRecord>,
    images: Vec<PageImage>,
    links: BTreeSet<(PageId, PageId)>,
}

#[derive(Default)]
pub struct InMemoryPageStore {
    state: Mutex<PageState>,
}

impl InMemoryPageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_page(&self, fixture: PageFixture) -> Page {
        let mut state = lock(&self.state);
        state.next_page_id += 1;
        let page = Page {
            id: PageId::from_i64(state.next_page_id),
            crawling_session_id: fixture.session_id,
            url: fixture.url,
            response_code: fixture.response_code,
            redirect_code: fixture.redirect_code,
            depth: fixture.depth,
            title: None,
            og_title: fixture.og_title,
            og_description: fixture.og_description,
            content_type: None,
            created_at: Utc::now(),
        };
        state.pages.insert(
            page.id,
            PageRecord {
                page: page.clone(),
                extra: fixture.extra,
            },
        );
        page
    }

    pub fn add_image(&self, page_id: PageId, url: &str) -> PageImage {
        let mut state = lock(&self.state);
        state.next_image_id += 1;
        let image = PageImage {
            id: PageImageId::from_i64(state.next_image_id),
            page_id,
            url: url.to_string(),
        };
        state.images.push(image.clone());
        image
    }

    pub fn add_link(&self, source: PageId, target: PageId) {
        lock(&self.state).links.insert((source, target));
    }

    fn selected(state: &PageState, selection: &PageSelection) -> Vec<PageRecord> {
        state
            .pages
            .values()
            .filter(|r| selection.matches(r.page.crawling_session_id, *r))
            .cloned()
            .collect()
    }
}

/// PostgreSQL default ordering: NULLs sort last ascending, first descending.
fn compare_for_sort(a: &Option<FilterScalar>, b: &Option<FilterScalar>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => a.compare(b).unwrap_or(Ordering::Equal),
    }
}

#[async_trait]
impl BasePageStore for InMemoryPageStore {
    async fn find_page(&self, id: PageId) -> Result<Option<Page>, CoreError> {
        Ok(lock(&self.state).pages.get(&id).map(|r| r.page.clone()))
    }

    async fn count_pages(&self, selection: &PageSelection) -> Result<i64, CoreError> {
        let state = lock(&self.state);
        Ok(Self::selected(&state, selection).len() as i64)
    }

    async fn find_pages(
        &self,
        selection: &PageSelection,
        window: &PageWindow,
    ) -> Result<Vec<Page>, CoreError> {
        let state = lock(&self.state);
        let mut records = Self::selected(&state, selection);
        let column = window.sort.as_str();
        records.sort_by(|a, b| {
            let ordering = compare_for_sort(&a.attribute(column), &b.attribute(column));
            let ordering = match window.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            };
            ordering.then(a.page.id.cmp(&b.page.id))
        });
        Ok(records
            .into_iter()
            .skip(window.offset.max(0) as usize)
            .take(window.limit.max(0) as usize)
            .map(|r| r.page)
            .collect())
    }

    async fn count_buckets(
        &self,
        selection: &PageSelection,
        buckets: &[Vec<FilterEntry>],
    ) -> Result<(i64, Vec<i64>), CoreError> {
        let state = lock(&self.state);
        let records = Self::selected(&state, selection);
        let counts = buckets
            .iter()
            .map(|entries| records.iter().filter(|r| matches_any(entries, *r)).count() as i64)
            .collect();
        Ok((records.len() as i64, counts))
    }

    async fn page_images(&self, page_id: PageId, limit: i64) -> Result<Vec<PageImage>, CoreError> {
        let state = lock(&self.state);
        let mut images: Vec<PageImage> = state
            .images
            .iter()
            .filter(|i| i.page_id == page_id)
            .cloned()
            .collect();
        images.sort_by_key(|i| i.id);
        images.truncate(limit.max(0) as usize);
        Ok(images)
    }

    async fn broken_link_targets(&self, page_id: PageId, limit: i64) -> Result<Vec<Page>, CoreError> {
        let state = lock(&self.state);
        let targets: BTreeSet<PageId> = state
            .links
            .iter()
            .filter(|(source, _)| *source == page_id)
            .map(|(_, target)| *target)
            .collect();
        Ok(targets
            .into_iter()
            .filter_map(|id| state.pages.get(&id))
            .filter(|r| r.page.response_code >= 400)
            .take(limit.max(0) as usize)
            .map(|r| r.page.clone())
            .collect())
    }

    async fn referrers(&self, page_id: PageId, limit: i64) -> Result<Vec<Page>, CoreError> {
        let state = lock(&self.state);
        let sources: BTreeSet<PageId> = state
            .links
            .iter()
            .filter(|(_, target)| *target == page_id)
            .map(|(source, _)| *source)
            .collect();
        Ok(sources
            .into_iter()
            .filter_map(|id| state.pages.get(&id))
            .take(limit.max(0) as usize)
            .map(|r| r.page.clone())
            .collect())
    }
}

// =============================================================================
// In-memory Audit Check and View Stores
// =============================================================================

#[derive(Default)]
pub struct InMemoryAuditCheckStore {
    checks: Mutex<Vec<AuditCheck>>,
}

impl InMemoryAuditCheckStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BaseAuditCheckStore for InMemoryAuditCheckStore {
    async fn create_audit_check(&self, input: &NewAuditCheck) -> Result<AuditCheck, CoreError> {
        let mut checks = lock(&self.checks);
        let now = Utc::now();
        let check = AuditCheck {
            id: AuditCheckId::from_i64(checks.len() as i64 + 1),
            search_keyword_url_id: input.search_keyword_url_id,
            name: input.name.clone(),
            category: input.category.clone(),
            filter_config: input.filter_config.clone(),
            created_at: now,
            updated_at: now,
        };
        checks.push(check.clone());
        Ok(check)
    }

    async fn audit_checks_for_sku(&self, sku: SkuId) -> Result<Vec<AuditCheck>, CoreError> {
        Ok(lock(&self.checks)
            .iter()
            .filter(|c| c.search_keyword_url_id == sku)
            .cloned()
            .collect())
    }

    async fn audit_checks_in_category(
        &self,
        sku: SkuId,
        category: &str,
    ) -> Result<Vec<AuditCheck>, CoreError> {
        Ok(lock(&self.checks)
            .iter()
            .filter(|c| c.search_keyword_url_id == sku && c.category == category)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryViewStore {
    views: Mutex<Vec<View>>,
}

impl InMemoryViewStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BaseViewStore for InMemoryViewStore {
    async fn create_view(&self, input: &NewView) -> Result<View, CoreError> {
        let mut views = lock(&self.views);
        let now = Utc::now();
        let view = View {
            id: ViewId::from_i64(views.len() as i64 + 1),
            search_keyword_url_id: input.search_keyword_url_id,
            name: input.name.clone(),
            filter_config: input.filter_config.clone(),
            created_at: now,
            updated_at: now,
        };
        views.push(view.clone());
        Ok(view)
    }

    async fn find_view(&self, id: ViewId) -> Result<Option<View>, CoreError> {
        Ok(lock(&self.views).iter().find(|v| v.id == id).cloned())
    }
}

// =============================================================================
// TestDependencies
// =============================================================================

/// In-memory stores plus typed handles for seeding them.
#[derive(Clone)]
pub struct TestDependencies {
    pub sessions: Arc<InMemorySessionStore>,
    pub pages: Arc<InMemoryPageStore>,
    pub audit_checks: Arc<InMemoryAuditCheckStore>,
    pub views: Arc<InMemoryViewStore>,
}

impl Default for TestDependencies {
    fn default() -> Self {
        Self::new()
    }
}

impl TestDependencies {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(InMemorySessionStore::new()),
            pages: Arc::new(InMemoryPageStore::new()),
            audit_checks: Arc::new(InMemoryAuditCheckStore::new()),
            views: Arc::new(InMemoryViewStore::new()),
        }
    }

    pub fn deps(&self) -> CoreDeps {
        CoreDeps::new(
            self.sessions.clone(),
            self.pages.clone(),
            self.audit_checks.clone(),
            self.views.clone(),
        )
    }
}
