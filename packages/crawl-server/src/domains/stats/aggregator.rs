//! Session statistics: bucketed page counts, problematic pages, site health
//! and an optional diff against a second session.

use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use typed_builder::TypedBuilder;

use crate::common::{cancellable, CoreError, ErrorKind, SessionId, SkuId};
use crate::domains::audits::models::PROBLEMATIC_CATEGORY;
use crate::domains::filters::{FilterEntry, FilterError, FilterSpec, PageScope};
use crate::domains::pages::models::PageSelection;
use crate::domains::stats::buckets::{Bucket, PageBuckets};
use crate::kernel::CoreDeps;

/// Errors at the stats boundary. Store failures are opaque here; callers
/// that need the cause can walk `source()`.
#[derive(Error, Debug)]
pub enum StatsError {
    #[error("Invalid filter: {0}")]
    InvalidFilter(#[from] FilterError),

    #[error("Crawling session not found: {0}")]
    SessionNotFound(SessionId),

    #[error("Stats aggregation failed")]
    AggregationFailed(#[source] CoreError),

    #[error("Operation cancelled")]
    Cancelled,
}

impl StatsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StatsError::InvalidFilter(_) => ErrorKind::InvalidInput,
            StatsError::SessionNotFound(_) => ErrorKind::NotFound,
            StatsError::AggregationFailed(_) => ErrorKind::StoreFailure,
            StatsError::Cancelled => ErrorKind::Cancelled,
        }
    }
}

impl From<CoreError> for StatsError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidFilter(e) => StatsError::InvalidFilter(e),
            CoreError::SessionNotFound(id) => StatsError::SessionNotFound(id),
            CoreError::Cancelled => StatsError::Cancelled,
            other => StatsError::AggregationFailed(other),
        }
    }
}

#[derive(Debug, Clone, TypedBuilder)]
pub struct StatsRequest {
    pub session_id: SessionId,
    #[builder(default, setter(strip_option))]
    pub comparison_session_id: Option<SessionId>,
    /// Filters fixed by the caller's context (e.g. a saved view)
    #[builder(default)]
    pub prefilters: FilterSpec,
    #[builder(default)]
    pub filters: FilterSpec,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsReport {
    pub session_id: SessionId,
    #[serde(flatten)]
    pub buckets: PageBuckets,
    pub problematic: i64,
    pub site_health: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparison: Option<PageBuckets>,
    /// `buckets - comparison`, bucket by bucket
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changes: Option<PageBuckets>,
}

/// 100 for a clean (or empty) crawl, minus the problematic share in whole percent.
pub fn site_health(total: i64, problematic: i64) -> i64 {
    if total <= 0 || problematic <= 0 {
        return 100;
    }
    100 - (problematic * 100) / total
}

pub async fn fetch_stats(
    request: &StatsRequest,
    token: &CancellationToken,
    deps: &CoreDeps,
) -> Result<StatsReport, StatsError> {
    let session = cancellable(token, deps.sessions.find_session(request.session_id))
        .await?
        .ok_or(StatsError::SessionNotFound(request.session_id))?;

    let buckets = count_buckets(request.session_id, request, token, deps).await?;
    let problematic = count_problematic(session.search_keyword_url_id, request, token, deps).await?;
    let site_health = site_health(buckets.total, problematic);

    let comparison = match request.comparison_session_id {
        Some(comparison_id) => {
            cancellable(token, deps.sessions.find_session(comparison_id))
                .await?
                .ok_or(StatsError::SessionNotFound(comparison_id))?;
            Some(count_buckets(comparison_id, request, token, deps).await?)
        }
        None => None,
    };
    let changes = comparison.as_ref().map(|c| buckets.delta(c));

    info!(
        session_id = %request.session_id,
        total = buckets.total,
        problematic,
        site_health,
        compared = comparison.is_some(),
        "Computed crawl stats"
    );

    Ok(StatsReport {
        session_id: request.session_id,
        buckets,
        problematic,
        site_health,
        comparison,
        changes,
    })
}

fn selection_for(session_id: SessionId, request: &StatsRequest) -> PageSelection {
    PageSelection::new(PageScope::Session(session_id))
        .with_filters(request.prefilters.clone())
        .with_filters(request.filters.clone())
}

async fn count_buckets(
    session_id: SessionId,
    request: &StatsRequest,
    token: &CancellationToken,
    deps: &CoreDeps,
) -> Result<PageBuckets, StatsError> {
    let selection = selection_for(session_id, request);
    let definitions: Vec<Vec<FilterEntry>> = Bucket::ALL.iter().map(|b| b.entries()).collect();

    let (total, counts) =
        cancellable(token, deps.pages.count_buckets(&selection, &definitions)).await?;
    Ok(PageBuckets::from_counts(total, &counts))
}

/// Pages flagged by any problematic audit check of the SKU.
async fn count_problematic(
    sku: SkuId,
    request: &StatsRequest,
    token: &CancellationToken,
    deps: &CoreDeps,
) -> Result<i64, StatsError> {
    let checks = cancellable(
        token,
        deps.audit_checks
            .audit_checks_in_category(sku, PROBLEMATIC_CATEGORY),
    )
    .await?;

    let mut union = Vec::new();
    for check in &checks {
        match check.valid_filter_groups() {
            Ok((groups, rejected)) => {
                for e in &rejected {
                    warn!(check_id = %check.id, error = %e, "Skipping invalid filter group of problematic check");
                }
                union.extend(groups.entries().iter().cloned());
            }
            Err(e) => {
                warn!(check_id = %check.id, error = %e, "Skipping problematic check with invalid filter config")
            }
        }
    }

    if union.is_empty() {
        debug!(search_keyword_url_id = %sku, checks = checks.len(), "No problematic filters to count");
        return Ok(0);
    }

    let selection = selection_for(request.session_id, request).with_any_of(union);
    Ok(cancellable(token, deps.pages.count_pages(&selection)).await?)
}
