use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::common::{cancellable, AuditCheckId, CoreError, SessionId};
use crate::domains::filters::{Column, FilterSpec, PageScope};
use crate::domains::pages::models::{Page, PageSelection, PageWindow, SortDirection};
use crate::kernel::CoreDeps;

pub const DEFAULT_PAGES_PER_CHECK: i64 = 10;

/// An audit check with a sample of the pages it flags.
#[derive(Debug, Clone, Serialize)]
pub struct CheckWithPages {
    pub id: AuditCheckId,
    pub name: String,
    pub category: String,
    pub pages: Vec<Page>,
}

/// Every audit check of the session's SKU, in id order, each with up to
/// `limit_per_check` matching pages in page-id order.
///
/// Pages come from the session, or from the session and `comparison_id`
/// together, and must match `view_filters` as well as one of the check's
/// filter groups. Checks that flag nothing keep their place with no pages.
pub async fn checks_with_pages(
    session_id: SessionId,
    comparison_id: Option<SessionId>,
    view_filters: &FilterSpec,
    limit_per_check: i64,
    token: &CancellationToken,
    deps: &CoreDeps,
) -> Result<Vec<CheckWithPages>, CoreError> {
    let limit = if limit_per_check > 0 {
        limit_per_check
    } else {
        DEFAULT_PAGES_PER_CHECK
    };

    let session = cancellable(token, deps.sessions.find_session(session_id))
        .await?
        .ok_or(CoreError::SessionNotFound(session_id))?;

    let checks = cancellable(
        token,
        deps.audit_checks
            .audit_checks_for_sku(session.search_keyword_url_id),
    )
    .await?;

    let scope = PageScope::with_comparison(session_id, comparison_id);
    let window = PageWindow {
        sort: Column::parse("id")?,
        direction: SortDirection::Asc,
        limit,
        offset: 0,
    };

    let mut results = Vec::with_capacity(checks.len());
    for check in checks {
        let pages = match check.valid_filter_groups() {
            Ok((groups, rejected)) => {
                for e in &rejected {
                    warn!(check_id = %check.id, error = %e, "Skipping invalid filter group of audit check");
                }
                let selection = PageSelection::new(scope.clone())
                    .with_filters(view_filters.clone())
                    .with_any_of(groups.entries().to_vec());
                cancellable(token, deps.pages.find_pages(&selection, &window)).await?
            }
            Err(e) => {
                warn!(check_id = %check.id, error = %e, "Skipping pages for audit check with invalid filter config");
                Vec::new()
            }
        };

        debug!(check_id = %check.id, pages = pages.len(), "Sampled pages for audit check");
        results.push(CheckWithPages {
            id: check.id,
            name: check.name,
            category: check.category,
            pages,
        });
    }

    Ok(results)
}
