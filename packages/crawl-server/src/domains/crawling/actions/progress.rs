use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::common::{cancellable, CoreError, SessionId};
use crate::domains::crawling::models::{CrawlingSession, ProgressDelta, SiteInfo};
use crate::kernel::CoreDeps;

/// Finish a session. Repeating the call re-sets the reason; `ended_at` keeps its first value.
pub async fn mark_session_done(
    id: SessionId,
    reason: &str,
    token: &CancellationToken,
    deps: &CoreDeps,
) -> Result<CrawlingSession, CoreError> {
    let session = cancellable(token, deps.sessions.mark_done(id, reason)).await?;

    info!(
        session_id = %id,
        end_reason = session.end_reason.as_deref().unwrap_or_default(),
        pages_count = session.pages_count,
        "Crawling session done"
    );

    Ok(session)
}

pub async fn update_site_info(
    id: SessionId,
    info: &SiteInfo,
    token: &CancellationToken,
    deps: &CoreDeps,
) -> Result<(), CoreError> {
    cancellable(token, deps.sessions.update_site_info(id, info)).await?;
    debug!(session_id = %id, ips = info.ips.len(), ssl_valid = info.ssl_valid, "Updated site info");
    Ok(())
}

pub async fn update_progress(
    id: SessionId,
    delta: &ProgressDelta,
    token: &CancellationToken,
    deps: &CoreDeps,
) -> Result<(), CoreError> {
    cancellable(token, deps.sessions.update_progress(id, delta)).await?;
    debug!(session_id = %id, ?delta, "Updated crawl progress");
    Ok(())
}
