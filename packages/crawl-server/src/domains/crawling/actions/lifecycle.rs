use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::common::{cancellable, CoreError, SessionId, SkuId};
use crate::domains::crawling::models::{CrawlingSession, NewCrawlingSession};
use crate::kernel::CoreDeps;

/// Fail with `SessionAlreadyRunning` when the SKU has a pending or processing session
pub async fn prevent_in_progress(
    sku: SkuId,
    token: &CancellationToken,
    deps: &CoreDeps,
) -> Result<(), CoreError> {
    let active = cancellable(token, deps.sessions.has_active_session(sku)).await?;
    if active {
        warn!(search_keyword_url_id = %sku, "Crawling session already in progress");
        return Err(CoreError::SessionAlreadyRunning(sku));
    }
    Ok(())
}

/// Create a pending crawling session for a search keyword URL.
///
/// The early check gives a clean conflict in the common case; the store
/// enforces the same rule atomically for concurrent creators.
pub async fn create_session(
    input: NewCrawlingSession,
    token: &CancellationToken,
    deps: &CoreDeps,
) -> Result<CrawlingSession, CoreError> {
    input.validate()?;

    prevent_in_progress(input.search_keyword_url_id, token, deps).await?;

    let session = cancellable(token, deps.sessions.create_session(&input)).await?;

    info!(
        session_id = %session.id,
        search_keyword_url_id = %session.search_keyword_url_id,
        queue = session.queue,
        "Created crawling session"
    );

    Ok(session)
}

pub async fn get_session(
    id: SessionId,
    token: &CancellationToken,
    deps: &CoreDeps,
) -> Result<CrawlingSession, CoreError> {
    cancellable(token, deps.sessions.find_session(id))
        .await?
        .ok_or(CoreError::SessionNotFound(id))
}
