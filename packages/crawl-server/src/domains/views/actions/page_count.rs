use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::common::{cancellable, CoreError, SessionId, ViewId};
use crate::domains::filters::PageScope;
use crate::domains::pages::models::PageSelection;
use crate::kernel::CoreDeps;

/// Number of the session's pages matching every filter group of a saved view.
pub async fn view_page_count(
    view_id: ViewId,
    session_id: SessionId,
    token: &CancellationToken,
    deps: &CoreDeps,
) -> Result<i64, CoreError> {
    let view = cancellable(token, deps.views.find_view(view_id))
        .await?
        .ok_or_else(|| CoreError::not_found("view", view_id))?;

    let selection = PageSelection::new(PageScope::Session(session_id)).with_filters(view.filters()?);
    let count = cancellable(token, deps.pages.count_pages(&selection)).await?;

    debug!(view_id = %view_id, session_id = %session_id, count, "Counted view pages");
    Ok(count)
}
