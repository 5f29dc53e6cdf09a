use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use typed_builder::TypedBuilder;

use crate::common::{cancellable, CoreError, PaginationArgs, SessionId};
use crate::domains::filters::{Column, FilterSpec, PageScope};
use crate::domains::pages::models::{Page, PageSelection, PageWindow, SortDirection};
use crate::kernel::CoreDeps;

#[derive(Debug, Clone, TypedBuilder)]
pub struct PageListRequest {
    pub session_id: SessionId,
    #[builder(default)]
    pub filters: FilterSpec,
    /// Column to sort by; `id` when absent.
    #[builder(default, setter(strip_option, into))]
    pub sort: Option<String>,
    #[builder(default, setter(strip_option, into))]
    pub direction: Option<String>,
    #[builder(default)]
    pub pagination: PaginationArgs,
}

#[derive(Debug, Clone, Serialize)]
pub struct PageList {
    pub total: i64,
    pub page: i64,
    pub page_limit: i64,
    pub pages: Vec<Page>,
}

/// Filtered, sorted, paginated pages of one session plus the total match count.
pub async fn list_pages(
    request: &PageListRequest,
    token: &CancellationToken,
    deps: &CoreDeps,
) -> Result<PageList, CoreError> {
    let sort = match request.sort.as_deref().map(str::trim) {
        None | Some("") => Column::parse("id")?,
        Some(name) => Column::parse(name).map_err(|_| {
            CoreError::invalid_input("sort", format!("{name:?} is not a valid column"))
        })?,
    };
    let pagination = request.pagination.validate();

    let selection = PageSelection::new(PageScope::Session(request.session_id))
        .with_filters(request.filters.clone());
    let window = PageWindow {
        sort,
        direction: SortDirection::parse(request.direction.as_deref()),
        limit: pagination.limit,
        offset: pagination.offset(),
    };

    let total = cancellable(token, deps.pages.count_pages(&selection)).await?;
    let pages = if total > window.offset {
        cancellable(token, deps.pages.find_pages(&selection, &window)).await?
    } else {
        Vec::new()
    };

    debug!(
        session_id = %request.session_id,
        total,
        returned = pages.len(),
        page = pagination.page,
        "Listed pages"
    );

    Ok(PageList {
        total,
        page: pagination.page,
        page_limit: pagination.limit,
        pages,
    })
}
