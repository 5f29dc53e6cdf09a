use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::common::{cancellable, CoreError, PageId, SkuId};
use crate::domains::pages::models::{Page, PageImage};
use crate::kernel::CoreDeps;

pub const DEFAULT_DETAILS_LIMIT: i64 = 100;

/// What a page looks like from the link graph.
///
/// Successful pages report their images and the broken pages they link to.
/// Anything else reports the pages that link to it.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PageDetails {
    Success {
        page: Page,
        images: Vec<PageImage>,
        broken_links: Vec<Page>,
    },
    Failure {
        page: Page,
        referrers: Vec<Page>,
    },
}

pub async fn page_details(
    page_id: PageId,
    sku: SkuId,
    limit: i64,
    token: &CancellationToken,
    deps: &CoreDeps,
) -> Result<PageDetails, CoreError> {
    let limit = if limit > 0 { limit } else { DEFAULT_DETAILS_LIMIT };

    let page = cancellable(token, deps.pages.find_page(page_id))
        .await?
        .ok_or_else(|| CoreError::not_found("page", page_id))?;

    // A page is only visible through the SKU its session was crawled for
    let session = cancellable(token, deps.sessions.find_session(page.crawling_session_id)).await?;
    if session.map(|s| s.search_keyword_url_id) != Some(sku) {
        debug!(page_id = %page_id, search_keyword_url_id = %sku, "Page does not belong to SKU");
        return Err(CoreError::not_found("page", page_id));
    }

    if (200..300).contains(&page.response_code) {
        let images = cancellable(token, deps.pages.page_images(page_id, limit)).await?;
        let broken_links = cancellable(token, deps.pages.broken_link_targets(page_id, limit)).await?;
        Ok(PageDetails::Success {
            page,
            images,
            broken_links,
        })
    } else {
        let referrers = cancellable(token, deps.pages.referrers(page_id, limit)).await?;
        Ok(PageDetails::Failure { page, referrers })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ErrorKind;
    use crate::domains::crawling::models::NewCrawlingSession;
    use crate::kernel::{PageFixture, TestDependencies};

    async fn session_for(test_deps: &TestDependencies, sku: i64) -> crate::common::SessionId {
        test_deps
            .deps()
            .sessions
            .create_session(
                &NewCrawlingSession::builder()
                    .search_keyword_url_id(SkuId::from_i64(sku))
                    .url("https://example.com")
                    .build(),
            )
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_success_page_lists_images_and_broken_links() {
        let test_deps = TestDependencies::new();
        let session = session_for(&test_deps, 1).await;
        let fixture = |code| PageFixture::builder().session_id(session).response_code(code).build();

        let home = test_deps.pages.add_page(fixture(200));
        let ok = test_deps.pages.add_page(fixture(200));
        let missing = test_deps.pages.add_page(fixture(404));
        let down = test_deps.pages.add_page(fixture(503));
        for target in [ok.id, missing.id, down.id] {
            test_deps.pages.add_link(home.id, target);
        }
        test_deps.pages.add_image(home.id, "https://example.com/logo.png");

        let details = page_details(home.id, SkuId::from_i64(1), 0, &CancellationToken::new(), &test_deps.deps())
            .await
            .unwrap();

        match details {
            PageDetails::Success {
                images,
                broken_links,
                ..
            } => {
                assert_eq!(images.len(), 1);
                let ids: Vec<PageId> = broken_links.iter().map(|p| p.id).collect();
                assert_eq!(ids, vec![missing.id, down.id]);
            }
            other => panic!("expected success details, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_failed_page_lists_referrers_up_to_limit() {
        let test_deps = TestDependencies::new();
        let session = session_for(&test_deps, 1).await;
        let fixture = |code| PageFixture::builder().session_id(session).response_code(code).build();

        let missing = test_deps.pages.add_page(fixture(404));
        let a = test_deps.pages.add_page(fixture(200));
        let b = test_deps.pages.add_page(fixture(200));
        test_deps.pages.add_link(a.id, missing.id);
        test_deps.pages.add_link(b.id, missing.id);

        let details = page_details(missing.id, SkuId::from_i64(1), 1, &CancellationToken::new(), &test_deps.deps())
            .await
            .unwrap();

        match details {
            PageDetails::Failure { referrers, .. } => {
                assert_eq!(referrers.iter().map(|p| p.id).collect::<Vec<_>>(), vec![a.id]);
            }
            other => panic!("expected failure details, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_page_of_other_sku_is_not_found() {
        let test_deps = TestDependencies::new();
        let session = session_for(&test_deps, 1).await;
        let page = test_deps
            .pages
            .add_page(PageFixture::builder().session_id(session).build());

        let err = page_details(page.id, SkuId::from_i64(2), 10, &CancellationToken::new(), &test_deps.deps())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = page_details(PageId::from_i64(999), SkuId::from_i64(1), 10, &CancellationToken::new(), &test_deps.deps())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
