//! Integration tests for the read side against PostgreSQL:
//! - stats buckets, problematic pages, site health and comparison
//! - page listing with filters, sort and pagination
//! - audit checks with sample pages, view counts and page details

mod common;

use crate::common::{
    create_test_audit_check, create_test_session, insert_test_image, insert_test_link,
    insert_test_page, insert_test_page_with, TestHarness,
};
use crawl_core::common::{ErrorKind, PageId, PaginationArgs};
use crawl_core::domains::filters::FilterSpec;
use crawl_core::domains::pages::actions::{
    checks_with_pages, list_pages, page_details, PageDetails, PageListRequest,
};
use crawl_core::domains::stats::{fetch_stats, StatsError, StatsRequest};
use crawl_core::domains::views::models::{NewView, View};
use crawl_core::domains::views::view_page_count;
use serde_json::json;
use test_context::test_context;
use tokio_util::sync::CancellationToken;

fn problematic_config() -> serde_json::Value {
    json!({"filter_groups": [{"filters": [
        {"name": "response_code", "operator": "gte", "value": 400}
    ]}]})
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_problematic_pages_drive_site_health(ctx: &TestHarness) {
    let sku = ctx.unique_sku();
    let session = create_test_session(&ctx.db_pool, sku, ctx.unique_queue())
        .await
        .unwrap();
    for code in [200, 200, 200, 200, 200, 200, 200, 404, 410, 503] {
        insert_test_page(&ctx.db_pool, session.id, code, Some(1)).await.unwrap();
    }
    create_test_audit_check(&ctx.db_pool, sku, "Broken pages", "problematic", problematic_config())
        .await
        .unwrap();

    let request = StatsRequest::builder().session_id(session.id).build();
    let report = fetch_stats(&request, &CancellationToken::new(), &ctx.deps())
        .await
        .unwrap();

    assert_eq!(report.buckets.total, 10);
    assert_eq!(report.problematic, 3);
    assert_eq!(report.site_health, 70);
    assert_eq!(report.buckets.client_error_pages, 2);
    assert_eq!(report.buckets.server_error_pages, 1);
    assert_eq!(report.buckets.level1, 10);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_bucket_taxonomy(ctx: &TestHarness) {
    let pool = &ctx.db_pool;
    let session = create_test_session(pool, ctx.unique_sku(), ctx.unique_queue())
        .await
        .unwrap();

    insert_test_page_with(pool, session.id, 200, Some(1), None, Some("T"), Some("D")).await.unwrap();
    insert_test_page_with(pool, session.id, 200, Some(2), Some(301), Some("T"), Some("D")).await.unwrap();
    insert_test_page_with(pool, session.id, 200, Some(3), None, None, Some("D")).await.unwrap();
    insert_test_page_with(pool, session.id, 302, Some(4), Some(308), Some("T"), Some("")).await.unwrap();
    insert_test_page_with(pool, session.id, 404, Some(5), None, Some("T"), Some("D")).await.unwrap();
    insert_test_page_with(pool, session.id, 599, None, Some(200), Some("T"), Some("D")).await.unwrap();

    let report = fetch_stats(
        &StatsRequest::builder().session_id(session.id).build(),
        &CancellationToken::new(),
        &ctx.deps(),
    )
    .await
    .unwrap();
    let b = report.buckets;

    assert_eq!(b.total, 6);
    assert_eq!(b.ok, 2);
    assert_eq!(b.warning, 2);
    assert_eq!(b.error, 2);
    assert_eq!(b.redirection, 2);
    assert_eq!((b.level1, b.level2, b.level3, b.level4), (1, 1, 1, 1));
    assert_eq!(b.success_pages, 3);
    assert_eq!(b.redirect_pages, 1);
    assert_eq!(b.client_error_pages, 1);
    assert_eq!(b.server_error_pages, 1);
    assert_eq!(report.problematic, 0);
    assert_eq!(report.site_health, 100);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_stats_comparison_and_errors(ctx: &TestHarness) {
    let pool = &ctx.db_pool;
    let current = create_test_session(pool, ctx.unique_sku(), ctx.unique_queue())
        .await
        .unwrap();
    let previous = create_test_session(pool, ctx.unique_sku(), ctx.unique_queue())
        .await
        .unwrap();
    for code in [200, 200, 404] {
        insert_test_page(pool, current.id, code, Some(1)).await.unwrap();
    }
    for code in [200, 500, 500, 404] {
        insert_test_page(pool, previous.id, code, Some(2)).await.unwrap();
    }

    let request = StatsRequest::builder()
        .session_id(current.id)
        .comparison_session_id(previous.id)
        .build();
    let report = fetch_stats(&request, &CancellationToken::new(), &ctx.deps())
        .await
        .unwrap();
    let changes = report.changes.unwrap();
    assert_eq!(report.comparison.unwrap().total, 4);
    assert_eq!(changes.total, -1);
    assert_eq!(changes.error, -2);
    assert_eq!(changes.level1, 3);
    assert_eq!(changes.level2, -4);

    // Type mismatch between filter value and column is a store failure
    let request = StatsRequest::builder()
        .session_id(current.id)
        .filters(FilterSpec::parse(&json!([{"depth": "deep"}])).unwrap())
        .build();
    let err = fetch_stats(&request, &CancellationToken::new(), &ctx.deps())
        .await
        .unwrap_err();
    assert!(matches!(err, StatsError::AggregationFailed(_)));
    assert_eq!(err.kind(), ErrorKind::StoreFailure);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_list_pages_sorted_and_paginated(ctx: &TestHarness) {
    let pool = &ctx.db_pool;
    let session = create_test_session(pool, ctx.unique_sku(), ctx.unique_queue())
        .await
        .unwrap();
    let mut ids = Vec::new();
    for (code, depth) in [(200, 1), (500, 2), (404, 1), (200, 3), (301, 2)] {
        ids.push(insert_test_page(pool, session.id, code, Some(depth)).await.unwrap());
    }

    let request = PageListRequest::builder()
        .session_id(session.id)
        .filters(
            FilterSpec::parse(&json!([
                {"filters": [{"name": "response_code", "operator": "neq", "value": 301}]}
            ]))
            .unwrap(),
        )
        .sort("depth")
        .direction("desc")
        .pagination(PaginationArgs::new(1, 3))
        .build();
    let first = list_pages(&request, &CancellationToken::new(), &ctx.deps())
        .await
        .unwrap();
    assert_eq!(first.total, 4);
    let order: Vec<PageId> = first.pages.iter().map(|p| p.id).collect();
    // depth 3, then depth 2, then the first of the two depth-1 pages by id
    assert_eq!(order, vec![ids[3], ids[1], ids[0]]);

    let second = list_pages(
        &PageListRequest {
            pagination: PaginationArgs::new(2, 3),
            ..request
        },
        &CancellationToken::new(),
        &ctx.deps(),
    )
    .await
    .unwrap();
    assert_eq!(second.pages.iter().map(|p| p.id).collect::<Vec<_>>(), vec![ids[2]]);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_checks_with_pages_and_view_count(ctx: &TestHarness) {
    let pool = &ctx.db_pool;
    let sku = ctx.unique_sku();
    let session = create_test_session(pool, sku, ctx.unique_queue())
        .await
        .unwrap();
    let mut ids = Vec::new();
    for (code, depth) in [(200, 1), (404, 1), (500, 2), (404, 2)] {
        ids.push(insert_test_page(pool, session.id, code, Some(depth)).await.unwrap());
    }
    create_test_audit_check(pool, sku, "Broken", "problematic", problematic_config())
        .await
        .unwrap();
    create_test_audit_check(
        pool,
        sku,
        "Teapots",
        "fun",
        json!({"filter_groups": [{"response_code": 418}]}),
    )
    .await
    .unwrap();

    let view_filters = FilterSpec::parse(&json!([{"depth": 2}])).unwrap();
    let checks = checks_with_pages(
        session.id,
        None,
        &view_filters,
        10,
        &CancellationToken::new(),
        &ctx.deps(),
    )
    .await
    .unwrap();
    assert_eq!(checks.len(), 2);
    assert_eq!(checks[0].name, "Broken");
    assert_eq!(checks[0].pages.iter().map(|p| p.id).collect::<Vec<_>>(), vec![ids[2], ids[3]]);
    assert!(checks[1].pages.is_empty());

    let view = View::create(
        &NewView {
            search_keyword_url_id: sku,
            name: "Level one".to_string(),
            filter_config: json!({"filter_groups": [{"depth": 1}]}),
        },
        pool,
    )
    .await
    .unwrap();
    let count = view_page_count(view.id, session.id, &CancellationToken::new(), &ctx.deps())
        .await
        .unwrap();
    assert_eq!(count, 2);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_page_details_follow_links(ctx: &TestHarness) {
    let pool = &ctx.db_pool;
    let sku = ctx.unique_sku();
    let session = create_test_session(pool, sku, ctx.unique_queue())
        .await
        .unwrap();
    let home = insert_test_page(pool, session.id, 200, Some(0)).await.unwrap();
    let about = insert_test_page(pool, session.id, 200, Some(1)).await.unwrap();
    let gone = insert_test_page(pool, session.id, 410, Some(1)).await.unwrap();
    insert_test_link(pool, home, about).await.unwrap();
    insert_test_link(pool, home, gone).await.unwrap();
    insert_test_link(pool, about, gone).await.unwrap();
    insert_test_image(pool, home, "https://example.com/hero.png").await.unwrap();

    let token = CancellationToken::new();
    match page_details(home, sku, 0, &token, &ctx.deps()).await.unwrap() {
        PageDetails::Success {
            images,
            broken_links,
            ..
        } => {
            assert_eq!(images.len(), 1);
            assert_eq!(broken_links.iter().map(|p| p.id).collect::<Vec<_>>(), vec![gone]);
        }
        other => panic!("expected success details, got {other:?}"),
    }

    match page_details(gone, sku, 0, &token, &ctx.deps()).await.unwrap() {
        PageDetails::Failure { referrers, .. } => {
            assert_eq!(referrers.iter().map(|p| p.id).collect::<Vec<_>>(), vec![home, about]);
        }
        other => panic!("expected failure details, got {other:?}"),
    }

    let err = page_details(home, ctx.unique_sku(), 0, &token, &ctx.deps())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}
