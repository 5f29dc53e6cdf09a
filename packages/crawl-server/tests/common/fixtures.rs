//! Test fixtures for creating test data.
//!
//! Sessions go through the model methods; pages, links and images are
//! written by crawl workers in production, so they are inserted directly.

use anyhow::Result;
use crawl_core::common::{PageId, SessionId, SkuId};
use crawl_core::domains::audits::models::{AuditCheck, NewAuditCheck};
use crawl_core::domains::crawling::models::{CrawlingSession, NewCrawlingSession};
use serde_json::Value;
use sqlx::PgPool;

/// Create a pending session for `sku` on `queue`
pub async fn create_test_session(pool: &PgPool, sku: SkuId, queue: i32) -> Result<CrawlingSession> {
    let input = NewCrawlingSession::builder()
        .search_keyword_url_id(sku)
        .url(format!("https://sku-{sku}.example"))
        .queue(queue)
        .build();
    Ok(CrawlingSession::create(&input, pool).await?)
}

/// Insert a page with the given response code and depth
pub async fn insert_test_page(
    pool: &PgPool,
    session_id: SessionId,
    response_code: i32,
    depth: Option<i32>,
) -> Result<PageId> {
    insert_test_page_with(pool, session_id, response_code, depth, None, Some("Title"), Some("Description")).await
}

pub async fn insert_test_page_with(
    pool: &PgPool,
    session_id: SessionId,
    response_code: i32,
    depth: Option<i32>,
    redirect_code: Option<i32>,
    og_title: Option<&str>,
    og_description: Option<&str>,
) -> Result<PageId> {
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO pages (crawling_session_id, url, response_code, depth, redirect_code, og_title, og_description)
        VALUES ($1, 'https://example.com/' || gen_random_uuid()::text, $2, $3, $4, $5, $6)
        RETURNING id
        "#,
    )
    .bind(session_id)
    .bind(response_code)
    .bind(depth)
    .bind(redirect_code)
    .bind(og_title)
    .bind(og_description)
    .fetch_one(pool)
    .await?;
    Ok(PageId::from_i64(id))
}

pub async fn insert_test_link(pool: &PgPool, source: PageId, target: PageId) -> Result<()> {
    sqlx::query("INSERT INTO page_links (source_page_id, target_page_id) VALUES ($1, $2)")
        .bind(source)
        .bind(target)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn insert_test_image(pool: &PgPool, page_id: PageId, url: &str) -> Result<()> {
    sqlx::query("INSERT INTO page_images (page_id, url) VALUES ($1, $2)")
        .bind(page_id)
        .bind(url)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn create_test_audit_check(
    pool: &PgPool,
    sku: SkuId,
    name: &str,
    category: &str,
    filter_config: Value,
) -> Result<AuditCheck> {
    let input = NewAuditCheck {
        search_keyword_url_id: sku,
        name: name.to_string(),
        category: category.to_string(),
        filter_config,
    };
    Ok(AuditCheck::create(&input, pool).await?)
}

/// Pretend the worker holding the session went quiet `secs` seconds ago
pub async fn backdate_started_at(pool: &PgPool, session_id: SessionId, secs: i64) -> Result<()> {
    sqlx::query(
        "UPDATE crawling_sessions SET started_at = NOW() - ($2 || ' seconds')::INTERVAL WHERE id = $1",
    )
    .bind(session_id)
    .bind(secs.to_string())
    .execute(pool)
    .await?;
    Ok(())
}
