use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgArguments;
use sqlx::{Arguments, PgPool, Row};

use super::PageSelection;
use crate::common::{CoreError, PageId, PageImageId, SessionId};
use crate::domains::filters::{compile_any_of, Column, FilterEntry, FilterRow, FilterScalar};

/// Page - one crawled URL within a session (written by workers, read-only here)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Page {
    pub id: PageId,
    pub crawling_session_id: SessionId,
    pub url: String,
    pub response_code: i32,
    pub redirect_code: Option<i32>,
    pub depth: Option<i32>,
    pub title: Option<String>,
    pub og_title: Option<String>,
    pub og_description: Option<String>,
    pub content_type: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl FilterRow for Page {
    fn attribute(&self, column: &str) -> Option<FilterScalar> {
        let int = |v: i32| FilterScalar::Integer(i64::from(v));
        let text = |v: &Option<String>| v.clone().map(FilterScalar::Text);
        match column {
            "id" => Some(FilterScalar::Integer(self.id.as_i64())),
            "crawling_session_id" => Some(FilterScalar::Integer(self.crawling_session_id.as_i64())),
            "url" => Some(FilterScalar::Text(self.url.clone())),
            "response_code" => Some(int(self.response_code)),
            "redirect_code" => self.redirect_code.map(int),
            "depth" => self.depth.map(int),
            "title" => text(&self.title),
            "og_title" => text(&self.og_title),
            "og_description" => text(&self.og_description),
            "content_type" => text(&self.content_type),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PageImage {
    pub id: PageImageId,
    pub page_id: PageId,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    /// `desc` in any case sorts descending; anything else ascending.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some(s) if s.trim().eq_ignore_ascii_case("desc") => SortDirection::Desc,
            _ => SortDirection::Asc,
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// A sorted, paginated slice of a selection.
#[derive(Debug, Clone, PartialEq)]
pub struct PageWindow {
    pub sort: Column,
    pub direction: SortDirection,
    pub limit: i64,
    pub offset: i64,
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

const PAGE_COLUMNS: &str = r#"
    id, crawling_session_id, url, response_code, redirect_code, depth,
    title, og_title, og_description, content_type, created_at
"#;

fn page_columns(alias: &str) -> String {
    PAGE_COLUMNS
        .split(',')
        .map(|column| format!("{alias}.{}", column.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn add_i64(arguments: &mut PgArguments, value: i64) -> Result<(), CoreError> {
    arguments
        .add(value)
        .map_err(|e| CoreError::DatabaseError(sqlx::Error::Encode(e)))
}

impl Page {
    pub async fn find_by_id(id: PageId, pool: &PgPool) -> Result<Option<Self>, CoreError> {
        let page = sqlx::query_as::<_, Page>(&format!("SELECT {PAGE_COLUMNS} FROM pages WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(page)
    }

    pub async fn count(selection: &PageSelection, pool: &PgPool) -> Result<i64, CoreError> {
        let Some(predicate) = selection.predicate() else {
            return Ok(0);
        };
        let count = sqlx::query_scalar_with::<_, i64, _>(
            &format!("SELECT COUNT(*) FROM pages WHERE {}", predicate.sql()),
            predicate.arguments()?,
        )
        .fetch_one(pool)
        .await?;
        Ok(count)
    }

    /// One window of a selection. The sort column is followed by `id` so
    /// pages with equal sort keys keep a stable order across windows.
    pub async fn find_window(
        selection: &PageSelection,
        window: &PageWindow,
        pool: &PgPool,
    ) -> Result<Vec<Self>, CoreError> {
        let Some(predicate) = selection.predicate() else {
            return Ok(Vec::new());
        };

        let mut order_by = format!("{} {}", window.sort, window.direction.as_sql());
        if window.sort.as_str() != "id" {
            order_by.push_str(", id ASC");
        }

        let next = predicate.args().len();
        let sql = format!(
            "SELECT {PAGE_COLUMNS} FROM pages WHERE {} ORDER BY {order_by} LIMIT ${} OFFSET ${}",
            predicate.sql(),
            next + 1,
            next + 2
        );

        let mut arguments = predicate.arguments()?;
        add_i64(&mut arguments, window.limit)?;
        add_i64(&mut arguments, window.offset)?;

        let pages = sqlx::query_as_with::<_, Page, _>(&sql, arguments)
            .fetch_all(pool)
            .await?;
        Ok(pages)
    }

    /// `COUNT(*)` of the selection plus one `COUNT(*) FILTER` per bucket, in a
    /// single scan.
    pub async fn count_buckets(
        selection: &PageSelection,
        buckets: &[Vec<FilterEntry>],
        pool: &PgPool,
    ) -> Result<(i64, Vec<i64>), CoreError> {
        let Some(predicate) = selection.predicate() else {
            return Ok((0, vec![0; buckets.len()]));
        };

        let (where_sql, mut args) = predicate.into_parts();
        let mut select = vec!["COUNT(*)".to_string()];
        for bucket in buckets {
            let union = compile_any_of(bucket);
            if union.is_empty() {
                select.push("0::BIGINT".to_string());
                continue;
            }
            let shifted = union.shifted(args.len());
            select.push(format!("COUNT(*) FILTER (WHERE {})", shifted.sql()));
            args.extend(shifted.args().iter().cloned());
        }

        let sql = format!("SELECT {} FROM pages WHERE {where_sql}", select.join(", "));
        let mut arguments = PgArguments::default();
        for arg in &args {
            crate::domains::filters::push_argument(&mut arguments, arg)?;
        }

        let row = sqlx::query_with(&sql, arguments).fetch_one(pool).await?;
        let total: i64 = row.try_get(0)?;
        let counts = (1..=buckets.len())
            .map(|i| row.try_get::<i64, _>(i))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((total, counts))
    }

    /// Images of a page in id order
    pub async fn images(page_id: PageId, limit: i64, pool: &PgPool) -> Result<Vec<PageImage>, CoreError> {
        let images = sqlx::query_as::<_, PageImage>(
            "SELECT id, page_id, url FROM page_images WHERE page_id = $1 ORDER BY id LIMIT $2",
        )
        .bind(page_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;
        Ok(images)
    }

    /// Pages this page links to that answered with a 4xx/5xx
    pub async fn broken_link_targets(page_id: PageId, limit: i64, pool: &PgPool) -> Result<Vec<Self>, CoreError> {
        let pages = sqlx::query_as::<_, Page>(&format!(
            r#"
            SELECT DISTINCT {cols}
            FROM page_links l
            JOIN pages t ON t.id = l.target_page_id
            WHERE l.source_page_id = $1
              AND t.response_code >= 400
            ORDER BY t.id
            LIMIT $2
            "#,
            cols = page_columns("t")
        ))
        .bind(page_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;
        Ok(pages)
    }

    /// Pages linking to this page
    pub async fn referrers(page_id: PageId, limit: i64, pool: &PgPool) -> Result<Vec<Self>, CoreError> {
        let pages = sqlx::query_as::<_, Page>(&format!(
            r#"
            SELECT DISTINCT {cols}
            FROM page_links l
            JOIN pages s ON s.id = l.source_page_id
            WHERE l.target_page_id = $1
            ORDER BY s.id
            LIMIT $2
            "#,
            cols = page_columns("s")
        ))
        .bind(page_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;
        Ok(pages)
    }
}
