use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::PgPool;
use std::time::Duration;
use typed_builder::TypedBuilder;

use crate::common::{CoreError, SessionId, SkuId};

/// Partial unique index guaranteeing one active session per SKU.
pub const ONE_ACTIVE_PER_SKU_CONSTRAINT: &str = "crawling_sessions_one_active_per_sku";

/// Longest stall threshold honored; larger values overflow a Postgres interval.
pub const MAX_STALL_THRESHOLD: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// CrawlingSession - one crawl of a search keyword URL, dispatched to a worker
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CrawlingSession {
    pub id: SessionId,
    pub search_keyword_url_id: SkuId,
    pub url: String,
    pub status: CrawlingSessionStatus,
    pub queue: i32,
    pub version: i32,

    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub end_reason: Option<String>,
    pub error: Option<String>,

    // Site metadata
    pub ips: Option<Vec<String>>,
    pub dns_servers: Option<Vec<String>>,
    pub aliases: Option<Vec<String>>,
    pub location: Option<String>,
    pub sitemap: bool,
    pub robots: bool,
    pub ssl_valid: bool,
    pub ssl_valid_until: Option<DateTime<Utc>>,

    // Progress counters
    pub pages_count: i64,
    pub internal_urls_count: i64,
    pub ignored_urls_count: i64,
    pub external_urls_count: i64,
    pub internal_resources_count: i64,
    pub external_resources_count: i64,

    pub options: Option<Value>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "crawling_session_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CrawlingSessionStatus {
    Pending,
    Processing,
    Done,
}

impl CrawlingSessionStatus {
    /// Pending and processing sessions block a new session for the same SKU.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Processing)
    }
}

impl std::fmt::Display for CrawlingSessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CrawlingSessionStatus::Pending => write!(f, "pending"),
            CrawlingSessionStatus::Processing => write!(f, "processing"),
            CrawlingSessionStatus::Done => write!(f, "done"),
        }
    }
}

/// Input for creating a session.
#[derive(Debug, Clone, TypedBuilder, Serialize, Deserialize)]
pub struct NewCrawlingSession {
    pub search_keyword_url_id: SkuId,
    #[builder(setter(into))]
    pub url: String,
    #[builder(default = 1)]
    pub queue: i32,
    #[builder(default, setter(strip_option))]
    pub options: Option<Map<String, Value>>,
}

impl NewCrawlingSession {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.search_keyword_url_id.is_zero() {
            return Err(CoreError::invalid_input(
                "search_keyword_url_id",
                "must be non-zero",
            ));
        }
        if self.url.trim().is_empty() {
            return Err(CoreError::invalid_input("url", "must not be empty"));
        }
        Ok(())
    }
}

/// Site metadata reported by a worker; overwrites the stored values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteInfo {
    pub ips: Vec<String>,
    pub dns_servers: Vec<String>,
    pub aliases: Vec<String>,
    pub location: Option<String>,
    pub sitemap: bool,
    pub robots: bool,
    pub ssl_valid: bool,
    pub ssl_valid_until: Option<DateTime<Utc>>,
}

/// Counter increments reported by a worker after crawling a page.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ProgressDelta {
    pub inc_pages: bool,
    pub internal_urls: i64,
    pub ignored_urls: i64,
    pub external_urls: i64,
}

impl ProgressDelta {
    pub fn pages_increment(&self) -> i64 {
        i64::from(self.inc_pages)
    }
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

const SESSION_COLUMNS: &str = r#"
    id, search_keyword_url_id, url, status, queue, version,
    started_at, ended_at, end_reason, error,
    ips, dns_servers, aliases, location, sitemap, robots, ssl_valid, ssl_valid_until,
    pages_count, internal_urls_count, ignored_urls_count, external_urls_count,
    internal_resources_count, external_resources_count,
    options, created_at, updated_at
"#;

impl CrawlingSession {
    /// Find session by ID
    pub async fn find_by_id(id: SessionId, pool: &PgPool) -> Result<Option<Self>, CoreError> {
        let session = sqlx::query_as::<_, CrawlingSession>(&format!(
            "SELECT {SESSION_COLUMNS} FROM crawling_sessions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;
        Ok(session)
    }

    /// Whether the SKU already has a pending or processing session
    pub async fn has_active_for_sku(sku: SkuId, pool: &PgPool) -> Result<bool, CoreError> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM crawling_sessions
                WHERE search_keyword_url_id = $1
                  AND status IN ('pending', 'processing')
            )
            "#,
        )
        .bind(sku)
        .fetch_one(pool)
        .await?;
        Ok(exists)
    }

    /// Insert a pending session at version 1.
    ///
    /// A concurrent insert for the same SKU trips the partial unique index and
    /// comes back as `SessionAlreadyRunning`.
    pub async fn create(input: &NewCrawlingSession, pool: &PgPool) -> Result<Self, CoreError> {
        let result = sqlx::query_as::<_, CrawlingSession>(&format!(
            r#"
            INSERT INTO crawling_sessions
                (search_keyword_url_id, url, status, queue, version, options)
            VALUES ($1, $2, 'pending', $3, 1, $4)
            RETURNING {SESSION_COLUMNS}
            "#
        ))
        .bind(input.search_keyword_url_id)
        .bind(input.url.trim())
        .bind(input.queue)
        .bind(input.options.clone().map(Value::Object))
        .fetch_one(pool)
        .await;

        match result {
            Ok(session) => Ok(session),
            Err(sqlx::Error::Database(db_err))
                if db_err.constraint() == Some(ONE_ACTIVE_PER_SKU_CONSTRAINT) =>
            {
                Err(CoreError::SessionAlreadyRunning(input.search_keyword_url_id))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Claim up to `limit` pending sessions of a queue, oldest first.
    ///
    /// Rows locked by a concurrent claimer are skipped, so concurrent callers
    /// always receive disjoint sets.
    pub async fn claim_pending(queue: i32, limit: i64, pool: &PgPool) -> Result<Vec<Self>, CoreError> {
        if limit <= 0 {
            return Ok(Vec::new());
        }

        let mut sessions = sqlx::query_as::<_, CrawlingSession>(&format!(
            r#"
            WITH next_sessions AS (
                SELECT id
                FROM crawling_sessions
                WHERE status = 'pending'
                  AND queue = $1
                ORDER BY created_at ASC, id ASC
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            )
            UPDATE crawling_sessions cs
            SET status = 'processing',
                started_at = NOW(),
                updated_at = NOW()
            FROM next_sessions
            WHERE cs.id = next_sessions.id
            RETURNING {}
            "#,
            qualified_columns("cs")
        ))
        .bind(queue)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        sort_oldest_first(&mut sessions);
        Ok(sessions)
    }

    /// Re-claim processing sessions whose `started_at` is older than
    /// `stall_threshold`, skipping `exclude` (sessions the caller still owns).
    pub async fn claim_stalled(
        queue: i32,
        exclude: &[SessionId],
        stall_threshold: Duration,
        limit: i64,
        pool: &PgPool,
    ) -> Result<Vec<Self>, CoreError> {
        if limit <= 0 {
            return Ok(Vec::new());
        }

        let threshold_ms = i64::try_from(stall_threshold.min(MAX_STALL_THRESHOLD).as_millis()).unwrap_or(i64::MAX);

        let mut sessions = sqlx::query_as::<_, CrawlingSession>(&format!(
            r#"
            WITH stalled AS (
                SELECT id
                FROM crawling_sessions
                WHERE status = 'processing'
                  AND queue = $1
                  AND started_at < NOW() - ($2 || ' milliseconds')::INTERVAL
                  AND NOT (id = ANY($3))
                ORDER BY started_at ASC, id ASC
                LIMIT $4
                FOR UPDATE SKIP LOCKED
            )
            UPDATE crawling_sessions cs
            SET started_at = NOW(),
                updated_at = NOW()
            FROM stalled
            WHERE cs.id = stalled.id
            RETURNING {}
            "#,
            qualified_columns("cs")
        ))
        .bind(queue)
        .bind(threshold_ms.to_string())
        .bind(exclude)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        sort_oldest_first(&mut sessions);
        Ok(sessions)
    }

    /// Mark a session done. Repeated calls re-set the reason but `ended_at`
    /// keeps its first value.
    pub async fn mark_done(id: SessionId, reason: &str, pool: &PgPool) -> Result<Self, CoreError> {
        sqlx::query_as::<_, CrawlingSession>(&format!(
            r#"
            UPDATE crawling_sessions
            SET status = 'done',
                end_reason = $2,
                ended_at = COALESCE(ended_at, NOW()),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {SESSION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(reason)
        .fetch_optional(pool)
        .await?
        .ok_or(CoreError::SessionNotFound(id))
    }

    /// Overwrite site metadata (last writer wins)
    pub async fn update_site_info(id: SessionId, info: &SiteInfo, pool: &PgPool) -> Result<(), CoreError> {
        let result = sqlx::query(
            r#"
            UPDATE crawling_sessions
            SET ips = $2,
                dns_servers = $3,
                aliases = $4,
                location = $5,
                sitemap = $6,
                robots = $7,
                ssl_valid = $8,
                ssl_valid_until = $9,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&info.ips)
        .bind(&info.dns_servers)
        .bind(&info.aliases)
        .bind(&info.location)
        .bind(info.sitemap)
        .bind(info.robots)
        .bind(info.ssl_valid)
        .bind(info.ssl_valid_until)
        .execute(pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::SessionNotFound(id));
        }
        Ok(())
    }

    /// Apply counter increments in the database, never read-modify-write
    pub async fn update_progress(id: SessionId, delta: &ProgressDelta, pool: &PgPool) -> Result<(), CoreError> {
        let result = sqlx::query(
            r#"
            UPDATE crawling_sessions
            SET pages_count = pages_count + $2,
                internal_urls_count = internal_urls_count + $3,
                ignored_urls_count = ignored_urls_count + $4,
                external_urls_count = external_urls_count + $5,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(delta.pages_increment())
        .bind(delta.internal_urls)
        .bind(delta.ignored_urls)
        .bind(delta.external_urls)
        .execute(pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::SessionNotFound(id));
        }
        Ok(())
    }
}

fn qualified_columns(alias: &str) -> String {
    SESSION_COLUMNS
        .split(',')
        .map(|column| format!("{alias}.{}", column.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// `RETURNING` order is unspecified; claimers expect oldest first.
pub(crate) fn sort_oldest_first(sessions: &mut [CrawlingSession]) {
    sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
}
