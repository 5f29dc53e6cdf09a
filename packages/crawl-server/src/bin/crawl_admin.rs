//! Operator CLI for crawl sessions and page analytics
//!
//! Every command prints one JSON line: the result on success, or
//! `{"success": false, "kind": ..., "error": ...}` with a non-zero exit.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::{json, Map, Value};
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use crawl_core::common::{CoreError, ErrorKind, PageId, PaginationArgs, SessionId, SkuId, ViewId};
use crawl_core::config::Config;
use crawl_core::domains::crawling::actions::{
    claim_pending_sessions, claim_stalled_sessions, create_session, get_session,
    mark_session_done, update_progress, update_site_info,
};
use crawl_core::domains::crawling::models::{NewCrawlingSession, ProgressDelta, SiteInfo};
use crawl_core::domains::filters::{FilterError, FilterSpec};
use crawl_core::domains::pages::actions::{checks_with_pages, list_pages, page_details, PageListRequest};
use crawl_core::domains::stats::{fetch_stats, StatsError, StatsRequest};
use crawl_core::domains::views::view_page_count;
use crawl_core::kernel::CoreDeps;

#[derive(Parser)]
#[command(name = "crawl_admin")]
#[command(about = "Crawl session and page analytics CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply database migrations
    Migrate,

    /// Create a pending crawling session for a SKU
    Create {
        #[arg(long)]
        sku: i64,
        #[arg(long)]
        url: String,
        #[arg(long, default_value_t = 1)]
        queue: i32,
        /// Crawl options as a JSON object
        #[arg(long)]
        options: Option<String>,
    },

    /// Show one session
    Get { id: i64 },

    /// Claim pending sessions (defaults from CLAIM_QUEUE / CLAIM_BATCH_SIZE)
    Claim {
        #[arg(long)]
        queue: Option<i32>,
        #[arg(long)]
        limit: Option<i64>,
    },

    /// Reclaim sessions idle longer than STALL_THRESHOLD_SECS
    ClaimStalled {
        #[arg(long)]
        queue: Option<i32>,
        #[arg(long)]
        limit: Option<i64>,
        /// Session ids still owned by the caller
        #[arg(long, value_delimiter = ',')]
        exclude: Vec<i64>,
    },

    /// Finish a session
    MarkDone {
        id: i64,
        #[arg(long, default_value = "completed")]
        reason: String,
    },

    /// Apply counter increments
    Progress {
        id: i64,
        #[arg(long)]
        inc_pages: bool,
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        internal: i64,
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        ignored: i64,
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        external: i64,
    },

    /// Overwrite site metadata from a JSON object
    SiteInfo { id: i64, info: String },

    /// Bucketed page stats, problematic pages and site health
    Stats {
        session: i64,
        #[arg(long)]
        compare: Option<i64>,
        #[arg(long)]
        prefilters: Option<String>,
        #[arg(long)]
        filters: Option<String>,
    },

    /// List pages of a session
    Pages {
        session: i64,
        #[arg(long)]
        filters: Option<String>,
        #[arg(long)]
        sort: Option<String>,
        #[arg(long)]
        direction: Option<String>,
        #[arg(long)]
        page: Option<i64>,
        #[arg(long)]
        page_limit: Option<i64>,
    },

    /// Audit checks of the session's SKU with sample pages
    Checks {
        session: i64,
        #[arg(long)]
        compare: Option<i64>,
        #[arg(long)]
        view_filters: Option<String>,
        #[arg(long, default_value_t = 10)]
        limit: i64,
    },

    /// Count session pages matching a saved view
    ViewCount { view: i64, session: i64 },

    /// Images and broken links of a page, or its referrers
    Details {
        page: i64,
        #[arg(long)]
        sku: i64,
        #[arg(long, default_value_t = 100)]
        limit: i64,
    },
}

// ============================================================================
// JSON Output
// ============================================================================

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<ErrorKind>,
    error: String,
}

fn output<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

fn error_kind(err: &anyhow::Error) -> Option<ErrorKind> {
    if let Some(core) = err.downcast_ref::<CoreError>() {
        return Some(core.kind());
    }
    if err.downcast_ref::<FilterError>().is_some() {
        return Some(ErrorKind::InvalidInput);
    }
    err.downcast_ref::<StatsError>().map(StatsError::kind)
}

fn parse_filters(raw: Option<&str>) -> Result<FilterSpec> {
    match raw {
        Some(raw) => Ok(FilterSpec::parse_str(raw)?),
        None => Ok(FilterSpec::empty()),
    }
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,crawl_core=debug,sqlx=warn".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_line_number(true)
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();
    let run_id = Uuid::new_v4();
    let span = tracing::info_span!("crawl_admin", %run_id);

    if let Err(err) = run(cli.command).instrument(span).await {
        tracing::error!(%run_id, error = ?err, "Command failed");
        output(&ErrorResponse {
            success: false,
            kind: error_kind(&err),
            error: format!("{err:#}"),
        })?;
        std::process::exit(1);
    }
    Ok(())
}

async fn run(command: Commands) -> Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    let token = CancellationToken::new();
    let shutdown = token.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("Received shutdown signal");
        shutdown.cancel();
    });

    let deps = CoreDeps::postgres(pool.clone());

    match command {
        Commands::Migrate => {
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .context("Failed to run migrations")?;
            tracing::info!("Migrations complete");
            output(&json!({"success": true}))
        }

        Commands::Create {
            sku,
            url,
            queue,
            options,
        } => {
            let options = options
                .map(|raw| serde_json::from_str::<Map<String, Value>>(&raw))
                .transpose()
                .context("--options must be a JSON object")?;
            let input = NewCrawlingSession {
                search_keyword_url_id: SkuId::from_i64(sku),
                url,
                queue,
                options,
            };
            output(&create_session(input, &token, &deps).await?)
        }

        Commands::Get { id } => output(&get_session(SessionId::from_i64(id), &token, &deps).await?),

        Commands::Claim { queue, limit } => {
            let sessions = claim_pending_sessions(
                queue.unwrap_or(config.claim_queue),
                limit.unwrap_or(config.claim_batch_size),
                &token,
                &deps,
            )
            .await?;
            output(&sessions)
        }

        Commands::ClaimStalled {
            queue,
            limit,
            exclude,
        } => {
            let exclude: Vec<SessionId> = exclude.into_iter().map(SessionId::from_i64).collect();
            let sessions = claim_stalled_sessions(
                queue.unwrap_or(config.claim_queue),
                &exclude,
                config.stall_threshold,
                limit.unwrap_or(config.claim_batch_size),
                &token,
                &deps,
            )
            .await?;
            output(&sessions)
        }

        Commands::MarkDone { id, reason } => {
            output(&mark_session_done(SessionId::from_i64(id), &reason, &token, &deps).await?)
        }

        Commands::Progress {
            id,
            inc_pages,
            internal,
            ignored,
            external,
        } => {
            let delta = ProgressDelta {
                inc_pages,
                internal_urls: internal,
                ignored_urls: ignored,
                external_urls: external,
            };
            update_progress(SessionId::from_i64(id), &delta, &token, &deps).await?;
            output(&json!({"success": true}))
        }

        Commands::SiteInfo { id, info } => {
            let info: SiteInfo =
                serde_json::from_str(&info).context("site info must be a JSON object")?;
            update_site_info(SessionId::from_i64(id), &info, &token, &deps).await?;
            output(&json!({"success": true}))
        }

        Commands::Stats {
            session,
            compare,
            prefilters,
            filters,
        } => {
            let request = StatsRequest {
                session_id: SessionId::from_i64(session),
                comparison_session_id: compare.map(SessionId::from_i64),
                prefilters: parse_filters(prefilters.as_deref())?,
                filters: parse_filters(filters.as_deref())?,
            };
            output(&fetch_stats(&request, &token, &deps).await?)
        }

        Commands::Pages {
            session,
            filters,
            sort,
            direction,
            page,
            page_limit,
        } => {
            let request = PageListRequest {
                session_id: SessionId::from_i64(session),
                filters: parse_filters(filters.as_deref())?,
                sort,
                direction,
                pagination: PaginationArgs { page, page_limit },
            };
            output(&list_pages(&request, &token, &deps).await?)
        }

        Commands::Checks {
            session,
            compare,
            view_filters,
            limit,
        } => {
            let checks = checks_with_pages(
                SessionId::from_i64(session),
                compare.map(SessionId::from_i64),
                &parse_filters(view_filters.as_deref())?,
                limit,
                &token,
                &deps,
            )
            .await?;
            output(&checks)
        }

        Commands::ViewCount { view, session } => {
            let count = view_page_count(
                ViewId::from_i64(view),
                SessionId::from_i64(session),
                &token,
                &deps,
            )
            .await?;
            output(&json!({"count": count}))
        }

        Commands::Details { page, sku, limit } => {
            let details = page_details(
                PageId::from_i64(page),
                SkuId::from_i64(sku),
                limit,
                &token,
                &deps,
            )
            .await?;
            output(&details)
        }
    }
}
