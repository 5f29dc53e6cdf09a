//! Test harness with testcontainers for integration testing.
//!
//! One Postgres container per test binary, started and migrated on the first
//! test and reused afterwards. Tests share the database, so each one works
//! under its own SKUs and claim queue (see `unique_sku` / `unique_queue`).

use anyhow::{Context, Result};
use crawl_core::common::SkuId;
use crawl_core::kernel::CoreDeps;
use sqlx::PgPool;
use std::sync::atomic::{AtomicI64, Ordering};
use test_context::AsyncTestContext;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared test infrastructure that persists across all tests.
struct SharedTestInfra {
    db_url: String,
    // Keep the container alive for the entire test run
    _postgres: ContainerAsync<Postgres>,
}

static SHARED_INFRA: OnceCell<SharedTestInfra> = OnceCell::const_new();

static NEXT_KEY: AtomicI64 = AtomicI64::new(1);

impl SharedTestInfra {
    async fn init() -> Result<Self> {
        // Run tests with: RUST_LOG=debug cargo test -- --nocapture
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let postgres = Postgres::default()
            .with_tag("16")
            .with_cmd(["-c", "max_connections=200"])
            .start()
            .await
            .context("Failed to start Postgres container")?;

        let pg_host = postgres.get_host().await?;
        let pg_port = postgres.get_host_port_ipv4(5432).await?;
        let db_url = format!("postgresql://postgres:postgres@{}:{}/postgres", pg_host, pg_port);

        let pool = PgPool::connect(&db_url)
            .await
            .context("Failed to connect to Postgres for migrations")?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("Failed to run migrations")?;

        Ok(Self {
            db_url,
            _postgres: postgres,
        })
    }

    async fn get() -> &'static Self {
        SHARED_INFRA
            .get_or_init(|| async {
                Self::init()
                    .await
                    .expect("Failed to initialize shared test infrastructure")
            })
            .await
    }
}

/// Per-test context over the shared database.
///
/// ```ignore
/// #[test_context(TestHarness)]
/// #[tokio::test]
/// async fn my_test(ctx: &TestHarness) {
///     let deps = ctx.deps();
/// }
/// ```
pub struct TestHarness {
    /// Database pool - use this for fixtures.
    pub db_pool: PgPool,
}

impl AsyncTestContext for TestHarness {
    async fn setup() -> Self {
        Self::new().await.expect("Failed to create test harness")
    }

    async fn teardown(self) {
        self.db_pool.close().await;
    }
}

impl TestHarness {
    pub async fn new() -> Result<Self> {
        let infra = SharedTestInfra::get().await;

        let db_pool = PgPool::connect(&infra.db_url)
            .await
            .context("Failed to connect to test database")?;

        Ok(Self { db_pool })
    }

    /// Stores backed by this harness's pool
    pub fn deps(&self) -> CoreDeps {
        CoreDeps::postgres(self.db_pool.clone())
    }

    /// A SKU no other test in this binary uses
    pub fn unique_sku(&self) -> SkuId {
        SkuId::from_i64(NEXT_KEY.fetch_add(1, Ordering::SeqCst))
    }

    /// A claim queue no other test in this binary uses
    pub fn unique_queue(&self) -> i32 {
        // Queue 1 is the production default; stay clear of it
        1000 + NEXT_KEY.fetch_add(1, Ordering::SeqCst) as i32
    }
}
