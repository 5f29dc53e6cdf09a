//! Core dependencies for actions (using traits for testability)
//!
//! Every action takes a `&CoreDeps`. There is no process-wide default store:
//! callers build one explicitly, from a pool in production or from
//! `TestDependencies` in tests.

use sqlx::PgPool;
use std::sync::Arc;

use crate::kernel::{
    BaseAuditCheckStore, BasePageStore, BaseSessionStore, BaseViewStore, PostgresStore,
};

#[derive(Clone)]
pub struct CoreDeps {
    pub sessions: Arc<dyn BaseSessionStore>,
    pub pages: Arc<dyn BasePageStore>,
    pub audit_checks: Arc<dyn BaseAuditCheckStore>,
    pub views: Arc<dyn BaseViewStore>,
}

impl CoreDeps {
    pub fn new(
        sessions: Arc<dyn BaseSessionStore>,
        pages: Arc<dyn BasePageStore>,
        audit_checks: Arc<dyn BaseAuditCheckStore>,
        views: Arc<dyn BaseViewStore>,
    ) -> Self {
        Self {
            sessions,
            pages,
            audit_checks,
            views,
        }
    }

    /// All stores backed by one PostgreSQL pool
    pub fn postgres(pool: PgPool) -> Self {
        let store = Arc::new(PostgresStore::new(pool));
        Self {
            sessions: store.clone(),
            pages: store.clone(),
            audit_checks: store.clone(),
            views: store,
        }
    }
}
