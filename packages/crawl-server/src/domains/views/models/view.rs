use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;

use crate::common::{CoreError, SkuId, ViewId};
use crate::domains::filters::{FilterError, FilterSpec};

/// View - a saved page filter of a SKU
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct View {
    pub id: ViewId,
    pub search_keyword_url_id: SkuId,
    pub name: String,
    pub filter_config: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewView {
    pub search_keyword_url_id: SkuId,
    pub name: String,
    pub filter_config: Value,
}

impl View {
    /// Filter groups of the view, all of which must match (like listing filters).
    pub fn filters(&self) -> Result<FilterSpec, FilterError> {
        FilterSpec::from_filter_config(&self.filter_config)
    }
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

impl View {
    pub async fn create(input: &NewView, pool: &PgPool) -> Result<Self, CoreError> {
        let view = sqlx::query_as::<_, View>(
            r#"
            INSERT INTO views (search_keyword_url_id, name, filter_config)
            VALUES ($1, $2, $3)
            RETURNING id, search_keyword_url_id, name, filter_config, created_at, updated_at
            "#,
        )
        .bind(input.search_keyword_url_id)
        .bind(&input.name)
        .bind(&input.filter_config)
        .fetch_one(pool)
        .await?;
        Ok(view)
    }

    pub async fn find_by_id(id: ViewId, pool: &PgPool) -> Result<Option<Self>, CoreError> {
        let view = sqlx::query_as::<_, View>(
            "SELECT id, search_keyword_url_id, name, filter_config, created_at, updated_at FROM views WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;
        Ok(view)
    }
}
