use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;

use crate::common::{AuditCheckId, CoreError, SkuId};
use crate::domains::filters::{FilterError, FilterSpec};

/// Category whose checks feed the "problematic pages" count.
pub const PROBLEMATIC_CATEGORY: &str = "problematic";

/// AuditCheck - a named set of filter groups flagging pages of a SKU
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AuditCheck {
    pub id: AuditCheckId,
    pub search_keyword_url_id: SkuId,
    pub name: String,
    pub category: String,
    /// `{"filter_groups": [...]}`
    pub filter_config: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAuditCheck {
    pub search_keyword_url_id: SkuId,
    pub name: String,
    pub category: String,
    pub filter_config: Value,
}

impl AuditCheck {
    /// The check's filter groups; a page is flagged when any group matches.
    /// Groups that don't parse are returned as errors next to the valid ones.
    /// Fails only when the config itself is not an object holding a list.
    pub fn valid_filter_groups(&self) -> Result<(FilterSpec, Vec<FilterError>), FilterError> {
        FilterSpec::from_filter_config_valid(&self.filter_config)
    }
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

impl AuditCheck {
    pub async fn create(input: &NewAuditCheck, pool: &PgPool) -> Result<Self, CoreError> {
        let check = sqlx::query_as::<_, AuditCheck>(
            r#"
            INSERT INTO audit_checks (search_keyword_url_id, name, category, filter_config)
            VALUES ($1, $2, $3, $4)
            RETURNING id, search_keyword_url_id, name, category, filter_config, created_at, updated_at
            "#,
        )
        .bind(input.search_keyword_url_id)
        .bind(&input.name)
        .bind(&input.category)
        .bind(&input.filter_config)
        .fetch_one(pool)
        .await?;
        Ok(check)
    }

    /// All checks of a SKU in id order
    pub async fn find_by_sku(sku: SkuId, pool: &PgPool) -> Result<Vec<Self>, CoreError> {
        let checks = sqlx::query_as::<_, AuditCheck>(
            r#"
            SELECT id, search_keyword_url_id, name, category, filter_config, created_at, updated_at
            FROM audit_checks
            WHERE search_keyword_url_id = $1
            ORDER BY id
            "#,
        )
        .bind(sku)
        .fetch_all(pool)
        .await?;
        Ok(checks)
    }

    pub async fn find_by_sku_and_category(
        sku: SkuId,
        category: &str,
        pool: &PgPool,
    ) -> Result<Vec<Self>, CoreError> {
        let checks = sqlx::query_as::<_, AuditCheck>(
            r#"
            SELECT id, search_keyword_url_id, name, category, filter_config, created_at, updated_at
            FROM audit_checks
            WHERE search_keyword_url_id = $1 AND category = $2
            ORDER BY id
            "#,
        )
        .bind(sku)
        .bind(category)
        .fetch_all(pool)
        .await?;
        Ok(checks)
    }
}
