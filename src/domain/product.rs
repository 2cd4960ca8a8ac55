//! Catalog product, the snapshot source for order items and replacements.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tenant::TenantId;

/// How a product is ordered: by piece count, by weight, or by a money
/// amount the customer names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
pub enum OrderMode {
    Quantity,
    Weight,
    Price,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: i64,
    pub tenant_id: TenantId,
    pub title: String,
    /// Minor units (piastres/cents).
    pub unit_price: i64,
    pub order_mode: OrderMode,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
