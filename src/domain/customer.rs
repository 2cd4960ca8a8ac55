//! A tenant's buyer.
//!
//! `code` is sequential within the tenant, assigned from
//! `Tenant::customer_counter` at creation. The four stats fields are derived
//! counters owned by `CustomerStatsProjector`; nothing else writes them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tenant::TenantId;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Customer {
    pub id: i64,
    pub tenant_id: TenantId,
    pub code: i64,
    pub name: String,
    pub phone: String,
    pub order_count: i64,
    pub completed_order_count: i64,
    pub first_order_at: Option<DateTime<Utc>>,
    pub last_order_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
