//! Derived customer counters.
//!
//! The projector is the only writer of `order_count`,
//! `completed_order_count`, `first_order_at`, and `last_order_at`. It runs
//! inside the same transaction as the order write it reacts to, and each
//! update is a single conditional statement, so concurrent orders for one
//! customer cannot lose increments.

use chrono::{DateTime, Utc};
use sqlx::PgConnection;

use crate::error::Result;
use crate::repo;

pub struct CustomerStatsProjector;

impl CustomerStatsProjector {
    pub async fn order_created(
        conn: &mut PgConnection,
        customer_id: i64,
        ordered_at: DateTime<Utc>,
    ) -> Result<()> {
        repo::customers::record_order_created(conn, customer_id, ordered_at).await
    }

    pub async fn order_completed(conn: &mut PgConnection, customer_id: i64) -> Result<()> {
        repo::customers::record_order_completed(conn, customer_id).await
    }
}
