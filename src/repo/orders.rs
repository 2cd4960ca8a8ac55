//! Order and order-item rows.
//!
//! Mutating operations load their row with `FOR UPDATE` first, inside the
//! tenant-scoped transaction. That row lock is what serializes two requests
//! racing to resolve the same replacement or transition the same order: the
//! second writer blocks, then re-reads already-resolved state and fails with
//! a conflict instead of silently overwriting.
//!
//! Every tenant-scoped statement repeats `tenant_id = $1` from the task's
//! context. Row security remains the authoritative boundary; the repeated
//! predicate is the defense-in-depth duplicate. The token lookups are the
//! deliberate exception: the token, not the tenant, is their key.

use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::domain::order::{Order, OrderItem, OrderStatus, OrderType, PricingMode};
use crate::domain::product::{OrderMode, Product};
use crate::domain::replacement::ReplacementColumns;
use crate::error::{Error, Result};
use crate::tenant::TenantContext;

const INSERT_ORDER: &str = "INSERT INTO orders (tenant_id, customer_id, public_token, \
         order_type, pricing_mode, subtotal, delivery_fee, total, free_text_payload) \
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING *";

const INSERT_ITEM: &str = "INSERT INTO order_items (tenant_id, order_id, product_id, title, \
         unit_price, quantity, total, order_mode) \
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8)";

const FIND: &str = "SELECT * FROM orders WHERE tenant_id = $1 AND id = $2";

const FIND_FOR_UPDATE: &str = "SELECT * FROM orders WHERE tenant_id = $1 AND id = $2 FOR UPDATE";

const FIND_BY_TOKEN: &str = "SELECT * FROM orders WHERE public_token = $1";

const FIND_BY_TOKEN_FOR_UPDATE: &str =
    "SELECT * FROM orders WHERE public_token = $1 FOR UPDATE";

const ITEMS_OF: &str =
    "SELECT * FROM order_items WHERE tenant_id = $1 AND order_id = $2 ORDER BY id";

const UPDATE_STATUS: &str = "UPDATE orders SET status = $3, updated_at = now() \
     WHERE tenant_id = $1 AND id = $2 RETURNING *";

const RECORD_REJECTION: &str = "UPDATE orders \
     SET status = 'rejected_by_customer', \
         customer_rejection_reason = $3, \
         customer_rejected_at = $4, \
         updated_at = now() \
     WHERE tenant_id = $1 AND id = $2 RETURNING *";

const FIND_ITEM: &str = "SELECT * FROM order_items WHERE tenant_id = $1 AND id = $2";

const FIND_ITEM_FOR_UPDATE: &str =
    "SELECT * FROM order_items WHERE tenant_id = $1 AND id = $2 FOR UPDATE";

const UPDATE_ITEM_REPLACEMENT: &str = "UPDATE order_items \
     SET pending_replacement_product_id = $3, \
         replacement_decision_status = $4, \
         replacement_decision_reason = $5, \
         replacement_decided_at = $6 \
     WHERE tenant_id = $1 AND id = $2 RETURNING *";

const APPLY_APPROVED_REPLACEMENT: &str = "UPDATE order_items \
     SET product_id = $3, \
         title = $4, \
         unit_price = $5, \
         total = $5 * quantity, \
         pending_replacement_product_id = NULL, \
         replacement_decision_status = $6, \
         replacement_decision_reason = NULL, \
         replacement_decided_at = $7 \
     WHERE tenant_id = $1 AND id = $2 RETURNING *";

pub struct NewOrder {
    pub customer_id: i64,
    pub order_type: OrderType,
    pub pricing_mode: PricingMode,
    pub delivery_fee: Option<i64>,
    pub free_text_payload: Option<String>,
}

pub struct NewOrderItem {
    pub product_id: Option<i64>,
    pub title: String,
    pub unit_price: i64,
    pub quantity: i64,
    pub order_mode: OrderMode,
}

/// Insert an order and its items. Totals are computed here for auto pricing
/// and left null for manual pricing until the merchant prices the order.
pub async fn insert(
    conn: &mut PgConnection,
    new: NewOrder,
    items: Vec<NewOrderItem>,
) -> Result<Order> {
    let tenant_id = TenantContext::require()?;
    let public_token = Uuid::new_v4().simple().to_string();

    let (subtotal, total) = match new.pricing_mode {
        PricingMode::Auto => {
            let subtotal: i64 = items.iter().map(|i| i.unit_price * i.quantity).sum();
            (Some(subtotal), Some(subtotal + new.delivery_fee.unwrap_or(0)))
        }
        PricingMode::Manual => (None, None),
    };

    let order = sqlx::query_as::<_, Order>(INSERT_ORDER)
        .bind(tenant_id)
        .bind(new.customer_id)
        .bind(&public_token)
        .bind(new.order_type)
        .bind(new.pricing_mode)
        .bind(subtotal)
        .bind(new.delivery_fee)
        .bind(total)
        .bind(&new.free_text_payload)
        .fetch_one(&mut *conn)
        .await?;

    for item in items {
        sqlx::query(INSERT_ITEM)
            .bind(tenant_id)
            .bind(order.id)
            .bind(item.product_id)
            .bind(&item.title)
            .bind(item.unit_price)
            .bind(item.quantity)
            .bind(item.unit_price * item.quantity)
            .bind(item.order_mode)
            .execute(&mut *conn)
            .await?;
    }

    Ok(order)
}

pub async fn find(conn: &mut PgConnection, id: i64) -> Result<Order> {
    let tenant_id = TenantContext::require()?;
    sqlx::query_as::<_, Order>(FIND)
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or(Error::NotFound)
}

pub async fn find_for_update(conn: &mut PgConnection, id: i64) -> Result<Order> {
    let tenant_id = TenantContext::require()?;
    sqlx::query_as::<_, Order>(FIND_FOR_UPDATE)
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or(Error::NotFound)
}

pub async fn find_by_token_for_update(conn: &mut PgConnection, token: &str) -> Result<Order> {
    sqlx::query_as::<_, Order>(FIND_BY_TOKEN_FOR_UPDATE)
        .bind(token)
        .fetch_optional(conn)
        .await?
        .ok_or(Error::NotFound)
}

/// Anonymous lookup through the tracking policy; read-only.
pub async fn find_by_token(conn: &mut PgConnection, token: &str) -> Result<Order> {
    sqlx::query_as::<_, Order>(FIND_BY_TOKEN)
        .bind(token)
        .fetch_optional(conn)
        .await?
        .ok_or(Error::NotFound)
}

pub async fn items_of(conn: &mut PgConnection, order_id: i64) -> Result<Vec<OrderItem>> {
    let tenant_id = TenantContext::require()?;
    let items = sqlx::query_as::<_, OrderItem>(ITEMS_OF)
        .bind(tenant_id)
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(items)
}

pub async fn update_status(
    conn: &mut PgConnection,
    id: i64,
    status: OrderStatus,
) -> Result<Order> {
    let tenant_id = TenantContext::require()?;
    sqlx::query_as::<_, Order>(UPDATE_STATUS)
        .bind(tenant_id)
        .bind(id)
        .bind(status)
        .fetch_optional(conn)
        .await?
        .ok_or(Error::NotFound)
}

pub async fn record_customer_rejection(
    conn: &mut PgConnection,
    id: i64,
    reason: Option<&str>,
    rejected_at: DateTime<Utc>,
) -> Result<Order> {
    let tenant_id = TenantContext::require()?;
    sqlx::query_as::<_, Order>(RECORD_REJECTION)
        .bind(tenant_id)
        .bind(id)
        .bind(reason)
        .bind(rejected_at)
        .fetch_optional(conn)
        .await?
        .ok_or(Error::NotFound)
}

/// Unlocked read, used to learn the owning order before taking locks in the
/// fixed order (order row first, then item row).
pub async fn find_item(conn: &mut PgConnection, item_id: i64) -> Result<OrderItem> {
    let tenant_id = TenantContext::require()?;
    sqlx::query_as::<_, OrderItem>(FIND_ITEM)
        .bind(tenant_id)
        .bind(item_id)
        .fetch_optional(conn)
        .await?
        .ok_or(Error::NotFound)
}

pub async fn find_item_for_update(conn: &mut PgConnection, item_id: i64) -> Result<OrderItem> {
    let tenant_id = TenantContext::require()?;
    sqlx::query_as::<_, OrderItem>(FIND_ITEM_FOR_UPDATE)
        .bind(tenant_id)
        .bind(item_id)
        .fetch_optional(conn)
        .await?
        .ok_or(Error::NotFound)
}

/// Write back the replacement columns of one item, leaving the snapshot
/// untouched (reject, reset, propose).
pub async fn update_item_replacement(
    conn: &mut PgConnection,
    item_id: i64,
    cols: &ReplacementColumns,
) -> Result<OrderItem> {
    let tenant_id = TenantContext::require()?;
    sqlx::query_as::<_, OrderItem>(UPDATE_ITEM_REPLACEMENT)
        .bind(tenant_id)
        .bind(item_id)
        .bind(cols.pending_product_id)
        .bind(cols.status)
        .bind(&cols.reason)
        .bind(cols.decided_at)
        .fetch_optional(conn)
        .await?
        .ok_or(Error::NotFound)
}

/// Approval re-snapshots the item from the replacement product's current
/// data and clears the proposal in the same statement.
pub async fn apply_approved_replacement(
    conn: &mut PgConnection,
    item_id: i64,
    replacement: &Product,
    cols: &ReplacementColumns,
) -> Result<OrderItem> {
    let tenant_id = TenantContext::require()?;
    sqlx::query_as::<_, OrderItem>(APPLY_APPROVED_REPLACEMENT)
        .bind(tenant_id)
        .bind(item_id)
        .bind(replacement.id)
        .bind(&replacement.title)
        .bind(replacement.unit_price)
        .bind(cols.status)
        .bind(cols.decided_at)
        .fetch_optional(conn)
        .await?
        .ok_or(Error::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_scoped_statements_repeat_the_tenant_filter() {
        for sql in [
            FIND,
            FIND_FOR_UPDATE,
            ITEMS_OF,
            UPDATE_STATUS,
            RECORD_REJECTION,
            FIND_ITEM,
            FIND_ITEM_FOR_UPDATE,
            UPDATE_ITEM_REPLACEMENT,
            APPLY_APPROVED_REPLACEMENT,
        ] {
            assert!(sql.contains("tenant_id = $1"), "missing tenant filter: {sql}");
        }
        for sql in [INSERT_ORDER, INSERT_ITEM] {
            assert!(sql.contains("tenant_id"), "missing tenant column: {sql}");
        }
    }

    #[test]
    fn token_lookups_are_keyed_by_token_alone() {
        // The tracking policy, not the tenant filter, bounds these.
        for sql in [FIND_BY_TOKEN, FIND_BY_TOKEN_FOR_UPDATE] {
            assert!(sql.contains("public_token = $1"));
            assert!(!sql.contains("tenant_id ="));
        }
    }

    #[test]
    fn mutating_reads_take_row_locks() {
        for sql in [FIND_FOR_UPDATE, FIND_BY_TOKEN_FOR_UPDATE, FIND_ITEM_FOR_UPDATE] {
            assert!(sql.ends_with("FOR UPDATE"));
        }
    }
}
