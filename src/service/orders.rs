//! Order operations: creation, lifecycle transitions, the replacement
//! decision flow, and anonymous tracking.
//!
//! Every operation is one tenant-scoped transaction: lock the rows it will
//! change, run the pure state machine, write, update the projector where
//! the transition calls for it, commit. Events go out only after commit.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::domain::order::{Order, OrderItem, OrderStatus, OrderType, PricingMode};
use crate::domain::DomainEvent;
use crate::error::{Error, Result};
use crate::notify::Notifier;
use crate::repo;
use crate::repo::orders::{NewOrder, NewOrderItem};
use crate::service::stats::CustomerStatsProjector;
use crate::tenant::resolver::{PgTenantDirectory, TenantDirectory};
use crate::tenant::{TenantContext, TenantScopedSession, TrackingSession};

#[derive(Debug, Deserialize)]
pub struct CreateOrder {
    pub customer_name: String,
    pub customer_phone: String,
    pub order_type: OrderType,
    pub pricing_mode: PricingMode,
    pub delivery_fee: Option<i64>,
    pub free_text_payload: Option<String>,
    pub items: Vec<CreateOrderItem>,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderItem {
    pub product_id: i64,
    pub quantity: i64,
}

/// The customer's verdict on a pending replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Reject,
}

#[derive(Clone)]
pub struct OrderService {
    pool: PgPool,
    directory: PgTenantDirectory,
    notifier: Notifier,
}

impl OrderService {
    pub fn new(pool: PgPool, notifier: Notifier) -> Self {
        let directory = PgTenantDirectory::new(pool.clone());
        Self { pool, directory, notifier }
    }

    /// Create a draft order for the named customer, creating the customer on
    /// first contact. Catalog items are snapshotted from the current
    /// catalog; the stats projector runs in the same transaction.
    pub async fn create_order(&self, input: CreateOrder) -> Result<Order> {
        match input.order_type {
            OrderType::Catalog if input.items.is_empty() => {
                return Err(Error::conflict("a catalog order needs at least one item"));
            }
            OrderType::FreeText if input.free_text_payload.as_deref().unwrap_or("").is_empty() => {
                return Err(Error::conflict("a free-text order needs a payload"));
            }
            _ => {}
        }

        let mut session = TenantScopedSession::begin(&self.pool).await?;

        let customer = repo::customers::find_or_create(
            session.conn(),
            &input.customer_name,
            &input.customer_phone,
        )
        .await?;

        let mut items = Vec::with_capacity(input.items.len());
        for line in &input.items {
            let product = repo::products::find(session.conn(), line.product_id)
                .await?
                .ok_or_else(|| Error::conflict("product is not available in this store"))?;
            if line.quantity <= 0 {
                return Err(Error::conflict("item quantity must be positive"));
            }
            items.push(NewOrderItem {
                product_id: Some(product.id),
                title: product.title,
                unit_price: product.unit_price,
                quantity: line.quantity,
                order_mode: product.order_mode,
            });
        }

        let order = repo::orders::insert(
            session.conn(),
            NewOrder {
                customer_id: customer.id,
                order_type: input.order_type,
                pricing_mode: input.pricing_mode,
                delivery_fee: input.delivery_fee,
                free_text_payload: input.free_text_payload,
            },
            items,
        )
        .await?;

        CustomerStatsProjector::order_created(session.conn(), customer.id, order.created_at)
            .await?;
        session.commit().await?;

        self.notifier.publish(DomainEvent::OrderCreated {
            tenant_id: order.tenant_id,
            order_id: order.id,
            customer_id: order.customer_id,
            public_token: order.public_token.clone(),
        });
        Ok(order)
    }

    /// Public storefront profile. Only active stores are discoverable;
    /// everything else looks absent.
    pub async fn store_profile(&self, slug: &str) -> Result<crate::domain::Tenant> {
        let tenant = repo::tenants::find_by_slug(&self.pool, slug)
            .await?
            .ok_or(Error::NotFound)?;
        if tenant.status != crate::domain::TenantStatus::Active {
            return Err(Error::NotFound);
        }
        Ok(tenant)
    }

    /// A tenant's buyer, including the projector-maintained counters.
    pub async fn get_customer(&self, customer_id: i64) -> Result<crate::domain::Customer> {
        let mut session = TenantScopedSession::begin(&self.pool).await?;
        let customer = repo::customers::find(session.conn(), customer_id)
            .await?
            .ok_or(Error::NotFound)?;
        session.commit().await?;
        Ok(customer)
    }

    pub async fn get_order(&self, order_id: i64) -> Result<(Order, Vec<OrderItem>)> {
        let mut session = TenantScopedSession::begin(&self.pool).await?;
        let order = repo::orders::find(session.conn(), order_id).await?;
        let items = repo::orders::items_of(session.conn(), order.id).await?;
        session.commit().await?;
        Ok((order, items))
    }

    /// Merchant-driven status transition. The customer-rejection state is
    /// not reachable here; it belongs to the tracking-token path.
    pub async fn transition_status(&self, order_id: i64, target: OrderStatus) -> Result<Order> {
        if target == OrderStatus::RejectedByCustomer {
            return Err(Error::conflict(
                "customer rejection goes through the tracking link, not the merchant API",
            ));
        }

        let mut session = TenantScopedSession::begin(&self.pool).await?;
        let order = repo::orders::find_for_update(session.conn(), order_id).await?;
        let from = order.status;
        let next = from.transition(target)?;
        let order = repo::orders::update_status(session.conn(), order.id, next).await?;
        if next == OrderStatus::Completed {
            CustomerStatsProjector::order_completed(session.conn(), order.customer_id).await?;
        }
        session.commit().await?;

        self.notifier.publish(DomainEvent::OrderStatusChanged {
            tenant_id: order.tenant_id,
            order_id: order.id,
            from,
            to: next,
        });
        Ok(order)
    }

    /// Merchant proposes a substitute product for a line item.
    pub async fn propose_replacement(
        &self,
        item_id: i64,
        replacement_product_id: i64,
    ) -> Result<OrderItem> {
        let mut session = TenantScopedSession::begin(&self.pool).await?;
        let probe = repo::orders::find_item(session.conn(), item_id).await?;
        let order = repo::orders::find_for_update(session.conn(), probe.order_id).await?;
        let item = repo::orders::find_item_for_update(session.conn(), item_id).await?;
        if order.status.is_terminal() {
            return Err(Error::conflict("order is no longer open"));
        }

        // Row security hides other tenants' products, so a cross-tenant
        // proposal surfaces as an absent product.
        let product = repo::products::find(session.conn(), replacement_product_id)
            .await?
            .ok_or_else(|| {
                Error::conflict("replacement product is not available in this store")
            })?;

        let next = item.replacement()?.propose(product.id)?;
        let item =
            repo::orders::update_item_replacement(session.conn(), item.id, &next.to_columns())
                .await?;
        session.commit().await?;
        Ok(item)
    }

    /// Customer approves or rejects a pending replacement. Approval
    /// re-snapshots the item from the replacement product's current data.
    pub async fn decide_replacement(
        &self,
        item_id: i64,
        decision: Decision,
        reason: Option<String>,
    ) -> Result<OrderItem> {
        let mut session = TenantScopedSession::begin(&self.pool).await?;
        let probe = repo::orders::find_item(session.conn(), item_id).await?;
        let order = repo::orders::find_for_update(session.conn(), probe.order_id).await?;
        let item = repo::orders::find_item_for_update(session.conn(), item_id).await?;
        self.decide_locked(session, order, item, decision, reason).await
    }

    /// Same decision, reached anonymously: the tracking token names both the
    /// tenant and the order, and the item must belong to that order.
    pub async fn decide_replacement_via_token(
        &self,
        token: &str,
        item_id: i64,
        decision: Decision,
        reason: Option<String>,
    ) -> Result<OrderItem> {
        let tenant_id = self
            .directory
            .tenant_by_order_token(token)
            .await?
            .ok_or(Error::NotFound)?;

        TenantContext::run(tenant_id, async {
            let mut session = TenantScopedSession::begin(&self.pool).await?;
            let order = repo::orders::find_by_token_for_update(session.conn(), token).await?;
            let item = repo::orders::find_item_for_update(session.conn(), item_id).await?;
            if item.order_id != order.id {
                return Err(Error::NotFound);
            }
            self.decide_locked(session, order, item, decision, reason).await
        })
        .await
    }

    async fn decide_locked(
        &self,
        mut session: TenantScopedSession,
        order: Order,
        item: OrderItem,
        decision: Decision,
        reason: Option<String>,
    ) -> Result<OrderItem> {
        let now = Utc::now();
        if order.status.is_terminal() {
            return Err(Error::conflict("order is no longer open"));
        }

        let current = item.replacement()?;
        let item = match decision {
            Decision::Approve => {
                let (next, product_id) = current.approve(now)?;
                let product = repo::products::find(session.conn(), product_id)
                    .await?
                    .ok_or_else(|| {
                        Error::conflict("replacement product is no longer available")
                    })?;
                repo::orders::apply_approved_replacement(
                    session.conn(),
                    item.id,
                    &product,
                    &next.to_columns(),
                )
                .await?
            }
            Decision::Reject => {
                let next = current.reject(reason.clone(), now)?;
                repo::orders::update_item_replacement(session.conn(), item.id, &next.to_columns())
                    .await?
            }
        };
        session.commit().await?;

        self.notifier.publish(DomainEvent::ReplacementDecided {
            tenant_id: item.tenant_id,
            order_id: item.order_id,
            order_item_id: item.id,
            approved: decision == Decision::Approve,
            reason,
        });
        Ok(item)
    }

    /// Merchant reopens a replacement decision after talking to the
    /// customer. Allowed any time before the order completes.
    pub async fn reset_replacement(&self, item_id: i64) -> Result<OrderItem> {
        let mut session = TenantScopedSession::begin(&self.pool).await?;
        let probe = repo::orders::find_item(session.conn(), item_id).await?;
        let order = repo::orders::find_for_update(session.conn(), probe.order_id).await?;
        let item = repo::orders::find_item_for_update(session.conn(), item_id).await?;
        if order.status == OrderStatus::Completed {
            return Err(Error::conflict("order is already completed"));
        }

        let next = item.replacement()?.reset();
        let item =
            repo::orders::update_item_replacement(session.conn(), item.id, &next.to_columns())
                .await?;
        session.commit().await?;
        Ok(item)
    }

    /// Customer rejects the whole order through the tracking token. The
    /// token also names the owning tenant, so the scoped transaction is
    /// opened on the customer's behalf here.
    pub async fn reject_order(&self, token: &str, reason: Option<String>) -> Result<Order> {
        let tenant_id = self
            .directory
            .tenant_by_order_token(token)
            .await?
            .ok_or(Error::NotFound)?;

        let (order, from) = TenantContext::run(tenant_id, async {
            let mut session = TenantScopedSession::begin(&self.pool).await?;
            let order = repo::orders::find_by_token_for_update(session.conn(), token).await?;
            let from = order.status;
            from.transition(OrderStatus::RejectedByCustomer)?;
            let order = repo::orders::record_customer_rejection(
                session.conn(),
                order.id,
                reason.as_deref(),
                Utc::now(),
            )
            .await?;
            session.commit().await?;
            Ok::<_, Error>((order, from))
        })
        .await?;

        self.notifier.publish(DomainEvent::OrderStatusChanged {
            tenant_id: order.tenant_id,
            order_id: order.id,
            from,
            to: OrderStatus::RejectedByCustomer,
        });
        Ok(order)
    }

    /// Anonymous order lookup. A token that does not exist and a token the
    /// policy hides produce the same not-found value.
    pub async fn track_order(&self, token: &str) -> Result<Order> {
        let mut session = TrackingSession::begin(&self.pool, token).await?;
        let order = repo::orders::find_by_token(session.conn(), token).await?;
        session.commit().await?;
        Ok(order)
    }
}
