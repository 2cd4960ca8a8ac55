//! Order lifecycle.
//!
//! The status machine is a fixed adjacency list:
//! `draft → confirmed → out_for_delivery → completed`, with merchant
//! cancellation from `draft|confirmed` and customer rejection (token path
//! only) from `draft|confirmed`. Terminal states admit nothing further.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::product::OrderMode;
use crate::domain::replacement::ReplacementStatus;
use crate::error::{Error, Result};
use crate::tenant::TenantId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
pub enum OrderStatus {
    Draft,
    Confirmed,
    OutForDelivery,
    Completed,
    Cancelled,
    RejectedByCustomer,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Draft => "draft",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::OutForDelivery => "out_for_delivery",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::RejectedByCustomer => "rejected_by_customer",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Completed | OrderStatus::Cancelled | OrderStatus::RejectedByCustomer
        )
    }

    /// The adjacency list. Customer rejection is listed here as an edge;
    /// whether the caller is allowed to take it is the service's concern.
    pub fn can_transition(self, to: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, to),
            (Draft, Confirmed)
                | (Confirmed, OutForDelivery)
                | (OutForDelivery, Completed)
                | (Draft, Cancelled)
                | (Confirmed, Cancelled)
                | (Draft, RejectedByCustomer)
                | (Confirmed, RejectedByCustomer)
        )
    }

    /// Checked transition: any edge outside the adjacency list is a
    /// conflict, leaving state untouched at the caller.
    pub fn transition(self, to: OrderStatus) -> Result<OrderStatus> {
        if self.can_transition(to) {
            Ok(to)
        } else {
            Err(Error::conflict(format!(
                "order status cannot move from {} to {}",
                self.as_str(),
                to.as_str()
            )))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
pub enum OrderType {
    Catalog,
    FreeText,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
pub enum PricingMode {
    Auto,
    Manual,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Order {
    pub id: i64,
    pub tenant_id: TenantId,
    pub customer_id: i64,
    /// Unguessable token for anonymous tracking; globally unique.
    pub public_token: String,
    pub order_type: OrderType,
    pub status: OrderStatus,
    pub pricing_mode: PricingMode,
    pub subtotal: Option<i64>,
    pub delivery_fee: Option<i64>,
    pub total: Option<i64>,
    pub free_text_payload: Option<String>,
    pub customer_rejection_reason: Option<String>,
    pub customer_rejected_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrderItem {
    pub id: i64,
    pub tenant_id: TenantId,
    pub order_id: i64,
    /// Snapshotted product; may be gone from the catalog.
    pub product_id: Option<i64>,
    pub title: String,
    pub unit_price: i64,
    pub quantity: i64,
    pub total: i64,
    pub order_mode: OrderMode,
    pub pending_replacement_product_id: Option<i64>,
    pub replacement_decision_status: ReplacementStatus,
    pub replacement_decision_reason: Option<String>,
    pub replacement_decided_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl OrderItem {
    /// The item's replacement state as one tagged value; errors on a row
    /// that holds an inconsistent combination of columns.
    pub fn replacement(&self) -> Result<crate::domain::replacement::ReplacementDecision> {
        crate::domain::replacement::ReplacementDecision::from_columns(
            crate::domain::replacement::ReplacementColumns {
                status: self.replacement_decision_status,
                pending_product_id: self.pending_replacement_product_id,
                reason: self.replacement_decision_reason.clone(),
                decided_at: self.replacement_decided_at,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use OrderStatus::*;

    const ALL: [OrderStatus; 6] = [
        Draft,
        Confirmed,
        OutForDelivery,
        Completed,
        Cancelled,
        RejectedByCustomer,
    ];

    #[test]
    fn adjacency_is_exactly_the_allowed_edges() {
        let allowed = [
            (Draft, Confirmed),
            (Confirmed, OutForDelivery),
            (OutForDelivery, Completed),
            (Draft, Cancelled),
            (Confirmed, Cancelled),
            (Draft, RejectedByCustomer),
            (Confirmed, RejectedByCustomer),
        ];
        for from in ALL {
            for to in ALL {
                let expected = allowed.contains(&(from, to));
                assert_eq!(
                    from.can_transition(to),
                    expected,
                    "{} -> {}",
                    from.as_str(),
                    to.as_str()
                );
            }
        }
    }

    #[test]
    fn terminal_states_admit_no_edges() {
        for from in ALL.into_iter().filter(|s| s.is_terminal()) {
            for to in ALL {
                assert!(!from.can_transition(to));
            }
        }
    }

    #[test]
    fn skipping_a_step_is_a_conflict() {
        let err = Draft.transition(Completed).unwrap_err();
        assert_eq!(err.classification(), "conflict");
        // The legal path still works.
        let status = Draft.transition(Confirmed).unwrap();
        let status = status.transition(OutForDelivery).unwrap();
        assert_eq!(status.transition(Completed).unwrap(), Completed);
    }

    #[test]
    fn out_for_delivery_cannot_be_cancelled_or_rejected() {
        assert!(OutForDelivery.transition(Cancelled).is_err());
        assert!(OutForDelivery.transition(RejectedByCustomer).is_err());
    }
}
