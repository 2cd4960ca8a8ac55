//! Domain events handed to the notification collaborator.
//!
//! Emitted after the owning transaction commits; delivery is fire-and-forget
//! and never feeds back into the state transition that produced the event.

use serde::{Deserialize, Serialize};

use crate::domain::order::OrderStatus;
use crate::tenant::TenantId;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    OrderCreated {
        tenant_id: TenantId,
        order_id: i64,
        customer_id: i64,
        public_token: String,
    },
    OrderStatusChanged {
        tenant_id: TenantId,
        order_id: i64,
        from: OrderStatus,
        to: OrderStatus,
    },
    ReplacementDecided {
        tenant_id: TenantId,
        order_id: i64,
        order_item_id: i64,
        approved: bool,
        reason: Option<String>,
    },
}

impl DomainEvent {
    pub fn subject(&self) -> &'static str {
        match self {
            DomainEvent::OrderCreated { .. } => "dukkan.order.created",
            DomainEvent::OrderStatusChanged { .. } => "dukkan.order.status_changed",
            DomainEvent::ReplacementDecided { .. } => "dukkan.order.replacement_decided",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_tag_and_subject() {
        let event = DomainEvent::OrderStatusChanged {
            tenant_id: TenantId(1),
            order_id: 10,
            from: OrderStatus::Draft,
            to: OrderStatus::Confirmed,
        };
        assert_eq!(event.subject(), "dukkan.order.status_changed");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "order_status_changed");
        assert_eq!(json["from"], "draft");
        assert_eq!(json["to"], "confirmed");
    }
}
