//! Domain model: tenants, customers, products, orders, and the two state
//! machines (order status and per-item replacement decision).

pub mod customer;
pub mod events;
pub mod order;
pub mod product;
pub mod replacement;
pub mod tenant;

pub use customer::Customer;
pub use events::DomainEvent;
pub use order::{Order, OrderItem, OrderStatus, OrderType, PricingMode};
pub use product::{OrderMode, Product};
pub use replacement::{ReplacementDecision, ReplacementStatus};
pub use tenant::{Tenant, TenantStatus};
