//! Business operations composed from the domain machines and the repos.

pub mod orders;
pub mod stats;

pub use orders::{CreateOrder, CreateOrderItem, Decision, OrderService};
pub use stats::CustomerStatsProjector;
