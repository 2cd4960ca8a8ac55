//! Persistence operations, always executed on a connection whose tenant (or
//! tracking) session variable is already pinned. Row security is the
//! authoritative boundary; the `tenant_id` predicates repeated in these
//! queries are defense in depth, not the mechanism.

pub mod customers;
pub mod orders;
pub mod products;
pub mod tenants;
