//! Dukkan - Multi-tenant Store/Order Backend
//!
//! Many independent merchant stores share one Postgres database. Every
//! request is scoped to exactly one tenant, and the scoping is enforced by
//! database row security, not just by query discipline.
//!
//! ## Core pieces
//! - Tenant context propagation bound to the logical request
//! - Tenant-scoped database sessions backed by row-security policies
//! - Order lifecycle state machine with a per-item replacement sub-flow
//! - Anonymous order tracking via unguessable public tokens
//! - Derived customer statistics maintained without lost updates

pub mod domain;
pub mod error;
pub mod http;
pub mod notify;
pub mod repo;
pub mod service;
pub mod tenant;

pub use error::{Error, Result};
