//! Tenant isolation: request-scoped context, evidence resolution, and the
//! row-security-backed database session.

pub mod context;
pub mod resolver;
pub mod session;

pub use context::{TenantContext, TenantId};
pub use resolver::{PgTenantDirectory, TenantDirectory, TenantEvidence, TenantResolver};
pub use session::{TenantScopedSession, TrackingSession};
