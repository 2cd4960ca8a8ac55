//! Tenant-scoped units of work.
//!
//! Every session is one database transaction whose first statement pins the
//! transaction-local `app.tenant_id` setting that the row-security policies
//! read. Because `set_config(..., is_local => true)` evaporates at commit or
//! rollback, a pooled connection can never hand a stale tenant binding to
//! its next borrower.
//!
//! When no tenant is bound to the task, [`TenantScopedSession::begin`] fails
//! closed with a configuration error instead of opening an unscoped
//! transaction.

use sqlx::{PgConnection, PgPool, Postgres, Transaction};

use crate::error::Result;
use crate::tenant::context::TenantContext;

/// A transaction in which row security restricts every tenant-scoped table
/// to the tenant bound via [`TenantContext::run`].
pub struct TenantScopedSession {
    tx: Transaction<'static, Postgres>,
}

impl TenantScopedSession {
    pub async fn begin(pool: &PgPool) -> Result<Self> {
        let tenant_id = TenantContext::require()?;
        let mut tx = pool.begin().await?;
        sqlx::query("SELECT set_config('app.tenant_id', $1, true)")
            .bind(tenant_id.0.to_string())
            .execute(&mut *tx)
            .await?;
        Ok(Self { tx })
    }

    pub fn conn(&mut self) -> &mut PgConnection {
        &mut self.tx
    }

    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    /// Explicit rollback; dropping the session without committing rolls back
    /// as well, so a timed-out request never commits a partial transition.
    pub async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

/// A transaction scoped to a single order's public tracking token instead of
/// a tenant. The `order_tracking` policy makes exactly that one order row
/// readable; every other tenant-scoped table stays invisible.
pub struct TrackingSession {
    tx: Transaction<'static, Postgres>,
}

impl TrackingSession {
    pub async fn begin(pool: &PgPool, token: &str) -> Result<Self> {
        let mut tx = pool.begin().await?;
        sqlx::query("SELECT set_config('app.order_token', $1, true)")
            .bind(token)
            .execute(&mut *tx)
            .await?;
        Ok(Self { tx })
    }

    pub fn conn(&mut self) -> &mut PgConnection {
        &mut self.tx
    }

    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
