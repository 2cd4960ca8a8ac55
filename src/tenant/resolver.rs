//! Deriving a tenant from request evidence.
//!
//! Evidence sources in precedence order: an authenticated principal's claim,
//! a trusted internal header, a public store slug, and finally an order's
//! public tracking token. An unresolved tenant is not an error here; routes
//! that cannot proceed without one fail when they try to open a scoped
//! session.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::Result;
use crate::tenant::context::TenantId;
use crate::tenant::session::TrackingSession;

/// Evidence gathered from one inbound request.
#[derive(Debug, Default, Clone)]
pub struct TenantEvidence {
    pub claim_tenant: Option<TenantId>,
    pub header_tenant: Option<TenantId>,
    pub store_slug: Option<String>,
    pub order_token: Option<String>,
}

impl TenantEvidence {
    pub fn from_claim(tenant_id: TenantId) -> Self {
        Self { claim_tenant: Some(tenant_id), ..Self::default() }
    }

    pub fn from_slug(slug: impl Into<String>) -> Self {
        Self { store_slug: Some(slug.into()), ..Self::default() }
    }

    pub fn from_order_token(token: impl Into<String>) -> Self {
        Self { order_token: Some(token.into()), ..Self::default() }
    }
}

/// Lookup seam between the resolver and persistence.
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    async fn tenant_by_slug(&self, slug: &str) -> Result<Option<TenantId>>;

    /// Owning tenant of the order carrying `token`. The token is globally
    /// unique, so the caller does not need to know the tenant up front.
    async fn tenant_by_order_token(&self, token: &str) -> Result<Option<TenantId>>;
}

#[derive(Clone)]
pub struct TenantResolver<D> {
    directory: D,
}

impl<D: TenantDirectory> TenantResolver<D> {
    pub fn new(directory: D) -> Self {
        Self { directory }
    }

    /// `Ok(None)` means the request is tenant-agnostic as far as the
    /// evidence goes; the caller decides whether that is fatal.
    pub async fn resolve(&self, evidence: &TenantEvidence) -> Result<Option<TenantId>> {
        if let Some(id) = evidence.claim_tenant {
            return Ok(Some(id));
        }
        if let Some(id) = evidence.header_tenant {
            return Ok(Some(id));
        }
        if let Some(slug) = &evidence.store_slug {
            if let Some(id) = self.directory.tenant_by_slug(slug).await? {
                return Ok(Some(id));
            }
        }
        if let Some(token) = &evidence.order_token {
            if let Some(id) = self.directory.tenant_by_order_token(token).await? {
                return Ok(Some(id));
            }
        }
        Ok(None)
    }
}

/// Directory over the shared pool. The tenants registry is not itself
/// tenant-scoped (slug discovery is public); the token lookup goes through
/// the tracking policy, which exposes exactly one order row.
#[derive(Clone)]
pub struct PgTenantDirectory {
    pool: PgPool,
}

impl PgTenantDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TenantDirectory for PgTenantDirectory {
    async fn tenant_by_slug(&self, slug: &str) -> Result<Option<TenantId>> {
        let id: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM tenants WHERE slug = $1 AND status = 'active'")
                .bind(slug)
                .fetch_optional(&self.pool)
                .await?;
        Ok(id.map(|(id,)| TenantId(id)))
    }

    async fn tenant_by_order_token(&self, token: &str) -> Result<Option<TenantId>> {
        let mut session = TrackingSession::begin(&self.pool, token).await?;
        let id: Option<(i64,)> =
            sqlx::query_as("SELECT tenant_id FROM orders WHERE public_token = $1")
                .bind(token)
                .fetch_optional(session.conn())
                .await?;
        session.commit().await?;
        Ok(id.map(|(id,)| TenantId(id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct FakeDirectory {
        slugs: HashMap<String, TenantId>,
        tokens: HashMap<String, TenantId>,
    }

    #[async_trait]
    impl TenantDirectory for FakeDirectory {
        async fn tenant_by_slug(&self, slug: &str) -> Result<Option<TenantId>> {
            Ok(self.slugs.get(slug).copied())
        }

        async fn tenant_by_order_token(&self, token: &str) -> Result<Option<TenantId>> {
            Ok(self.tokens.get(token).copied())
        }
    }

    fn resolver() -> TenantResolver<FakeDirectory> {
        TenantResolver::new(FakeDirectory {
            slugs: HashMap::from([("corner-shop".to_string(), TenantId(3))]),
            tokens: HashMap::from([("tok-abc".to_string(), TenantId(5))]),
        })
    }

    #[tokio::test]
    async fn claim_wins_over_everything() {
        let evidence = TenantEvidence {
            claim_tenant: Some(TenantId(1)),
            header_tenant: Some(TenantId(2)),
            store_slug: Some("corner-shop".into()),
            order_token: Some("tok-abc".into()),
        };
        assert_eq!(resolver().resolve(&evidence).await.unwrap(), Some(TenantId(1)));
    }

    #[tokio::test]
    async fn header_wins_over_slug_and_token() {
        let evidence = TenantEvidence {
            header_tenant: Some(TenantId(2)),
            store_slug: Some("corner-shop".into()),
            ..Default::default()
        };
        assert_eq!(resolver().resolve(&evidence).await.unwrap(), Some(TenantId(2)));
    }

    #[tokio::test]
    async fn slug_and_token_lookups() {
        let by_slug = resolver()
            .resolve(&TenantEvidence::from_slug("corner-shop"))
            .await
            .unwrap();
        assert_eq!(by_slug, Some(TenantId(3)));

        let by_token = resolver()
            .resolve(&TenantEvidence::from_order_token("tok-abc"))
            .await
            .unwrap();
        assert_eq!(by_token, Some(TenantId(5)));
    }

    #[tokio::test]
    async fn unresolved_is_none_not_error() {
        let result = resolver()
            .resolve(&TenantEvidence::from_slug("no-such-store"))
            .await
            .unwrap();
        assert_eq!(result, None);

        let empty = resolver().resolve(&TenantEvidence::default()).await.unwrap();
        assert_eq!(empty, None);
    }
}
