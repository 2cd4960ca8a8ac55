//! The tenants registry. Not row-secured: it is the partition map itself,
//! and slug discovery is a public, tenant-agnostic route.

use sqlx::PgPool;

use crate::domain::Tenant;
use crate::error::Result;

pub async fn find_by_slug(pool: &PgPool, slug: &str) -> Result<Option<Tenant>> {
    let tenant = sqlx::query_as::<_, Tenant>("SELECT * FROM tenants WHERE slug = $1")
        .bind(slug)
        .fetch_optional(pool)
        .await?;
    Ok(tenant)
}
