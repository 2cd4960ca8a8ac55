//! Catalog lookups. Under row security a product belonging to another
//! tenant is simply absent, so "not visible" and "does not exist" are the
//! same `None` here.

use sqlx::PgConnection;

use crate::domain::Product;
use crate::error::Result;
use crate::tenant::TenantContext;

const FIND: &str = "SELECT * FROM products WHERE tenant_id = $1 AND id = $2";

pub async fn find(conn: &mut PgConnection, id: i64) -> Result<Option<Product>> {
    let tenant_id = TenantContext::require()?;
    let product = sqlx::query_as::<_, Product>(FIND)
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(product)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_repeats_the_tenant_filter() {
        assert!(FIND.contains("tenant_id = $1"));
    }
}
