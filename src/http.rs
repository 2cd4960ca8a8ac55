//! Thin HTTP surface over the core services.
//!
//! Merchant endpoints take tenant evidence from the request (the auth
//! collaborator's claim, here standing in as the `x-tenant-id` header) and
//! bind it with [`TenantContext::run`] for the whole handler. Anonymous
//! endpoints carry a tracking token in the path and resolve the tenant from
//! it; the handlers never receive a tenant id explicitly.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use validator::Validate;

use crate::domain::order::{Order, OrderItem, OrderStatus, OrderType, PricingMode};
use crate::error::{Error, Result};
use crate::service::{CreateOrder, CreateOrderItem, Decision, OrderService};
use crate::tenant::{
    PgTenantDirectory, TenantContext, TenantEvidence, TenantId, TenantResolver,
};

#[derive(Clone)]
pub struct AppState {
    pub service: OrderService,
    pub resolver: TenantResolver<PgTenantDirectory>,
}

impl AppState {
    pub fn new(pool: PgPool, service: OrderService) -> Self {
        let resolver = TenantResolver::new(PgTenantDirectory::new(pool));
        Self { service, resolver }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/health",
            get(|| async { Json(serde_json::json!({"status": "healthy", "service": "dukkan"})) }),
        )
        .route("/api/v1/orders", post(create_order))
        .route("/api/v1/orders/:id", get(get_order))
        .route("/api/v1/customers/:id", get(get_customer))
        .route("/api/v1/orders/:id/status", post(transition_status))
        .route(
            "/api/v1/order-items/:id/replacement",
            post(propose_replacement).delete(reset_replacement),
        )
        .route("/store/:slug", get(store_profile))
        .route("/track/:token", get(track_order))
        .route("/track/:token/reject", post(reject_order))
        .route("/track/:token/items/:item_id/decision", post(decide_replacement))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Resolve the merchant tenant for an authenticated route. Unresolved is
/// not-found here: these routes cannot proceed tenant-agnostically, and the
/// response must not reveal whether the tenant exists.
async fn require_tenant(state: &AppState, headers: &HeaderMap) -> Result<TenantId> {
    let header_tenant = headers
        .get("x-tenant-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<i64>().ok())
        .map(TenantId);
    let evidence = TenantEvidence { header_tenant, ..Default::default() };
    state.resolver.resolve(&evidence).await?.ok_or(Error::NotFound)
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, max = 120))]
    pub customer_name: String,
    #[validate(length(min = 5, max = 20))]
    pub customer_phone: String,
    pub order_type: OrderType,
    pub pricing_mode: PricingMode,
    pub delivery_fee: Option<i64>,
    pub free_text_payload: Option<String>,
    #[serde(default)]
    pub items: Vec<OrderItemRequest>,
}

#[derive(Debug, Deserialize)]
pub struct OrderItemRequest {
    pub product_id: i64,
    pub quantity: i64,
}

async fn create_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateOrderRequest>,
) -> Result<Json<Order>> {
    req.validate()?;
    let tenant_id = require_tenant(&state, &headers).await?;
    let input = CreateOrder {
        customer_name: req.customer_name,
        customer_phone: req.customer_phone,
        order_type: req.order_type,
        pricing_mode: req.pricing_mode,
        delivery_fee: req.delivery_fee,
        free_text_payload: req.free_text_payload,
        items: req
            .items
            .into_iter()
            .map(|i| CreateOrderItem { product_id: i.product_id, quantity: i.quantity })
            .collect(),
    };
    let order = TenantContext::run(tenant_id, state.service.create_order(input)).await?;
    Ok(Json(order))
}

#[derive(serde::Serialize)]
pub struct OrderResponse {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

async fn get_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<OrderResponse>> {
    let tenant_id = require_tenant(&state, &headers).await?;
    let (order, items) = TenantContext::run(tenant_id, state.service.get_order(id)).await?;
    Ok(Json(OrderResponse { order, items }))
}

#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    pub target: OrderStatus,
}

async fn transition_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(req): Json<TransitionRequest>,
) -> Result<Json<Order>> {
    let tenant_id = require_tenant(&state, &headers).await?;
    let order =
        TenantContext::run(tenant_id, state.service.transition_status(id, req.target)).await?;
    Ok(Json(order))
}

#[derive(Debug, Deserialize)]
pub struct ProposeRequest {
    pub replacement_product_id: i64,
}

async fn propose_replacement(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(req): Json<ProposeRequest>,
) -> Result<Json<OrderItem>> {
    let tenant_id = require_tenant(&state, &headers).await?;
    let item = TenantContext::run(
        tenant_id,
        state.service.propose_replacement(id, req.replacement_product_id),
    )
    .await?;
    Ok(Json(item))
}

async fn reset_replacement(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<OrderItem>> {
    let tenant_id = require_tenant(&state, &headers).await?;
    let item = TenantContext::run(tenant_id, state.service.reset_replacement(id)).await?;
    Ok(Json(item))
}

async fn get_customer(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<crate::domain::Customer>> {
    let tenant_id = require_tenant(&state, &headers).await?;
    let customer = TenantContext::run(tenant_id, state.service.get_customer(id)).await?;
    Ok(Json(customer))
}

async fn store_profile(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<crate::domain::Tenant>> {
    let tenant = state.service.store_profile(&slug).await?;
    Ok(Json(tenant))
}

async fn track_order(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<Order>> {
    let order = state.service.track_order(&token).await?;
    Ok(Json(order))
}

#[derive(Debug, Deserialize, Default)]
pub struct RejectRequest {
    pub reason: Option<String>,
}

async fn reject_order(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(req): Json<RejectRequest>,
) -> Result<Json<Order>> {
    let order = state.service.reject_order(&token, req.reason).await?;
    Ok(Json(order))
}

#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub decision: Decision,
    pub reason: Option<String>,
}

async fn decide_replacement(
    State(state): State<AppState>,
    Path((token, item_id)): Path<(String, i64)>,
    Json(req): Json<DecisionRequest>,
) -> Result<Json<OrderItem>> {
    let item = state
        .service
        .decide_replacement_via_token(&token, item_id, req.decision, req.reason)
        .await?;
    Ok(Json(item))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::Notifier;
    use axum::http::HeaderValue;
    use sqlx::postgres::PgPoolOptions;

    fn lazy_state() -> AppState {
        // connect_lazy never touches the network until a query runs.
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/dukkan_test")
            .unwrap();
        let service = OrderService::new(pool.clone(), Notifier::disabled());
        AppState::new(pool, service)
    }

    #[tokio::test]
    async fn header_evidence_resolves_without_touching_the_database() {
        let state = lazy_state();
        let mut headers = HeaderMap::new();
        headers.insert("x-tenant-id", HeaderValue::from_static("12"));
        let tenant = require_tenant(&state, &headers).await.unwrap();
        assert_eq!(tenant, TenantId(12));
    }

    #[tokio::test]
    async fn missing_evidence_is_not_found() {
        let state = lazy_state();
        let err = require_tenant(&state, &HeaderMap::new()).await.unwrap_err();
        assert!(matches!(err, Error::NotFound));
    }

    #[tokio::test]
    async fn malformed_header_is_ignored_as_evidence() {
        let state = lazy_state();
        let mut headers = HeaderMap::new();
        headers.insert("x-tenant-id", HeaderValue::from_static("not-a-number"));
        let err = require_tenant(&state, &headers).await.unwrap_err();
        assert!(matches!(err, Error::NotFound));
    }

    #[test]
    fn create_order_request_validation() {
        let req = CreateOrderRequest {
            customer_name: "".into(),
            customer_phone: "+201000000001".into(),
            order_type: OrderType::Catalog,
            pricing_mode: PricingMode::Auto,
            delivery_fee: None,
            free_text_payload: None,
            items: vec![],
        };
        assert!(req.validate().is_err());
    }
}
