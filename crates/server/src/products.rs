//! Catalog browsing endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use fernwood_core::domain::product::decimal_to_cents;
use fernwood_core::{Product, ProductId};
use fernwood_db::repositories::product::SqlProductRepository;
use fernwood_db::repositories::{PageRequest, ProductFilter, ProductRepository, RepositoryError};
use fernwood_db::DbPool;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::error;

#[derive(Clone)]
pub struct CatalogState {
    products: Arc<dyn ProductRepository>,
}

impl CatalogState {
    pub fn new(products: Arc<dyn ProductRepository>) -> Self {
        Self { products }
    }
}

pub fn router(db_pool: DbPool) -> Router {
    let state = CatalogState::new(Arc::new(SqlProductRepository::new(db_pool)));
    Router::new()
        .route("/api/products", get(list_products))
        .route("/api/products/{id}", get(get_product))
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductListQuery {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub min_price: Option<Decimal>,
    #[serde(default)]
    pub max_price: Option<Decimal>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub page: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub pages: u64,
}

#[derive(Debug, Serialize)]
pub struct ProductListResponse {
    pub products: Vec<Product>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
}

fn repository_error(error: RepositoryError) -> (StatusCode, Json<ApiError>) {
    error!(event_name = "api.products.repository_error", error = %error, "catalog query failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiError { error: "failed to query the catalog".to_string() }),
    )
}

fn price_bound(value: Option<Decimal>) -> Result<Option<i64>, (StatusCode, Json<ApiError>)> {
    match value {
        None => Ok(None),
        Some(amount) => decimal_to_cents(amount).map(Some).ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                Json(ApiError { error: format!("price bound out of range: {amount}") }),
            )
        }),
    }
}

pub async fn list_products(
    State(state): State<CatalogState>,
    Query(query): Query<ProductListQuery>,
) -> Result<Json<ProductListResponse>, (StatusCode, Json<ApiError>)> {
    let filter = ProductFilter {
        category: query.category.filter(|value| !value.trim().is_empty()),
        min_sale_cents: price_bound(query.min_price)?,
        max_sale_cents: price_bound(query.max_price)?,
    };
    let page = PageRequest::new(query.page.unwrap_or(1), query.limit.unwrap_or(20));

    let listing = state.products.list(&filter, page).await.map_err(repository_error)?;
    Ok(Json(ProductListResponse {
        products: listing.products,
        pagination: Pagination {
            page: listing.page,
            limit: listing.limit,
            total: listing.total,
            pages: listing.pages,
        },
    }))
}

pub async fn get_product(
    State(state): State<CatalogState>,
    Path(id): Path<String>,
) -> Result<Json<Product>, (StatusCode, Json<ApiError>)> {
    let product =
        state.products.find_by_id(&ProductId(id)).await.map_err(repository_error)?;
    match product {
        Some(product) => Ok(Json(product)),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(ApiError { error: "Product not found".to_string() }),
        )),
    }
}
