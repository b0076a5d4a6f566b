use async_trait::async_trait;
use thiserror::Error;

use fernwood_core::{ChatMessage, Product, ProductId, ThreadId};

pub mod memory;
pub mod product;
pub mod thread_log;

pub use memory::{InMemoryProductRepository, InMemoryThreadLog};
pub use product::SqlProductRepository;
pub use thread_log::SqlThreadLog;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Catalog listing filter. `category` is a case-insensitive substring match;
/// price bounds are inclusive and apply to the sale price.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProductFilter {
    pub category: Option<String>,
    pub min_sale_cents: Option<i64>,
    pub max_sale_cents: Option<i64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { page: 1, limit: 20 }
    }
}

impl PageRequest {
    pub fn new(page: u32, limit: u32) -> Self {
        Self { page: page.max(1), limit: limit.max(1) }
    }

    /// Row offset for this page. Widened to u64 so a large `page` from a
    /// query string cannot overflow the multiplication.
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ProductPage {
    pub products: Vec<Product>,
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub pages: u64,
}

pub fn page_count(total: u64, limit: u32) -> u64 {
    let limit = u64::from(limit.max(1));
    total.div_ceil(limit)
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn count(&self) -> Result<u64, RepositoryError>;

    async fn find_by_id(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError>;

    async fn list(
        &self,
        filter: &ProductFilter,
        page: PageRequest,
    ) -> Result<ProductPage, RepositoryError>;

    async fn insert(
        &self,
        product: &Product,
        embedding: Option<&[f32]>,
    ) -> Result<(), RepositoryError>;

    /// Case-insensitive substring match across name, description, categories
    /// and embedding text.
    async fn text_search(&self, query: &str, limit: u32) -> Result<Vec<Product>, RepositoryError>;

    /// All products that carry a stored embedding, with their vectors.
    async fn embedded(&self) -> Result<Vec<(Product, Vec<f32>)>, RepositoryError>;
}

/// Append-only conversation log keyed by thread id. Messages are never
/// mutated after append; `read` returns them in strict append order.
#[async_trait]
pub trait ThreadLog: Send + Sync {
    async fn append(
        &self,
        thread: &ThreadId,
        message: &ChatMessage,
    ) -> Result<(), RepositoryError>;

    async fn read(&self, thread: &ThreadId) -> Result<Vec<ChatMessage>, RepositoryError>;
}
