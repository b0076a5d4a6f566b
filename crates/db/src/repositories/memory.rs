use std::collections::HashMap;

use tokio::sync::RwLock;

use fernwood_core::{ChatMessage, Product, ProductId, ThreadId};

use super::{
    page_count, PageRequest, ProductFilter, ProductPage, ProductRepository, RepositoryError,
    ThreadLog,
};

/// In-memory catalog double for agent and handler tests. Mirrors the Sql
/// repository's filter and ordering semantics on a plain Vec.
#[derive(Default)]
pub struct InMemoryProductRepository {
    products: RwLock<Vec<(Product, Option<Vec<f32>>)>>,
}

impl InMemoryProductRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn matches_filter(product: &Product, filter: &ProductFilter) -> bool {
        if let Some(category) = &filter.category {
            let needle = category.trim().to_lowercase();
            let hit = product
                .categories
                .iter()
                .any(|candidate| candidate.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }
        if let Some(min) = filter.min_sale_cents {
            if product.prices.sale_cents < min {
                return false;
            }
        }
        if let Some(max) = filter.max_sale_cents {
            if product.prices.sale_cents > max {
                return false;
            }
        }
        true
    }
}

#[async_trait::async_trait]
impl ProductRepository for InMemoryProductRepository {
    async fn count(&self) -> Result<u64, RepositoryError> {
        Ok(self.products.read().await.len() as u64)
    }

    async fn find_by_id(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        let products = self.products.read().await;
        Ok(products.iter().find(|(product, _)| product.id == *id).map(|(p, _)| p.clone()))
    }

    async fn list(
        &self,
        filter: &ProductFilter,
        page: PageRequest,
    ) -> Result<ProductPage, RepositoryError> {
        let products = self.products.read().await;
        let mut matched: Vec<Product> = products
            .iter()
            .filter(|(product, _)| Self::matches_filter(product, filter))
            .map(|(product, _)| product.clone())
            .collect();
        matched.sort_by(|left, right| left.id.0.cmp(&right.id.0));

        let total = matched.len() as u64;
        let selected: Vec<Product> = matched
            .into_iter()
            .skip(usize::try_from(page.offset()).unwrap_or(usize::MAX))
            .take(page.limit as usize)
            .collect();

        Ok(ProductPage {
            products: selected,
            page: page.page,
            limit: page.limit,
            total,
            pages: page_count(total, page.limit),
        })
    }

    async fn insert(
        &self,
        product: &Product,
        embedding: Option<&[f32]>,
    ) -> Result<(), RepositoryError> {
        let mut products = self.products.write().await;
        products.retain(|(existing, _)| existing.id != product.id);
        products.push((product.clone(), embedding.map(<[f32]>::to_vec)));
        Ok(())
    }

    async fn text_search(&self, query: &str, limit: u32) -> Result<Vec<Product>, RepositoryError> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        let products = self.products.read().await;
        let mut matched: Vec<Product> = products
            .iter()
            .filter(|(product, _)| {
                product.name.to_lowercase().contains(&needle)
                    || product.description.to_lowercase().contains(&needle)
                    || product.embedding_text.to_lowercase().contains(&needle)
                    || product
                        .categories
                        .iter()
                        .any(|category| category.to_lowercase().contains(&needle))
            })
            .map(|(product, _)| product.clone())
            .collect();
        matched.sort_by(|left, right| left.id.0.cmp(&right.id.0));
        matched.truncate(limit as usize);
        Ok(matched)
    }

    async fn embedded(&self) -> Result<Vec<(Product, Vec<f32>)>, RepositoryError> {
        let products = self.products.read().await;
        Ok(products
            .iter()
            .filter_map(|(product, embedding)| {
                embedding.as_ref().map(|vector| (product.clone(), vector.clone()))
            })
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryThreadLog {
    threads: RwLock<HashMap<String, Vec<ChatMessage>>>,
}

impl InMemoryThreadLog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ThreadLog for InMemoryThreadLog {
    async fn append(
        &self,
        thread: &ThreadId,
        message: &ChatMessage,
    ) -> Result<(), RepositoryError> {
        let mut threads = self.threads.write().await;
        threads.entry(thread.0.clone()).or_default().push(message.clone());
        Ok(())
    }

    async fn read(&self, thread: &ThreadId) -> Result<Vec<ChatMessage>, RepositoryError> {
        let threads = self.threads.read().await;
        Ok(threads.get(&thread.0).cloned().unwrap_or_default())
    }
}
