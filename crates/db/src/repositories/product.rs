use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row};

use fernwood_core::{Prices, Product, ProductId};

use super::{page_count, PageRequest, ProductFilter, ProductPage, ProductRepository, RepositoryError};
use crate::DbPool;

const PRODUCT_COLUMNS: &str = "item_id, item_name, item_description, brand, \
     full_price_cents, sale_price_cents, categories, reviews, embedding_text, embedding";

pub struct SqlProductRepository {
    pool: DbPool,
}

impl SqlProductRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProductRepository for SqlProductRepository {
    async fn count(&self) -> Result<u64, RepositoryError> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM product").fetch_one(&self.pool).await?;
        Ok(total.max(0) as u64)
    }

    async fn find_by_id(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM product WHERE item_id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| decode_product(&row)).transpose()
    }

    async fn list(
        &self,
        filter: &ProductFilter,
        page: PageRequest,
    ) -> Result<ProductPage, RepositoryError> {
        let mut count_builder: QueryBuilder<sqlx::Sqlite> =
            QueryBuilder::new("SELECT COUNT(*) FROM product");
        push_filter(&mut count_builder, filter);
        let total: i64 = count_builder.build_query_scalar().fetch_one(&self.pool).await?;
        let total = total.max(0) as u64;

        let mut builder: QueryBuilder<sqlx::Sqlite> =
            QueryBuilder::new(format!("SELECT {PRODUCT_COLUMNS} FROM product"));
        push_filter(&mut builder, filter);
        builder.push(" ORDER BY item_id");
        builder.push(" LIMIT ").push_bind(i64::from(page.limit));
        builder.push(" OFFSET ").push_bind(i64::try_from(page.offset()).unwrap_or(i64::MAX));

        let rows = builder.build().fetch_all(&self.pool).await?;
        let products =
            rows.iter().map(decode_product).collect::<Result<Vec<_>, RepositoryError>>()?;

        Ok(ProductPage {
            products,
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
        let categories = serde_json::to_string(&product.categories)
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;
        let reviews = serde_json::to_string(&product.reviews)
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;
        let embedding = embedding
            .map(serde_json::to_string)
            .transpose()
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;

        sqlx::query(
            "INSERT INTO product (item_id, item_name, item_description, brand, \
                 full_price_cents, sale_price_cents, categories, reviews, \
                 embedding_text, embedding, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT (item_id) DO UPDATE SET \
                 item_name = excluded.item_name, \
                 item_description = excluded.item_description, \
                 brand = excluded.brand, \
                 full_price_cents = excluded.full_price_cents, \
                 sale_price_cents = excluded.sale_price_cents, \
                 categories = excluded.categories, \
                 reviews = excluded.reviews, \
                 embedding_text = excluded.embedding_text, \
                 embedding = excluded.embedding",
        )
        .bind(&product.id.0)
        .bind(&product.name)
        .bind(&product.description)
        .bind(&product.brand)
        .bind(product.prices.full_cents)
        .bind(product.prices.sale_cents)
        .bind(categories)
        .bind(reviews)
        .bind(&product.embedding_text)
        .bind(embedding)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn text_search(&self, query: &str, limit: u32) -> Result<Vec<Product>, RepositoryError> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM product \
             WHERE instr(lower(item_name), ?) > 0 \
                OR instr(lower(item_description), ?) > 0 \
                OR instr(lower(categories), ?) > 0 \
                OR instr(lower(embedding_text), ?) > 0 \
             ORDER BY item_id \
             LIMIT ?"
        ))
        .bind(&needle)
        .bind(&needle)
        .bind(&needle)
        .bind(&needle)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(decode_product).collect()
    }

    async fn embedded(&self) -> Result<Vec<(Product, Vec<f32>)>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM product WHERE embedding IS NOT NULL"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let product = decode_product(row)?;
                let raw: String = row.try_get("embedding")?;
                let embedding: Vec<f32> = serde_json::from_str(&raw).map_err(|error| {
                    RepositoryError::Decode(format!(
                        "invalid embedding for `{}`: {error}",
                        product.id.0
                    ))
                })?;
                Ok((product, embedding))
            })
            .collect()
    }
}

fn push_filter(builder: &mut QueryBuilder<'_, sqlx::Sqlite>, filter: &ProductFilter) {
    let mut prefix = " WHERE ";
    if let Some(category) = &filter.category {
        builder.push(prefix).push("instr(lower(categories), ");
        builder.push_bind(category.trim().to_lowercase());
        builder.push(") > 0");
        prefix = " AND ";
    }
    if let Some(min_sale_cents) = filter.min_sale_cents {
        builder.push(prefix).push("sale_price_cents >= ").push_bind(min_sale_cents);
        prefix = " AND ";
    }
    if let Some(max_sale_cents) = filter.max_sale_cents {
        builder.push(prefix).push("sale_price_cents <= ").push_bind(max_sale_cents);
    }
}

fn decode_product(row: &SqliteRow) -> Result<Product, RepositoryError> {
    let categories_raw: String = row.try_get("categories")?;
    let categories = serde_json::from_str(&categories_raw)
        .map_err(|error| RepositoryError::Decode(format!("invalid categories: {error}")))?;
    let reviews_raw: String = row.try_get("reviews")?;
    let reviews = serde_json::from_str(&reviews_raw)
        .map_err(|error| RepositoryError::Decode(format!("invalid reviews: {error}")))?;

    Ok(Product {
        id: ProductId(row.try_get("item_id")?),
        name: row.try_get("item_name")?,
        description: row.try_get("item_description")?,
        brand: row.try_get("brand")?,
        prices: Prices::new(row.try_get("full_price_cents")?, row.try_get("sale_price_cents")?),
        categories,
        reviews,
        embedding_text: row.try_get("embedding_text")?,
    })
}

#[cfg(test)]
mod tests {
    use fernwood_core::{Prices, Product, ProductId};

    use super::SqlProductRepository;
    use crate::migrations::run_pending;
    use crate::repositories::{PageRequest, ProductFilter, ProductRepository};
    use crate::{connect_with_settings, DbPool};

    async fn memory_pool() -> DbPool {
        let pool =
            connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool should connect");
        run_pending(&pool).await.expect("migrations should apply");
        pool
    }

    fn product(id: &str, category: &str, sale_cents: i64) -> Product {
        Product {
            id: ProductId(id.to_string()),
            name: format!("{id} name"),
            description: format!("{id} description"),
            brand: "Fernwood".to_string(),
            prices: Prices::new(sale_cents + 10_000, sale_cents),
            categories: vec![category.to_string()],
            reviews: Vec::new(),
            embedding_text: format!("{category} {id}"),
        }
    }

    #[tokio::test]
    async fn find_by_id_round_trips() {
        let pool = memory_pool().await;
        let repo = SqlProductRepository::new(pool.clone());

        let original = product("item-001", "sofas", 89_900);
        repo.insert(&original, None).await.expect("insert should succeed");

        let found = repo
            .find_by_id(&ProductId("item-001".to_string()))
            .await
            .expect("lookup should succeed")
            .expect("product should exist");
        assert_eq!(found, original);

        assert!(repo
            .find_by_id(&ProductId("missing".to_string()))
            .await
            .expect("lookup should succeed")
            .is_none());

        pool.close().await;
    }

    #[tokio::test]
    async fn list_filters_by_sale_price_range_inclusive() {
        let pool = memory_pool().await;
        let repo = SqlProductRepository::new(pool.clone());

        repo.insert(&product("item-low", "chairs", 9_900), None).await.expect("insert");
        repo.insert(&product("item-edge-low", "chairs", 10_000), None).await.expect("insert");
        repo.insert(&product("item-mid", "chairs", 25_000), None).await.expect("insert");
        repo.insert(&product("item-edge-high", "chairs", 50_000), None).await.expect("insert");
        repo.insert(&product("item-high", "chairs", 50_100), None).await.expect("insert");

        let filter = ProductFilter {
            min_sale_cents: Some(10_000),
            max_sale_cents: Some(50_000),
            ..ProductFilter::default()
        };
        let page = repo.list(&filter, PageRequest::default()).await.expect("list should succeed");

        let ids: Vec<&str> = page.products.iter().map(|p| p.id.0.as_str()).collect();
        assert_eq!(ids, vec!["item-edge-high", "item-edge-low", "item-mid"]);
        assert_eq!(page.total, 3);

        pool.close().await;
    }

    #[tokio::test]
    async fn list_filters_category_case_insensitively() {
        let pool = memory_pool().await;
        let repo = SqlProductRepository::new(pool.clone());

        repo.insert(&product("item-sofa", "Sofas", 89_900), None).await.expect("insert");
        repo.insert(&product("item-chair", "chairs", 19_900), None).await.expect("insert");

        let filter =
            ProductFilter { category: Some("SOFA".to_string()), ..ProductFilter::default() };
        let page = repo.list(&filter, PageRequest::default()).await.expect("list should succeed");

        assert_eq!(page.products.len(), 1);
        assert_eq!(page.products[0].id.0, "item-sofa");

        pool.close().await;
    }

    #[tokio::test]
    async fn pagination_math_matches_ceiling() {
        let pool = memory_pool().await;
        let repo = SqlProductRepository::new(pool.clone());

        for index in 0..7 {
            repo.insert(&product(&format!("item-{index:03}"), "tables", 10_000), None)
                .await
                .expect("insert");
        }

        let page =
            repo.list(&ProductFilter::default(), PageRequest::new(3, 3)).await.expect("list");
        assert_eq!(page.total, 7);
        assert_eq!(page.pages, 3);
        assert_eq!(page.products.len(), 1);
        assert_eq!(page.products[0].id.0, "item-006");

        pool.close().await;
    }

    #[tokio::test]
    async fn text_search_matches_all_declared_fields() {
        let pool = memory_pool().await;
        let repo = SqlProductRepository::new(pool.clone());

        let mut by_description = product("item-a", "beds", 10_000);
        by_description.description = "Solid Oak frame".to_string();
        repo.insert(&by_description, None).await.expect("insert");

        let mut by_embedding_text = product("item-b", "beds", 10_000);
        by_embedding_text.embedding_text = "queen platform with oak slats".to_string();
        repo.insert(&by_embedding_text, None).await.expect("insert");

        repo.insert(&product("item-c", "desks", 10_000), None).await.expect("insert");

        let results = repo.text_search("OAK", 10).await.expect("search should succeed");
        let ids: Vec<&str> = results.iter().map(|p| p.id.0.as_str()).collect();
        assert_eq!(ids, vec!["item-a", "item-b"]);

        pool.close().await;
    }

    #[tokio::test]
    async fn embedded_returns_only_rows_with_vectors() {
        let pool = memory_pool().await;
        let repo = SqlProductRepository::new(pool.clone());

        repo.insert(&product("item-plain", "sofas", 10_000), None).await.expect("insert");
        repo.insert(&product("item-embedded", "sofas", 10_000), Some(&[0.1, 0.2, 0.3]))
            .await
            .expect("insert");

        let embedded = repo.embedded().await.expect("fetch should succeed");
        assert_eq!(embedded.len(), 1);
        assert_eq!(embedded[0].0.id.0, "item-embedded");
        assert_eq!(embedded[0].1, vec![0.1, 0.2, 0.3]);

        pool.close().await;
    }
}
