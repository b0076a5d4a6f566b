//! Deterministic showroom catalog used by `fernwood seed` and tests. Rows are
//! upserted, so reseeding an existing database is safe. Seeded rows carry no
//! embeddings; those are backfilled against the live embedding API.

use chrono::TimeZone;
use chrono::Utc;

use fernwood_core::{Prices, Product, ProductId, Review};

use crate::repositories::{ProductRepository, SqlProductRepository};
use crate::{DbPool, repositories::RepositoryError};

const EXPECTED_CATEGORIES: &[&str] = &["sofas", "chairs", "tables", "beds", "office"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeedResult {
    pub products_seeded: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

pub struct ShowroomSeedDataset;

impl ShowroomSeedDataset {
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let repository = SqlProductRepository::new(pool.clone());
        let catalog = showroom_catalog();
        for product in &catalog {
            repository.insert(product, None).await?;
        }
        Ok(SeedResult { products_seeded: catalog.len() })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let repository = SqlProductRepository::new(pool.clone());
        let expected = showroom_catalog().len() as u64;

        let mut checks = Vec::new();
        checks.push(("catalog_row_count", repository.count().await? >= expected));
        for category in EXPECTED_CATEGORIES {
            let hits = repository.text_search(category, 1).await?;
            let check: &'static str = category;
            checks.push((check, !hits.is_empty()));
        }

        let all_present = checks.iter().all(|(_, passed)| *passed);
        Ok(VerificationResult { all_present, checks })
    }
}

fn review(rating: u8, comment: &str, year: i32, month: u32, day: u32) -> Review {
    Review {
        rating,
        comment: comment.to_string(),
        date: Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).single().unwrap_or_default(),
    }
}

#[allow(clippy::too_many_arguments)]
fn item(
    id: &str,
    name: &str,
    description: &str,
    full_cents: i64,
    sale_cents: i64,
    categories: &[&str],
    reviews: Vec<Review>,
) -> Product {
    let embedding_text = format!("{name}. {description}. {}", categories.join(", "));
    Product {
        id: ProductId(id.to_string()),
        name: name.to_string(),
        description: description.to_string(),
        brand: "Fernwood".to_string(),
        prices: Prices::new(full_cents, sale_cents),
        categories: categories.iter().map(ToString::to_string).collect(),
        reviews,
        embedding_text,
    }
}

pub fn showroom_catalog() -> Vec<Product> {
    vec![
        item(
            "item-0001",
            "Modern Sectional Sofa",
            "Grey L-shaped sectional that seats six, with washable covers.",
            159_900,
            129_900,
            &["sofas", "living room"],
            vec![review(5, "Swallowed our whole family movie night.", 2025, 2, 14)],
        ),
        item(
            "item-0002",
            "Classic Leather Sofa",
            "Brown three-seater in full-grain leather on a hardwood frame.",
            109_900,
            89_900,
            &["sofas", "living room"],
            vec![review(4, "Ages beautifully, firm cushions.", 2025, 1, 8)],
        ),
        item(
            "item-0003",
            "Convertible Sofa Bed",
            "Navy two-seater that folds flat for guests, tool-free.",
            79_900,
            59_900,
            &["sofas", "beds"],
            Vec::new(),
        ),
        item(
            "item-0004",
            "Ergonomic Office Chair",
            "Adjustable task chair with lumbar support and mesh back.",
            49_900,
            39_900,
            &["chairs", "office"],
            vec![review(5, "My back stopped complaining after a week.", 2025, 3, 30)],
        ),
        item(
            "item-0005",
            "Oak Dining Chairs, Set of 4",
            "Solid oak dining chairs with woven seats.",
            39_900,
            29_900,
            &["chairs", "dining"],
            Vec::new(),
        ),
        item(
            "item-0006",
            "Velvet Accent Chair",
            "Compact accent chair in emerald velvet, brass legs.",
            24_900,
            19_900,
            &["chairs", "living room"],
            vec![review(4, "Prettier in person than in photos.", 2024, 11, 3)],
        ),
        item(
            "item-0007",
            "Extending Dining Table",
            "Seats six, extends to ten; oiled oak top on steel trestles.",
            99_900,
            89_900,
            &["tables", "dining"],
            Vec::new(),
        ),
        item(
            "item-0008",
            "Glass Coffee Table",
            "Tempered glass top with a walnut magazine shelf below.",
            34_900,
            29_900,
            &["tables", "living room"],
            Vec::new(),
        ),
        item(
            "item-0009",
            "Queen Platform Bed",
            "Low platform bed with two storage drawers, no box spring needed.",
            89_900,
            79_900,
            &["beds", "bedroom"],
            vec![review(5, "Assembly took twenty minutes, rock solid.", 2025, 5, 21)],
        ),
        item(
            "item-0010",
            "King Bed Frame",
            "Classic solid-wood king frame with slatted base.",
            109_900,
            99_900,
            &["beds", "bedroom"],
            Vec::new(),
        ),
        item(
            "item-0011",
            "Walnut Writing Desk",
            "Sixty-inch desk with cable tray and two soft-close drawers.",
            64_900,
            54_900,
            &["office", "tables"],
            Vec::new(),
        ),
        item(
            "item-0012",
            "Oak Nightstand Pair",
            "Two matching nightstands with a drawer and open shelf.",
            32_900,
            29_900,
            &["beds", "bedroom", "storage"],
            Vec::new(),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::{showroom_catalog, ShowroomSeedDataset};
    use crate::migrations::run_pending;
    use crate::{connect_with_settings, DbPool};

    async fn memory_pool() -> DbPool {
        let pool =
            connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool should connect");
        run_pending(&pool).await.expect("migrations should apply");
        pool
    }

    #[test]
    fn catalog_ids_are_unique() {
        let catalog = showroom_catalog();
        let mut ids: Vec<&str> = catalog.iter().map(|p| p.id.0.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), catalog.len());
    }

    #[tokio::test]
    async fn seed_loads_and_verifies() {
        let pool = memory_pool().await;

        let result = ShowroomSeedDataset::load(&pool).await.expect("seed should load");
        assert_eq!(result.products_seeded, showroom_catalog().len());

        let verification = ShowroomSeedDataset::verify(&pool).await.expect("verify should run");
        assert!(verification.all_present, "failed checks: {:?}", verification.checks);

        pool.close().await;
    }

    #[tokio::test]
    async fn seeding_twice_is_idempotent() {
        let pool = memory_pool().await;

        ShowroomSeedDataset::load(&pool).await.expect("first seed");
        ShowroomSeedDataset::load(&pool).await.expect("second seed");

        let verification = ShowroomSeedDataset::verify(&pool).await.expect("verify");
        assert!(verification.all_present);

        pool.close().await;
    }
}
