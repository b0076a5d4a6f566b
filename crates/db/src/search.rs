//! Similarity ranking over stored product embeddings. The catalog is small
//! enough that candidates are scored in-process after a single fetch.

use fernwood_core::Product;

/// Cosine similarity in [-1, 1]. Zero-length or mismatched vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Rank embedded candidates against a query vector, best first, keeping the
/// top `limit`. Candidates without a usable embedding never reach this point.
pub fn rank_by_similarity(
    candidates: Vec<(Product, Vec<f32>)>,
    query: &[f32],
    limit: usize,
) -> Vec<(Product, f32)> {
    let mut scored: Vec<(Product, f32)> = candidates
        .into_iter()
        .map(|(product, embedding)| {
            let score = cosine_similarity(&embedding, query);
            (product, score)
        })
        .collect();

    scored.sort_by(|left, right| right.1.total_cmp(&left.1));
    scored.truncate(limit);
    scored
}

#[cfg(test)]
mod tests {
    use fernwood_core::{Prices, Product, ProductId};

    use super::{cosine_similarity, rank_by_similarity};

    fn product(id: &str) -> Product {
        Product {
            id: ProductId(id.to_string()),
            name: id.to_string(),
            description: String::new(),
            brand: "Fernwood".to_string(),
            prices: Prices::new(10_000, 8_000),
            categories: Vec::new(),
            reviews: Vec::new(),
            embedding_text: String::new(),
        }
    }

    #[test]
    fn identical_vectors_score_one() {
        let v = vec![0.5, 0.5, 0.1];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn orthogonal_vectors_score_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn mismatched_lengths_score_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
    }

    #[test]
    fn ranking_orders_best_first_and_truncates() {
        let candidates = vec![
            (product("far"), vec![0.0, 1.0]),
            (product("near"), vec![1.0, 0.05]),
            (product("middle"), vec![0.7, 0.7]),
        ];

        let ranked = rank_by_similarity(candidates, &[1.0, 0.0], 2);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].0.id.0, "near");
        assert_eq!(ranked[1].0.id.0, "middle");
        assert!(ranked[0].1 > ranked[1].1);
    }
}
