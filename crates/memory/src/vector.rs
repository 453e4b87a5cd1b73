//! Vector similarity and diversity utilities.
//!
//! Pure-Rust implementations of:
//! - Cosine similarity and Euclidean distance
//! - Mean vectors (chapter centroids)
//! - Maximal Marginal Relevance (MMR) diversity selection
//! - Similarity ranking of memory records
//!
//! Mismatched dimensions are an error, never silently coerced.

use recall_core::error::SimilarityError;
use recall_core::memory::MemoryRecord;

/// Added to the cosine denominator so zero-norm vectors yield 0 instead of NaN.
const COSINE_EPSILON: f64 = 1e-8;

fn check_dims(a: &[f32], b: &[f32]) -> Result<(), SimilarityError> {
    if a.len() != b.len() {
        return Err(SimilarityError::DimensionMismatch {
            left: a.len(),
            right: b.len(),
        });
    }
    Ok(())
}

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 = identical direction, 0 = orthogonal,
/// -1 = opposite. Zero-norm vectors have similarity 0 with everything.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32, SimilarityError> {
    check_dims(a, b)?;

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt() + COSINE_EPSILON;
    Ok((dot / denom) as f32)
}

/// Euclidean (L2) distance between two vectors.
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> Result<f32, SimilarityError> {
    check_dims(a, b)?;

    let sum: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = *x as f64 - *y as f64;
            d * d
        })
        .sum();
    Ok(sum.sqrt() as f32)
}

/// Element-wise mean of a set of equally sized vectors.
pub fn mean_vector(vectors: &[Vec<f32>]) -> Result<Vec<f32>, SimilarityError> {
    let first = vectors.first().ok_or(SimilarityError::Empty)?;
    let mut sum = vec![0.0f64; first.len()];

    for v in vectors {
        check_dims(first, v)?;
        for (acc, x) in sum.iter_mut().zip(v.iter()) {
            *acc += *x as f64;
        }
    }

    let n = vectors.len() as f64;
    Ok(sum.into_iter().map(|s| (s / n) as f32).collect())
}

/// Maximal Marginal Relevance selection.
///
/// Greedily picks up to `k` candidates, each time maximizing
/// `lambda × cos(c, query) − (1 − lambda) × max cos(c, s)` over the already
/// selected `s`. Ties go to the earliest candidate. Returns indices into
/// `candidates` in selection order.
///
/// With `lambda = 1.0` this is exactly top-k by relevance.
pub fn diversity_select(
    candidates: &[Vec<f32>],
    query: &[f32],
    k: usize,
    lambda: f32,
) -> Result<Vec<usize>, SimilarityError> {
    let relevance: Vec<f32> = candidates
        .iter()
        .map(|c| cosine_similarity(c, query))
        .collect::<Result<_, _>>()?;

    let target = k.min(candidates.len());
    let mut selected: Vec<usize> = Vec::with_capacity(target);
    // Highest similarity of each candidate to anything selected so far.
    let mut max_sim_to_selected = vec![0.0f32; candidates.len()];
    let mut taken = vec![false; candidates.len()];

    while selected.len() < target {
        let mut best: Option<(usize, f32)> = None;

        for (i, rel) in relevance.iter().enumerate() {
            if taken[i] {
                continue;
            }
            let redundancy = if selected.is_empty() {
                0.0
            } else {
                max_sim_to_selected[i]
            };
            let score = lambda * rel - (1.0 - lambda) * redundancy;
            if best.is_none_or(|(_, best_score)| score > best_score) {
                best = Some((i, score));
            }
        }

        let Some((pick, _)) = best else { break };
        taken[pick] = true;
        selected.push(pick);

        for (i, candidate) in candidates.iter().enumerate() {
            if taken[i] {
                continue;
            }
            let sim = cosine_similarity(candidate, &candidates[pick])?;
            if selected.len() == 1 || sim > max_sim_to_selected[i] {
                max_sim_to_selected[i] = sim;
            }
        }
    }

    Ok(selected)
}

/// Rank memory records by cosine similarity to a query embedding.
///
/// Returns records sorted by descending similarity, with `score` set to the
/// cosine similarity value. Records without embeddings, with a different
/// dimension, or below `min_score` are skipped.
pub fn vector_search(
    records: &[MemoryRecord],
    query_embedding: &[f32],
    limit: usize,
    min_score: f32,
) -> Vec<MemoryRecord> {
    let mut scored: Vec<(f32, MemoryRecord)> = records
        .iter()
        .filter_map(|record| {
            let emb = record.embedding.as_ref()?;
            let sim = cosine_similarity(emb, query_embedding).ok()?;
            if sim >= min_score {
                let mut r = record.clone();
                r.score = sim;
                Some((sim, r))
            } else {
                None
            }
        })
        .collect();

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(limit);
    scored.into_iter().map(|(_, r)| r).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(id: i64, embedding: Option<Vec<f32>>) -> MemoryRecord {
        MemoryRecord {
            id,
            content: format!("Content for {id}"),
            importance: 0.5,
            source_key: format!("test:{id}"),
            tags: vec![],
            created_at: Utc::now(),
            score: 0.0,
            embedding,
        }
    }

    #[test]
    fn cosine_identical_vectors() {
        let v = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity(&v, &v).unwrap();
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_orthogonal_vectors() {
        let sim = cosine_similarity(&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0]).unwrap();
        assert!(sim.abs() < 1e-6);
    }

    #[test]
    fn cosine_opposite_vectors() {
        let sim = cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]).unwrap();
        assert!((sim - (-1.0)).abs() < 1e-6);
    }

    #[test]
    fn cosine_mismatched_lengths_is_an_error() {
        let err = cosine_similarity(&[1.0, 2.0], &[1.0, 2.0, 3.0]).unwrap_err();
        assert_eq!(err, SimilarityError::DimensionMismatch { left: 2, right: 3 });
    }

    #[test]
    fn cosine_zero_vector_is_zero() {
        let sim = cosine_similarity(&[0.0, 0.0, 0.0], &[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(sim, 0.0);
        let sim = cosine_similarity(&[0.0, 0.0], &[0.0, 0.0]).unwrap();
        assert_eq!(sim, 0.0);
    }

    #[test]
    fn cosine_known_value() {
        // [1,1] · [1,0] = 1, |[1,1]| = sqrt(2), |[1,0]| = 1
        let sim = cosine_similarity(&[1.0, 1.0], &[1.0, 0.0]).unwrap();
        assert!((sim - 0.7071).abs() < 0.001);
    }

    #[test]
    fn cosine_is_bounded() {
        let vectors = [
            vec![3.0, -1.0, 2.5],
            vec![-0.2, 7.0, 1.0],
            vec![100.0, 100.0, -100.0],
            vec![1e-3, 0.0, 1e-3],
        ];
        for a in &vectors {
            for b in &vectors {
                let sim = cosine_similarity(a, b).unwrap();
                assert!((-1.0 - 1e-6..=1.0 + 1e-6).contains(&sim));
            }
        }
    }

    #[test]
    fn euclidean_self_distance_is_zero() {
        let v = vec![0.3, -4.0, 2.0];
        assert_eq!(euclidean_distance(&v, &v).unwrap(), 0.0);
    }

    #[test]
    fn euclidean_is_symmetric_and_correct() {
        let a = vec![0.0, 0.0];
        let b = vec![3.0, 4.0];
        assert!((euclidean_distance(&a, &b).unwrap() - 5.0).abs() < 1e-6);
        assert_eq!(
            euclidean_distance(&a, &b).unwrap(),
            euclidean_distance(&b, &a).unwrap()
        );
    }

    #[test]
    fn euclidean_mismatched_lengths_is_an_error() {
        assert!(euclidean_distance(&[1.0], &[1.0, 2.0]).is_err());
    }

    #[test]
    fn mean_of_vectors() {
        let mean = mean_vector(&[vec![1.0, 0.0], vec![3.0, 2.0]]).unwrap();
        assert_eq!(mean, vec![2.0, 1.0]);
    }

    #[test]
    fn mean_rejects_empty_and_ragged_input() {
        assert_eq!(mean_vector(&[]).unwrap_err(), SimilarityError::Empty);
        assert!(matches!(
            mean_vector(&[vec![1.0], vec![1.0, 2.0]]).unwrap_err(),
            SimilarityError::DimensionMismatch { .. }
        ));
    }

    #[test]
    fn mmr_returns_min_k_distinct_items() {
        let candidates = vec![vec![1.0, 0.0], vec![0.9, 0.1], vec![0.0, 1.0]];
        let query = vec![1.0, 0.0];

        let picked = diversity_select(&candidates, &query, 2, 0.5).unwrap();
        assert_eq!(picked.len(), 2);
        assert_ne!(picked[0], picked[1]);

        let picked = diversity_select(&candidates, &query, 10, 0.5).unwrap();
        assert_eq!(picked.len(), 3);

        let picked = diversity_select(&candidates, &query, 0, 0.5).unwrap();
        assert!(picked.is_empty());
    }

    #[test]
    fn mmr_with_lambda_one_is_relevance_ranking() {
        let candidates = vec![
            vec![0.0, 1.0],
            vec![1.0, 0.0],
            vec![0.7, 0.7],
            vec![1.0, 0.05],
            vec![0.7, 0.7],
        ];
        let query = vec![1.0, 0.0];

        let picked = diversity_select(&candidates, &query, 5, 1.0).unwrap();

        let mut by_relevance: Vec<usize> = (0..candidates.len()).collect();
        by_relevance.sort_by(|&a, &b| {
            let ra = cosine_similarity(&candidates[a], &query).unwrap();
            let rb = cosine_similarity(&candidates[b], &query).unwrap();
            rb.partial_cmp(&ra).unwrap().then(a.cmp(&b))
        });
        assert_eq!(picked, by_relevance);
    }

    #[test]
    fn mmr_prefers_novelty_with_low_lambda() {
        // Two near-duplicates of the query and one different-but-relevant item.
        let candidates = vec![vec![1.0, 0.0], vec![0.99, 0.01], vec![0.6, 0.8]];
        let query = vec![1.0, 0.0];

        let picked = diversity_select(&candidates, &query, 2, 0.3).unwrap();
        assert_eq!(picked, vec![0, 2]);
    }

    #[test]
    fn mmr_ties_go_to_earliest() {
        let candidates = vec![vec![1.0, 0.0], vec![1.0, 0.0]];
        let picked = diversity_select(&candidates, &[1.0, 0.0], 1, 0.7).unwrap();
        assert_eq!(picked, vec![0]);
    }

    #[test]
    fn mmr_dimension_mismatch_is_fatal() {
        let candidates = vec![vec![1.0, 0.0], vec![1.0]];
        assert!(diversity_select(&candidates, &[1.0, 0.0], 2, 0.5).is_err());
    }

    #[test]
    fn vector_search_ranks_by_similarity() {
        let query = vec![1.0, 0.0, 0.0];
        let records = vec![
            record(1, Some(vec![0.0, 1.0, 0.0])), // orthogonal = 0
            record(2, Some(vec![1.0, 0.0, 0.0])), // identical = 1
            record(3, Some(vec![0.5, 0.5, 0.0])), // partial = ~0.707
        ];

        let results = vector_search(&records, &query, 10, 0.0);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].id, 2);
        assert_eq!(results[1].id, 3);
        assert_eq!(results[2].id, 1);
    }

    #[test]
    fn vector_search_skips_missing_and_mismatched_embeddings() {
        let query = vec![1.0, 0.0];
        let records = vec![
            record(1, Some(vec![1.0, 0.0])),
            record(2, None),
            record(3, Some(vec![1.0, 0.0, 0.0])),
        ];

        let results = vector_search(&records, &query, 10, 0.0);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, 1);
    }

    #[test]
    fn vector_search_respects_min_score_and_limit() {
        let query = vec![1.0, 0.0];
        let records: Vec<_> = (0..10)
            .map(|i| record(i, Some(vec![1.0, i as f32 * 0.1])))
            .collect();

        assert_eq!(vector_search(&records, &query, 3, 0.0).len(), 3);
        let strict = vector_search(&records, &query, 10, 0.99);
        assert!(strict.iter().all(|r| r.score >= 0.99));
    }
}
