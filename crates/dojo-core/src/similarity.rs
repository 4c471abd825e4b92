//! Similarity scoring shared by the store backends.

use std::cmp::Ordering;

use crate::types::ScoredEntry;

/// Cosine similarity of two vectors, `0.0` when either has zero norm or
/// the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

/// Convert a cosine distance (`1 - cosine`) into a score in `[0, 1]`.
pub fn score_from_distance(distance: f32) -> f32 {
    (1.0 - distance).clamp(0.0, 1.0)
}

/// Apply the threshold, order and limit rules to scored hits.
///
/// Keeps hits with `similarity > threshold`, sorts by similarity descending
/// then `created_at` descending, and truncates to `limit`.
pub fn rank(mut hits: Vec<ScoredEntry>, threshold: f32, limit: usize) -> Vec<ScoredEntry> {
    hits.retain(|hit| hit.similarity > threshold);
    hits.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.entry.created_at.cmp(&a.entry.created_at))
    });
    hits.truncate(limit);
    hits
}
