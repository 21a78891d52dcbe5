use std::collections::HashMap;

/// Normalized centroid vector for one semantic profile (spec §4.6).
#[derive(Debug, Clone)]
pub struct Centroid {
    pub vector: Vec<f32>,
}

impl Centroid {
    /// Cosine similarity against an already-computed embedding. `self.vector`
    /// is L2-normalized at construction, so this only needs to normalize
    /// `other`.
    pub fn cosine_similarity(&self, other: &[f32]) -> f32 {
        let other_norm = l2_norm(other);
        if other_norm == 0.0 {
            return 0.0;
        }
        let dot: f32 = self.vector.iter().zip(other.iter()).map(|(a, b)| a * b).sum();
        dot / other_norm
    }
}

pub(crate) fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

pub(crate) fn l2_normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm = l2_norm(&v);
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
    v
}

/// Output of [`crate::evaluator::SemanticEvaluator::evaluate_interest_profiles`]
/// (spec §4.6).
#[derive(Debug, Clone, Default)]
pub struct InterestEvaluation {
    /// `profile_id -> cosine similarity`.
    pub semantic_scores: HashMap<String, f32>,
    pub matched_profile_ids: Vec<String>,
    pub should_include_in_feed: bool,
    pub should_include_in_digest: bool,
}
