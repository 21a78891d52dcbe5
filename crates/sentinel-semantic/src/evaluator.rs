use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use sentinel_core::config::ProfileDefinition;
use sentinel_store::StoreManager;
use tracing::{debug, warn};

use crate::backend::EmbeddingBackend;
use crate::error::Result;
use crate::types::{l2_normalize, Centroid, InterestEvaluation};

/// Base weight for a profile's declared `positive_samples`.
const POSITIVE_BASE_WEIGHT: f32 = 1.0;
/// Weight for feedback-augmented positive samples (spec §4.6).
const FEEDBACK_WEIGHT: f32 = 0.4;
/// Scale applied to the negative-sample centroid before subtraction.
const NEGATIVE_WEIGHT: f32 = 0.3;

/// Embedding-centroid similarity scorer for semantic (interest) profiles
/// (spec §4.6). Centroids are cached in-memory keyed by profile ID;
/// [`SemanticEvaluator::invalidate`] clears one entry, called by the batch
/// feedback processor (C7) after recomputation-worthy feedback arrives.
pub struct SemanticEvaluator {
    backend: Arc<dyn EmbeddingBackend>,
    store: Arc<StoreManager>,
    cache: DashMap<String, Centroid>,
}

impl SemanticEvaluator {
    pub fn new(backend: Arc<dyn EmbeddingBackend>, store: Arc<StoreManager>) -> Self {
        Self { backend, store, cache: DashMap::new() }
    }

    pub fn invalidate(&self, profile_id: &str) {
        self.cache.remove(profile_id);
        debug!(profile_id, "centroid cache invalidated");
    }

    /// Cosine similarity of `text` against `profile`'s centroid, or `None`
    /// if the embedding backend is unavailable (spec §4.6 contract).
    pub async fn score_text_for_profile(&self, text: &str, profile: &ProfileDefinition) -> Result<Option<f32>> {
        let Some(centroid) = self.get_or_compute_centroid(profile).await? else {
            return Ok(None);
        };
        let Some(embedding) = self.backend.embed(text).await else {
            return Ok(None);
        };
        Ok(Some(centroid.cosine_similarity(&embedding)))
    }

    async fn get_or_compute_centroid(&self, profile: &ProfileDefinition) -> Result<Option<Centroid>> {
        if let Some(cached) = self.cache.get(&profile.id) {
            return Ok(Some(cached.clone()));
        }

        let feedback_texts = {
            let store = self.store.clone();
            let profile_id = profile.id.clone();
            tokio::task::spawn_blocking(move || store.positive_feedback_texts(&profile_id))
                .await
                .expect("blocking feedback lookup panicked")?
        };

        let mut weighted_sum: Option<Vec<f32>> = None;
        let mut total_weight = 0.0f32;

        for sample in &profile.positive_samples {
            if let Some(v) = self.backend.embed(sample).await {
                accumulate(&mut weighted_sum, &v, POSITIVE_BASE_WEIGHT);
                total_weight += POSITIVE_BASE_WEIGHT;
            }
        }
        for sample in &feedback_texts {
            if let Some(v) = self.backend.embed(sample).await {
                accumulate(&mut weighted_sum, &v, FEEDBACK_WEIGHT);
                total_weight += FEEDBACK_WEIGHT;
            }
        }

        let Some(mut sum) = weighted_sum else {
            warn!(profile_id = %profile.id, "no positive samples embedded, semantic scoring unavailable");
            return Ok(None);
        };
        for x in sum.iter_mut() {
            *x /= total_weight;
        }

        if !profile.negative_samples.is_empty() {
            let mut negative_sum: Option<Vec<f32>> = None;
            let mut negative_count = 0.0f32;
            for sample in &profile.negative_samples {
                if let Some(v) = self.backend.embed(sample).await {
                    accumulate(&mut negative_sum, &v, 1.0);
                    negative_count += 1.0;
                }
            }
            if let Some(mut negative_mean) = negative_sum {
                for x in negative_mean.iter_mut() {
                    *x /= negative_count;
                }
                for (s, n) in sum.iter_mut().zip(negative_mean.iter()) {
                    *s -= NEGATIVE_WEIGHT * n;
                }
            }
        }

        let centroid = Centroid { vector: l2_normalize(sum) };
        self.cache.insert(profile.id.clone(), centroid.clone());
        Ok(Some(centroid))
    }

    /// Iterate bound semantic profiles, score `text` against each, and
    /// assemble the feed/digest inclusion flags (spec §4.6).
    pub async fn evaluate_interest_profiles(
        &self,
        text: &str,
        bound_profiles: &[&ProfileDefinition],
    ) -> Result<InterestEvaluation> {
        let mut semantic_scores = HashMap::new();
        let mut matched_profile_ids = Vec::new();
        let mut should_include_in_digest = false;

        for profile in bound_profiles {
            let Some(score) = self.score_text_for_profile(text, profile).await? else {
                continue;
            };
            semantic_scores.insert(profile.id.clone(), score);
            if score >= profile.threshold {
                matched_profile_ids.push(profile.id.clone());
                let mode = profile.digest.as_ref().map(|d| d.mode).unwrap_or_default();
                if mode.includes_digest() {
                    should_include_in_digest = true;
                }
            }
        }

        let should_include_in_feed = !matched_profile_ids.is_empty();
        Ok(InterestEvaluation {
            semantic_scores,
            matched_profile_ids,
            should_include_in_feed,
            should_include_in_digest,
        })
    }
}

fn accumulate(acc: &mut Option<Vec<f32>>, v: &[f32], weight: f32) {
    match acc {
        Some(sum) => {
            for (s, x) in sum.iter_mut().zip(v.iter()) {
                *s += weight * x;
            }
        }
        None => {
            *acc = Some(v.iter().map(|x| x * weight).collect());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Embeds each sample as a one-hot-ish vector keyed by its first byte,
    /// so similarity is deterministic and easy to reason about in tests.
    struct FakeBackend;

    #[async_trait]
    impl EmbeddingBackend for FakeBackend {
        async fn embed(&self, text: &str) -> Option<Vec<f32>> {
            if text == "unembeddable" {
                return None;
            }
            let first = text.bytes().next().unwrap_or(0) as f32;
            Some(vec![first, 1.0])
        }
    }

    fn evaluator() -> SemanticEvaluator {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let store = Arc::new(StoreManager::new(conn).unwrap());
        SemanticEvaluator::new(Arc::new(FakeBackend), store)
    }

    fn semantic_profile() -> ProfileDefinition {
        let cfg_json = serde_json::json!({
            "id": "launches",
            "positive_samples": ["apple", "avocado"],
        });
        serde_json::from_value(cfg_json).unwrap()
    }

    #[tokio::test]
    async fn identical_text_scores_near_one() {
        let eval = evaluator();
        let profile = semantic_profile();
        let score = eval.score_text_for_profile("apple", &profile).await.unwrap();
        assert!(score.unwrap() > 0.9);
    }

    #[tokio::test]
    async fn centroid_is_cached_across_calls() {
        let eval = evaluator();
        let profile = semantic_profile();
        eval.score_text_for_profile("apple", &profile).await.unwrap();
        assert!(eval.cache.contains_key(&profile.id));
        eval.invalidate(&profile.id);
        assert!(!eval.cache.contains_key(&profile.id));
    }

    #[tokio::test]
    async fn no_embeddable_samples_degrades_to_none() {
        let eval = evaluator();
        let mut profile = semantic_profile();
        profile.positive_samples = vec!["unembeddable".to_string()];
        let score = eval.score_text_for_profile("apple", &profile).await.unwrap();
        assert!(score.is_none());
    }
}
