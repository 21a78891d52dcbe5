use async_trait::async_trait;

/// External embedding model, treated as a collaborator behind a trait
/// boundary (spec §1/§4.6) — this crate never loads a model itself.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Embed `text`. Returns `None` if the backend is unavailable or the
    /// call fails; semantic scoring degrades gracefully in that case.
    async fn embed(&self, text: &str) -> Option<Vec<f32>>;
}

/// Always-`None` backend, used when `EMBEDDINGS_MODEL` is unset so the
/// crate (and the worker built on it) runs standalone without a model.
pub struct NoopEmbeddingBackend;

#[async_trait]
impl EmbeddingBackend for NoopEmbeddingBackend {
    async fn embed(&self, _text: &str) -> Option<Vec<f32>> {
        None
    }
}
