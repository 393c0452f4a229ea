//! Embedding provider (C4): two interchangeable local backends selected
//! by `RLM_EMBEDDING_PROVIDER`, plus a no-op provider for graceful
//! degradation when neither backend can be loaded.

use crate::config::ProviderKind;

/// Narrow interface every embedding backend implements. No
/// provider-specific type ever crosses this boundary.
pub enum EmbeddingProvider {
    /// Static-embedding model (model2vec), ~256-dim, <100ms cold start.
    Model2Vec {
        model: model2vec_rs::model::StaticModel,
    },
    /// Transformer-based embedder (fastembed), ~384-dim.
    FastEmbed {
        model: std::sync::Mutex<fastembed::TextEmbedding>,
    },
    /// No provider available: every semantic step is skipped and search
    /// degrades to BM25-only. Not an error — the specified graceful path.
    None,
}

impl EmbeddingProvider {
    /// Load the provider selected by `kind`. Any load failure degrades to
    /// `EmbeddingProvider::None` rather than propagating an error — a
    /// missing model file is `ProviderUnavailable`, surfaced only via
    /// `status`, never as a hard failure of `chunk`/`search`.
    pub fn load(kind: ProviderKind) -> Self {
        match kind {
            ProviderKind::Model2Vec => match load_model2vec() {
                Ok(model) => EmbeddingProvider::Model2Vec { model },
                Err(_) => EmbeddingProvider::None,
            },
            ProviderKind::FastEmbed => match load_fastembed() {
                Ok(model) => EmbeddingProvider::FastEmbed {
                    model: std::sync::Mutex::new(model),
                },
                Err(_) => EmbeddingProvider::None,
            },
            ProviderKind::None => EmbeddingProvider::None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            EmbeddingProvider::Model2Vec { .. } => "model2vec",
            EmbeddingProvider::FastEmbed { .. } => "fastembed",
            EmbeddingProvider::None => "none",
        }
    }

    pub fn dim(&self) -> usize {
        match self {
            EmbeddingProvider::Model2Vec { .. } => 256,
            EmbeddingProvider::FastEmbed { .. } => 384,
            EmbeddingProvider::None => 0,
        }
    }

    pub fn is_available(&self) -> bool {
        !matches!(self, EmbeddingProvider::None)
    }

    /// Encode a single piece of text. Returns `None` when no provider is
    /// loaded or the call fails — callers treat this as "skip the
    /// semantic branch", never as a hard error.
    pub fn encode(&self, text: &str) -> Option<Vec<f32>> {
        match self {
            EmbeddingProvider::Model2Vec { model } => Some(model.encode_single(text)),
            EmbeddingProvider::FastEmbed { model } => {
                let mut model = model.lock().ok()?;
                let mut out = model.embed(vec![text.to_string()], None).ok()?;
                out.pop()
            }
            EmbeddingProvider::None => None,
        }
    }
}

fn load_model2vec() -> Result<model2vec_rs::model::StaticModel, Box<dyn std::error::Error>> {
    let model_id =
        std::env::var("RLM_MODEL2VEC_MODEL").unwrap_or_else(|_| "minishlab/potion-base-8M".into());
    let model = model2vec_rs::model::StaticModel::from_pretrained(&model_id, None, None, None)?;
    Ok(model)
}

fn load_fastembed() -> Result<fastembed::TextEmbedding, Box<dyn std::error::Error>> {
    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
    let model = TextEmbedding::try_new(
        InitOptions::new(EmbeddingModel::AllMiniLML6V2).with_show_download_progress(false),
    )?;
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_provider_has_zero_dim_and_is_unavailable() {
        let p = EmbeddingProvider::None;
        assert_eq!(p.dim(), 0);
        assert!(!p.is_available());
        assert!(p.encode("anything").is_none());
    }
}
