//! Status reporting (§4.11): a single read-only snapshot of store health,
//! used by both the CLI `status` subcommand and the `status` RPC tool.

use std::path::PathBuf;

use serde::Serialize;

use crate::chunks::ChunkStore;
use crate::config::Config;
use crate::embeddings::EmbeddingProvider;
use crate::error::Result;
use crate::insights::InsightStore;
use crate::sessions::SessionStore;

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub active_chunks: usize,
    pub archived_chunks: usize,
    pub insights: usize,
    pub sessions: usize,
    pub embedding_provider: Option<String>,
    pub storage_root: PathBuf,
}

pub fn status(config: &Config, provider: &EmbeddingProvider) -> Result<StatusReport> {
    let chunks = ChunkStore::new(config.storage_root.clone());
    let insights = InsightStore::new(config.storage_root.clone());
    let sessions = SessionStore::new(config.storage_root.clone());

    let index = chunks.load_index()?;
    let active_chunks = index.chunks.iter().filter(|c| !c.archived).count();
    let archived_chunks = index.chunks.iter().filter(|c| c.archived).count();
    let insight_count = insights.load()?.insights.len();
    let session_count = sessions.load()?.sessions.len();

    Ok(StatusReport {
        active_chunks,
        archived_chunks,
        insights: insight_count,
        sessions: session_count,
        embedding_provider: provider.is_available().then(|| provider.name().to_string()),
        storage_root: config.storage_root.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderKind;
    use tempfile::tempdir;

    #[test]
    fn status_counts_active_and_archived() {
        let dir = tempdir().unwrap();
        let config = Config::with_root(dir.path().to_path_buf());
        let chunks = ChunkStore::new(config.storage_root.clone());
        let res = chunks
            .chunk("some content", None, vec![], None, None, None)
            .unwrap();
        chunks.archive(&res.chunk_id).unwrap();

        let provider = EmbeddingProvider::load(ProviderKind::None);
        let report = status(&config, &provider).unwrap();
        assert_eq!(report.active_chunks, 0);
        assert_eq!(report.archived_chunks, 1);
        assert_eq!(report.embedding_provider, None);
    }
}
