//! Wires the store types together into the single surface the CLI and the
//! MCP server both dispatch against, so neither has to know how a command
//! is implemented — only which `App` method answers it.

use std::path::PathBuf;

use crate::chunks::{ChunkCreateResult, ChunkRecord, ChunkStore};
use crate::config::Config;
use crate::embeddings::{EmbeddingProvider, VectorStore};
use crate::error::Result;
use crate::insights::{Category, Importance, Insight, InsightStore};
use crate::nav::{self, FuzzyHit, GrepHit};
use crate::retention::{RetentionCandidate, RetentionPolicy, RetentionReport};
use crate::search::{SearchEngine, SearchFilters, SearchResult};
use crate::sessions::{SessionRecord, SessionStore};
use crate::status::{self, StatusReport};

pub struct App {
    config: Config,
    chunks: ChunkStore,
    insights: InsightStore,
    sessions: SessionStore,
    provider: EmbeddingProvider,
    vector_store: VectorStore,
}

impl App {
    pub fn new(config: Config) -> Self {
        let chunks = ChunkStore::new(config.storage_root.clone());
        let insights = InsightStore::new(config.storage_root.clone());
        let sessions = SessionStore::new(config.storage_root.clone());
        let provider = EmbeddingProvider::load(config.provider);
        let store_path = crate::embeddings::store::default_store_path(&config.storage_root);
        let vector_store = VectorStore::load_or_create(store_path, provider.name(), provider.dim());

        App {
            config,
            chunks,
            insights,
            sessions,
            provider,
            vector_store,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn storage_root(&self) -> &PathBuf {
        &self.config.storage_root
    }

    #[allow(clippy::too_many_arguments)]
    pub fn chunk(
        &mut self,
        content: &str,
        summary: Option<&str>,
        tags: Vec<String>,
        project: Option<String>,
        ticket: Option<String>,
        domain: Option<String>,
    ) -> Result<ChunkCreateResult> {
        let result = self.chunks.chunk(
            content,
            summary,
            tags.clone(),
            project.clone(),
            ticket,
            domain.clone(),
        )?;

        if !result.duplicate {
            let project_name = project.clone().unwrap_or_else(crate::config::detect_project);
            self.sessions
                .register_chunk(&project_name, &result.chunk_id, domain.as_deref())?;

            let text_with_metadata_prefix = format!(
                "{} {} {} {} {content}",
                result.summary,
                tags.join(" "),
                project.as_deref().unwrap_or(""),
                domain.as_deref().unwrap_or(""),
            );
            if let Some(vector) = self.provider.encode(&text_with_metadata_prefix) {
                self.vector_store.add(&result.chunk_id, vector)?;
            }
        }
        Ok(result)
    }

    pub fn peek(
        &self,
        id: &str,
        start_line: Option<usize>,
        end_line: Option<usize>,
    ) -> Result<(String, u64)> {
        self.chunks.peek(id, start_line, end_line)
    }

    pub fn list_chunks(
        &self,
        project: Option<&str>,
        domain: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<ChunkRecord>> {
        self.chunks.list_chunks(project, domain, limit)
    }

    pub fn grep(&self, pattern: &str, filters: &SearchFilters, limit: usize) -> Result<Vec<GrepHit>> {
        nav::grep(&self.chunks, pattern, filters, limit)
    }

    pub fn grep_fuzzy(
        &self,
        pattern: &str,
        threshold: i64,
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<FuzzyHit>> {
        nav::grep_fuzzy(&self.chunks, pattern, threshold, filters, limit)
    }

    pub fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
        include_insights: bool,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        let engine = SearchEngine::new(&self.chunks, &self.insights, &self.provider, &self.vector_store);
        engine.search(query, filters, include_insights, limit)
    }

    pub fn remember(
        &self,
        content: &str,
        category: Category,
        importance: Importance,
        tags: Vec<String>,
    ) -> Result<String> {
        self.insights.remember(content, category, importance, tags)
    }

    pub fn recall(
        &self,
        query: Option<&str>,
        category: Option<Category>,
        importance: Option<Importance>,
        limit: Option<usize>,
    ) -> Result<Vec<Insight>> {
        self.insights.recall(query, category, importance, limit)
    }

    pub fn forget(&self, id: &str) -> Result<()> {
        self.insights.forget(id)
    }

    pub fn sessions(
        &self,
        project: Option<&str>,
        domain: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<(String, SessionRecord)>> {
        self.sessions.list_sessions(project, domain, limit)
    }

    pub fn domains(&self) -> Result<Vec<String>> {
        self.sessions.list_domains()
    }

    pub fn retention_preview(&self) -> Result<Vec<RetentionCandidate>> {
        RetentionPolicy::new(&self.chunks).preview()
    }

    pub fn retention_run(&self, archive: bool, purge: bool) -> Result<RetentionReport> {
        RetentionPolicy::new(&self.chunks).run(archive, purge)
    }

    pub fn restore(&self, id: &str) -> Result<()> {
        self.chunks.restore(id)
    }

    pub fn status(&self) -> Result<StatusReport> {
        status::status(&self.config, &self.provider)
    }
}
