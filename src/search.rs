//! Unified hybrid search (C8): BM25 over a lexical corpus built from
//! chunks and insights, optionally fused with cosine similarity over a
//! vector store when an embedding provider is available.

use std::collections::HashMap;

use rayon::prelude::*;
use serde::Serialize;

use crate::chunks::{ChunkRecord, ChunkStore};
use crate::embeddings::{EmbeddingProvider, VectorStore};
use crate::error::Result;
use crate::insights::{Insight, InsightStore};
use crate::tokenizer::tokenize;

const BM25_K1: f64 = 1.5;
const BM25_B: f64 = 0.75;
const HYBRID_ALPHA: f64 = 0.6;

#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub id: String,
    pub kind: &'static str,
    pub score: f64,
    pub preview: String,
}

#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub project: Option<String>,
    pub domain: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub entity: Option<String>,
}

impl SearchFilters {
    fn matches_chunk(&self, c: &ChunkRecord) -> bool {
        if let Some(p) = &self.project {
            if c.project.as_deref() != Some(p.as_str()) {
                return false;
            }
        }
        if let Some(d) = &self.domain {
            if c.domain.as_deref() != Some(d.as_str()) {
                return false;
            }
        }
        let date = c.created_date();
        if let Some(from) = &self.date_from {
            if date < from.as_str() {
                return false;
            }
        }
        if let Some(to) = &self.date_to {
            if date > to.as_str() {
                return false;
            }
        }
        if let Some(e) = &self.entity {
            if !c.entities.contains(e) {
                return false;
            }
        }
        true
    }
}

struct Document {
    id: String,
    kind: &'static str,
    tokens: Vec<String>,
    preview: String,
}

/// Okapi BM25 with conventional prose defaults (k1=1.5, b=0.75) over the
/// supplied document set. Returns a raw (unnormalized) score per document,
/// in the same order as `docs`.
fn bm25_scores(docs: &[Document], query_tokens: &[String]) -> Vec<f64> {
    if docs.is_empty() || query_tokens.is_empty() {
        return vec![0.0; docs.len()];
    }
    let n = docs.len() as f64;
    let avg_len: f64 = docs.iter().map(|d| d.tokens.len() as f64).sum::<f64>() / n;

    let mut df: HashMap<&str, usize> = HashMap::new();
    for term in query_tokens {
        let count = docs
            .iter()
            .filter(|d| d.tokens.iter().any(|t| t == term))
            .count();
        df.entry(term.as_str()).or_insert(count);
    }

    docs.par_iter()
        .map(|d| {
            let len = d.tokens.len().max(1) as f64;
            let mut term_freq: HashMap<&str, usize> = HashMap::new();
            for t in &d.tokens {
                *term_freq.entry(t.as_str()).or_insert(0) += 1;
            }
            query_tokens
                .iter()
                .map(|term| {
                    let f = *term_freq.get(term.as_str()).unwrap_or(&0) as f64;
                    if f == 0.0 {
                        return 0.0;
                    }
                    let n_q = *df.get(term.as_str()).unwrap_or(&0) as f64;
                    let idf = ((n - n_q + 0.5) / (n_q + 0.5) + 1.0).ln();
                    idf * (f * (BM25_K1 + 1.0))
                        / (f + BM25_K1 * (1.0 - BM25_B + BM25_B * len / avg_len))
                })
                .sum()
        })
        .collect()
}

/// Min-max normalization into [0, 1]. A degenerate (all-equal) score set
/// collapses to 1.0 for any positive score, 0.0 otherwise, rather than
/// dividing by zero.
fn min_max_normalize(scores: &[f64]) -> Vec<f64> {
    let max = scores.iter().cloned().fold(f64::MIN, f64::max);
    let min = scores.iter().cloned().fold(f64::MAX, f64::min);
    if !(max > min) {
        return scores
            .iter()
            .map(|s| if *s > 0.0 { 1.0 } else { 0.0 })
            .collect();
    }
    scores.iter().map(|s| (s - min) / (max - min)).collect()
}

fn truncate_preview(s: &str, max: usize) -> String {
    let collapsed: String = s.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max {
        collapsed
    } else {
        let truncated: String = collapsed.chars().take(max).collect();
        format!("{truncated}…")
    }
}

pub struct SearchEngine<'a> {
    chunks: &'a ChunkStore,
    insights: &'a InsightStore,
    provider: &'a EmbeddingProvider,
    vector_store: &'a VectorStore,
}

impl<'a> SearchEngine<'a> {
    pub fn new(
        chunks: &'a ChunkStore,
        insights: &'a InsightStore,
        provider: &'a EmbeddingProvider,
        vector_store: &'a VectorStore,
    ) -> Self {
        SearchEngine {
            chunks,
            insights,
            provider,
            vector_store,
        }
    }

    /// Search chunks and, when `include_insights` is set, insights too. An
    /// empty or stopwords-only query returns an empty list rather than the
    /// full corpus.
    pub fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
        include_insights: bool,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        let query_tokens = tokenize(query, true);
        if query_tokens.is_empty() {
            return Ok(Vec::new());
        }

        let chunk_records: Vec<ChunkRecord> = self
            .chunks
            .list_chunks(None, None, None)?
            .into_iter()
            .filter(|c| filters.matches_chunk(c))
            .collect();
        let insight_records: Vec<Insight> = if include_insights {
            self.insights.recall(None, None, None, None)?
        } else {
            Vec::new()
        };

        let mut docs: Vec<Document> = Vec::with_capacity(chunk_records.len() + insight_records.len());

        for c in &chunk_records {
            let mut text = format!(
                "{} {} {} {}",
                c.summary,
                c.tags.join(" "),
                c.project.clone().unwrap_or_default(),
                c.domain.clone().unwrap_or_default(),
            );
            if !c.archived {
                if let Ok(content) = self.chunks.read_active_content(&c.id) {
                    text.push(' ');
                    text.push_str(&content);
                }
            }
            docs.push(Document {
                id: c.id.clone(),
                kind: "chunk",
                tokens: tokenize(&text, true),
                preview: c.summary.clone(),
            });
        }

        for i in &insight_records {
            docs.push(Document {
                id: i.id.clone(),
                kind: "insight",
                tokens: tokenize(&i.content, true),
                preview: truncate_preview(&i.content, 80),
            });
        }

        if docs.is_empty() {
            return Ok(Vec::new());
        }

        let bm25_raw = bm25_scores(&docs, &query_tokens);
        let bm25_norm = min_max_normalize(&bm25_raw);

        let cosine_scores: Option<Vec<f64>> = self
            .provider
            .encode(query)
            .filter(|_| !self.vector_store.is_empty())
            .map(|query_vec| {
                let cosine_by_id: HashMap<String, f32> = self
                    .vector_store
                    .cosine_all(&query_vec, self.provider.name())
                    .into_iter()
                    .collect();
                docs.iter()
                    .map(|d| *cosine_by_id.get(&d.id).unwrap_or(&0.0) as f64)
                    .collect()
            });

        let final_scores: Vec<f64> = match cosine_scores {
            Some(cosine) => bm25_norm
                .iter()
                .zip(cosine.iter())
                .map(|(bm25, cos)| HYBRID_ALPHA * cos + (1.0 - HYBRID_ALPHA) * bm25)
                .collect(),
            None => bm25_norm,
        };

        let mut results: Vec<SearchResult> = docs
            .into_iter()
            .zip(final_scores)
            .filter(|(_, score)| *score > 0.0)
            .map(|(d, score)| SearchResult {
                id: d.id,
                kind: d.kind,
                score,
                preview: d.preview,
            })
            .collect();

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(limit);
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderKind;
    use tempfile::tempdir;

    fn setup() -> (tempfile::TempDir, ChunkStore, InsightStore) {
        let dir = tempdir().unwrap();
        let chunks = ChunkStore::new(dir.path().to_path_buf());
        let insights = InsightStore::new(dir.path().to_path_buf());
        (dir, chunks, insights)
    }

    #[test]
    fn bm25_only_search_ranks_relevant_chunk_first() {
        let (_dir, chunks, insights) = setup();
        chunks
            .chunk(
                "API redesign discussion covering pagination and auth",
                None,
                vec![],
                Some("widget".into()),
                None,
                None,
            )
            .unwrap();
        chunks
            .chunk("lunch order notes", None, vec![], Some("widget".into()), None, None)
            .unwrap();

        let provider = EmbeddingProvider::load(ProviderKind::None);
        let store = VectorStore::load_or_create(_dir.path().join("e.json"), provider.name(), provider.dim());
        let engine = SearchEngine::new(&chunks, &insights, &provider, &store);

        let results = engine.search("API redesign", &SearchFilters::default(), true, 10).unwrap();
        assert!(!results.is_empty());
        assert!(results[0].preview.to_lowercase().contains("api"));
    }

    #[test]
    fn empty_query_returns_empty() {
        let (dir, chunks, insights) = setup();
        let provider = EmbeddingProvider::load(ProviderKind::None);
        let store = VectorStore::load_or_create(dir.path().join("e.json"), provider.name(), provider.dim());
        let engine = SearchEngine::new(&chunks, &insights, &provider, &store);
        let results = engine.search("", &SearchFilters::default(), true, 10).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn include_insights_false_excludes_insight_hits() {
        let (dir, chunks, insights) = setup();
        insights
            .remember("API redesign plan", crate::insights::Category::Finding, crate::insights::Importance::Medium, vec![])
            .unwrap();
        let provider = EmbeddingProvider::load(ProviderKind::None);
        let store = VectorStore::load_or_create(dir.path().join("e.json"), provider.name(), provider.dim());
        let engine = SearchEngine::new(&chunks, &insights, &provider, &store);

        let with_insights = engine.search("API redesign", &SearchFilters::default(), true, 10).unwrap();
        assert!(with_insights.iter().any(|r| r.kind == "insight"));

        let without_insights = engine.search("API redesign", &SearchFilters::default(), false, 10).unwrap();
        assert!(without_insights.iter().all(|r| r.kind != "insight"));
    }

    #[test]
    fn filters_restrict_results_by_project() {
        let (dir, chunks, insights) = setup();
        chunks
            .chunk("API redesign notes", None, vec![], Some("widget".into()), None, None)
            .unwrap();
        chunks
            .chunk("API redesign notes v2", None, vec![], Some("other".into()), None, None)
            .unwrap();
        let provider = EmbeddingProvider::load(ProviderKind::None);
        let store = VectorStore::load_or_create(dir.path().join("e.json"), provider.name(), provider.dim());
        let engine = SearchEngine::new(&chunks, &insights, &provider, &store);
        let filters = SearchFilters {
            project: Some("widget".to_string()),
            ..Default::default()
        };
        let results = engine.search("API redesign", &filters, true, 10).unwrap();
        assert_eq!(results.len(), 1);
    }
}
