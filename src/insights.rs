//! Insight memory (C7): short structured memos kept in a single JSON
//! document. Never paginated to disk as chunks.

use std::path::PathBuf;

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Result, RlmError};
use crate::io_safety::{atomic_write, with_exclusive_lock};
use crate::tokenizer::tokenize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Decision,
    Fact,
    Preference,
    Finding,
    Todo,
    General,
}

impl Category {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "decision" => Some(Category::Decision),
            "fact" => Some(Category::Fact),
            "preference" => Some(Category::Preference),
            "finding" => Some(Category::Finding),
            "todo" => Some(Category::Todo),
            "general" => Some(Category::General),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    Low,
    Medium,
    High,
    Critical,
}

impl Importance {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(Importance::Low),
            "medium" => Some(Importance::Medium),
            "high" => Some(Importance::High),
            "critical" => Some(Importance::Critical),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Insight {
    pub id: String,
    pub content: String,
    pub category: Category,
    pub importance: Importance,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightMemory {
    pub version: String,
    pub insights: Vec<Insight>,
    pub created_at: String,
    pub last_updated: String,
}

impl Default for InsightMemory {
    fn default() -> Self {
        let now = Utc::now().to_rfc3339();
        InsightMemory {
            version: "1".to_string(),
            insights: Vec::new(),
            created_at: now.clone(),
            last_updated: now,
        }
    }
}

pub struct InsightStore {
    root: PathBuf,
}

impl InsightStore {
    pub fn new(root: PathBuf) -> Self {
        InsightStore { root }
    }

    fn path(&self) -> PathBuf {
        self.root.join("session_memory.json")
    }

    pub fn load(&self) -> Result<InsightMemory> {
        let path = self.path();
        if !path.exists() {
            return Ok(InsightMemory::default());
        }
        let raw = std::fs::read_to_string(&path)?;
        if raw.trim().is_empty() {
            return Ok(InsightMemory::default());
        }
        Ok(serde_json::from_str(&raw)?)
    }

    fn save_locked(&self, memory: &InsightMemory) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(memory)?;
        atomic_write(&self.path(), &bytes)
    }

    pub fn remember(
        &self,
        content: &str,
        category: Category,
        importance: Importance,
        tags: Vec<String>,
    ) -> Result<String> {
        with_exclusive_lock(&self.path(), || {
            let mut memory = self.load()?;
            let id = fresh_id();
            let insight = Insight {
                id: id.clone(),
                content: content.to_string(),
                category,
                importance,
                tags,
                created_at: Utc::now().to_rfc3339(),
            };
            memory.insights.push(insight);
            memory.last_updated = Utc::now().to_rfc3339();
            self.save_locked(&memory)?;
            Ok(id)
        })
    }

    pub fn forget(&self, id: &str) -> Result<()> {
        with_exclusive_lock(&self.path(), || {
            let mut memory = self.load()?;
            let before = memory.insights.len();
            memory.insights.retain(|i| i.id != id);
            if memory.insights.len() == before {
                return Err(RlmError::NotFound(id.to_string()));
            }
            memory.last_updated = Utc::now().to_rfc3339();
            self.save_locked(&memory)
        })
    }

    /// Rank insights by fraction of query tokens present in the
    /// tokenized content; ties broken by `created_at` descending. Falls
    /// back to a raw case-insensitive substring match when the query is
    /// empty or stopwords-only. Without a query, sorts by date descending.
    pub fn recall(
        &self,
        query: Option<&str>,
        category: Option<Category>,
        importance: Option<Importance>,
        limit: Option<usize>,
    ) -> Result<Vec<Insight>> {
        let memory = self.load()?;
        let mut candidates: Vec<Insight> = memory
            .insights
            .into_iter()
            .filter(|i| category.is_none() || Some(i.category) == category)
            .filter(|i| importance.is_none() || Some(i.importance) == importance)
            .collect();

        match query {
            None => {
                candidates.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            }
            Some(q) => {
                let query_tokens = tokenize(q, true);
                if query_tokens.is_empty() {
                    let needle = q.to_lowercase();
                    candidates.retain(|i| i.content.to_lowercase().contains(&needle));
                    candidates.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                } else {
                    let mut scored: Vec<(f64, Insight)> = candidates
                        .into_iter()
                        .map(|i| {
                            let content_tokens: std::collections::HashSet<String> =
                                tokenize(&i.content, true).into_iter().collect();
                            let hits = query_tokens
                                .iter()
                                .filter(|t| content_tokens.contains(*t))
                                .count();
                            let ratio = hits as f64 / query_tokens.len() as f64;
                            (ratio, i)
                        })
                        .filter(|(ratio, _)| *ratio > 0.0)
                        .collect();
                    scored.sort_by(|a, b| {
                        b.0.partial_cmp(&a.0)
                            .unwrap_or(std::cmp::Ordering::Equal)
                            .then_with(|| b.1.created_at.cmp(&a.1.created_at))
                    });
                    candidates = scored.into_iter().map(|(_, i)| i).collect();
                }
            }
        }

        if let Some(limit) = limit {
            candidates.truncate(limit);
        }
        Ok(candidates)
    }
}

fn fresh_id() -> String {
    let millis = Utc::now().timestamp_millis();
    let suffix: u64 = rand::thread_rng().gen();
    format!("{millis:x}-{suffix:x}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store() -> (tempfile::TempDir, InsightStore) {
        let dir = tempdir().unwrap();
        let s = InsightStore::new(dir.path().to_path_buf());
        (dir, s)
    }

    #[test]
    fn remember_then_recall_by_id() {
        let (_dir, s) = store();
        let id = s
            .remember(
                "prefer tabs over spaces",
                Category::Preference,
                Importance::Low,
                vec![],
            )
            .unwrap();
        let results = s.recall(None, None, None, None).unwrap();
        assert_eq!(results[0].id, id);
    }

    #[test]
    fn recall_ranks_by_token_overlap() {
        let (_dir, s) = store();
        s.remember("discuss API redesign plan", Category::Finding, Importance::Medium, vec![])
            .unwrap();
        s.remember("unrelated note about lunch", Category::General, Importance::Low, vec![])
            .unwrap();
        let results = s.recall(Some("API redesign"), None, None, None).unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].content.contains("API redesign"));
    }

    #[test]
    fn forget_removes_insight() {
        let (_dir, s) = store();
        let id = s
            .remember("temp", Category::General, Importance::Low, vec![])
            .unwrap();
        s.forget(&id).unwrap();
        assert!(s.recall(None, None, None, None).unwrap().is_empty());
        assert!(matches!(s.forget(&id), Err(RlmError::NotFound(_))));
    }

    #[test]
    fn empty_query_falls_back_to_date_order() {
        let (_dir, s) = store();
        s.remember("first", Category::General, Importance::Low, vec![])
            .unwrap();
        s.remember("second", Category::General, Importance::Low, vec![])
            .unwrap();
        let results = s.recall(Some(""), None, None, None).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].content, "second");
    }
}
