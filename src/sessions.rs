//! Session registry (C6): a `{date}_{project}` keyed JSON document plus a
//! small curated+observed domain list.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::io_safety::{atomic_write, with_exclusive_lock};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub started_at: String,
    pub project: String,
    pub chunk_ids: Vec<String>,
    #[serde(default)]
    pub domains: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SessionRegistry {
    pub sessions: BTreeMap<String, SessionRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DomainRegistry {
    pub suggestions: Vec<String>,
    pub observed: Vec<String>,
}

const CURATED_DOMAINS: &[&str] = &[
    "backend", "frontend", "infra", "testing", "docs", "security", "performance",
];

pub struct SessionStore {
    root: PathBuf,
}

impl SessionStore {
    pub fn new(root: PathBuf) -> Self {
        SessionStore { root }
    }

    fn sessions_path(&self) -> PathBuf {
        self.root.join("sessions.json")
    }

    fn domains_path(&self) -> PathBuf {
        self.root.join("domains.json")
    }

    pub fn load(&self) -> Result<SessionRegistry> {
        let path = self.sessions_path();
        if !path.exists() {
            return Ok(SessionRegistry::default());
        }
        let raw = std::fs::read_to_string(&path)?;
        if raw.trim().is_empty() {
            return Ok(SessionRegistry::default());
        }
        Ok(serde_json::from_str(&raw)?)
    }

    fn load_domains(&self) -> Result<DomainRegistry> {
        let path = self.domains_path();
        if !path.exists() {
            return Ok(DomainRegistry {
                suggestions: CURATED_DOMAINS.iter().map(|s| s.to_string()).collect(),
                observed: Vec::new(),
            });
        }
        let raw = std::fs::read_to_string(&path)?;
        if raw.trim().is_empty() {
            return Ok(DomainRegistry::default());
        }
        Ok(serde_json::from_str(&raw)?)
    }

    /// Register a newly-written chunk against today's session for its
    /// project, creating the session entry on first write of the day.
    pub fn register_chunk(
        &self,
        project: &str,
        chunk_id: &str,
        domain: Option<&str>,
    ) -> Result<()> {
        with_exclusive_lock(&self.sessions_path(), || {
            let mut registry = self.load()?;
            let date = Utc::now().format("%Y-%m-%d").to_string();
            let key = format!("{date}_{project}");

            let entry = registry.sessions.entry(key).or_insert_with(|| SessionRecord {
                started_at: Utc::now().to_rfc3339(),
                project: project.to_string(),
                chunk_ids: Vec::new(),
                domains: Vec::new(),
            });
            entry.chunk_ids.push(chunk_id.to_string());
            if let Some(d) = domain {
                if !entry.domains.iter().any(|existing| existing == d) {
                    entry.domains.push(d.to_string());
                }
            }

            let bytes = serde_json::to_vec_pretty(&registry)?;
            atomic_write(&self.sessions_path(), &bytes)?;

            if let Some(d) = domain {
                self.observe_domain(d)?;
            }
            Ok(())
        })
    }

    fn observe_domain(&self, domain: &str) -> Result<()> {
        with_exclusive_lock(&self.domains_path(), || {
            let mut registry = self.load_domains()?;
            if !registry.observed.iter().any(|d| d == domain)
                && !registry.suggestions.iter().any(|d| d == domain)
            {
                registry.observed.push(domain.to_string());
                let bytes = serde_json::to_vec_pretty(&registry)?;
                atomic_write(&self.domains_path(), &bytes)?;
            }
            Ok(())
        })
    }

    pub fn list_sessions(
        &self,
        project: Option<&str>,
        domain: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<(String, SessionRecord)>> {
        let registry = self.load()?;
        let mut sessions: Vec<(String, SessionRecord)> = registry
            .sessions
            .into_iter()
            .filter(|(_, s)| match project {
                Some(p) => s.project == p,
                None => true,
            })
            .filter(|(_, s)| match domain {
                Some(d) => s.domains.iter().any(|sd| sd == d),
                None => true,
            })
            .collect();
        sessions.sort_by(|a, b| b.0.cmp(&a.0));
        if let Some(limit) = limit {
            sessions.truncate(limit);
        }
        Ok(sessions)
    }

    pub fn list_domains(&self) -> Result<Vec<String>> {
        let registry = self.load_domains()?;
        let mut all: Vec<String> = registry
            .suggestions
            .into_iter()
            .chain(registry.observed)
            .collect();
        all.sort();
        all.dedup();
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn register_chunk_creates_session() {
        let dir = tempdir().unwrap();
        let store = SessionStore::new(dir.path().to_path_buf());
        store
            .register_chunk("widget", "2026-01-18_widget_001", Some("backend"))
            .unwrap();
        let sessions = store.list_sessions(Some("widget"), None, None).unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].1.chunk_ids, vec!["2026-01-18_widget_001"]);
    }

    #[test]
    fn domains_include_curated_and_observed() {
        let dir = tempdir().unwrap();
        let store = SessionStore::new(dir.path().to_path_buf());
        store
            .register_chunk("widget", "2026-01-18_widget_001", Some("novel-domain"))
            .unwrap();
        let domains = store.list_domains().unwrap();
        assert!(domains.contains(&"novel-domain".to_string()));
        assert!(domains.contains(&"backend".to_string()));
    }
}
