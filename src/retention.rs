//! Retention lifecycle (C10): active chunks age into a gzip archive, then
//! eventually get purged, unless a chunk carries a protected tag, has been
//! accessed often enough, or its body contains a protected keyword marker.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chunks::{ChunkRecord, ChunkStore};
use crate::error::Result;
use crate::io_safety::{atomic_write, with_exclusive_lock};

const ARCHIVE_AFTER_DAYS: i64 = 30;
const PURGE_AFTER_DAYS: i64 = 180;
const IMMUNE_ACCESS_COUNT: u64 = 3;

const PROTECTED_TAGS: &[&str] = &["critical", "decision", "keep", "important"];
const PROTECTED_KEYWORDS: &[&str] = &["DECISION:", "IMPORTANT:", "A RETENIR:"];
const KEYWORD_SCAN_CHARS: usize = 4096;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurgeLogEntry {
    pub id: String,
    pub purged_at: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PurgeLog {
    pub entries: Vec<PurgeLogEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RetentionCandidate {
    pub id: String,
    pub summary: String,
    pub created_at: String,
    pub action: &'static str,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct RetentionReport {
    pub archived: Vec<String>,
    pub purged: Vec<String>,
    pub errors: Vec<String>,
}

fn parse_rfc3339(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn is_protected_by_tags(record: &ChunkRecord) -> bool {
    record
        .tags
        .iter()
        .any(|t| PROTECTED_TAGS.iter().any(|p| p.eq_ignore_ascii_case(t)))
}

fn contains_protected_keyword(content_sample: &str) -> bool {
    let upper = content_sample.to_uppercase();
    PROTECTED_KEYWORDS.iter().any(|k| upper.contains(k))
}

/// A chunk is immune to archival/purge if it carries a protected tag, has
/// been accessed at least `IMMUNE_ACCESS_COUNT` times, or its leading text
/// contains a protected keyword marker.
pub fn is_immune(record: &ChunkRecord, content_sample: Option<&str>) -> bool {
    is_protected_by_tags(record)
        || record.access_count >= IMMUNE_ACCESS_COUNT
        || content_sample.is_some_and(contains_protected_keyword)
}

pub struct RetentionPolicy<'a> {
    store: &'a ChunkStore,
}

impl<'a> RetentionPolicy<'a> {
    pub fn new(store: &'a ChunkStore) -> Self {
        RetentionPolicy { store }
    }

    fn purge_log_path(&self) -> PathBuf {
        self.store.root().join("purge_log.json")
    }

    fn load_purge_log(&self) -> Result<PurgeLog> {
        let path = self.purge_log_path();
        if !path.exists() {
            return Ok(PurgeLog::default());
        }
        let raw = std::fs::read_to_string(&path)?;
        if raw.trim().is_empty() {
            return Ok(PurgeLog::default());
        }
        Ok(serde_json::from_str(&raw)?)
    }

    fn append_purge_log(&self, entry: PurgeLogEntry) -> Result<()> {
        with_exclusive_lock(&self.purge_log_path(), || {
            let mut log = self.load_purge_log()?;
            log.entries.push(entry);
            let bytes = serde_json::to_vec_pretty(&log)?;
            atomic_write(&self.purge_log_path(), &bytes)
        })
    }

    /// List chunks that would be archived or purged right now, without
    /// mutating anything. Archive age is measured from `created_at`; purge
    /// age is measured from the archive index's `archived_at` (the chunk
    /// index carries no `archived_at` of its own), per the three-zone
    /// lifecycle.
    pub fn preview(&self) -> Result<Vec<RetentionCandidate>> {
        let now = Utc::now();
        let chunks = self.store.list_chunks(None, None, None)?;
        let archive_index = self.store.load_archive_index()?;
        let archived_at_by_id: HashMap<&str, &str> = archive_index
            .entries
            .iter()
            .map(|e| (e.id.as_str(), e.archived_at.as_str()))
            .collect();

        let mut out = Vec::new();
        for c in &chunks {
            let sample = if c.archived {
                None
            } else {
                self.store
                    .read_active_content(&c.id)
                    .ok()
                    .map(|s| s.chars().take(KEYWORD_SCAN_CHARS).collect::<String>())
            };
            if is_immune(c, sample.as_deref()) {
                continue;
            }

            if !c.archived {
                let Some(created) = parse_rfc3339(&c.created_at) else {
                    continue;
                };
                let age_days = (now - created).num_days();
                if c.access_count == 0 && age_days >= ARCHIVE_AFTER_DAYS {
                    out.push(RetentionCandidate {
                        id: c.id.clone(),
                        summary: c.summary.clone(),
                        created_at: c.created_at.clone(),
                        action: "archive",
                    });
                }
            } else {
                let Some(archived_at) = archived_at_by_id
                    .get(c.id.as_str())
                    .and_then(|s| parse_rfc3339(s))
                else {
                    continue;
                };
                let age_days = (now - archived_at).num_days();
                if age_days >= PURGE_AFTER_DAYS {
                    out.push(RetentionCandidate {
                        id: c.id.clone(),
                        summary: c.summary.clone(),
                        created_at: c.created_at.clone(),
                        action: "purge",
                    });
                }
            }
        }
        Ok(out)
    }

    /// Apply the retention policy. `archive`/`purge` gate whether each
    /// phase actually runs, so callers can e.g. archive without purging.
    pub fn run(&self, archive: bool, purge: bool) -> Result<RetentionReport> {
        let mut report = RetentionReport::default();
        for c in self.preview()? {
            match c.action {
                "archive" if archive => match self.store.archive(&c.id) {
                    Ok(()) => report.archived.push(c.id),
                    Err(e) => report.errors.push(format!("{}: {e}", c.id)),
                },
                "purge" if purge => match self.store.purge(&c.id) {
                    Ok(()) => {
                        if let Err(e) = self.append_purge_log(PurgeLogEntry {
                            id: c.id.clone(),
                            purged_at: Utc::now().to_rfc3339(),
                            reason: "age".to_string(),
                        }) {
                            report
                                .errors
                                .push(format!("{}: purge log write failed: {e}", c.id));
                        }
                        report.purged.push(c.id);
                    }
                    Err(e) => report.errors.push(format!("{}: {e}", c.id)),
                },
                _ => {}
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn aged_chunk(store: &ChunkStore, days_old: i64, tags: Vec<String>) -> String {
        let res = store
            .chunk("body text here", None, tags, None, None, None)
            .unwrap();
        let mut index = store.load_index().unwrap();
        let pos = index.chunks.iter().position(|c| c.id == res.chunk_id).unwrap();
        index.chunks[pos].created_at = (Utc::now() - chrono::Duration::days(days_old)).to_rfc3339();
        let bytes = serde_json::to_vec_pretty(&index).unwrap();
        std::fs::write(store.index_path(), bytes).unwrap();
        res.chunk_id
    }

    #[test]
    fn preview_flags_old_chunk_for_archive() {
        let dir = tempdir().unwrap();
        let store = ChunkStore::new(dir.path().to_path_buf());
        let id = aged_chunk(&store, 40, vec![]);
        let policy = RetentionPolicy::new(&store);
        let candidates = policy.preview().unwrap();
        assert!(candidates.iter().any(|c| c.id == id && c.action == "archive"));
    }

    #[test]
    fn protected_tag_grants_immunity() {
        let dir = tempdir().unwrap();
        let store = ChunkStore::new(dir.path().to_path_buf());
        let id = aged_chunk(&store, 400, vec!["critical".to_string()]);
        let policy = RetentionPolicy::new(&store);
        let candidates = policy.preview().unwrap();
        assert!(!candidates.iter().any(|c| c.id == id));
    }

    /// Backdate an archived chunk's `archived_at` in the archive index, so
    /// purge-age checks (which must key off `archived_at`, not
    /// `created_at`) have something real to observe.
    fn age_archive_entry(store: &ChunkStore, id: &str, days_old: i64) {
        let mut archive_index = store.load_archive_index().unwrap();
        let pos = archive_index.entries.iter().position(|e| e.id == id).unwrap();
        archive_index.entries[pos].archived_at =
            (Utc::now() - chrono::Duration::days(days_old)).to_rfc3339();
        let bytes = serde_json::to_vec_pretty(&archive_index).unwrap();
        std::fs::write(store.archive_index_path(), bytes).unwrap();
    }

    #[test]
    fn run_archives_then_purges() {
        let dir = tempdir().unwrap();
        let store = ChunkStore::new(dir.path().to_path_buf());
        // Freshly created (age 0) but already archived, so the purge clock
        // starts from `archived_at`, not from the unrelated `created_at`.
        let id = aged_chunk(&store, 0, vec![]);
        store.archive(&id).unwrap();

        let policy = RetentionPolicy::new(&store);
        assert!(policy.preview().unwrap().iter().all(|c| c.id != id));

        age_archive_entry(&store, &id, 200);
        let report = policy.run(true, true).unwrap();
        assert_eq!(report.purged, vec![id]);
    }

    #[test]
    fn purge_age_is_measured_from_archived_at_not_created_at() {
        let dir = tempdir().unwrap();
        let store = ChunkStore::new(dir.path().to_path_buf());
        // created_at is old enough to purge on its own, but archived_at is
        // recent — the chunk must not be purged yet.
        let id = aged_chunk(&store, 400, vec![]);
        store.archive(&id).unwrap();

        let policy = RetentionPolicy::new(&store);
        let candidates = policy.preview().unwrap();
        assert!(!candidates.iter().any(|c| c.id == id && c.action == "purge"));
    }

    #[test]
    fn accessed_chunk_is_not_an_archive_candidate() {
        let dir = tempdir().unwrap();
        let store = ChunkStore::new(dir.path().to_path_buf());
        let id = aged_chunk(&store, 40, vec![]);
        store.peek(&id, None, None).unwrap();

        let policy = RetentionPolicy::new(&store);
        let candidates = policy.preview().unwrap();
        assert!(!candidates.iter().any(|c| c.id == id));
    }
}
