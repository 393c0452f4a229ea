pub mod entities;
pub mod frontmatter;

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::chunks::entities::{extract_entities, Entities};
use crate::error::{Result, RlmError};
use crate::io_safety::{
    atomic_write, check_content_size, gunzip_bounded, gzip_atomic_write, resolve_in,
    sha256_normalized, validate_id, with_exclusive_lock, MAX_GUNZIP_SIZE,
};

const INDEX_VERSION: &str = "1";

/// An immutable content-addressed chunk's metadata, as stored in `index.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub id: String,
    pub path: String,
    pub summary: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub ticket: Option<String>,
    pub created_at: String,
    pub tokens_estimate: usize,
    pub content_hash: String,
    #[serde(default)]
    pub access_count: u64,
    #[serde(default)]
    pub last_accessed: Option<String>,
    #[serde(default)]
    pub entities: Entities,
    #[serde(default)]
    pub archived: bool,
}

impl ChunkRecord {
    /// Leading `YYYY-MM-DD` date, whether the ID is the conventional or
    /// legacy form.
    pub fn created_date(&self) -> &str {
        if self.created_at.len() >= 10 {
            &self.created_at[..10]
        } else if self.id.len() >= 10 {
            &self.id[..10]
        } else {
            ""
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkIndex {
    pub version: String,
    pub chunks: Vec<ChunkRecord>,
    pub total_tokens_estimate: usize,
}

impl Default for ChunkIndex {
    fn default() -> Self {
        ChunkIndex {
            version: INDEX_VERSION.to_string(),
            chunks: Vec::new(),
            total_tokens_estimate: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveEntry {
    pub id: String,
    pub original_path: String,
    pub archived_path: String,
    pub archived_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ArchiveIndex {
    pub entries: Vec<ArchiveEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChunkCreateResult {
    pub chunk_id: String,
    pub duplicate: bool,
    pub summary: String,
    pub tokens: usize,
}

/// Owns the on-disk layout for active chunks + the chunk index + the
/// archive index, and implements C5's contract.
pub struct ChunkStore {
    root: PathBuf,
}

impl ChunkStore {
    pub fn new(root: PathBuf) -> Self {
        ChunkStore { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn index_path(&self) -> PathBuf {
        self.root.join("index.json")
    }

    pub fn archive_index_path(&self) -> PathBuf {
        self.root.join("archive_index.json")
    }

    pub fn chunks_dir(&self) -> PathBuf {
        self.root.join("chunks")
    }

    pub fn archive_dir(&self) -> PathBuf {
        self.root.join("archive")
    }

    pub fn load_index(&self) -> Result<ChunkIndex> {
        let path = self.index_path();
        if !path.exists() {
            return Ok(ChunkIndex::default());
        }
        let raw = std::fs::read_to_string(&path)?;
        if raw.trim().is_empty() {
            return Ok(ChunkIndex::default());
        }
        Ok(serde_json::from_str(&raw)?)
    }

    fn save_index_locked(&self, index: &ChunkIndex) -> Result<()> {
        let path = self.index_path();
        let bytes = serde_json::to_vec_pretty(index)?;
        atomic_write(&path, &bytes)
    }

    pub fn load_archive_index(&self) -> Result<ArchiveIndex> {
        let path = self.archive_index_path();
        if !path.exists() {
            return Ok(ArchiveIndex::default());
        }
        let raw = std::fs::read_to_string(&path)?;
        if raw.trim().is_empty() {
            return Ok(ArchiveIndex::default());
        }
        Ok(serde_json::from_str(&raw)?)
    }

    fn save_archive_index_locked(&self, index: &ArchiveIndex) -> Result<()> {
        let path = self.archive_index_path();
        let bytes = serde_json::to_vec_pretty(index)?;
        atomic_write(&path, &bytes)
    }

    /// Create (or deduplicate) a chunk. Returns the resulting ID and
    /// whether an existing chunk was reused.
    #[allow(clippy::too_many_arguments)]
    pub fn chunk(
        &self,
        content: &str,
        summary: Option<&str>,
        tags: Vec<String>,
        project: Option<String>,
        ticket: Option<String>,
        domain: Option<String>,
    ) -> Result<ChunkCreateResult> {
        check_content_size(content)?;

        let hash = sha256_normalized(content);
        let tokens = estimate_tokens(content);

        with_exclusive_lock(&self.index_path(), || {
            let mut index = self.load_index()?;

            if let Some(existing) = index.chunks.iter().find(|c| c.content_hash == hash) {
                return Ok(ChunkCreateResult {
                    chunk_id: existing.id.clone(),
                    duplicate: true,
                    summary: existing.summary.clone(),
                    tokens: existing.tokens_estimate,
                });
            }

            let now = Utc::now();
            let date = now.format("%Y-%m-%d").to_string();
            let resolved_summary = summary
                .filter(|s| !s.trim().is_empty())
                .map(|s| s.to_string())
                .unwrap_or_else(|| auto_summary(content));

            let project_slug = project
                .clone()
                .unwrap_or_else(crate::config::detect_project);
            let seq = next_sequence(&index, &date, &project_slug);
            let id = build_chunk_id(
                &date,
                &project_slug,
                seq,
                ticket.as_deref(),
                domain.as_deref(),
            )?;

            let entities = extract_entities(content);
            let created_at = now.to_rfc3339();

            let fm = frontmatter::Frontmatter {
                summary: resolved_summary.clone(),
                tags: tags.clone(),
                created_at: created_at.clone(),
                project: project.clone(),
                domain: domain.clone(),
                ticket: ticket.clone(),
                entities: entities.clone(),
            };
            let rendered = frontmatter::render(&fm, content);

            let chunk_path = resolve_in(&self.chunks_dir(), &id, ".md")?;
            atomic_write(&chunk_path, rendered.as_bytes())?;

            let record = ChunkRecord {
                id: id.clone(),
                path: format!("chunks/{id}.md"),
                summary: resolved_summary.clone(),
                tags,
                project,
                domain,
                ticket,
                created_at,
                tokens_estimate: tokens,
                content_hash: hash,
                access_count: 0,
                last_accessed: None,
                entities,
                archived: false,
            };

            index.total_tokens_estimate += record.tokens_estimate;
            index.chunks.push(record);
            self.save_index_locked(&index)?;

            Ok(ChunkCreateResult {
                chunk_id: id,
                duplicate: false,
                summary: resolved_summary,
                tokens,
            })
        })
    }

    /// Read a chunk's content, optionally sliced to an inclusive 1-based
    /// line range, transparently restoring it from the archive if needed,
    /// and incrementing its access counter.
    pub fn peek(
        &self,
        id: &str,
        start_line: Option<usize>,
        end_line: Option<usize>,
    ) -> Result<(String, u64)> {
        validate_id(id)?;

        with_exclusive_lock(&self.index_path(), || {
            let mut index = self.load_index()?;
            let pos = index
                .chunks
                .iter()
                .position(|c| c.id == id)
                .ok_or_else(|| RlmError::NotFound(id.to_string()))?;

            if index.chunks[pos].archived {
                self.restore_locked(&mut index, pos)?;
            }

            let path = resolve_in(&self.chunks_dir(), id, ".md")?;
            let raw = std::fs::read_to_string(&path).map_err(|_| {
                RlmError::NotFound(format!("chunk file missing for {id}"))
            })?;
            let (_fm, content) = frontmatter::parse(&raw)?;

            let sliced = slice_lines(&content, start_line, end_line);

            index.chunks[pos].access_count += 1;
            index.chunks[pos].last_accessed = Some(Utc::now().to_rfc3339());
            let access_count = index.chunks[pos].access_count;

            self.save_index_locked(&index)?;

            Ok((sliced, access_count))
        })
    }

    /// Restore an archived chunk while already holding the index lock.
    /// Shared by `peek`'s auto-restore path and the explicit `restore` op.
    pub(crate) fn restore_locked(&self, index: &mut ChunkIndex, pos: usize) -> Result<()> {
        let id = index.chunks[pos].id.clone();
        let mut archive_index = self.load_archive_index()?;
        let entry_pos = archive_index
            .entries
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| RlmError::NotFound(format!("archive entry missing for {id}")))?;

        let gz_path = self.root.join(&archive_index.entries[entry_pos].archived_path);
        let bytes = gunzip_bounded(&gz_path, MAX_GUNZIP_SIZE)?;

        let active_path = resolve_in(&self.chunks_dir(), &id, ".md")?;
        atomic_write(&active_path, &bytes)?;
        std::fs::remove_file(&gz_path).ok();

        archive_index.entries.remove(entry_pos);
        self.save_archive_index_locked(&archive_index)?;

        index.chunks[pos].archived = false;
        Ok(())
    }

    /// Explicit restore entry point (C10 `restore`), used outside a
    /// `peek` call.
    pub fn restore(&self, id: &str) -> Result<()> {
        validate_id(id)?;
        with_exclusive_lock(&self.index_path(), || {
            let mut index = self.load_index()?;
            let pos = index
                .chunks
                .iter()
                .position(|c| c.id == id)
                .ok_or_else(|| RlmError::NotFound(id.to_string()))?;
            if !index.chunks[pos].archived {
                return Ok(());
            }
            self.restore_locked(&mut index, pos)?;
            self.save_index_locked(&index)
        })
    }

    /// Archive an active, eligible chunk: gzip-compress its body into the
    /// archive directory, record it in the archive index, and flip
    /// `archived` in the chunk index. No-op if already archived.
    pub fn archive(&self, id: &str) -> Result<()> {
        validate_id(id)?;
        with_exclusive_lock(&self.index_path(), || {
            let mut index = self.load_index()?;
            let pos = index
                .chunks
                .iter()
                .position(|c| c.id == id)
                .ok_or_else(|| RlmError::NotFound(id.to_string()))?;
            if index.chunks[pos].archived {
                return Ok(());
            }

            let active_path = resolve_in(&self.chunks_dir(), id, ".md")?;
            let bytes = std::fs::read(&active_path)?;
            let archived_rel = format!("archive/{id}.md.gz");
            let gz_path = self.root.join(&archived_rel);
            gzip_atomic_write(&gz_path, &bytes)?;
            std::fs::remove_file(&active_path).ok();

            let mut archive_index = self.load_archive_index()?;
            archive_index.entries.push(ArchiveEntry {
                id: id.to_string(),
                original_path: format!("chunks/{id}.md"),
                archived_path: archived_rel,
                archived_at: Utc::now().to_rfc3339(),
            });
            self.save_archive_index_locked(&archive_index)?;

            index.chunks[pos].archived = true;
            self.save_index_locked(&index)
        })
    }

    /// Permanently delete an archived chunk's compressed body and its
    /// index entries. Active chunks are never purged directly — they must
    /// be archived first.
    pub fn purge(&self, id: &str) -> Result<()> {
        validate_id(id)?;
        with_exclusive_lock(&self.index_path(), || {
            let mut index = self.load_index()?;
            let pos = index
                .chunks
                .iter()
                .position(|c| c.id == id)
                .ok_or_else(|| RlmError::NotFound(id.to_string()))?;
            if !index.chunks[pos].archived {
                return Err(RlmError::InvalidId(format!("{id} is not archived, cannot purge")));
            }

            let mut archive_index = self.load_archive_index()?;
            if let Some(entry_pos) = archive_index.entries.iter().position(|e| e.id == id) {
                let gz_path = self.root.join(&archive_index.entries[entry_pos].archived_path);
                std::fs::remove_file(&gz_path).ok();
                archive_index.entries.remove(entry_pos);
                self.save_archive_index_locked(&archive_index)?;
            }

            index.total_tokens_estimate = index
                .total_tokens_estimate
                .saturating_sub(index.chunks[pos].tokens_estimate);
            index.chunks.remove(pos);
            self.save_index_locked(&index)
        })
    }

    /// Read an active chunk's body without touching the index — no lock,
    /// no access-count bump, no archive restore. Used by search's corpus
    /// build, which runs over many chunks per query and must stay
    /// read-only; archived chunks are skipped by callers instead.
    pub fn read_active_content(&self, id: &str) -> Result<String> {
        let path = resolve_in(&self.chunks_dir(), id, ".md")?;
        let raw = std::fs::read_to_string(&path)?;
        let (_fm, content) = frontmatter::parse(&raw)?;
        Ok(content)
    }

    /// Metadata-only projection, ordered by `created_at` descending.
    pub fn list_chunks(
        &self,
        project: Option<&str>,
        domain: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<ChunkRecord>> {
        let index = self.load_index()?;
        let mut chunks: Vec<ChunkRecord> = index
            .chunks
            .into_iter()
            .filter(|c| match project {
                Some(p) => c.project.as_deref() == Some(p),
                None => true,
            })
            .filter(|c| match domain {
                Some(d) => c.domain.as_deref() == Some(d),
                None => true,
            })
            .collect();
        chunks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = limit {
            chunks.truncate(limit);
        }
        Ok(chunks)
    }
}

fn slice_lines(content: &str, start: Option<usize>, end: Option<usize>) -> String {
    match (start, end) {
        (None, None) => content.to_string(),
        _ => {
            let lines: Vec<&str> = content.lines().collect();
            let start_idx = start.unwrap_or(1).max(1) - 1;
            let end_idx = end.unwrap_or(lines.len()).min(lines.len());
            if start_idx >= end_idx || start_idx >= lines.len() {
                String::new()
            } else {
                lines[start_idx..end_idx].join("\n")
            }
        }
    }
}

/// First non-empty, non-heading line, truncated to ~80 chars.
fn auto_summary(content: &str) -> String {
    let line = content
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.starts_with('#'))
        .unwrap_or("");
    truncate_chars(line, 80)
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{truncated}…")
    }
}

fn estimate_tokens(content: &str) -> usize {
    // ~4 chars/token, the conventional rough estimator this corpus uses
    // when no tokenizer-specific count is available.
    (content.len() / 4).max(1)
}

fn next_sequence(index: &ChunkIndex, date: &str, project: &str) -> u32 {
    let prefix = format!("{date}_{project}_");
    index
        .chunks
        .iter()
        .filter_map(|c| c.id.strip_prefix(&prefix))
        .filter_map(|rest| rest.split('_').next())
        .filter_map(|seq| seq.parse::<u32>().ok())
        .max()
        .map(|m| m + 1)
        .unwrap_or(1)
}

fn build_chunk_id(
    date: &str,
    project: &str,
    seq: u32,
    ticket: Option<&str>,
    domain: Option<&str>,
) -> Result<String> {
    let mut id = format!("{date}_{project}_{seq:03}");
    if let Some(t) = ticket {
        id.push('_');
        id.push_str(t);
    }
    if let Some(d) = domain {
        id.push('_');
        id.push_str(d);
    }
    validate_id(&id)?;
    Ok(id)
}

/// Parse the leading `YYYY-MM-DD` date out of either ID form (conventional
/// `YYYY-MM-DD_{project}_{NNN}...` or legacy `YYYY-MM-DD_{NNN}`).
pub fn date_from_id(id: &str) -> Option<&str> {
    if id.len() >= 10 && id.as_bytes().get(4) == Some(&b'-') && id.as_bytes().get(7) == Some(&b'-')
    {
        Some(&id[..10])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store() -> (tempfile::TempDir, ChunkStore) {
        let dir = tempdir().unwrap();
        let s = ChunkStore::new(dir.path().to_path_buf());
        (dir, s)
    }

    #[test]
    fn chunk_then_peek_roundtrip() {
        let (_dir, s) = store();
        let res = s
            .chunk(
                "Discussion about API redesign\n\nMore detail.",
                None,
                vec!["decision".into()],
                Some("widget".into()),
                None,
                None,
            )
            .unwrap();
        assert!(!res.duplicate);
        let (content, count) = s.peek(&res.chunk_id, None, None).unwrap();
        assert!(content.contains("API redesign"));
        assert_eq!(count, 1);
        let (_content2, count2) = s.peek(&res.chunk_id, None, None).unwrap();
        assert_eq!(count2, 2);
    }

    #[test]
    fn duplicate_content_reuses_id() {
        let (_dir, s) = store();
        let first = s
            .chunk("Same content", None, vec![], None, None, None)
            .unwrap();
        let second = s
            .chunk("Same content", None, vec![], None, None, None)
            .unwrap();
        assert_eq!(first.chunk_id, second.chunk_id);
        assert!(second.duplicate);
        let chunks_dir = s.chunks_dir();
        let count = std::fs::read_dir(&chunks_dir).unwrap().count();
        assert_eq!(count, 1);
    }

    #[test]
    fn oversized_content_rejected() {
        let (_dir, s) = store();
        let big = "a".repeat(crate::io_safety::MAX_CHUNK_SIZE + 1);
        let err = s.chunk(&big, None, vec![], None, None, None);
        assert!(err.is_err());
        assert_eq!(std::fs::read_dir(s.chunks_dir()).ok().map(|d| d.count()), None);
    }

    #[test]
    fn peek_with_line_range() {
        let (_dir, s) = store();
        let res = s
            .chunk("line1\nline2\nline3", None, vec![], None, None, None)
            .unwrap();
        let (content, _) = s.peek(&res.chunk_id, Some(2), Some(2)).unwrap();
        assert_eq!(content, "line2");
    }

    #[test]
    fn peek_missing_id_not_found() {
        let (_dir, s) = store();
        assert!(matches!(
            s.peek("2026-01-01_x_999", None, None),
            Err(RlmError::NotFound(_))
        ));
    }

    #[test]
    fn invalid_id_rejected_on_peek() {
        let (_dir, s) = store();
        assert!(matches!(
            s.peek("../../etc/passwd", None, None),
            Err(RlmError::InvalidId(_))
        ));
    }
}
