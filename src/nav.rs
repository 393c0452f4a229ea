//! Navigation (C9): literal/regex grep and fuzzy grep over active chunks,
//! sharing the project/domain/date/entity filter pipeline with search.

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use regex::RegexBuilder;

use crate::chunks::{ChunkRecord, ChunkStore};
use crate::error::{Result, RlmError};
use crate::search::SearchFilters;

#[derive(Debug, Clone, serde::Serialize)]
pub struct GrepHit {
    pub id: String,
    pub summary: String,
    pub line_no: usize,
    pub line: String,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct FuzzyHit {
    pub id: String,
    pub summary: String,
    pub line_no: usize,
    pub line: String,
    pub score: i64,
}

/// Case-insensitive regex search over active chunk bodies. Chunks are
/// visited in `created_at` order; the first match per line is recorded and
/// the scan stops once `limit` hits are collected. A bad pattern returns
/// `InvalidPattern` without touching any chunk state.
pub fn grep(
    store: &ChunkStore,
    pattern: &str,
    filters: &SearchFilters,
    limit: usize,
) -> Result<Vec<GrepHit>> {
    let regex = RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| RlmError::InvalidPattern(e.to_string()))?;

    let records: Vec<ChunkRecord> = store
        .list_chunks(None, None, None)?
        .into_iter()
        .filter(|c| !c.archived)
        .filter(|c| filter_matches(filters, c))
        .collect();

    let mut hits = Vec::new();
    'records: for record in &records {
        let Ok(content) = store.read_active_content(&record.id) else {
            continue;
        };
        for (idx, line) in content.lines().enumerate() {
            if regex.is_match(line) {
                hits.push(GrepHit {
                    id: record.id.clone(),
                    summary: record.summary.clone(),
                    line_no: idx + 1,
                    line: line.to_string(),
                });
                if hits.len() >= limit {
                    break 'records;
                }
            }
        }
    }
    Ok(hits)
}

/// Fuzzy match `pattern` against every line of every active chunk (its
/// summary, treated as line 0, plus every line of its body), ranking by
/// `fuzzy_matcher`'s skim score (higher is better). Each chunk contributes
/// at most its single best-scoring line. Chunks scoring below `threshold`
/// are dropped.
pub fn grep_fuzzy(
    store: &ChunkStore,
    pattern: &str,
    threshold: i64,
    filters: &SearchFilters,
    limit: usize,
) -> Result<Vec<FuzzyHit>> {
    let matcher = SkimMatcherV2::default();
    let records: Vec<ChunkRecord> = store
        .list_chunks(None, None, None)?
        .into_iter()
        .filter(|c| !c.archived)
        .filter(|c| filter_matches(filters, c))
        .collect();

    let mut hits: Vec<FuzzyHit> = Vec::new();
    for record in &records {
        let mut best: Option<(i64, usize, String)> = None;

        if let Some(score) = matcher.fuzzy_match(&record.summary, pattern) {
            best = Some((score, 0, record.summary.clone()));
        }

        if let Ok(content) = store.read_active_content(&record.id) {
            for (idx, line) in content.lines().enumerate() {
                if let Some(score) = matcher.fuzzy_match(line, pattern) {
                    let is_better = match &best {
                        Some((best_score, ..)) => score > *best_score,
                        None => true,
                    };
                    if is_better {
                        best = Some((score, idx + 1, line.to_string()));
                    }
                }
            }
        }

        if let Some((score, line_no, line)) = best {
            if score >= threshold {
                hits.push(FuzzyHit {
                    id: record.id.clone(),
                    summary: record.summary.clone(),
                    line_no,
                    line,
                    score,
                });
            }
        }
    }

    hits.sort_by(|a, b| b.score.cmp(&a.score));
    hits.truncate(limit);
    Ok(hits)
}

fn filter_matches(filters: &SearchFilters, c: &ChunkRecord) -> bool {
    if let Some(p) = &filters.project {
        if c.project.as_deref() != Some(p.as_str()) {
            return false;
        }
    }
    if let Some(d) = &filters.domain {
        if c.domain.as_deref() != Some(d.as_str()) {
            return false;
        }
    }
    let date = c.created_date();
    if let Some(from) = &filters.date_from {
        if date < from.as_str() {
            return false;
        }
    }
    if let Some(to) = &filters.date_to {
        if date > to.as_str() {
            return false;
        }
    }
    if let Some(e) = &filters.entity {
        if !c.entities.contains(e) {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store() -> (tempfile::TempDir, ChunkStore) {
        let dir = tempdir().unwrap();
        (dir, ChunkStore::new(dir.path().to_path_buf()))
    }

    #[test]
    fn grep_finds_matching_line() {
        let (_dir, s) = store();
        let res = s
            .chunk("first line\nfn handle_request() {}\nthird", None, vec![], None, None, None)
            .unwrap();
        let hits = grep(&s, "handle_request", &SearchFilters::default(), 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, res.chunk_id);
        assert_eq!(hits[0].line_no, 2);
    }

    #[test]
    fn grep_invalid_pattern_errors() {
        let (_dir, s) = store();
        let err = grep(&s, "(unclosed", &SearchFilters::default(), 10);
        assert!(matches!(err, Err(RlmError::InvalidPattern(_))));
    }

    #[test]
    fn grep_fuzzy_ranks_by_score() {
        let (_dir, s) = store();
        s.chunk("content a", Some("API redesign plan"), vec![], None, None, None)
            .unwrap();
        s.chunk("content b", Some("lunch notes"), vec![], None, None, None)
            .unwrap();
        let hits = grep_fuzzy(&s, "api redesign", 0, &SearchFilters::default(), 10).unwrap();
        assert!(!hits.is_empty());
        assert_eq!(hits[0].summary, "API redesign plan");
    }

    #[test]
    fn grep_fuzzy_matches_body_content_not_just_summary() {
        let (_dir, s) = store();
        let res = s
            .chunk(
                "unrelated opener\nwidget pagination cursor tokens\nunrelated closer",
                Some("generic summary"),
                vec![],
                None,
                None,
                None,
            )
            .unwrap();
        let hits = grep_fuzzy(&s, "pagination cursor", 0, &SearchFilters::default(), 10).unwrap();
        assert!(!hits.is_empty());
        assert_eq!(hits[0].id, res.chunk_id);
        assert_eq!(hits[0].line_no, 2);
        assert!(hits[0].line.contains("pagination"));
    }
}
