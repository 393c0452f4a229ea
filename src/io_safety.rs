//! Path and I/O safety primitives: ID validation, traversal-safe path
//! resolution, atomic writes, exclusive file locks, normalized hashing,
//! and bounded gzip decompression.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::{Result, RlmError};

/// Maximum chunk content size at creation (2 MiB).
pub const MAX_CHUNK_SIZE: usize = 2 * 1024 * 1024;

/// Maximum bytes a single `gunzip_bounded` call will produce (10 MiB).
pub const MAX_GUNZIP_SIZE: u64 = 10 * 1024 * 1024;

/// Validate a chunk/insight ID against the allowlist `[A-Za-z0-9_.&-]+`.
pub fn validate_id(id: &str) -> Result<()> {
    if id.is_empty() || id.len() > 256 {
        return Err(RlmError::InvalidId(id.to_string()));
    }
    let ok = id
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'&' | b'-'));
    if !ok {
        return Err(RlmError::InvalidId(id.to_string()));
    }
    Ok(())
}

/// Resolve `id` (with optional `ext`) under `base`, failing if the
/// canonicalized result would escape `base`. `base` itself need not exist
/// ahead of time for the directory component check, but the canonical
/// prefix check is what actually prevents traversal.
pub fn resolve_in(base: &Path, id: &str, ext: &str) -> Result<PathBuf> {
    validate_id(id)?;

    let file_name = if ext.is_empty() {
        id.to_string()
    } else {
        format!("{id}{ext}")
    };

    let candidate = base.join(&file_name);

    // base may not exist yet; canonicalize what we can and compare prefixes
    // on the lexical join, since `validate_id` already forbids `/` and `..`
    // from ever appearing in `id`.
    let base_abs = if base.exists() {
        base.canonicalize()?
    } else {
        base.to_path_buf()
    };

    let candidate_parent = candidate
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| base.to_path_buf());

    if candidate_parent != base && candidate_parent != base_abs {
        return Err(RlmError::PathEscape(candidate.display().to_string()));
    }

    Ok(candidate)
}

/// Write `bytes` atomically: write to a sibling tempfile, fsync, then
/// rename over `path`. On failure the tempfile is removed; `path` is never
/// left partially written.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| RlmError::Io(std::io::Error::other("path has no parent")))?;
    fs::create_dir_all(parent)?;

    let tmp_name = format!(
        ".{}.tmp-{}",
        path.file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
        std::process::id()
    );
    let tmp_path = parent.join(tmp_name);

    let write_result = (|| -> Result<()> {
        let mut f = File::create(&tmp_path)?;
        f.write_all(bytes)?;
        f.sync_all()?;
        Ok(())
    })();

    if let Err(e) = write_result {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }

    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Acquire an exclusive whole-file advisory lock on `path` (created if
/// missing), run `f`, and release the lock on every exit path including
/// unwinding.
pub fn with_exclusive_lock<T>(path: &Path, f: impl FnOnce() -> Result<T>) -> Result<T> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(path)?;

    let mut lock = fd_lock::RwLock::new(file);
    let _guard = lock.write()?;

    f()
}

/// SHA-256 of `text` lowercased with runs of whitespace collapsed to a
/// single space and trimmed.
pub fn sha256_normalized(text: &str) -> String {
    let normalized = normalize_for_hash(text);
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn normalize_for_hash(text: &str) -> String {
    let lowered = text.to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    let mut last_was_space = false;
    for ch in lowered.chars() {
        if ch.is_whitespace() {
            if !last_was_space {
                out.push(' ');
                last_was_space = true;
            }
        } else {
            out.push(ch);
            last_was_space = false;
        }
    }
    out.trim().to_string()
}

/// Streaming gzip decompression bounded by `max_bytes`; aborts (returning
/// `InvalidSize`) if the decompressed stream would exceed the cap. Protects
/// against decompression bombs in the archive zone.
pub fn gunzip_bounded(path: &Path, max_bytes: u64) -> Result<Vec<u8>> {
    use flate2::read::GzDecoder;

    let file = File::open(path)?;
    let mut decoder = GzDecoder::new(file);
    let mut buf = vec![0u8; 64 * 1024];
    let mut out = Vec::new();
    let mut total: u64 = 0;

    loop {
        let n = decoder.read(&mut buf)?;
        if n == 0 {
            break;
        }
        total += n as u64;
        if total > max_bytes {
            return Err(RlmError::InvalidSize(format!(
                "decompressed size exceeds {max_bytes} bytes"
            )));
        }
        out.extend_from_slice(&buf[..n]);
    }

    Ok(out)
}

/// Gzip-compress `bytes` and atomically write the result to `path`.
pub fn gzip_atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
    use flate2::write::GzEncoder;
    use flate2::Compression;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes)?;
    let compressed = encoder.finish()?;
    atomic_write(path, &compressed)
}

/// Validate content size at chunk-creation time.
pub fn check_content_size(content: &str) -> Result<()> {
    if content.len() > MAX_CHUNK_SIZE {
        return Err(RlmError::InvalidSize(format!(
            "content is {} bytes, max is {MAX_CHUNK_SIZE}",
            content.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn validate_id_rejects_traversal() {
        assert!(validate_id("../../etc/passwd").is_err());
        assert!(validate_id("ok-id_1.2&3").is_ok());
        assert!(validate_id("").is_err());
    }

    #[test]
    fn resolve_in_blocks_escape() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path()).unwrap();
        let p = resolve_in(dir.path(), "2026-01-01_proj_001", ".md").unwrap();
        assert!(p.starts_with(dir.path()));
    }

    #[test]
    fn atomic_write_then_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.txt");
        atomic_write(&path, b"hello").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "hello");
    }

    #[test]
    fn sha256_normalized_collapses_whitespace() {
        let a = sha256_normalized("Hello   World\n\n");
        let b = sha256_normalized("hello world");
        assert_eq!(a, b);
    }

    #[test]
    fn gzip_roundtrip_bounded() {
        let dir = tempdir().unwrap();
        let gz_path = dir.path().join("a.md.gz");
        gzip_atomic_write(&gz_path, b"some content here").unwrap();
        let out = gunzip_bounded(&gz_path, MAX_GUNZIP_SIZE).unwrap();
        assert_eq!(out, b"some content here");
    }

    #[test]
    fn content_size_enforced() {
        let ok = "a".repeat(MAX_CHUNK_SIZE);
        assert!(check_content_size(&ok).is_ok());
        let too_big = "a".repeat(MAX_CHUNK_SIZE + 1);
        assert!(check_content_size(&too_big).is_err());
    }
}
