//! Flat inner-product vector index over chunk embeddings.
//!
//! Every vector is L2-normalized on the way in, so the inner product
//! computed at query time is cosine similarity in `[-1, 1]`. Search is
//! brute force over all slots; expected corpus sizes (thousands of
//! chunks) keep this well under a millisecond per query.
//!
//! # Ordering
//!
//! Slots are append-only. Results are sorted by descending score, and
//! equal scores are ordered by ascending slot, so the earlier-added chunk
//! wins a tie.
//!
//! # Snapshots
//!
//! [`VectorIndex::save`] writes two artifacts next to a base path:
//!
//! | File | Contents |
//! |------|----------|
//! | `<base>.vectors` | `ARVI` magic, format version, dimension, count, normalized `f32` matrix (LE) |
//! | `<base>.meta.json` | dimension, chunk list, raw embeddings, SHA-256 of `.vectors` |
//!
//! [`VectorIndex::load`] treats a missing artifact as "no saved state"
//! and any inconsistency between the two as a contract violation.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::embedding::{blob_to_vec, dot, normalize_l2, vec_to_blob};
use crate::error::{CoreError, Result};
use crate::models::{DocumentChunk, IndexState};

/// Output width of `text-embedding-3-small`.
pub const DEFAULT_DIMENSION: usize = 1536;

const MAGIC: &[u8; 4] = b"ARVI";
const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 4 + 4 + 4 + 8;

/// One stored chunk and its unit-length vector.
#[derive(Debug, Clone)]
struct IndexEntry {
    chunk: Arc<DocumentChunk>,
    vector: Vec<f32>,
}

/// A search hit.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Arc<DocumentChunk>,
    pub score: f32,
    pub slot: usize,
}

#[derive(Serialize, Deserialize)]
struct SnapshotMeta {
    dimension: usize,
    chunks: Vec<DocumentChunk>,
    embeddings: Vec<Vec<f32>>,
    vectors_sha256: String,
}

#[derive(Debug, Clone)]
pub struct VectorIndex {
    dimension: usize,
    entries: Vec<IndexEntry>,
    /// Embeddings exactly as supplied, kept for the metadata artifact.
    raw_embeddings: Vec<Vec<f32>>,
}

impl VectorIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            entries: Vec::new(),
            raw_embeddings: Vec::new(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn state(&self) -> IndexState {
        if self.entries.is_empty() {
            IndexState::Empty
        } else {
            IndexState::Populated
        }
    }

    /// Chunks in slot order.
    pub fn chunks(&self) -> impl Iterator<Item = &DocumentChunk> {
        self.entries.iter().map(|e| e.chunk.as_ref())
    }

    fn check_dimension(&self, len: usize, what: &str) -> Result<()> {
        if len != self.dimension {
            return Err(CoreError::invalid(format!(
                "{} has dimension {}, index expects {}",
                what, len, self.dimension
            )));
        }
        Ok(())
    }

    /// Append chunks with their embeddings at the next free slots.
    ///
    /// Every vector is validated and normalized before the index is
    /// touched; on error nothing is appended.
    pub fn add(&mut self, chunks: Vec<DocumentChunk>, embeddings: Vec<Vec<f32>>) -> Result<()> {
        if chunks.len() != embeddings.len() {
            return Err(CoreError::invalid(format!(
                "number of chunks ({}) must match number of embeddings ({})",
                chunks.len(),
                embeddings.len()
            )));
        }

        let mut normalized = Vec::with_capacity(embeddings.len());
        for (i, raw) in embeddings.iter().enumerate() {
            self.check_dimension(raw.len(), &format!("embedding {}", i))?;
            let mut v = raw.clone();
            normalize_l2(&mut v)
                .map_err(|_| CoreError::invalid(format!("embedding {} has zero norm", i)))?;
            normalized.push(v);
        }

        self.entries.extend(
            chunks
                .into_iter()
                .zip(normalized)
                .map(|(chunk, vector)| IndexEntry {
                    chunk: Arc::new(chunk),
                    vector,
                }),
        );
        self.raw_embeddings.extend(embeddings);
        Ok(())
    }

    /// Top-`k` chunks by cosine similarity to `query`.
    ///
    /// Returns `min(k, len)` results. An empty index returns an empty
    /// list without inspecting the query.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        if self.entries.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        self.check_dimension(query.len(), "query embedding")?;
        let mut q = query.to_vec();
        normalize_l2(&mut q)?;

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(slot, e)| (slot, dot(&q, &e.vector)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(slot, score)| ScoredChunk {
                chunk: Arc::clone(&self.entries[slot].chunk),
                score,
                slot,
            })
            .collect())
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.raw_embeddings.clear();
    }

    fn artifact_paths(base: &Path) -> (PathBuf, PathBuf) {
        let mut vectors = base.as_os_str().to_owned();
        vectors.push(".vectors");
        let mut meta = base.as_os_str().to_owned();
        meta.push(".meta.json");
        (PathBuf::from(vectors), PathBuf::from(meta))
    }

    fn encode_vectors(&self) -> Vec<u8> {
        let mut bytes =
            Vec::with_capacity(HEADER_LEN + self.entries.len() * self.dimension * 4);
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&(self.dimension as u32).to_le_bytes());
        bytes.extend_from_slice(&(self.entries.len() as u64).to_le_bytes());
        for e in &self.entries {
            bytes.extend_from_slice(&vec_to_blob(&e.vector));
        }
        bytes
    }

    fn decode_vectors(bytes: &[u8]) -> Result<(usize, Vec<Vec<f32>>)> {
        if bytes.len() < HEADER_LEN || &bytes[0..4] != MAGIC {
            return Err(CoreError::contract("vector artifact has no valid header"));
        }
        let read_u32 = |at: usize| u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
        let version = read_u32(4);
        if version != FORMAT_VERSION {
            return Err(CoreError::contract(format!(
                "unsupported vector artifact version {}",
                version
            )));
        }
        let dimension = read_u32(8) as usize;
        let mut count_bytes = [0u8; 8];
        count_bytes.copy_from_slice(&bytes[12..20]);
        let count = u64::from_le_bytes(count_bytes) as usize;

        let body = &bytes[HEADER_LEN..];
        let expected = count
            .checked_mul(dimension)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| CoreError::contract("vector artifact header overflows"))?;
        if body.len() != expected || (count > 0 && dimension == 0) {
            return Err(CoreError::contract(format!(
                "vector artifact body is {} bytes, header implies {}",
                body.len(),
                expected
            )));
        }
        let vectors = if dimension == 0 {
            Vec::new()
        } else {
            body.chunks_exact(dimension * 4).map(blob_to_vec).collect()
        };
        Ok((dimension, vectors))
    }

    /// Write the `.vectors` and `.meta.json` artifacts for `base`.
    pub fn save(&self, base: &Path) -> Result<()> {
        let (vectors_path, meta_path) = Self::artifact_paths(base);
        if let Some(parent) = base.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| CoreError::contract(format!("create {}: {}", parent.display(), e)))?;
        }

        let vectors = self.encode_vectors();
        let meta = SnapshotMeta {
            dimension: self.dimension,
            chunks: self.entries.iter().map(|e| (*e.chunk).clone()).collect(),
            embeddings: self.raw_embeddings.clone(),
            vectors_sha256: format!("{:x}", Sha256::digest(&vectors)),
        };
        let meta_json = serde_json::to_vec(&meta)
            .map_err(|e| CoreError::contract(format!("serialize index metadata: {}", e)))?;

        fs::write(&vectors_path, &vectors)
            .map_err(|e| CoreError::contract(format!("write {}: {}", vectors_path.display(), e)))?;
        fs::write(&meta_path, meta_json)
            .map_err(|e| CoreError::contract(format!("write {}: {}", meta_path.display(), e)))?;
        Ok(())
    }

    /// Restore the state written by [`save`](Self::save).
    ///
    /// Returns `Ok(false)` without touching the index if either artifact
    /// is missing. The index is only replaced once both artifacts have
    /// been read and cross-checked.
    pub fn load(&mut self, base: &Path) -> Result<bool> {
        let (vectors_path, meta_path) = Self::artifact_paths(base);
        if !vectors_path.exists() || !meta_path.exists() {
            return Ok(false);
        }

        let vectors = fs::read(&vectors_path)
            .map_err(|e| CoreError::contract(format!("read {}: {}", vectors_path.display(), e)))?;
        let meta_bytes = fs::read(&meta_path)
            .map_err(|e| CoreError::contract(format!("read {}: {}", meta_path.display(), e)))?;
        let meta: SnapshotMeta = serde_json::from_slice(&meta_bytes)
            .map_err(|e| CoreError::contract(format!("parse {}: {}", meta_path.display(), e)))?;

        if format!("{:x}", Sha256::digest(&vectors)) != meta.vectors_sha256 {
            return Err(CoreError::contract(
                "vector artifact does not match metadata checksum",
            ));
        }
        let (dimension, normalized) = Self::decode_vectors(&vectors)?;
        if dimension != meta.dimension {
            return Err(CoreError::contract(format!(
                "dimension mismatch: vectors {}, metadata {}",
                dimension, meta.dimension
            )));
        }
        if dimension != self.dimension {
            return Err(CoreError::contract(format!(
                "snapshot dimension {} does not match index dimension {}",
                dimension, self.dimension
            )));
        }
        if normalized.len() != meta.chunks.len() || meta.chunks.len() != meta.embeddings.len() {
            return Err(CoreError::contract(format!(
                "snapshot holds {} vectors, {} chunks, {} embeddings",
                normalized.len(),
                meta.chunks.len(),
                meta.embeddings.len()
            )));
        }

        self.entries = meta
            .chunks
            .into_iter()
            .zip(normalized)
            .map(|(chunk, vector)| IndexEntry {
                chunk: Arc::new(chunk),
                vector,
            })
            .collect();
        self.raw_embeddings = meta.embeddings;
        Ok(true)
    }
}

impl Default for VectorIndex {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSION)
    }
}
