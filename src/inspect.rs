//! Offline inspection commands: token counts, chunk layout, and index
//! snapshots.
//!
//! These run without any gateway and are meant for tuning
//! `[corpus].token_threshold` and `[chunking]` against real files before
//! serving them.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::Path;

use adaptive_rag_core::index::VectorIndex;
use adaptive_rag_core::models::Mode;
use adaptive_rag_core::tokens::{ChunkingParams, TokenCounter};

use crate::config::Config;
use crate::extract;

/// Token count of one file and the mode it would select on its own.
#[derive(Debug, Clone, PartialEq)]
pub struct FileReport {
    pub name: String,
    pub chars: usize,
    pub tokens: usize,
    pub mode: Mode,
}

fn read_document(path: &Path) -> Result<(String, String)> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let text = extract::extract_text(&bytes, &name)?;
    Ok((name, text))
}

pub fn count_file(config: &Config, path: &Path) -> Result<FileReport> {
    let counter = TokenCounter::for_encoding(&config.tokenizer.encoding)?;
    let (name, text) = read_document(path)?;
    let tokens = counter.count(&text);
    Ok(FileReport {
        name,
        chars: text.chars().count(),
        tokens,
        mode: Mode::for_tokens(tokens, config.corpus.token_threshold),
    })
}

pub fn run_count(config: &Config, path: &Path) -> Result<()> {
    let report = count_file(config, path)?;
    println!("{}", report.name);
    println!("  Encoding:    {}", config.tokenizer.encoding);
    println!("  Characters:  {}", report.chars);
    println!("  Tokens:      {}", report.tokens);
    println!(
        "  Mode:        {} (threshold {})",
        report.mode, config.corpus.token_threshold
    );
    Ok(())
}

/// `(start, end, tokens)` for every window of `path`.
pub fn chunk_layout(
    config: &Config,
    path: &Path,
    params: ChunkingParams,
) -> Result<Vec<(usize, usize, usize)>> {
    let counter = TokenCounter::for_encoding(&config.tokenizer.encoding)?;
    let (_, text) = read_document(path)?;
    let windows = counter.chunk(&text, params)?;
    Ok(windows.map(|w| (w.start, w.end, w.len())).collect())
}

pub fn run_chunk(config: &Config, path: &Path, params: ChunkingParams) -> Result<()> {
    let layout = chunk_layout(config, path, params)?;
    println!(
        "{} chunks (max {}, overlap {})",
        layout.len(),
        params.max_tokens,
        params.overlap_tokens
    );
    for (i, (start, end, tokens)) in layout.iter().enumerate() {
        println!("  #{:<4} [{:>7}, {:>7})  {} tokens", i, start, end, tokens);
    }
    Ok(())
}

/// Load a snapshot written after a rebuild.
pub fn load_snapshot(config: &Config, base: &Path) -> Result<VectorIndex> {
    let mut index = VectorIndex::new(config.embedding.dims);
    let found = index
        .load(base)
        .with_context(|| format!("Failed to load index snapshot {}", base.display()))?;
    if !found {
        anyhow::bail!("No index snapshot at {}", base.display());
    }
    Ok(index)
}

pub fn run_index_info(config: &Config, base: &Path) -> Result<()> {
    let index = load_snapshot(config, base)?;

    let mut per_document: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    for chunk in index.chunks() {
        let entry = per_document.entry(chunk.document_name.as_str()).or_default();
        entry.0 += 1;
        entry.1 += chunk.token_count;
    }

    println!("Index snapshot: {}", base.display());
    println!("  Dimension:   {}", index.dimension());
    println!("  Chunks:      {}", index.len());
    println!("  Documents:   {}", per_document.len());
    for (name, (chunks, tokens)) in &per_document {
        println!("    {:<40} {:>5} chunks {:>8} tokens", name, chunks, tokens);
    }
    Ok(())
}
