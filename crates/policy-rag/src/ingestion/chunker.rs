//! Text chunking with page tracking
//!
//! Sizes and overlaps are measured in characters, not bytes.

use std::collections::VecDeque;
use unicode_segmentation::UnicodeSegmentation;

use crate::config::{ChunkingConfig, ChunkingStrategy};
use crate::types::{Chunk, ChunkSource, Document};

use super::parser::ParsedDocument;

/// Separators tried in order by the recursive strategy
const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Text chunker with configurable size and overlap
#[derive(Debug, Clone)]
pub struct TextChunker {
    strategy: ChunkingStrategy,
    /// Target chunk size in characters
    chunk_size: usize,
    /// Overlap between chunks
    overlap: usize,
}

impl TextChunker {
    /// Create a recursive chunker
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self {
            strategy: ChunkingStrategy::Recursive,
            chunk_size: chunk_size.max(1),
            overlap: overlap.min(chunk_size.saturating_sub(1)),
        }
    }

    /// Create a chunker from config
    pub fn from_config(config: &ChunkingConfig) -> Self {
        Self {
            strategy: config.strategy,
            ..Self::new(config.chunk_size, config.chunk_overlap)
        }
    }

    /// Chunk a parsed document page by page
    ///
    /// Chunks never span pages, so every chunk carries exactly one page
    /// number. Indices run across the whole document.
    pub fn chunk_document(&self, doc: &Document, parsed: &ParsedDocument) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for page in &parsed.pages {
            for text in self.split_text(&page.content) {
                let source = ChunkSource::pdf(doc.filename.clone(), page.page_number, parsed.total_pages);
                chunks.push(Chunk::new(doc.id, text, source, chunks.len() as u32));
            }
        }
        chunks
    }

    /// Split text into chunks using the configured strategy
    pub fn split_text(&self, text: &str) -> Vec<String> {
        match self.strategy {
            ChunkingStrategy::Recursive => self.split_recursive(text, &SEPARATORS),
            ChunkingStrategy::SlidingWindow => self.split_window(text),
        }
    }

    /// Split on the coarsest separator present, recursing into pieces that
    /// are still too long, then merge neighbouring pieces up to the size
    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let position = separators
            .iter()
            .position(|s| s.is_empty() || text.contains(s))
            .unwrap_or(separators.len().saturating_sub(1));
        let separator = separators.get(position).copied().unwrap_or("");
        let finer = separators.get(position + 1..).unwrap_or(&[]);

        let pieces: Vec<&str> = if separator.is_empty() {
            text.graphemes(true).collect()
        } else {
            text.split(separator).filter(|p| !p.is_empty()).collect()
        };

        let mut out = Vec::new();
        let mut pending: Vec<&str> = Vec::new();
        for piece in pieces {
            if char_len(piece) < self.chunk_size {
                pending.push(piece);
                continue;
            }
            if !pending.is_empty() {
                out.extend(self.merge(&pending, separator));
                pending.clear();
            }
            if finer.is_empty() {
                out.push(piece.trim().to_string());
            } else {
                out.extend(self.split_recursive(piece, finer));
            }
        }
        if !pending.is_empty() {
            out.extend(self.merge(&pending, separator));
        }

        out.retain(|c| !c.is_empty());
        out
    }

    /// Join small pieces into chunks of at most `chunk_size`, carrying up to
    /// `overlap` characters of trailing pieces into the next chunk
    fn merge(&self, pieces: &[&str], separator: &str) -> Vec<String> {
        let sep_len = char_len(separator);
        let mut chunks = Vec::new();
        let mut window: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);
            let joiner = if window.is_empty() { 0 } else { sep_len };

            if total + joiner + len > self.chunk_size && !window.is_empty() {
                push_joined(&mut chunks, &window, separator);

                while !window.is_empty()
                    && (total > self.overlap
                        || total + (if window.is_empty() { 0 } else { sep_len }) + len > self.chunk_size)
                {
                    if let Some((_, front)) = window.pop_front() {
                        total -= front + if window.is_empty() { 0 } else { sep_len };
                    }
                }
            }

            let joiner = if window.is_empty() { 0 } else { sep_len };
            total += joiner + len;
            window.push_back((piece, len));
        }

        push_joined(&mut chunks, &window, separator);
        chunks
    }

    /// Fixed-size character windows advancing by `chunk_size - overlap`
    fn split_window(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let step = self.chunk_size - self.overlap;
        let mut chunks = Vec::new();
        let mut start = 0;

        while start < chars.len() {
            let end = (start + self.chunk_size).min(chars.len());
            let chunk: String = chars[start..end].iter().collect();
            let chunk = chunk.trim();
            if !chunk.is_empty() {
                chunks.push(chunk.to_string());
            }
            if end == chars.len() {
                break;
            }
            start += step;
        }
        chunks
    }
}

fn push_joined(chunks: &mut Vec<String>, window: &VecDeque<(&str, usize)>, separator: &str) {
    let joined = window
        .iter()
        .map(|(piece, _)| *piece)
        .collect::<Vec<_>>()
        .join(separator);
    let joined = joined.trim();
    if !joined.is_empty() {
        chunks.push(joined.to_string());
    }
}
