//! Fixed-window text splitting.

use crate::config::ChunkingConfig;

/// Splits text into overlapping windows measured in characters.
///
/// Consecutive windows share `chunk_overlap` characters. The last window may be
/// shorter than `chunk_size`. Every chunk is cut down to `max_chunk_len`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
    max_chunk_len: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self::from_config(&ChunkingConfig::default())
    }
}

impl Chunker {
    /// A zero size is raised to 1 and an overlap that would stall the window is lowered.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
            max_chunk_len: usize::MAX,
        }
    }

    pub fn from_config(config: &ChunkingConfig) -> Self {
        Self::new(config.chunk_size, config.chunk_overlap).with_max_chunk_len(config.max_chunk_len)
    }

    pub fn with_max_chunk_len(mut self, max_chunk_len: usize) -> Self {
        self.max_chunk_len = max_chunk_len.max(1);
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split `text`. Empty or whitespace-only input yields no chunks.
    pub fn split(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        // Byte offset of every char boundary, end of string included.
        let bounds: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let char_count = bounds.len() - 1;
        let step = self.chunk_size - self.chunk_overlap;

        let mut chunks = Vec::with_capacity(char_count / step + 1);
        let mut start = 0;
        loop {
            let end = (start + self.chunk_size).min(char_count);
            let stored_end = end.min(start + self.max_chunk_len);
            chunks.push(text[bounds[start]..bounds[stored_end]].to_string());
            if end == char_count {
                break;
            }
            start += step;
        }
        chunks
    }
}
