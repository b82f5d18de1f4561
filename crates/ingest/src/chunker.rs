//! Full-text window chunking
//!
//! Fixed-size overlapping windows over whitespace-normalized text, measured
//! in grapheme clusters so `₹` and combining marks never split. Used so that
//! questions outside the seven canonical fields still find supporting text.

use unicode_segmentation::UnicodeSegmentation;

use fundfacts_config::{constants, IngestConfig};
use fundfacts_core::{Chunk, SourceDocument};

#[derive(Debug, Clone)]
pub struct FullTextChunker {
    chunk_size: usize,
    overlap: usize,
    max_chunks: usize,
    min_segment_chars: usize,
    max_chunk_chars: usize,
}

impl Default for FullTextChunker {
    fn default() -> Self {
        Self::from(&IngestConfig::default())
    }
}

impl From<&IngestConfig> for FullTextChunker {
    fn from(config: &IngestConfig) -> Self {
        Self {
            chunk_size: config.chunk_size.max(1),
            overlap: config.chunk_overlap,
            max_chunks: config.max_chunks_per_source,
            min_segment_chars: constants::ingest::MIN_SEGMENT_CHARS,
            max_chunk_chars: config.max_chunk_chars,
        }
    }
}

impl FullTextChunker {
    fn step(&self) -> usize {
        self.chunk_size.saturating_sub(self.overlap).max(1)
    }

    fn make_chunk(&self, source: &SourceDocument, index: usize, text: &str) -> Chunk {
        Chunk {
            id: format!("{}::fulltext::{}", source.source_id, index),
            source_id: source.source_id.clone(),
            text: text.graphemes(true).take(self.max_chunk_chars).collect(),
            scheme_tag: source.scheme_tag,
            field: None,
            source_type: source.source_type,
            source_url: source.source_url.clone(),
            last_fetched_date: source.last_fetched_date.clone(),
        }
    }

    /// Split one source's text into windows
    pub fn chunk(&self, source: &SourceDocument, text: &str) -> Vec<Chunk> {
        let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
        let mut graphemes: Vec<&str> = normalized.graphemes(true).collect();

        if graphemes.is_empty() {
            return Vec::new();
        }
        if graphemes.len() < self.chunk_size {
            return vec![self.make_chunk(source, 0, &normalized)];
        }

        // Text past what max_chunks windows could cover is never reached
        graphemes.truncate(self.chunk_size * self.max_chunks);

        let mut chunks = Vec::new();
        let mut start = 0;
        while start < graphemes.len() && chunks.len() < self.max_chunks {
            let end = (start + self.chunk_size).min(graphemes.len());
            let segment = graphemes[start..end].concat();
            let segment = segment.trim();
            if segment.chars().count() > self.min_segment_chars {
                chunks.push(self.make_chunk(source, chunks.len(), segment));
            }
            start += self.step();
        }

        tracing::debug!(
            source_id = %source.source_id,
            chunks = chunks.len(),
            "Chunked full text"
        );
        chunks
    }
}
