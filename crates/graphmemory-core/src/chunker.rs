//! Chunker consumer contract (§6.1).

/// Splits raw text into chunks the LLM client extracts entities/relations
/// from. Hosts may swap in a tokenizer-aware implementation; this crate
/// only ships the reference heuristic below.
pub trait Chunker: Send + Sync {
    fn chunk(&self, text: &str) -> Vec<String>;
}

/// Whitespace-split word-count heuristic, not a real tokenizer (§6.1).
/// Chunks of `max_tokens` words with `overlap_tokens` words repeated at
/// the start of the next chunk.
pub struct SimpleChunker {
    max_tokens: usize,
    overlap_tokens: usize,
}

impl SimpleChunker {
    pub fn new(max_tokens: usize, overlap_tokens: usize) -> Self {
        Self {
            max_tokens: max_tokens.max(1),
            overlap_tokens: overlap_tokens.min(max_tokens.saturating_sub(1)),
        }
    }
}

impl Default for SimpleChunker {
    fn default() -> Self {
        Self::new(512, 50)
    }
}

impl Chunker for SimpleChunker {
    fn chunk(&self, text: &str) -> Vec<String> {
        let words: Vec<&str> = text.split_whitespace().collect();
        if words.is_empty() {
            return Vec::new();
        }
        if words.len() <= self.max_tokens {
            return vec![text.trim().to_string()];
        }

        let stride = self.max_tokens - self.overlap_tokens;
        let mut chunks = Vec::new();
        let mut start = 0;
        while start < words.len() {
            let end = (start + self.max_tokens).min(words.len());
            chunks.push(words[start..end].join(" "));
            if end == words.len() {
                break;
            }
            start += stride;
        }
        chunks
    }
}
