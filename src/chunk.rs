//! Overlapping fixed-size text chunker.
//!
//! Splits document text into [`Chunk`]s of at most `chunk_size` characters.
//! Consecutive chunks of one document share exactly `chunk_overlap`
//! characters, so context that straddles a split point is visible in both
//! chunks.
//!
//! # Algorithm
//!
//! 1. Start a window at the current position, `chunk_size` characters wide.
//! 2. If the window reaches the end of the text, emit it and stop.
//! 3. Otherwise look for the latest split point inside the window, trying a
//!    paragraph break (`\n\n`), then a line break, then a space. The split
//!    point must leave the chunk longer than the overlap so the window
//!    always advances. With no such point, split hard at the window edge.
//! 4. Emit the chunk and start the next window `chunk_overlap` characters
//!    before the split point.
//!
//! Lengths are counted in `char`s, so multi-byte text is never cut inside
//! a code point. Dropping the first `chunk_overlap` characters of every
//! chunk but the first and concatenating reproduces the document exactly.
//!
//! # Example
//!
//! ```rust
//! use qa_agent::chunk::chunk_document;
//! use qa_agent::models::Document;
//!
//! let doc = Document::new("notes.txt", "Hello world.\n\nSecond paragraph.");
//! let chunks = chunk_document(&doc, 1000, 200);
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].chunk_index, 0);
//! ```

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::{Chunk, Document};

/// Split points, most preferred first.
const SEPARATORS: &[&str] = &["\n\n", "\n", " "];

/// Chunk every document in order and concatenate the results.
pub fn chunk_documents(docs: &[Document], chunk_size: usize, chunk_overlap: usize) -> Vec<Chunk> {
    docs.iter()
        .flat_map(|doc| chunk_document(doc, chunk_size, chunk_overlap))
        .collect()
}

/// Split one document into overlapping chunks.
///
/// Returns no chunks for empty text. `chunk_overlap` is clamped below
/// `chunk_size` (configuration validation rejects such values earlier).
pub fn chunk_document(doc: &Document, chunk_size: usize, chunk_overlap: usize) -> Vec<Chunk> {
    let chunk_size = chunk_size.max(1);
    let overlap = chunk_overlap.min(chunk_size - 1);

    let chars: Vec<char> = doc.text.chars().collect();
    let len = chars.len();
    let mut chunks = Vec::new();
    if len == 0 {
        return chunks;
    }

    let mut start = 0usize;
    let mut chunk_index: i64 = 0;

    loop {
        let window_end = (start + chunk_size).min(len);
        let end = if window_end < len {
            find_split(&chars, start + overlap + 1, window_end).unwrap_or(window_end)
        } else {
            len
        };

        let text: String = chars[start..end].iter().collect();
        chunks.push(make_chunk(doc, chunk_index, start, text));
        chunk_index += 1;

        if end == len {
            break;
        }
        start = end - overlap;
    }

    chunks
}

/// Latest position in `min_end..=max_end` directly after a separator.
fn find_split(chars: &[char], min_end: usize, max_end: usize) -> Option<usize> {
    SEPARATORS.iter().find_map(|sep| {
        let width = sep.chars().count();
        (min_end.max(width)..=max_end)
            .rev()
            .find(|&end| chars[end - width..end].iter().copied().eq(sep.chars()))
    })
}

fn make_chunk(doc: &Document, index: i64, offset: usize, text: String) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        id: Uuid::new_v4().to_string(),
        source: doc.source.clone(),
        chunk_index: index,
        char_offset: offset as i64,
        text,
        hash,
        metadata: doc.metadata.clone(),
    }
}
