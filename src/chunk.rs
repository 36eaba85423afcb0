//! Paragraph → sentence → word text chunker.
//!
//! Splits long text into pieces of at most `max_chars` characters so each
//! piece can be embedded on its own. Splitting prefers the largest natural
//! boundary that fits:
//!
//! 1. Text that already fits is returned as a single chunk, unchanged.
//! 2. Otherwise the text is split on blank lines into paragraphs, which are
//!    packed greedily into chunks joined by `\n\n`.
//! 3. A paragraph longer than `max_chars` is split into sentences (runs
//!    ending in `.`, `!` or `?`) packed the same way, joined by a space.
//! 4. A sentence longer than `max_chars` is split on whitespace into words.
//!    Words are never cut; a single word longer than `max_chars` becomes a
//!    chunk of its own.
//!
//! After splitting, every chunk but the first is given an overlap prefix:
//! the trailing `overlap` characters of the previous chunk, advanced to the
//! next word start so the prefix never begins mid-word.
//!
//! All lengths are counted in `char`s, never bytes.
//!
//! # Example
//!
//! ```rust
//! use kb_ingest::chunk::chunk_text;
//!
//! let chunks = chunk_text("A. B. C.", 4, 0).unwrap();
//! assert_eq!(chunks, vec!["A.", "B.", "C."]);
//! ```

use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

use crate::models::{Chunk, Document, DocumentMetadata};

/// Errors raised for invalid chunking parameters.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChunkError {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
}

fn paragraph_break() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n\s*\n").expect("paragraph regex"))
}

/// A sentence is any run of non-terminators closed by one or more
/// terminators plus trailing whitespace. Unterminated trailing text is
/// matched by the second alternative so nothing is dropped.
fn sentence() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^.!?]*[.!?]+\s*|[^.!?]+").expect("sentence regex"))
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Split `text` into overlapped chunk strings.
///
/// Equivalent to [`split_text`] followed by the overlap pass; each
/// returned string is `prefix + " " + body`, or just `body` when the
/// prefix is empty.
///
/// # Errors
///
/// [`ChunkError::InvalidArgument`] when `max_chars` is zero.
pub fn chunk_text(text: &str, max_chars: usize, overlap: usize) -> Result<Vec<String>, ChunkError> {
    let bodies = split_text(text, max_chars)?;
    Ok(Overlapped::new(bodies, overlap)
        .map(|(prefix, body)| join_overlap(&prefix, body))
        .collect())
}

/// Split `text` into chunk bodies without overlap.
///
/// Empty text yields no chunks. Text of at most `max_chars` characters
/// yields itself. No body is longer than `max_chars` unless it is a single
/// word that cannot be split.
pub fn split_text(text: &str, max_chars: usize) -> Result<Vec<String>, ChunkError> {
    if max_chars == 0 {
        return Err(ChunkError::InvalidArgument("max chunk size must be > 0"));
    }
    if text.is_empty() {
        return Ok(Vec::new());
    }
    if char_len(text) <= max_chars {
        return Ok(vec![text.to_string()]);
    }

    let mut packer = Packer::new(max_chars, "\n\n");
    for para in paragraph_break().split(text) {
        let para = para.trim();
        if para.is_empty() {
            continue;
        }
        let len = char_len(para);
        if len > max_chars {
            packer.extend(split_sentences(para, max_chars));
        } else {
            packer.push(para, len);
        }
    }
    Ok(packer.finish())
}

fn split_sentences(text: &str, max_chars: usize) -> Vec<String> {
    let mut packer = Packer::new(max_chars, " ");
    for m in sentence().find_iter(text) {
        let s = m.as_str().trim();
        if s.is_empty() {
            continue;
        }
        let len = char_len(s);
        if len > max_chars {
            packer.extend(split_words(s, max_chars));
        } else {
            packer.push(s, len);
        }
    }
    packer.finish()
}

fn split_words(text: &str, max_chars: usize) -> Vec<String> {
    let mut packer = Packer::new(max_chars, " ");
    for word in text.split_whitespace() {
        packer.push(word, char_len(word));
    }
    packer.finish()
}

/// Greedy accumulator shared by every split level.
struct Packer {
    max_chars: usize,
    separator: &'static str,
    separator_len: usize,
    buf: String,
    buf_len: usize,
    out: Vec<String>,
}

impl Packer {
    fn new(max_chars: usize, separator: &'static str) -> Self {
        Self {
            max_chars,
            separator,
            separator_len: char_len(separator),
            buf: String::new(),
            buf_len: 0,
            out: Vec::new(),
        }
    }

    /// Append `piece`, flushing first if it would push the buffer past the
    /// limit. A piece longer than the limit lands alone in the buffer.
    fn push(&mut self, piece: &str, len: usize) {
        if !self.buf.is_empty() && self.buf_len + self.separator_len + len > self.max_chars {
            self.flush();
        }
        if !self.buf.is_empty() {
            self.buf.push_str(self.separator);
            self.buf_len += self.separator_len;
        }
        self.buf.push_str(piece);
        self.buf_len += len;
    }

    /// Flush the buffer, then append already-finished chunks in order.
    fn extend(&mut self, chunks: Vec<String>) {
        self.flush();
        self.out.extend(chunks);
    }

    fn flush(&mut self) {
        if !self.buf.is_empty() {
            self.out.push(std::mem::take(&mut self.buf));
            self.buf_len = 0;
        }
    }

    fn finish(mut self) -> Vec<String> {
        self.flush();
        self.out
    }
}

/// Trailing fragment of `previous` used as the next chunk's overlap.
///
/// Takes at most `overlap` characters from the end. If the cut falls inside
/// a word, the fragment skips ahead to the next whitespace; with no
/// whitespace left the fragment is empty. Leading whitespace is dropped.
pub fn overlap_prefix(previous: &str, overlap: usize) -> &str {
    if overlap == 0 || previous.is_empty() {
        return "";
    }
    let skip = char_len(previous).saturating_sub(overlap);
    let start = previous
        .char_indices()
        .nth(skip)
        .map(|(i, _)| i)
        .unwrap_or(previous.len());
    let mut fragment = &previous[start..];

    let mid_word = start > 0
        && !previous[..start].ends_with(char::is_whitespace)
        && !fragment.starts_with(char::is_whitespace);
    if mid_word {
        match fragment.find(char::is_whitespace) {
            Some(pos) => fragment = &fragment[pos..],
            None => return "",
        }
    }
    fragment.trim_start()
}

fn join_overlap(prefix: &str, body: String) -> String {
    if prefix.is_empty() {
        body
    } else {
        format!("{} {}", prefix, body)
    }
}

/// Iterator yielding `(overlap_prefix, body)` pairs from pre-split bodies.
pub struct Overlapped {
    bodies: std::vec::IntoIter<String>,
    previous: Option<String>,
    overlap: usize,
}

impl Overlapped {
    pub fn new(bodies: Vec<String>, overlap: usize) -> Self {
        Self {
            bodies: bodies.into_iter(),
            previous: None,
            overlap,
        }
    }
}

impl Iterator for Overlapped {
    type Item = (String, String);

    fn next(&mut self) -> Option<Self::Item> {
        let body = self.bodies.next()?;
        let prefix = self
            .previous
            .as_deref()
            .map(|prev| overlap_prefix(prev, self.overlap).to_string())
            .unwrap_or_default();
        self.previous = Some(body.clone());
        Some((prefix, body))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.bodies.size_hint()
    }
}

impl ExactSizeIterator for Overlapped {}

/// Lazy sequence of [`Chunk`]s for one document.
pub struct Chunks<'a> {
    inner: Overlapped,
    index: usize,
    metadata: &'a DocumentMetadata,
}

impl Iterator for Chunks<'_> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        let (overlap_prefix, body) = self.inner.next()?;
        let chunk = Chunk {
            index: self.index,
            body,
            overlap_prefix,
            metadata: self.metadata.clone(),
        };
        self.index += 1;
        Some(chunk)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Chunks<'_> {}

/// Chunk a document's content into indexed [`Chunk`]s carrying its
/// metadata. Splitting happens eagerly; overlap is applied as the
/// iterator is consumed.
pub fn chunk_document(
    doc: &Document,
    max_chars: usize,
    overlap: usize,
) -> Result<Chunks<'_>, ChunkError> {
    let bodies = split_text(&doc.content, max_chars)?;
    Ok(Chunks {
        inner: Overlapped::new(bodies, overlap),
        index: 0,
        metadata: &doc.metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Origin;

    fn sample_text() -> String {
        let mut paras = Vec::new();
        for p in 0..12 {
            let mut sentences = Vec::new();
            for s in 0..(p % 5 + 1) {
                sentences.push(format!(
                    "Sentence {} of paragraph {} talks about {} windows!",
                    s,
                    p,
                    "double-hung ".repeat(s + 1).trim_end()
                ));
            }
            paras.push(sentences.join(" "));
        }
        paras.join("\n\n  \n")
    }

    #[test]
    fn test_small_text_single_chunk() {
        let text = "Hello, world!\n\nStill short.";
        assert_eq!(chunk_text(text, 100, 0).unwrap(), vec![text]);
        assert_eq!(chunk_text(text, 100, 10).unwrap(), vec![text]);
        assert_eq!(chunk_text(text, text.chars().count(), 0).unwrap(), vec![text]);
    }

    #[test]
    fn test_empty_text() {
        assert!(chunk_text("", 100, 10).unwrap().is_empty());
    }

    #[test]
    fn test_zero_max_is_invalid() {
        assert_eq!(
            chunk_text("anything", 0, 0),
            Err(ChunkError::InvalidArgument("max chunk size must be > 0"))
        );
    }

    #[test]
    fn test_sentence_split_without_blank_lines() {
        assert_eq!(chunk_text("A. B. C.", 4, 0).unwrap(), vec!["A.", "B.", "C."]);
    }

    #[test]
    fn test_paragraphs_packed_greedily() {
        let text = "Alpha one.\n\nBeta two.\n \t\nGamma three.";
        let chunks = split_text(text, 24).unwrap();
        assert_eq!(chunks, vec!["Alpha one.\n\nBeta two.", "Gamma three."]);
    }

    #[test]
    fn test_unterminated_tail_is_kept() {
        let text = "First one. Second one. tail words";
        let chunks = split_text(text, 12).unwrap();
        assert_eq!(chunks, vec!["First one.", "Second one.", "tail words"]);
    }

    #[test]
    fn test_sentence_split_breaks_dotted_tokens() {
        // Any terminator ends a sentence, including one inside a number or
        // domain name. The pieces are rejoined with a space.
        assert_eq!(
            split_text("Version 3.5 ships today.", 12).unwrap(),
            vec!["Version 3.", "5 ships", "today."]
        );
        assert_eq!(
            split_text("See example.com for more.", 15).unwrap(),
            vec!["See example.", "com for more."]
        );
        assert_eq!(
            split_text("ccc.bbccc..", 5).unwrap(),
            vec!["ccc.", "bbccc.."]
        );
    }

    #[test]
    fn test_long_word_stands_alone() {
        let chunks = split_text("a supercalifragilistic b", 5).unwrap();
        assert_eq!(chunks, vec!["a", "supercalifragilistic", "b"]);
    }

    #[test]
    fn test_overlap_advances_to_word_start() {
        let text = "The quick brown fox.\n\nJumps over the dog.";
        assert_eq!(
            chunk_text(text, 20, 9).unwrap(),
            vec!["The quick brown fox.", "fox. Jumps over the dog."]
        );
        assert_eq!(
            chunk_text(text, 20, 10).unwrap(),
            vec!["The quick brown fox.", "brown fox. Jumps over the dog."]
        );
    }

    #[test]
    fn test_overlap_inside_single_word_is_empty() {
        assert_eq!(overlap_prefix("abcdefgh", 3), "");
        assert_eq!(overlap_prefix("ab cdefgh", 6), "cdefgh");
        assert_eq!(overlap_prefix("anything", 0), "");
    }

    #[test]
    fn test_overlap_larger_than_chunk_takes_whole_chunk() {
        assert_eq!(
            chunk_text("A. B. C.", 4, 10).unwrap(),
            vec!["A.", "A. B.", "B. C."]
        );
    }

    #[test]
    fn test_bodies_respect_limit() {
        let text = sample_text();
        for max in [12, 40, 90, 250] {
            for body in split_text(&text, max).unwrap() {
                let len = body.chars().count();
                assert!(
                    len <= max || !body.contains(char::is_whitespace),
                    "body of {} chars exceeds {}: {:?}",
                    len,
                    max,
                    body
                );
            }
        }
    }

    #[test]
    fn test_bodies_reconstruct_original_words() {
        let text = sample_text();
        let original: Vec<&str> = text.split_whitespace().collect();
        for max in [12, 40, 90, 250] {
            let bodies = split_text(&text, max).unwrap();
            let joined = bodies.join(" ");
            let rebuilt: Vec<&str> = joined.split_whitespace().collect();
            assert_eq!(rebuilt, original, "max={}", max);
        }
    }

    #[test]
    fn test_overlap_is_bounded_suffix_of_previous() {
        let text = sample_text();
        let bodies = split_text(&text, 60).unwrap();
        let pairs: Vec<(String, String)> = Overlapped::new(bodies.clone(), 25).collect();
        assert_eq!(pairs.len(), bodies.len());
        assert!(pairs[0].0.is_empty());
        for i in 1..pairs.len() {
            let (prefix, body) = &pairs[i];
            assert_eq!(body, &bodies[i]);
            assert!(prefix.chars().count() <= 25);
            assert!(bodies[i - 1].ends_with(prefix.as_str()));
            if !prefix.is_empty() {
                let cut = bodies[i - 1].len() - prefix.len();
                assert!(cut == 0 || bodies[i - 1][..cut].ends_with(char::is_whitespace));
            }
        }
    }

    #[test]
    fn test_multibyte_chars_counted_not_bytes() {
        let text = "Ünïcödé wörds ärë fün. Ñö pröblém hérè. Ümläüts äll ärøund.";
        let bodies = split_text(text, 20).unwrap();
        for body in &bodies {
            assert!(body.chars().count() <= 20, "{:?}", body);
        }
        let chunks = chunk_text(text, 20, 7).unwrap();
        assert_eq!(chunks.len(), bodies.len());
    }

    #[test]
    fn test_whitespace_only_text_yields_nothing() {
        let text = " \n\n \n\n ".repeat(10);
        assert!(split_text(&text, 5).unwrap().is_empty());
    }

    #[test]
    fn test_chunk_document_indices_and_metadata() {
        let doc = Document {
            content: sample_text(),
            metadata: DocumentMetadata::new(
                Origin::Url {
                    url: "https://example.com/windows".to_string(),
                },
                None,
            ),
        };
        let iter = chunk_document(&doc, 80, 20).unwrap();
        let expected = split_text(&doc.content, 80).unwrap().len();
        assert_eq!(iter.len(), expected);
        let chunks: Vec<Chunk> = iter.collect();
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.index, i);
            assert_eq!(c.metadata, doc.metadata);
        }
        assert!(chunks[0].overlap_prefix.is_empty());
        assert_eq!(chunks[0].text(), chunks[0].body);
    }

    #[test]
    fn test_deterministic() {
        let text = sample_text();
        assert_eq!(
            chunk_text(&text, 50, 15).unwrap(),
            chunk_text(&text, 50, 15).unwrap()
        );
    }
}
