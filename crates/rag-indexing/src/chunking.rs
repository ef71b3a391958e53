//! Chunking strategies.
//!
//! A [`Chunker`] turns one document into an ordered, lazy sequence of
//! non-empty chunks. Calling [`Chunker::chunks`] again restarts the
//! sequence and yields the same chunks: every strategy is deterministic.
//!
//! Strategies:
//! - [`SentenceChunker`]: UAX #29 sentence boundaries, never splits a sentence
//! - [`ParagraphChunker`]: blank-line boundaries
//! - [`LineChunker`]: one chunk per non-empty line
//! - [`SlidingWindowChunker`]: fixed windows with overlap, advanced on word boundaries

use std::iter;

use rag_types::{ChunkStrategyKind, ChunkingSettings, Chunk, Document, WindowUnit};
use tiktoken_rs::CoreBPE;
use unicode_segmentation::UnicodeSegmentation;

use crate::error::IndexingError;

/// Splits document text into chunks.
pub trait Chunker: Send + Sync {
    /// Strategy name for logs
    fn name(&self) -> &'static str;

    /// Chunks of `document` in document order, numbered from 0.
    fn chunks<'a>(&'a self, document: &'a Document) -> Box<dyn Iterator<Item = Chunk> + 'a>;
}

/// Number non-empty trimmed pieces in order.
fn numbered<'a, I>(source: &'a str, pieces: I) -> impl Iterator<Item = Chunk> + 'a
where
    I: Iterator<Item = String> + 'a,
{
    pieces
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .enumerate()
        .map(move |(sequence, text)| Chunk::new(source, sequence, text))
}

/// UAX #29 sentences of `text`. A segment without any word (emoji, stray
/// punctuation) is attached to the sentence before it, or to the one after
/// it at the start of the text, so no text is dropped.
fn sentences(text: &str) -> impl Iterator<Item = String> + '_ {
    let mut segments = text
        .split_sentence_bounds()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .peekable();

    iter::from_fn(move || {
        let mut sentence = String::new();
        loop {
            let Some(segment) = segments.next() else {
                return (!sentence.is_empty()).then_some(sentence);
            };
            push_segment(&mut sentence, segment);
            if has_words(segment) {
                break;
            }
        }
        while let Some(segment) = segments.next_if(|s| !has_words(s)) {
            push_segment(&mut sentence, segment);
        }
        Some(sentence)
    })
}

fn has_words(segment: &str) -> bool {
    segment.unicode_words().next().is_some()
}

fn push_segment(sentence: &mut String, segment: &str) {
    if !sentence.is_empty() {
        sentence.push(' ');
    }
    sentence.push_str(segment);
}

/// Groups consecutive sentences.
#[derive(Debug, Clone)]
pub struct SentenceChunker {
    sentences_per_chunk: usize,
}

impl SentenceChunker {
    pub fn new(sentences_per_chunk: usize) -> Result<Self, IndexingError> {
        if sentences_per_chunk == 0 {
            return Err(IndexingError::Chunking(
                "sentences_per_chunk must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            sentences_per_chunk,
        })
    }
}

impl Default for SentenceChunker {
    fn default() -> Self {
        Self {
            sentences_per_chunk: 1,
        }
    }
}

impl Chunker for SentenceChunker {
    fn name(&self) -> &'static str {
        "sentence"
    }

    fn chunks<'a>(&'a self, document: &'a Document) -> Box<dyn Iterator<Item = Chunk> + 'a> {
        let trimmed = document.text.trim();
        if trimmed.is_empty() {
            return Box::new(iter::empty());
        }

        let mut sentences = sentences(trimmed);
        let per_chunk = self.sentences_per_chunk;
        let groups = iter::from_fn(move || {
            let group: Vec<String> = sentences.by_ref().take(per_chunk).collect();
            if group.is_empty() {
                None
            } else {
                Some(group.join(" "))
            }
        });
        Box::new(numbered(&document.source, groups))
    }
}

/// Splits on blank lines.
#[derive(Debug, Clone, Default)]
pub struct ParagraphChunker;

impl Chunker for ParagraphChunker {
    fn name(&self) -> &'static str {
        "paragraph"
    }

    fn chunks<'a>(&'a self, document: &'a Document) -> Box<dyn Iterator<Item = Chunk> + 'a> {
        let mut lines = document.text.lines().peekable();
        let paragraphs = iter::from_fn(move || {
            while lines.peek().is_some_and(|l| l.trim().is_empty()) {
                lines.next();
            }
            let mut paragraph: Vec<&str> = Vec::new();
            while let Some(line) = lines.next_if(|l| !l.trim().is_empty()) {
                paragraph.push(line.trim_end());
            }
            if paragraph.is_empty() {
                None
            } else {
                Some(paragraph.join("\n"))
            }
        });
        Box::new(numbered(&document.source, paragraphs))
    }
}

/// One chunk per non-empty line.
#[derive(Debug, Clone, Default)]
pub struct LineChunker;

impl Chunker for LineChunker {
    fn name(&self) -> &'static str {
        "line"
    }

    fn chunks<'a>(&'a self, document: &'a Document) -> Box<dyn Iterator<Item = Chunk> + 'a> {
        Box::new(numbered(
            &document.source,
            document.text.lines().map(str::to_string),
        ))
    }
}

/// How window length is measured.
enum Measure {
    Characters,
    Tokens(CoreBPE),
}

impl Measure {
    fn len(&self, text: &str) -> usize {
        match self {
            Measure::Characters => text.chars().count(),
            Measure::Tokens(bpe) => bpe.encode_ordinary(text).len(),
        }
    }
}

/// A word with its byte span and its cost in window units
/// (including the whitespace before it, except for the first word).
struct Word {
    start: usize,
    end: usize,
    cost: usize,
}

/// Fixed-size windows that overlap their predecessor.
///
/// Windows start and end on word boundaries. A single word longer than the
/// window becomes a window of its own.
pub struct SlidingWindowChunker {
    window: usize,
    overlap: f32,
    measure: Measure,
}

impl SlidingWindowChunker {
    pub fn new(window: usize, overlap: f32, unit: WindowUnit) -> Result<Self, IndexingError> {
        if window == 0 {
            return Err(IndexingError::Chunking("window must be at least 1".to_string()));
        }
        if !(0.0..1.0).contains(&overlap) {
            return Err(IndexingError::Chunking(format!(
                "overlap must be in [0, 1), got {}",
                overlap
            )));
        }
        let measure = match unit {
            WindowUnit::Characters => Measure::Characters,
            WindowUnit::Tokens => Measure::Tokens(
                tiktoken_rs::cl100k_base()
                    .map_err(|e| IndexingError::Chunking(format!("tokenizer: {}", e)))?,
            ),
        };
        Ok(Self {
            window,
            overlap,
            measure,
        })
    }

    fn words(&self, text: &str) -> Vec<Word> {
        let mut words = Vec::new();
        let mut prev_end = None;
        let mut start = None;

        for (i, c) in text.char_indices().chain(iter::once((text.len(), ' '))) {
            match (c.is_whitespace(), start) {
                (false, None) => start = Some(i),
                (true, Some(s)) => {
                    let cost_from = prev_end.unwrap_or(s);
                    words.push(Word {
                        start: s,
                        end: i,
                        cost: self.measure.len(&text[cost_from..i]),
                    });
                    prev_end = Some(i);
                    start = None;
                }
                _ => {}
            }
        }
        words
    }
}

impl Chunker for SlidingWindowChunker {
    fn name(&self) -> &'static str {
        "sliding_window"
    }

    fn chunks<'a>(&'a self, document: &'a Document) -> Box<dyn Iterator<Item = Chunk> + 'a> {
        let text = document.text.as_str();
        let words = self.words(text);
        let mut start = 0;

        let windows = iter::from_fn(move || {
            if start >= words.len() {
                return None;
            }

            let mut end = start;
            let mut used = 0;
            while end < words.len() && (end == start || used + words[end].cost <= self.window) {
                used += words[end].cost;
                end += 1;
            }
            let piece = text[words[start].start..words[end - 1].end].to_string();

            if end >= words.len() {
                start = words.len();
            } else {
                // Step back from `end` while the tail fits in the overlap budget.
                let keep = (used as f32 * self.overlap) as usize;
                let mut next = end;
                let mut tail = 0;
                while next > start + 1 && tail + words[next - 1].cost <= keep {
                    tail += words[next - 1].cost;
                    next -= 1;
                }
                start = next;
            }
            Some(piece)
        });
        Box::new(numbered(&document.source, windows))
    }
}

/// Construct the chunker selected by `settings`.
pub fn build_chunker(settings: &ChunkingSettings) -> Result<Box<dyn Chunker>, IndexingError> {
    Ok(match settings.strategy {
        ChunkStrategyKind::Sentence => Box::new(SentenceChunker::new(settings.sentences_per_chunk)?),
        ChunkStrategyKind::Paragraph => Box::new(ParagraphChunker),
        ChunkStrategyKind::Line => Box::new(LineChunker),
        ChunkStrategyKind::SlidingWindow => Box::new(SlidingWindowChunker::new(
            settings.window,
            settings.overlap,
            settings.unit,
        )?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(chunker: &dyn Chunker, text: &str) -> Vec<String> {
        let doc = Document::new("doc.txt", text);
        chunker.chunks(&doc).map(|c| c.text).collect()
    }

    #[test]
    fn test_sentence_split() {
        let out = texts(
            &SentenceChunker::default(),
            "Cats sleep 12-16 hours a day. Cats have retractable claws.",
        );
        assert_eq!(
            out,
            vec!["Cats sleep 12-16 hours a day.", "Cats have retractable claws."]
        );
    }

    #[test]
    fn test_sentence_grouping() {
        let chunker = SentenceChunker::new(2).unwrap();
        let out = texts(&chunker, "One here. Two here. Three here.");
        assert_eq!(out, vec!["One here. Two here.", "Three here."]);
    }

    #[test]
    fn test_sequence_numbers() {
        let doc = Document::new("doc.txt", "A cat. A dog. A bird.");
        let seqs: Vec<usize> = SentenceChunker::default()
            .chunks(&doc)
            .map(|c| c.sequence)
            .collect();
        assert_eq!(seqs, vec![0, 1, 2]);
    }

    #[test]
    fn test_degenerate_inputs() {
        let chunker = SentenceChunker::default();
        assert!(texts(&chunker, "").is_empty());
        assert!(texts(&chunker, "   \n\t ").is_empty());
        assert_eq!(texts(&chunker, "  no period here "), vec!["no period here"]);
        assert_eq!(texts(&chunker, " ... "), vec!["..."]);
    }

    #[test]
    fn test_wordless_sentence_kept_with_neighbour() {
        let out = texts(&SentenceChunker::default(), "Cats purr. 😺😺. Dogs bark.");
        assert_eq!(out.len(), 2);
        assert!(out[0].starts_with("Cats purr."));
        assert!(out[0].contains("😺😺"));
        assert_eq!(out[1], "Dogs bark.");
    }

    #[test]
    fn test_leading_wordless_segment_joins_next_sentence() {
        let out = texts(&SentenceChunker::default(), "😺. Cats purr. Dogs bark.");
        assert_eq!(out.len(), 2);
        assert!(out[0].starts_with("😺"));
        assert!(out[0].ends_with("Cats purr."));
    }

    #[test]
    fn test_newline_separated_facts() {
        let out = texts(
            &SentenceChunker::default(),
            "On average, cats spend 2/3 of every day sleeping\nA cat's nose is unique\n",
        );
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_rechunking_is_deterministic() {
        let doc = Document::new(
            "doc.txt",
            "First sentence. Second one! Third? Fourth.\n\nNew paragraph here.",
        );
        let strategies: Vec<Box<dyn Chunker>> = vec![
            Box::new(SentenceChunker::default()),
            Box::new(ParagraphChunker),
            Box::new(LineChunker),
            Box::new(SlidingWindowChunker::new(20, 0.25, WindowUnit::Characters).unwrap()),
        ];
        for chunker in &strategies {
            let a: Vec<Chunk> = chunker.chunks(&doc).collect();
            let b: Vec<Chunk> = chunker.chunks(&doc).collect();
            assert_eq!(a, b, "{} not deterministic", chunker.name());
            assert!(a.iter().all(|c| !c.text.is_empty()));
        }
    }

    #[test]
    fn test_paragraphs() {
        let out = texts(
            &ParagraphChunker,
            "\n\nFirst para\nstill first.\n\n\n  \nSecond para.\n",
        );
        assert_eq!(out, vec!["First para\nstill first.", "Second para."]);
    }

    #[test]
    fn test_lines() {
        let out = texts(&LineChunker, "fact one\n\n  fact two  \n");
        assert_eq!(out, vec!["fact one", "fact two"]);
    }

    #[test]
    fn test_sliding_window_overlaps_and_keeps_words_whole() {
        let chunker = SlidingWindowChunker::new(20, 0.5, WindowUnit::Characters).unwrap();
        let text = "alpha beta gamma delta epsilon zeta eta theta";
        let out = texts(&chunker, text);

        assert!(out.len() > 2);
        for piece in &out {
            assert!(piece.chars().count() <= 20, "window too long: {:?}", piece);
            for word in piece.split_whitespace() {
                assert!(text.split_whitespace().any(|w| w == word));
            }
        }
        // consecutive windows share at least one word
        for pair in out.windows(2) {
            let last = pair[0].split_whitespace().last().unwrap();
            assert!(pair[1].split_whitespace().any(|w| w == last));
        }
        assert!(out.last().unwrap().ends_with("theta"));
    }

    #[test]
    fn test_sliding_window_no_overlap_covers_text_once() {
        let chunker = SlidingWindowChunker::new(11, 0.0, WindowUnit::Characters).unwrap();
        let out = texts(&chunker, "aaaa bbbb cccc dddd");
        assert_eq!(out, vec!["aaaa bbbb", "cccc dddd"]);
    }

    #[test]
    fn test_sliding_window_long_word() {
        let chunker = SlidingWindowChunker::new(3, 0.0, WindowUnit::Characters).unwrap();
        assert_eq!(texts(&chunker, "abcdefgh ij"), vec!["abcdefgh", "ij"]);
    }

    #[test]
    fn test_sliding_window_tokens() {
        let chunker = SlidingWindowChunker::new(8, 0.25, WindowUnit::Tokens).unwrap();
        let out = texts(
            &chunker,
            "Cats sleep twelve to sixteen hours every day and have retractable claws for climbing.",
        );
        assert!(out.len() >= 2);
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(SentenceChunker::new(0).is_err());
        assert!(SlidingWindowChunker::new(0, 0.1, WindowUnit::Characters).is_err());
        assert!(SlidingWindowChunker::new(10, 1.0, WindowUnit::Characters).is_err());
        assert!(SlidingWindowChunker::new(10, -0.1, WindowUnit::Characters).is_err());
    }

    #[test]
    fn test_build_chunker_from_settings() {
        let settings = ChunkingSettings {
            strategy: ChunkStrategyKind::Paragraph,
            ..Default::default()
        };
        assert_eq!(build_chunker(&settings).unwrap().name(), "paragraph");
        assert_eq!(
            build_chunker(&ChunkingSettings::default()).unwrap().name(),
            "sentence"
        );
    }
}
