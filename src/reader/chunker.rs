//! Text chunking for read-aloud playback.
//!
//! Text is split into paragraphs at blank lines, paragraphs into sentences at
//! `.!?`, and sentences are packed greedily into chunks of at most
//! `max_len` characters. A sentence longer than `max_len` becomes a chunk of
//! its own; nothing is ever cut mid-sentence.

pub const DEFAULT_MAX_CHUNK_LEN: usize = 250;

/// Split `text` into trimmed, non-empty chunks.
pub fn split_into_chunks(text: &str, max_len: usize) -> Vec<String> {
    Chunks::new(text, max_len).collect()
}

/// Lazy chunk iterator over a borrowed text.
pub struct Chunks<'a> {
    paragraphs: Paragraphs<'a>,
    sentences: Option<Sentences<'a>>,
    current: String,
    current_len: usize,
    max_len: usize,
}

impl<'a> Chunks<'a> {
    pub fn new(text: &'a str, max_len: usize) -> Self {
        Self {
            paragraphs: Paragraphs { rest: text },
            sentences: None,
            current: String::new(),
            current_len: 0,
            max_len,
        }
    }

    fn take_current(&mut self, replacement: &str) -> Option<String> {
        let finished = std::mem::replace(&mut self.current, replacement.to_string());
        self.current_len = replacement.chars().count();
        let trimmed = finished.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }
}

impl Iterator for Chunks<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        loop {
            let Some(sentences) = self.sentences.as_mut() else {
                let paragraph = self.paragraphs.next()?;
                if !paragraph.trim().is_empty() {
                    self.sentences = Some(Sentences { rest: paragraph });
                }
                continue;
            };

            match sentences.next() {
                Some(sentence) => {
                    let len = sentence.chars().count();
                    if self.current_len + len <= self.max_len {
                        self.current.push_str(sentence);
                        self.current_len += len;
                    } else if let Some(chunk) = self.take_current(sentence) {
                        return Some(chunk);
                    }
                }
                None => {
                    // Chunks never span a paragraph break.
                    self.sentences = None;
                    if let Some(chunk) = self.take_current("") {
                        return Some(chunk);
                    }
                }
            }
        }
    }
}

/// Paragraphs separated by runs of two or more `\r`/`\n` characters.
struct Paragraphs<'a> {
    rest: &'a str,
}

impl<'a> Iterator for Paragraphs<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        if self.rest.is_empty() {
            return None;
        }

        let bytes = self.rest.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] != b'\r' && bytes[i] != b'\n' {
                i += 1;
                continue;
            }

            let run_start = i;
            while i < bytes.len() && (bytes[i] == b'\r' || bytes[i] == b'\n') {
                i += 1;
            }

            if i - run_start >= 2 {
                let paragraph = &self.rest[..run_start];
                self.rest = &self.rest[i..];
                return Some(paragraph);
            }
        }

        let paragraph = self.rest;
        self.rest = "";
        Some(paragraph)
    }
}

/// Sentences: a run of text followed by its run of `.!?` terminators.
/// A trailing fragment without a terminator is yielded as well.
struct Sentences<'a> {
    rest: &'a str,
}

fn is_terminator(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

impl<'a> Iterator for Sentences<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        if self.rest.is_empty() {
            return None;
        }

        let mut seen_terminator = false;
        let mut end = self.rest.len();
        for (i, c) in self.rest.char_indices() {
            if is_terminator(c) {
                seen_terminator = true;
            } else if seen_terminator {
                end = i;
                break;
            }
        }

        let (sentence, rest) = self.rest.split_at(end);
        self.rest = rest;
        Some(sentence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strip_whitespace(s: &str) -> String {
        s.chars().filter(|c| !c.is_whitespace()).collect()
    }

    #[test]
    fn long_sentence_is_kept_whole() {
        assert_eq!(
            split_into_chunks("Hello world. Bye.", 5),
            vec!["Hello world.", "Bye."]
        );
    }

    #[test]
    fn empty_and_blank_input_yield_nothing() {
        assert!(split_into_chunks("", 250).is_empty());
        assert!(split_into_chunks("  \n\n \r\n\r\n  ", 250).is_empty());
    }

    #[test]
    fn packs_sentences_up_to_max_len() {
        let chunks = split_into_chunks("One. Two. Three. Four.", 10);
        assert_eq!(chunks, vec!["One. Two.", "Three.", "Four."]);
    }

    #[test]
    fn paragraphs_are_never_merged() {
        let chunks = split_into_chunks("First para.\n\nSecond para.", 250);
        assert_eq!(chunks, vec!["First para.", "Second para."]);
    }

    #[test]
    fn single_line_breaks_stay_inside_a_paragraph() {
        let chunks = split_into_chunks("Line one\nline two.\rLine three.", 250);
        assert_eq!(chunks, vec!["Line one\nline two.\rLine three."]);
    }

    #[test]
    fn crlf_counts_as_two_line_breaks() {
        let chunks = split_into_chunks("Line one\r\nline two.", 250);
        assert_eq!(chunks, vec!["Line one", "line two."]);
    }

    #[test]
    fn crlf_blank_line_splits_paragraphs() {
        let chunks = split_into_chunks("Alpha.\r\n\r\nBeta.", 250);
        assert_eq!(chunks, vec!["Alpha.", "Beta."]);
    }

    #[test]
    fn trailing_fragment_without_terminator_is_kept() {
        let chunks = split_into_chunks("Done! And then", 250);
        assert_eq!(chunks, vec!["Done! And then"]);
    }

    #[test]
    fn terminator_runs_stay_with_their_sentence() {
        let chunks = split_into_chunks("Really?! Yes...", 8);
        assert_eq!(chunks, vec!["Really?!", "Yes..."]);
    }

    #[test]
    fn chunks_reconstruct_input_and_respect_max_len() {
        let text = "It was the best of times, it was the worst of times. It was the age of \
                    wisdom! It was the age of foolishness?\n\nWe had everything before us. \
                    We had nothing before us; we were all going direct to Heaven, we were all \
                    going direct the other way. In short, the period was so far like the \
                    present period.";
        for max_len in [1, 20, 60, 120, 250] {
            let chunks = split_into_chunks(text, max_len);
            assert_eq!(strip_whitespace(&chunks.concat()), strip_whitespace(text));
            for chunk in &chunks {
                assert!(!chunk.is_empty());
                assert_eq!(chunk.trim(), chunk);
                let sentences = Sentences { rest: chunk.as_str() }.count();
                assert!(
                    chunk.chars().count() <= max_len || sentences == 1,
                    "chunk over {max_len} chars holds {sentences} sentences: {chunk:?}"
                );
            }
        }
    }

    #[test]
    fn iterator_is_lazy_and_finite() {
        let mut chunks = Chunks::new("A. B.\n\nC.", 2);
        assert_eq!(chunks.next().as_deref(), Some("A."));
        assert_eq!(chunks.next().as_deref(), Some("B."));
        assert_eq!(chunks.next().as_deref(), Some("C."));
        assert_eq!(chunks.next(), None);
        assert_eq!(chunks.next(), None);
    }
}
