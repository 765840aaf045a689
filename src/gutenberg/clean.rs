//! Strips the Project Gutenberg licence header and footer from a book.
//!
//! Falls back to the original text whenever the cleaned result looks wrong
//! (empty, or suspiciously short for a long input).

use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, warn};

const START_MARKERS: &[&str] = &[
    "*** START OF THIS PROJECT GUTENBERG EBOOK",
    "*** START OF THE PROJECT GUTENBERG EBOOK",
    "*END THE SMALL PRINT! FOR PUBLIC DOMAIN EBOOKS*",
];

const END_MARKERS: &[&str] = &[
    "*** END OF THIS PROJECT GUTENBERG EBOOK",
    "*** END OF THE PROJECT GUTENBERG EBOOK",
    "End of the Project Gutenberg EBook",
    "End of Project Gutenberg's",
];

/// Scan window for the header heuristic when no start marker exists.
const MAX_HEADER_LINES: usize = 50;
const MIN_CLEANED_CHARS: usize = 200;
const LONG_ORIGINAL_CHARS: usize = 1000;

fn contains_marker(line: &str, markers: &[&str]) -> bool {
    let line = line.to_lowercase();
    markers.iter().any(|m| line.contains(&m.to_lowercase()))
}

fn blank_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n{3,}").expect("valid regex"))
}

fn marker_start(lines: &[&str]) -> Option<usize> {
    let mut start = None;
    for (i, line) in lines.iter().enumerate() {
        if !contains_marker(line, START_MARKERS) {
            continue;
        }
        let upper = line.to_uppercase();
        let small_print = upper.contains("FOR PUBLIC DOMAIN EBOOKS") && start.is_none();
        start = Some(i + 1);
        if !small_print && upper.contains("*** START OF TH") {
            break;
        }
    }
    start
}

/// First line with more than ten words, within the header window.
fn heuristic_start(lines: &[&str]) -> usize {
    let mut start = 0;
    let mut header_lines = 0;
    for (i, line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            header_lines += 1;
        } else if line.split_whitespace().count() > 10 {
            start = i;
            break;
        }
        header_lines += 1;
        if header_lines > MAX_HEADER_LINES {
            start = 0;
            break;
        }
    }

    if start == 0 && lines.len() > MAX_HEADER_LINES {
        start = 20.min(lines.len() / 10);
    }
    start
}

fn marker_end(lines: &[&str], start: usize) -> usize {
    (start..lines.len())
        .rev()
        .find(|&i| contains_marker(lines[i], END_MARKERS))
        .unwrap_or(lines.len())
}

pub fn clean_gutenberg_text(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();

    let start = match marker_start(&lines) {
        Some(start) => {
            debug!("Found start marker, content starts at line {start}");
            start
        }
        None => {
            let start = heuristic_start(&lines);
            debug!("No start marker, heuristic start line {start}");
            start
        }
    };
    let end = marker_end(&lines, start);
    if end == lines.len() {
        debug!("No end marker after content start");
    }

    let content = lines.get(start..end).unwrap_or_default().join("\n");
    let content = blank_runs().replace_all(&content, "\n\n");
    let content = content.trim();

    let cleaned_chars = content.chars().count();
    let original_chars = text.chars().count();
    debug!("Cleaned {original_chars} chars → {cleaned_chars} chars");

    if cleaned_chars < MIN_CLEANED_CHARS && original_chars > LONG_ORIGINAL_CHARS {
        warn!("Cleaned text is very short ({cleaned_chars} of {original_chars} chars), keeping original");
        return text.to_string();
    }
    if content.is_empty() {
        return text.to_string();
    }
    content.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(paragraphs: usize) -> String {
        (0..paragraphs)
            .map(|i| format!("Paragraph {i} of the story, long enough to look like real prose in a book."))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    #[test]
    fn strips_header_and_footer() {
        let text = format!(
            "The Project Gutenberg EBook of Something\n\
             Title: Something\n\
             *** START OF THIS PROJECT GUTENBERG EBOOK SOMETHING ***\n\n\n\n\
             {}\n\n\
             *** END OF THIS PROJECT GUTENBERG EBOOK SOMETHING ***\n\
             Licence text follows here.\n",
            body(5)
        );
        let cleaned = clean_gutenberg_text(&text);
        assert!(cleaned.starts_with("Paragraph 0"));
        assert!(cleaned.ends_with("real prose in a book."));
        assert!(!cleaned.contains("***"));
        assert!(!cleaned.contains("\n\n\n"));
    }

    #[test]
    fn markers_match_case_insensitively() {
        let text = format!(
            "header\n*** start of the project gutenberg ebook x ***\n{}\nend of project gutenberg's x\nfooter",
            body(4)
        );
        let cleaned = clean_gutenberg_text(&text);
        assert!(cleaned.starts_with("Paragraph 0"));
        assert!(!cleaned.contains("footer"));
    }

    #[test]
    fn heuristic_skips_short_header_lines() {
        let text = format!(
            "Some Title\nBy Someone\n\nThis opening line has clearly more than ten words in it, so it starts.\n{}",
            body(2)
        );
        let cleaned = clean_gutenberg_text(&text);
        assert!(cleaned.starts_with("This opening line"));
    }

    #[test]
    fn short_result_from_long_text_falls_back() {
        let filler = "word ".repeat(300);
        let text = format!("{filler}\n*** START OF THE PROJECT GUTENBERG EBOOK ***\nTiny.\n");
        assert_eq!(clean_gutenberg_text(&text), text);
    }

    #[test]
    fn empty_result_falls_back() {
        let text = "*** START OF THE PROJECT GUTENBERG EBOOK ***\n*** END OF THE PROJECT GUTENBERG EBOOK ***";
        assert_eq!(clean_gutenberg_text(text), text);
    }

    #[test]
    fn plain_text_passes_through_trimmed() {
        assert_eq!(clean_gutenberg_text("  Just a short note.  \n"), "Just a short note.");
    }
}
