//! Reading history and daily reports.
//!
//! Each read-aloud session is appended to a daily JSONL file in
//! ~/.gutenberg-reader-history/.

use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use tracing::{debug, error};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadingOutcome {
    Completed,
    Stopped,
    Failed,
}

/// One read-aloud session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadingRecord {
    pub timestamp: String,
    pub book_id: String,
    pub title: Option<String>,
    pub outcome: ReadingOutcome,
    pub chunks_total: usize,
    pub chunks_spoken: usize,
    pub from_selection: bool,
    pub engine: String,
    pub voice: Option<String>,
    pub duration_ms: i64,
    pub error: Option<String>,
}

impl ReadingRecord {
    pub fn now_timestamp() -> String {
        Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
    }
}

/// Daily JSONL files under one directory.
pub struct History {
    dir: PathBuf,
}

impl History {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `~/.gutenberg-reader-history`, or a relative directory when there is no home.
    pub fn default_location() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::new(home.join(".gutenberg-reader-history"))
    }

    fn file(&self, date: &str) -> PathBuf {
        self.dir.join(format!("{}.jsonl", resolve_date(date)))
    }

    /// Append a record to today's file. Failures are logged, not returned.
    pub fn save(&self, record: &ReadingRecord) {
        if let Err(e) = fs::create_dir_all(&self.dir) {
            error!("Failed to create history dir: {e}");
            return;
        }

        let path = self.file("today");
        let json = match serde_json::to_string(record) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize reading record: {e}");
                return;
            }
        };

        match fs::OpenOptions::new().create(true).append(true).open(&path) {
            Ok(mut file) => match writeln!(file, "{json}") {
                Ok(()) => debug!("Saved reading record to {}", path.display()),
                Err(e) => error!("Failed to write reading record: {e}"),
            },
            Err(e) => error!("Failed to open history file: {e}"),
        }
    }

    pub fn load(&self, date: &str) -> Vec<ReadingRecord> {
        let path = self.file(date);
        let file = match fs::File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                error!("Failed to load history records: {e}");
                return Vec::new();
            }
        };

        BufReader::new(file)
            .lines()
            .map_while(Result::ok)
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str(line.trim()) {
                Ok(record) => Some(record),
                Err(e) => {
                    debug!("Skipping malformed history line: {e}");
                    None
                }
            })
            .collect()
    }

    /// Dates with history, newest first.
    pub fn list_dates(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return Vec::new();
        };

        let mut dates: Vec<String> = entries
            .flatten()
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().to_string();
                name.strip_suffix(".jsonl").map(str::to_string)
            })
            .collect();

        dates.sort_by(|a, b| b.cmp(a));
        dates
    }

    pub fn generate_report(&self, date: &str) -> String {
        render_report(&resolve_date(date), &self.load(date))
    }
}

fn resolve_date(date: &str) -> String {
    if date == "today" {
        Local::now().format("%Y-%m-%d").to_string()
    } else {
        date.to_string()
    }
}

fn render_report(display_date: &str, records: &[ReadingRecord]) -> String {
    if records.is_empty() {
        return format!("# Reading Report - {display_date}\n\nNo reading sessions recorded.");
    }

    let count = |outcome: ReadingOutcome| records.iter().filter(|r| r.outcome == outcome).count();
    let chunks_spoken: usize = records.iter().map(|r| r.chunks_spoken).sum();
    let listening_s = records.iter().map(|r| r.duration_ms as f64).sum::<f64>() / 1000.0;

    let mut lines = vec![
        format!("# Reading Report - {display_date}"),
        String::new(),
        "## Summary".to_string(),
        format!("- **Sessions**: {}", records.len()),
        format!("- **Completed**: {}", count(ReadingOutcome::Completed)),
        format!("- **Stopped**: {}", count(ReadingOutcome::Stopped)),
        format!("- **Failed**: {}", count(ReadingOutcome::Failed)),
        format!("- **Chunks spoken**: {chunks_spoken}"),
        format!("- **Listening time**: {}", format_duration(listening_s)),
        String::new(),
        "## Session Log".to_string(),
        String::new(),
        "| Time | Book | Outcome | Chunks | Duration |".to_string(),
        "|------|------|---------|--------|----------|".to_string(),
    ];

    for r in records {
        let time_str = r.timestamp.get(11..19).unwrap_or(&r.timestamp);
        let book = match &r.title {
            Some(title) => truncate(title, 30),
            None => format!("#{}", r.book_id),
        };
        let outcome = match r.outcome {
            ReadingOutcome::Completed => "completed",
            ReadingOutcome::Stopped => "stopped",
            ReadingOutcome::Failed => "failed",
        };
        lines.push(format!(
            "| {time_str} | {book} | {outcome} | {}/{} | {} |",
            r.chunks_spoken,
            r.chunks_total,
            format_duration(r.duration_ms as f64 / 1000.0)
        ));
    }

    lines.join("\n")
}

fn format_duration(seconds: f64) -> String {
    if seconds < 60.0 {
        return format!("{seconds:.1}s");
    }
    let minutes = (seconds / 60.0) as u64;
    if minutes < 60 {
        format!("{minutes}m {:.0}s", seconds % 60.0)
    } else {
        format!("{}h {}m", minutes / 60, minutes % 60)
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let head: String = text.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{head}...")
    }
}
