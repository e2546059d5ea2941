//! Rebuilds destination history from the append-only request logs.
//!
//! Each channel writes one line per call (see `RequestLog`); this module reads
//! the newest files until it has enough lines, then parses the captured JSON
//! back into entries.

use once_cell::sync::Lazy;
use regex::Regex;
use scrobble_sync_destinations::LogChannel;
use scrobble_sync_models::{imdb_id_from_guid, DiaryLogEntry, LogEntry, TraktLogEntry};
use serde_json::Value;
use std::cmp::Reverse;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, warn};

/// How many retry markers are read when flagging retried diary entries
pub const RETRY_SCAN_LIMIT: usize = 100;

static LOG_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[(\d[^\]]*)\]").expect("log date regex should compile"));
static BARE_JSON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{.*\}").expect("payload regex should compile"));
static TRAKT_EXCHANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"PostData: (\{.*\}) \| Response: (\{.*\})$").expect("trakt regex should compile")
});
static LETTERBOXD_EXCHANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"PostData: (\{.*?\}) \| Response: (\{.*\})").expect("letterboxd regex should compile")
});
static WATCH_ENDPOINT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Endpoint: \S*/s/film:(\d+)/watch/ ").expect("watch endpoint regex should compile")
});
static MESSAGE_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"href="(.*?)">"#).expect("link regex should compile"));

fn line_pattern(channel: LogChannel) -> &'static Regex {
    match channel {
        LogChannel::Incoming | LogChannel::LetterboxdRetries => &*BARE_JSON,
        LogChannel::Trakt => &*TRAKT_EXCHANGE,
        LogChannel::Letterboxd => &*LETTERBOXD_EXCHANGE,
    }
}

/// `<prefix>.log`, or `<prefix>` followed by `.`, `-` or `_` and ending in `.log`
fn belongs_to(file_name: &str, prefix: &str) -> bool {
    let Some(rest) = file_name.strip_prefix(prefix) else {
        return false;
    };
    rest == ".log" || (rest.ends_with(".log") && rest.starts_with(['.', '-', '_']))
}

/// Only complete lines; a trailing line without newline is still being written.
fn complete_lines(content: &str) -> impl Iterator<Item = &str> {
    let complete = match content.rfind('\n') {
        Some(end) => &content[..end],
        None => "",
    };
    complete.lines().filter(|line| !line.trim().is_empty())
}

fn imdb_from_metadata(fields: &serde_json::Map<String, Value>) -> Option<String> {
    fields
        .get("Metadata")?
        .get("Guid")?
        .as_array()?
        .iter()
        .filter_map(|guid| guid.get("id").and_then(Value::as_str))
        .find_map(imdb_id_from_guid)
}

fn imdb_from_trakt_ids(fields: &serde_json::Map<String, Value>) -> Option<String> {
    let candidates = [
        fields.get("movies").and_then(|v| v.get(0)),
        fields.get("episodes").and_then(|v| v.get(0)),
        fields.get("movie"),
        fields.get("episode"),
    ];
    candidates
        .into_iter()
        .flatten()
        .find_map(|item| item.get("ids")?.get("imdb")?.as_str().map(str::to_string))
}

fn url_from_messages(fields: &serde_json::Map<String, Value>) -> Option<String> {
    let message = fields.get("messages")?.get(0)?.as_str()?;
    MESSAGE_LINK
        .captures(message)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Parse one log line into an entry. A line that does not match carries only its date.
pub fn parse_line(channel: LogChannel, line: &str) -> LogEntry {
    let mut entry = LogEntry {
        log_date: LOG_DATE
            .captures(line)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string()),
        ..LogEntry::default()
    };

    if let Some(caps) = line_pattern(channel).captures(line) {
        let captures: Vec<&str> = if caps.len() == 1 {
            caps.get(0).map(|m| m.as_str()).into_iter().collect()
        } else {
            caps.iter().skip(1).flatten().map(|m| m.as_str()).collect()
        };

        for capture in captures {
            match serde_json::from_str::<Value>(capture) {
                Ok(Value::Object(map)) => entry.fields.extend(map),
                _ => entry.positional.push(capture.to_string()),
            }
        }
    }

    // Watch posts only name the film in their endpoint
    if channel == LogChannel::Letterboxd
        && !entry.fields.contains_key("filmId")
        && !entry.fields.contains_key("viewingableUid")
    {
        if let Some(film_id) = WATCH_ENDPOINT.captures(line).and_then(|caps| caps.get(1)) {
            entry
                .fields
                .insert("filmId".to_string(), Value::String(film_id.as_str().to_string()));
        }
    }

    entry.imdb = imdb_from_metadata(&entry.fields).or_else(|| imdb_from_trakt_ids(&entry.fields));
    entry.url = url_from_messages(&entry.fields);
    entry
}

/// Reads history back out of the log directory.
#[derive(Debug, Clone)]
pub struct LogReconstructor {
    log_dir: PathBuf,
}

impl LogReconstructor {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self { log_dir: log_dir.into() }
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Log files of a channel, newest first.
    async fn files(&self, channel: LogChannel) -> Vec<PathBuf> {
        let mut dir = match tokio::fs::read_dir(&self.log_dir).await {
            Ok(dir) => dir,
            Err(e) => {
                debug!(dir = ?self.log_dir, "Log directory not readable: {}", e);
                return Vec::new();
            }
        };

        let mut files: Vec<(SystemTime, String, PathBuf)> = Vec::new();
        loop {
            let entry = match dir.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!(dir = ?self.log_dir, "Failed to list log directory: {}", e);
                    break;
                }
            };
            let name = entry.file_name().to_string_lossy().to_string();
            if !belongs_to(&name, channel.file_prefix()) {
                continue;
            }
            let key = match entry.metadata().await {
                Ok(meta) => meta
                    .created()
                    .or_else(|_| meta.modified())
                    .unwrap_or(SystemTime::UNIX_EPOCH),
                Err(e) => {
                    warn!(file = %name, "Skipping log file without metadata: {}", e);
                    continue;
                }
            };
            files.push((key, name, entry.path()));
        }

        files.sort_by(|a, b| (Reverse(a.0), Reverse(&a.1)).cmp(&(Reverse(b.0), Reverse(&b.1))));
        files.into_iter().map(|(_, _, path)| path).collect()
    }

    /// The `limit` most recent entries of a channel, oldest first.
    pub async fn latest(&self, channel: LogChannel, limit: usize) -> Vec<LogEntry> {
        if limit == 0 {
            return Vec::new();
        }

        let mut entries: Vec<LogEntry> = Vec::new();
        for path in self.files(channel).await {
            if entries.len() >= limit {
                break;
            }
            let content = match tokio::fs::read(&path).await {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(e) => {
                    warn!(file = ?path, "Skipping unreadable log file: {}", e);
                    continue;
                }
            };
            entries.extend(complete_lines(&content).map(|line| parse_line(channel, line)));
        }

        // Stable: lines with equal dates keep file order
        entries.sort_by(|a, b| a.log_date.cmp(&b.log_date));
        let skip = entries.len().saturating_sub(limit);
        entries.split_off(skip)
    }

    pub async fn trakt_history(&self, limit: usize) -> Vec<TraktLogEntry> {
        self.latest(LogChannel::Trakt, limit)
            .await
            .iter()
            .map(TraktLogEntry::from_entry)
            .collect()
    }

    /// Diary entries with a film id, flagged when a retry marker points at them.
    pub async fn diary_history(&self, limit: usize) -> Vec<DiaryLogEntry> {
        let mut entries: Vec<DiaryLogEntry> = self
            .latest(LogChannel::Letterboxd, limit)
            .await
            .iter()
            .map(DiaryLogEntry::from_entry)
            .filter(|entry| entry.film_id.is_some())
            .collect();

        let retries = self.latest(LogChannel::LetterboxdRetries, RETRY_SCAN_LIMIT).await;
        for retry in &retries {
            let Some(original) = retry.str_field("originalLogDate") else {
                continue;
            };
            if let Some(entry) = entries
                .iter_mut()
                .find(|entry| !entry.retried && entry.log_date == original)
            {
                entry.retried = true;
            }
        }

        entries
    }
}
