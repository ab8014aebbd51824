//! Append-only conversation transcript.
//!
//! Each exchange is written as two tagged lines followed by a blank line:
//!
//! ```text
//! [User] what's the weather
//! [Assistant] Sunny, 25C
//!
//! ```
//!
//! Newlines and backslashes inside a message are escaped so a record always
//! spans exactly two lines. When the file grows past the hard cap it is cut
//! down to a trailing window that fits the soft cap before the next record is
//! appended.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::write_atomic;
use crate::config::BotConfig;
use crate::conversation::Turn;
use crate::error::{BotError, Result};

/// First line of a fresh transcript
pub const HISTORY_HEADER: &str = "# Group chat history\n\n";
/// First line of a transcript that has been rotated
pub const ROTATION_MARKER: &str = "# Group chat history (rotated, trailing window kept)\n\n";

const USER_TAG: &str = "[User] ";
const ASSISTANT_TAG: &str = "[Assistant] ";

/// Transcript file with size-based rotation
#[derive(Debug, Clone)]
pub struct HistoryLog {
    path: PathBuf,
    hard_cap: u64,
    soft_cap: u64,
}

impl HistoryLog {
    /// Create a log with the default caps (100 MiB hard, 50 MiB soft)
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let defaults = crate::config::BotSettings::default();
        Self {
            path: path.into(),
            hard_cap: defaults.history_hard_cap,
            soft_cap: defaults.history_soft_cap,
        }
    }

    pub fn from_config(config: &BotConfig) -> Self {
        Self::new(&config.paths.history_file)
            .with_caps(config.bot.history_hard_cap, config.bot.history_soft_cap)
    }

    /// Set the rotation thresholds in bytes
    pub fn with_caps(mut self, hard_cap: u64, soft_cap: u64) -> Self {
        self.hard_cap = hard_cap;
        self.soft_cap = soft_cap;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the file with its header if missing. Returns `true` if created.
    pub fn ensure_exists(&self) -> Result<bool> {
        if self.path.exists() {
            return Ok(false);
        }
        self.reset()?;
        info!(path = %self.path.display(), "Created history file");
        Ok(true)
    }

    /// Replace the whole transcript with just the header.
    pub fn reset(&self) -> Result<()> {
        write_atomic(&self.path, HISTORY_HEADER.as_bytes())
    }

    /// Append one exchange, rotating first if the file is over the hard cap.
    pub fn append(&self, user: &str, assistant: &str) -> Result<()> {
        self.rotate_if_needed()?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| BotError::io("create directory", parent, e))?;
        }

        let mut record = format_record(user, assistant);
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| BotError::io("open", &self.path, e))?;
        if missing_separator(&mut file).map_err(|e| BotError::io("read", &self.path, e))? {
            // A record cut by a crash must not run into the new one.
            warn!(path = %self.path.display(), "History file ends inside a record, closing it");
            record.insert(0, '\n');
        }
        file.write_all(record.as_bytes())
            .map_err(|e| BotError::io("append", &self.path, e))?;

        debug!(path = %self.path.display(), bytes = record.len(), "Appended history record");
        Ok(())
    }

    /// Cut the file down to its trailing window when it exceeds the hard cap.
    /// Returns `true` if a rotation happened.
    pub fn rotate_if_needed(&self) -> Result<bool> {
        let size = match fs::metadata(&self.path) {
            Ok(metadata) => metadata.len(),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(BotError::io("stat", &self.path, e)),
        };
        if size <= self.hard_cap {
            return Ok(false);
        }

        let window = self.soft_cap.saturating_sub(ROTATION_MARKER.len() as u64);
        let tail = self.read_tail(size, window)?;

        let mut rotated = String::with_capacity(ROTATION_MARKER.len() + tail.len());
        rotated.push_str(ROTATION_MARKER);
        rotated.push_str(&tail);
        write_atomic(&self.path, rotated.as_bytes())?;

        info!(
            path = %self.path.display(),
            previous_size = size,
            new_size = rotated.len(),
            "Rotated history file"
        );
        Ok(true)
    }

    /// Read at most `window` trailing bytes, starting on a whole line.
    fn read_tail(&self, size: u64, window: u64) -> Result<String> {
        let mut file = fs::File::open(&self.path).map_err(|e| BotError::io("open", &self.path, e))?;

        // One extra byte tells whether the window begins right after a newline.
        let span = (window + 1).min(size);
        file.seek(SeekFrom::End(-(span as i64)))
            .map_err(|e| BotError::io("seek", &self.path, e))?;
        let mut buf = Vec::with_capacity(span as usize);
        file.read_to_end(&mut buf)
            .map_err(|e| BotError::io("read", &self.path, e))?;

        let starts_at_file_begin = span == size && window >= size;
        Ok(decode_tail(&buf, starts_at_file_begin))
    }

    /// Parse the transcript into turns, oldest first.
    ///
    /// Only complete user/assistant pairs are returned; stray or truncated
    /// lines are skipped.
    pub fn read_turns(&self) -> Result<Vec<Turn>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(BotError::io("read", &self.path, e)),
        };
        let text = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => {
                warn!(path = %self.path.display(), "History file has invalid UTF-8, decoding lossily");
                String::from_utf8_lossy(e.as_bytes()).into_owned()
            }
        };
        Ok(parse_records(&text))
    }
}

/// Whether a non-empty file does not end with the blank line that closes a
/// record or the header.
fn missing_separator(file: &mut fs::File) -> std::io::Result<bool> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(false);
    }
    let span = len.min(2);
    file.seek(SeekFrom::End(-(span as i64)))?;
    let mut tail = Vec::with_capacity(2);
    file.read_to_end(&mut tail)?;
    Ok(tail != b"\n\n")
}

/// Turn the raw tail bytes into text that starts on a line boundary.
///
/// `buf` holds the byte preceding the window followed by the window itself,
/// unless the window covers the whole file.
fn decode_tail(buf: &[u8], whole_file: bool) -> String {
    let body = if whole_file {
        buf
    } else {
        let (preceding, window) = buf.split_first().map_or((None, buf), |(b, rest)| (Some(*b), rest));
        let window = align_to_char_boundary(window);
        if preceding == Some(b'\n') {
            window
        } else {
            match window.iter().position(|&b| b == b'\n') {
                Some(newline) => &window[newline + 1..],
                None => &[],
            }
        }
    };

    match std::str::from_utf8(body) {
        Ok(text) => text.to_string(),
        Err(_) => String::from_utf8_lossy(body).into_owned(),
    }
}

/// Skip UTF-8 continuation bytes left over from a cut multi-byte character.
fn align_to_char_boundary(bytes: &[u8]) -> &[u8] {
    let skip = bytes
        .iter()
        .take(3)
        .take_while(|&&b| b & 0b1100_0000 == 0b1000_0000)
        .count();
    &bytes[skip..]
}

fn format_record(user: &str, assistant: &str) -> String {
    format!(
        "{USER_TAG}{}\n{ASSISTANT_TAG}{}\n\n",
        escape_line(user),
        escape_line(assistant)
    )
}

fn parse_records(text: &str) -> Vec<Turn> {
    // A final line without its newline was cut mid-write.
    let complete = match text.rfind('\n') {
        Some(idx) => &text[..=idx],
        None => "",
    };

    let mut turns = Vec::new();
    let mut pending_user: Option<String> = None;
    let mut lines = complete.lines().map(str::trim).peekable();
    while let Some(line) = lines.next() {
        if let Some(content) = line.strip_prefix(USER_TAG.trim_end()) {
            pending_user = Some(unescape_line(content.trim()));
        } else if let Some(content) = line.strip_prefix(ASSISTANT_TAG.trim_end()) {
            let answer = unescape_line(content.trim());
            // An answer must be followed by the separator or the end of file;
            // anything else means the line was cut and later continued.
            let closed = lines.peek().is_none_or(|next| next.is_empty());
            if let Some(question) = pending_user.take()
                && closed
                && !question.is_empty()
                && !answer.is_empty()
            {
                turns.push(Turn::user(question));
                turns.push(Turn::assistant(answer));
            }
        }
    }
    turns
}

fn escape_line(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out
}

fn unescape_line(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_append_writes_two_tagged_lines_and_separator() {
        let dir = tempdir().unwrap();
        let log = HistoryLog::new(dir.path().join("history.txt"));

        log.append("what's the weather", "Sunny, 25C").unwrap();

        let content = fs::read_to_string(log.path()).unwrap();
        assert_eq!(content, "[User] what's the weather\n[Assistant] Sunny, 25C\n\n");
    }

    #[test]
    fn test_read_turns_pairs_records() {
        let dir = tempdir().unwrap();
        let log = HistoryLog::new(dir.path().join("history.txt"));
        log.ensure_exists().unwrap();
        log.append("q1", "a1").unwrap();
        log.append("q2", "a2").unwrap();

        let turns = log.read_turns().unwrap();
        assert_eq!(
            turns,
            vec![
                Turn::user("q1"),
                Turn::assistant("a1"),
                Turn::user("q2"),
                Turn::assistant("a2"),
            ]
        );
    }

    #[test]
    fn test_multiline_messages_survive_round_trip() {
        let dir = tempdir().unwrap();
        let log = HistoryLog::new(dir.path().join("history.txt"));
        log.append("line one\nline two", "path C:\\temp\\n is literal").unwrap();

        let turns = log.read_turns().unwrap();
        assert_eq!(turns[0].content, "line one\nline two");
        assert_eq!(turns[1].content, "path C:\\temp\\n is literal");
        assert_eq!(fs::read_to_string(log.path()).unwrap().lines().count(), 3);
    }

    #[test]
    fn test_read_turns_discards_unpaired_and_truncated_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.txt");
        fs::write(
            &path,
            "# Group chat history\n\n\
             [Assistant] orphan answer\n\n\
             [User] q1\n[Assistant] a1\n\n\
             [User] q2\n[Assistant] cut mid-wr",
        )
        .unwrap();

        let turns = HistoryLog::new(&path).read_turns().unwrap();
        assert_eq!(turns, vec![Turn::user("q1"), Turn::assistant("a1")]);
    }

    #[test]
    fn test_append_after_truncated_line_keeps_new_record() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.txt");
        fs::write(
            &path,
            "# Group chat history\n\n[User] q1\n[Assistant] cut mid-wr",
        )
        .unwrap();

        let log = HistoryLog::new(&path);
        log.append("q2", "a2").unwrap();

        let turns = log.read_turns().unwrap();
        assert_eq!(turns, vec![Turn::user("q2"), Turn::assistant("a2")]);
        assert!(
            fs::read_to_string(&path)
                .unwrap()
                .ends_with("cut mid-wr\n[User] q2\n[Assistant] a2\n\n")
        );
    }

    #[test]
    fn test_append_after_missing_separator_keeps_both_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.txt");
        fs::write(&path, "# Group chat history\n\n[User] q1\n[Assistant] a1\n").unwrap();

        let log = HistoryLog::new(&path);
        log.append("q2", "a2").unwrap();

        assert_eq!(
            log.read_turns().unwrap(),
            vec![
                Turn::user("q1"),
                Turn::assistant("a1"),
                Turn::user("q2"),
                Turn::assistant("a2"),
            ]
        );
    }

    #[test]
    fn test_read_turns_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let log = HistoryLog::new(dir.path().join("none.txt"));
        assert!(log.read_turns().unwrap().is_empty());
    }

    #[test]
    fn test_ensure_exists_and_reset_write_header() {
        let dir = tempdir().unwrap();
        let log = HistoryLog::new(dir.path().join("history.txt"));

        assert!(log.ensure_exists().unwrap());
        assert!(!log.ensure_exists().unwrap());
        log.append("q", "a").unwrap();
        log.reset().unwrap();
        assert_eq!(fs::read_to_string(log.path()).unwrap(), HISTORY_HEADER);
    }

    #[test]
    fn test_no_rotation_below_hard_cap() {
        let dir = tempdir().unwrap();
        let log = HistoryLog::new(dir.path().join("history.txt")).with_caps(4096, 1024);
        log.append("q", "a").unwrap();
        assert!(!log.rotate_if_needed().unwrap());
    }

    #[test]
    fn test_rotation_keeps_trailing_window_under_soft_cap() {
        let dir = tempdir().unwrap();
        let log = HistoryLog::new(dir.path().join("history.txt")).with_caps(2048, 1024);
        log.ensure_exists().unwrap();
        let mut n = 0;
        while fs::metadata(log.path()).unwrap().len() <= 2048 {
            log.append(&format!("question {n}"), &format!("answer {n}")).unwrap();
            n += 1;
        }

        log.append("newest question", "newest answer").unwrap();

        let content = fs::read_to_string(log.path()).unwrap();
        let record = format_record("newest question", "newest answer");
        assert!(content.starts_with(ROTATION_MARKER));
        assert!(content.len() as u64 <= 1024 + record.len() as u64);
        assert!(content.ends_with(&record));

        // Only whole records survive the cut.
        let turns = log.read_turns().unwrap();
        assert_eq!(turns.len() % 2, 0);
        assert_eq!(turns.last().unwrap().content, "newest answer");
        assert_eq!(turns[turns.len() - 2].content, "newest question");
    }

    #[test]
    fn test_rotation_tolerates_cut_multibyte_characters() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.txt");
        // Multi-byte content makes a byte-offset cut very likely to land
        // inside a character.
        let mut content = String::new();
        for i in 0..200 {
            content.push_str(&format_record(&format!("天气怎么样 {i}"), "晴天，二十五度 ☀️"));
        }
        fs::write(&path, &content).unwrap();
        let size = content.len() as u64;

        for soft in [301u64, 302, 303, 517, 1000] {
            fs::write(&path, &content).unwrap();
            let log = HistoryLog::new(&path).with_caps(size - 1, soft);
            assert!(log.rotate_if_needed().unwrap());

            let rotated = fs::read_to_string(&path).unwrap();
            assert!(rotated.starts_with(ROTATION_MARKER));
            assert!(rotated.len() as u64 <= soft);
            let turns = log.read_turns().unwrap();
            assert!(turns.iter().all(|t| !t.content.contains('\u{FFFD}')));
            assert_eq!(turns.len() % 2, 0);
        }
    }

    #[test]
    fn test_decode_tail_keeps_window_that_starts_on_line_boundary() {
        let buf = b"\n[User] q\n[Assistant] a\n\n";
        assert_eq!(decode_tail(buf, false), "[User] q\n[Assistant] a\n\n");
    }

    #[test]
    fn test_decode_tail_drops_partial_first_line() {
        let buf = b"xer] q0\n[User] q\n[Assistant] a\n\n";
        assert_eq!(decode_tail(buf, false), "[User] q\n[Assistant] a\n\n");
    }

    #[test]
    fn test_align_to_char_boundary_skips_continuation_bytes() {
        let text = "é!".as_bytes();
        assert_eq!(align_to_char_boundary(&text[1..]), b"!");
        assert_eq!(align_to_char_boundary(b"abc"), b"abc");
    }

    #[test]
    fn test_unescape_inverts_escape() {
        for sample in ["plain", "a\nb", "back\\slash", "\\n literal", "trailing\\", "cr\r\n"] {
            assert_eq!(unescape_line(&escape_line(sample)), sample);
        }
    }
}
