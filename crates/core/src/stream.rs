//! Terminal output transcoding
//!
//! Commands run inside a workspace (package installers in particular) write
//! progress bars that redraw a single terminal line with carriage returns and
//! decorate text with ANSI escape codes. [`StreamTranscoder`] turns such a raw byte
//! stream into clean, de-duplicated log lines:
//!
//! - `\r` not followed by `\n` abandons the line being built (terminal overwrite)
//! - `\n` (or `\r\n`) finalizes the line; it is ANSI-stripped and trimmed, and
//!   emitted only if non-empty and different from the previously emitted line
//! - a final partial line is flushed by [`StreamTranscoder::finish`] with the same rule
//!
//! Input is decoded as UTF-8 leniently: invalid bytes are dropped, and a multi-byte
//! sequence split across two chunks is reassembled.

use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;

/// `ESC` followed by a single Fe byte, or a CSI sequence (`ESC [` params intermediates final)
static ANSI_ESCAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\x1B(?:[@-Z\\-_]|\[[0-?]*[ -/]*[@-~])").expect("Valid regex pattern")
});

/// Destination for transcoded lines
pub trait LineSink {
    /// Receive one cleaned, non-empty line
    fn emit(&mut self, line: &str);
}

impl LineSink for Vec<String> {
    fn emit(&mut self, line: &str) {
        self.push(line.to_string());
    }
}

/// Remove ANSI escape sequences; anything outside the escape grammar is left as text
pub fn strip_ansi(text: &str) -> Cow<'_, str> {
    ANSI_ESCAPE.replace_all(text, "")
}

/// Clean one line of image build output: trailing whitespace removed, blank lines dropped
pub fn clean_build_line(line: &str) -> Option<&str> {
    let trimmed = line.trim_end();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

/// One-pass streaming transcoder holding a single line buffer
#[derive(Debug, Default)]
pub struct StreamTranscoder {
    current: String,
    last_emitted: Option<String>,
    pending_cr: bool,
    partial: Vec<u8>,
}

impl StreamTranscoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume the next chunk of raw output
    pub fn feed(&mut self, bytes: &[u8], sink: &mut dyn LineSink) {
        self.partial.extend_from_slice(bytes);
        let pending = std::mem::take(&mut self.partial);
        let mut rest: &[u8] = &pending;

        loop {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    self.push_text(text, sink);
                    break;
                }
                Err(err) => {
                    let (valid, after) = rest.split_at(err.valid_up_to());
                    if let Ok(text) = std::str::from_utf8(valid) {
                        self.push_text(text, sink);
                    }
                    match err.error_len() {
                        // invalid sequence: drop it and keep decoding
                        Some(len) => rest = &after[len..],
                        // incomplete sequence at the end of the chunk
                        None => {
                            self.partial = after.to_vec();
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Flush the final partial line at end of stream
    pub fn finish(mut self, sink: &mut dyn LineSink) {
        if self.pending_cr {
            self.current.clear();
        }
        self.flush_line(sink);
    }

    /// Last line handed to the sink, if any
    pub fn last_emitted(&self) -> Option<&str> {
        self.last_emitted.as_deref()
    }

    fn push_text(&mut self, text: &str, sink: &mut dyn LineSink) {
        for ch in text.chars() {
            self.push_char(ch, sink);
        }
    }

    fn push_char(&mut self, ch: char, sink: &mut dyn LineSink) {
        if self.pending_cr {
            self.pending_cr = false;
            if ch == '\n' {
                self.flush_line(sink);
                return;
            }
            self.current.clear();
        }

        match ch {
            '\r' => self.pending_cr = true,
            '\n' => self.flush_line(sink),
            _ => self.current.push(ch),
        }
    }

    fn flush_line(&mut self, sink: &mut dyn LineSink) {
        let cleaned = strip_ansi(&self.current).trim().to_string();
        self.current.clear();

        if cleaned.is_empty() || self.last_emitted.as_deref() == Some(cleaned.as_str()) {
            return;
        }

        sink.emit(&cleaned);
        self.last_emitted = Some(cleaned);
    }
}

/// Transcode a complete buffer in one call
pub fn transcode(bytes: &[u8]) -> Vec<String> {
    let mut lines = Vec::new();
    let mut transcoder = StreamTranscoder::new();
    transcoder.feed(bytes, &mut lines);
    transcoder.finish(&mut lines);
    lines
}
