//! Status event sink.
//!
//! The pipelines never talk to a terminal directly; they emit events into a
//! [`StatusSink`] and a renderer decides what to do with them. Batch runs use
//! [`NullStatus`]; the normal CLI uses [`ConsoleStatus`], a plain stderr
//! renderer. A full-screen panel can implement the same trait without the
//! core knowing.

use std::time::{Duration, Instant};

/// Consumer of operator-facing progress events.
pub trait StatusSink {
    /// A complete log line, without trailing newline.
    fn log(&mut self, line: &str);

    /// Ring fill level as an integer percentage. Invoked only when the
    /// integer value changes.
    fn set_buffer_percent(&mut self, pct: u8);

    /// Cumulative byte totals plus the live volume's fill percentage.
    /// Invoked at most once per wall-clock second.
    fn set_totals(&mut self, in_bytes: u64, out_bytes: u64, buffered: u64, volume_pct: u8);

    /// Emphasis hint for subsequent log lines (operator action wanted).
    fn set_log_emphasis(&mut self, emphatic: bool);

    /// Called once per loop iteration; renderers repaint here.
    fn refresh(&mut self);
}

/// Discards every event.
#[derive(Debug)]
pub struct NullStatus;

impl StatusSink for NullStatus {
    fn log(&mut self, _line: &str) {}
    fn set_buffer_percent(&mut self, _pct: u8) {}
    fn set_totals(&mut self, _in_bytes: u64, _out_bytes: u64, _buffered: u64, _volume_pct: u8) {}
    fn set_log_emphasis(&mut self, _emphatic: bool) {}
    fn refresh(&mut self) {}
}

/// Plain renderer writing log lines to standard error.
///
/// Totals are shown only in verbose mode; the buffer gauge and emphasis
/// hints have no plain-text rendering.
pub struct ConsoleStatus {
    verbose: bool,
}

impl ConsoleStatus {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl StatusSink for ConsoleStatus {
    fn log(&mut self, line: &str) {
        eprintln!("{line}");
    }

    fn set_buffer_percent(&mut self, _pct: u8) {}

    fn set_totals(&mut self, in_bytes: u64, out_bytes: u64, buffered: u64, volume_pct: u8) {
        if self.verbose {
            eprintln!(
                "input: {} MB   output: {} MB   buffered: {} KB   volume done: {volume_pct}%",
                in_bytes / 1_000_000,
                out_bytes / 1_000_000,
                buffered / 1024,
            );
        }
    }

    fn set_log_emphasis(&mut self, _emphatic: bool) {}

    fn refresh(&mut self) {}
}

/// Rate limiter for the two throttled event kinds.
///
/// The pipelines funnel every update through this so sinks see buffer
/// percentages only on integer change and totals at most once per second.
#[derive(Debug)]
pub struct StatusThrottle {
    last_pct: Option<u8>,
    last_totals: Option<Instant>,
}

impl StatusThrottle {
    pub fn new() -> Self {
        Self {
            last_pct: None,
            last_totals: None,
        }
    }

    /// True when `pct` differs from the last forwarded percentage.
    pub fn buffer_percent_changed(&mut self, pct: u8) -> bool {
        if self.last_pct == Some(pct) {
            return false;
        }
        self.last_pct = Some(pct);
        true
    }

    /// True at most once per wall-clock second.
    pub fn totals_due(&mut self, now: Instant) -> bool {
        match self.last_totals {
            Some(last) if now.duration_since(last) < Duration::from_secs(1) => false,
            _ => {
                self.last_totals = Some(now);
                true
            }
        }
    }
}

impl Default for StatusThrottle {
    fn default() -> Self {
        Self::new()
    }
}

/// Splits raw child diagnostic bytes into whole log lines.
///
/// The writer command's stdout and stderr arrive as arbitrary chunks; lines
/// are forwarded as they complete and a trailing fragment is flushed when
/// the child goes away.
#[derive(Debug)]
pub struct DiagLineBuffer {
    pending: Vec<u8>,
}

impl DiagLineBuffer {
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
        }
    }

    /// Appends a chunk, emitting every completed line.
    pub fn push(&mut self, chunk: &[u8], mut emit: impl FnMut(&str)) {
        self.pending.extend_from_slice(chunk);
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line[..line.len() - 1]);
            emit(text.trim_end_matches('\r'));
        }
    }

    /// Emits any unterminated trailing fragment.
    pub fn flush(&mut self, mut emit: impl FnMut(&str)) {
        if !self.pending.is_empty() {
            let text = String::from_utf8_lossy(&self.pending).into_owned();
            emit(&text);
            self.pending.clear();
        }
    }
}

impl Default for DiagLineBuffer {
    fn default() -> Self {
        Self::new()
    }
}
