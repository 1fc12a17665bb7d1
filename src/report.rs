//! User-facing output of monitor commands

use std::fmt;
use std::io::{self, Write};
use tracing::warn;

/// Severity of a reported message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// Normal status output
    Notice,
    /// Misconfiguration or an unresolved node name
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Notice => write!(f, "NOTICE"),
            Level::Error => write!(f, "ERROR"),
        }
    }
}

/// Sink for messages produced while monitoring
pub trait Reporter {
    fn report(&mut self, level: Level, message: &str);
}

/// Status line for one probe: `Running: <what> <name>` or
/// `Not running: <what> <name>`.
pub fn status_line(running: bool, what: &str, name: Option<&str>) -> String {
    let state = if running { "Running" } else { "Not running" };
    match name {
        Some(name) => format!("{}: {} {}", state, what, name),
        None => format!("{}: {}", state, what),
    }
}

/// Writes each message as one line, errors and notices on the same stream
pub struct ConsoleReporter<W: Write> {
    out: W,
}

impl ConsoleReporter<io::Stdout> {
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write> ConsoleReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Reporter for ConsoleReporter<W> {
    fn report(&mut self, _level: Level, message: &str) {
        if let Err(e) = writeln!(self.out, "{}", message).and_then(|_| self.out.flush()) {
            warn!("Failed to write monitor output: {}", e);
        }
    }
}

/// Keeps reported messages in memory
#[derive(Debug, Default)]
pub struct MemoryReporter {
    entries: Vec<(Level, String)>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[(Level, String)] {
        &self.entries
    }

    pub fn lines(&self) -> Vec<&str> {
        self.entries.iter().map(|(_, m)| m.as_str()).collect()
    }

    pub fn count(&self, level: Level) -> usize {
        self.entries.iter().filter(|(l, _)| *l == level).count()
    }

    /// Everything reported so far, one message per line
    pub fn output(&self) -> String {
        let mut out = String::new();
        for (_, message) in &self.entries {
            out.push_str(message);
            out.push('\n');
        }
        out
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Reporter for MemoryReporter {
    fn report(&mut self, level: Level, message: &str) {
        self.entries.push((level, message.to_string()));
    }
}
