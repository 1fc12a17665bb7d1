//! Line-oriented shell feeding commands to the monitor

use crate::command::{tokenize, VERB};
use crate::error::Result;
use crate::monitor::Monitor;
use std::io::{BufRead, Write};

/// What the shell should do after a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Handle a single shell line
pub fn handle_line(monitor: &mut Monitor<'_>, line: &str) -> Flow {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Flow::Continue;
    }
    let tokens = tokenize(line);
    match tokens[0].as_str() {
        "exit" | "quit" => Flow::Exit,
        VERB => {
            monitor.execute(line);
            Flow::Continue
        }
        other => {
            monitor.error(&format!("unknown command: {}", other));
            Flow::Continue
        }
    }
}

/// Read commands from `input` until end of input or `exit`.
///
/// When a prompt is given it is written to `prompt_out` before each line.
pub fn run<R: BufRead, W: Write>(
    monitor: &mut Monitor<'_>,
    mut input: R,
    mut prompt: Option<(&str, W)>,
) -> Result<()> {
    let mut line = String::new();
    loop {
        if let Some((text, out)) = prompt.as_mut() {
            write!(out, "{}", text)?;
            out.flush()?;
        }
        line.clear();
        if input.read_line(&mut line)? == 0 {
            return Ok(());
        }
        if handle_line(monitor, &line) == Flow::Exit {
            return Ok(());
        }
    }
}
