//! Abstracts where `print` and the REPL's expression echo write to (§4.3,
//! §6), so the evaluator's observable side effects (§1) can be asserted on
//! in tests without capturing real process stdout. Grounded in
//! `ouros/crates/ouros/src/io.rs`'s `PrintWriter`/`StdPrint`/
//! `CollectStringPrint`/`NoPrint` family — the same shape, renamed to this
//! crate's vocabulary.

use std::cell::RefCell;

/// A destination for lines the running program writes. Each call writes
/// one already-newline-terminated line; callers pass text without the
/// trailing `\n`.
pub trait PrintSink {
    fn write_line(&self, line: &str);
}

/// Writes to the real process standard output. Used by the `lox` binary.
#[derive(Default)]
pub struct StdOut;

impl PrintSink for StdOut {
    fn write_line(&self, line: &str) {
        println!("{line}");
    }
}

/// Buffers every line into a `String`, newline-joined. Used by tests that
/// assert on a program's full transcript.
#[derive(Default)]
pub struct CollectOutput {
    buffer: RefCell<String>,
}

impl CollectOutput {
    pub fn new() -> Self {
        CollectOutput::default()
    }

    pub fn contents(&self) -> String {
        self.buffer.borrow().clone()
    }
}

impl PrintSink for CollectOutput {
    fn write_line(&self, line: &str) {
        let mut buf = self.buffer.borrow_mut();
        buf.push_str(line);
        buf.push('\n');
    }
}

/// Discards everything. Useful when only the return value of a driver call
/// matters, not its printed output.
#[derive(Default)]
pub struct NoOutput;

impl PrintSink for NoOutput {
    fn write_line(&self, _line: &str) {}
}

/// Where `read()`/`readline()` (§6) pull from. The counterpart to
/// [`PrintSink`] on the input side, so tests can feed a program's stdin
/// without touching the real process stream.
pub trait InputSource {
    /// A single whitespace-delimited token, for the `read()` native.
    /// Returns `None` at end-of-input.
    fn read_token(&self) -> Option<String>;
    /// A full line (no trailing newline), for `readline()`. Returns `None`
    /// at end-of-input.
    fn read_line(&self) -> Option<String>;
}

/// Reads synchronously from the real process standard input.
#[derive(Default)]
pub struct StdIn {
    pending: RefCell<std::collections::VecDeque<String>>,
}

impl InputSource for StdIn {
    fn read_token(&self) -> Option<String> {
        loop {
            if let Some(tok) = self.pending.borrow_mut().pop_front() {
                return Some(tok);
            }
            let mut line = String::new();
            if std::io::stdin().read_line(&mut line).unwrap_or(0) == 0 {
                return None;
            }
            let mut pending = self.pending.borrow_mut();
            pending.extend(line.split_whitespace().map(str::to_string));
        }
    }

    fn read_line(&self) -> Option<String> {
        self.pending.borrow_mut().clear();
        let mut line = String::new();
        if std::io::stdin().read_line(&mut line).unwrap_or(0) == 0 {
            return None;
        }
        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }
        Some(line)
    }
}

/// Feeds pre-scripted input, for tests.
#[derive(Default)]
pub struct FixedInput {
    lines: RefCell<std::collections::VecDeque<String>>,
}

impl FixedInput {
    pub fn new(lines: impl IntoIterator<Item = impl Into<String>>) -> Self {
        FixedInput {
            lines: RefCell::new(lines.into_iter().map(Into::into).collect()),
        }
    }
}

impl InputSource for FixedInput {
    fn read_token(&self) -> Option<String> {
        loop {
            let mut lines = self.lines.borrow_mut();
            let front = lines.front_mut()?;
            let trimmed = front.trim_start();
            match trimmed.find(char::is_whitespace) {
                Some(boundary) => {
                    let (tok, rest) = trimmed.split_at(boundary);
                    let tok = tok.to_string();
                    *front = rest.to_string();
                    return Some(tok);
                }
                None if !trimmed.is_empty() => {
                    let tok = trimmed.to_string();
                    *front = String::new();
                    return Some(tok);
                }
                None => {
                    lines.pop_front();
                }
            }
        }
    }

    fn read_line(&self) -> Option<String> {
        self.lines.borrow_mut().pop_front()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn collect_output_joins_with_newlines() {
        let sink = CollectOutput::new();
        sink.write_line("1");
        sink.write_line("2");
        assert_eq!(sink.contents(), "1\n2\n");
    }

    #[test]
    fn no_output_discards_everything() {
        let sink = NoOutput;
        sink.write_line("ignored");
    }

    #[test]
    fn fixed_input_read_token_splits_on_whitespace_across_lines() {
        let input = FixedInput::new(vec!["42  rest", "last"]);
        assert_eq!(input.read_token().as_deref(), Some("42"));
        assert_eq!(input.read_token().as_deref(), Some("rest"));
        assert_eq!(input.read_token().as_deref(), Some("last"));
        assert_eq!(input.read_token(), None);
    }

    #[test]
    fn fixed_input_read_line_returns_whole_lines() {
        let input = FixedInput::new(vec!["hello world", "second"]);
        assert_eq!(input.read_line().as_deref(), Some("hello world"));
        assert_eq!(input.read_line().as_deref(), Some("second"));
        assert_eq!(input.read_line(), None);
    }
}
