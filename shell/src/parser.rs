//! Recognition of the composition operators and tokenization of simple commands.
//!
//! Operators are found on the raw text, before any splitting into words: a line that
//! contains `|` is a pipe, otherwise a line that contains `>` is a redirection,
//! otherwise it is a simple command. There is no quoting, so `|` and `>` can never
//! appear inside an argument.

use std::fmt;

/// How the redirection target is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectKind {
    /// `>`: truncate the file before writing.
    Overwrite,
    /// `>>`: keep existing contents and write at the end.
    Append,
}

impl RedirectKind {
    fn operator(self) -> &'static str {
        match self {
            RedirectKind::Overwrite => ">",
            RedirectKind::Append => ">>",
        }
    }
}

impl fmt::Display for RedirectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.operator())
    }
}

/// A command line after operator recognition.
#[derive(Debug, PartialEq, Eq)]
pub enum Line<'a> {
    /// Nothing but whitespace.
    Empty,
    /// No operators; goes straight to the dispatcher.
    Simple(&'a str),
    /// `left | right`, both trimmed and non-empty.
    Pipe { left: &'a str, right: &'a str },
    /// `command > target` or `command >> target`, both trimmed and non-empty.
    Redirect {
        command: &'a str,
        target: &'a str,
        kind: RedirectKind,
    },
}

/// Malformed operator usage.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("Invalid pipe command. Use format: command1 | command2")]
    InvalidPipe,
    #[error("Invalid redirect command. Use format: command {0} file")]
    InvalidRedirect(RedirectKind),
}

/// Classify a raw command line.
///
/// A pipe takes precedence over a redirection, so `ls > f | cat` is a pipe whose
/// left side redirects.
pub fn parse_line(line: &str) -> Result<Line<'_>, ParseError> {
    let line = line.trim();
    if line.is_empty() {
        Ok(Line::Empty)
    } else if line.contains('|') {
        parse_pipe(line)
    } else if line.contains('>') {
        parse_redirect(line)
    } else {
        Ok(Line::Simple(line))
    }
}

fn parse_pipe(line: &str) -> Result<Line<'_>, ParseError> {
    let segments: Vec<&str> = line.split('|').map(str::trim).collect();
    match segments.as_slice() {
        &[left, right] if !left.is_empty() && !right.is_empty() => Ok(Line::Pipe { left, right }),
        _ => Err(ParseError::InvalidPipe),
    }
}

fn parse_redirect(line: &str) -> Result<Line<'_>, ParseError> {
    // `>>` must be looked for first, or `a >> f` would split on its first `>`.
    let kind = if line.contains(">>") {
        RedirectKind::Append
    } else {
        RedirectKind::Overwrite
    };

    let parts: Vec<&str> = line.split(kind.operator()).map(str::trim).collect();
    match parts.as_slice() {
        &[command, target]
            if !command.is_empty()
                && !target.is_empty()
                && !command.contains('>')
                && !target.contains('>') =>
        {
            Ok(Line::Redirect {
                command,
                target,
                kind,
            })
        }
        _ => Err(ParseError::InvalidRedirect(kind)),
    }
}

/// Split a simple command into its token sequence. The first token is the verb.
pub fn tokenize(line: &str) -> Vec<&str> {
    line.split_whitespace().collect()
}
