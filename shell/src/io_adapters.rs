use crate::parser::RedirectKind;
use std::cell::RefCell;
use std::fs::OpenOptions;
use std::io::{self, BufRead, BufReader, BufWriter, Cursor, Read, Result as IoResult, Write};
use std::path::Path;
use std::rc::Rc;

/// Memory-backed reader, used to feed captured output into the right side of a pipe.
pub struct MemReader {
    cursor: Cursor<Vec<u8>>,
}

impl MemReader {
    /// Create a MemReader that will read from the provided buffer.
    pub fn new(buf: Vec<u8>) -> Self {
        Self {
            cursor: Cursor::new(buf),
        }
    }
}

impl Read for MemReader {
    fn read(&mut self, out: &mut [u8]) -> IoResult<usize> {
        self.cursor.read(out)
    }
}

impl BufRead for MemReader {
    fn fill_buf(&mut self) -> IoResult<&[u8]> {
        self.cursor.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.cursor.consume(amt)
    }
}

/// Memory-backed writer for capturing the output of a command.
///
/// The buffer is shared, so the caller keeps a handle while the writer itself is
/// moved into the session as the current sink.
#[derive(Default)]
pub struct MemWriter {
    buf: Rc<RefCell<Vec<u8>>>,
}

impl MemWriter {
    /// Public constructor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience: create writer and return (writer, rc_handle).
    pub fn with_handle() -> (Self, Rc<RefCell<Vec<u8>>>) {
        let mw = MemWriter::new();
        let rc = mw.buf.clone();
        (mw, rc)
    }
}

impl Write for MemWriter {
    fn write(&mut self, data: &[u8]) -> IoResult<usize> {
        self.buf.borrow_mut().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> IoResult<()> {
        Ok(())
    }
}

/// Open `path` as an output sink for `>` (truncate) or `>>` (append), creating it if needed.
pub fn file_sink(path: &Path, kind: RedirectKind) -> IoResult<Box<dyn Write>> {
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .append(kind == RedirectKind::Append)
        .truncate(kind == RedirectKind::Overwrite)
        .open(path)?;
    Ok(Box::new(BufWriter::new(file)))
}

/// Strategy used by commands that need a yes/no answer from the user (`mv` overwrites).
pub trait Confirm {
    /// Ask `question`; `true` means the user agreed.
    fn confirm(&mut self, question: &str) -> bool;
}

impl<F: FnMut(&str) -> bool> Confirm for F {
    fn confirm(&mut self, question: &str) -> bool {
        self(question)
    }
}

/// Asks on the real terminal, independent of where the current sink points.
///
/// Any answer starting with `y` or `Y` is a yes. End of input counts as no.
pub struct TerminalConfirm;

impl Confirm for TerminalConfirm {
    fn confirm(&mut self, question: &str) -> bool {
        let mut out = io::stdout();
        if let Err(e) = write!(out, "{question}").and_then(|_| out.flush()) {
            tracing::warn!("failed to show confirmation prompt: {e}");
        }

        let mut answer = String::new();
        match io::stdin().read_line(&mut answer) {
            Ok(_) => is_yes(&answer),
            Err(e) => {
                tracing::warn!("failed to read confirmation: {e}");
                false
            }
        }
    }
}

/// `true` for answers like `y`, `Yes`, `yep`.
pub fn is_yes(answer: &str) -> bool {
    answer.trim_start().to_lowercase().starts_with('y')
}

/// The streams a command runs against.
///
/// `stdout` is the current output sink. Only the interpreter swaps it (for `>`, `>>`
/// and `|`), and it always puts the previous one back.
pub struct Streams {
    pub stdin: Box<dyn BufRead>,
    pub stdout: Box<dyn Write>,
    pub stderr: Box<dyn Write>,
    pub confirm: Box<dyn Confirm>,
}

impl Streams {
    /// Streams bound to the process terminal.
    pub fn terminal() -> Self {
        Self {
            stdin: Box::new(BufReader::new(io::stdin())),
            stdout: Box::new(io::stdout()),
            stderr: Box::new(io::stderr()),
            confirm: Box::new(TerminalConfirm),
        }
    }

    /// Fully in-memory streams: empty input, captured output and errors, and a
    /// fixed answer to every confirmation. Returns the output and error handles.
    pub fn captured(answer: bool) -> (Self, Rc<RefCell<Vec<u8>>>, Rc<RefCell<Vec<u8>>>) {
        let (out, out_rc) = MemWriter::with_handle();
        let (err, err_rc) = MemWriter::with_handle();
        let streams = Self {
            stdin: Box::new(MemReader::new(Vec::new())),
            stdout: Box::new(out),
            stderr: Box::new(err),
            confirm: Box::new(move |_: &str| answer),
        };
        (streams, out_rc, err_rc)
    }
}
