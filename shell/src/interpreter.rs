use crate::command::{CommandFactory, ExitCode};
use crate::env::Environment;
use crate::io_adapters::{MemReader, MemWriter, Streams, file_sink};
use crate::parser::{self, Line, RedirectKind};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::collections::HashMap;
use std::fmt;
use std::io::{BufRead, Write};
use std::mem;
use std::ops::{Deref, DerefMut};
use tracing::{debug, info, warn};

/// Factory allows creating instances of ExecutableCommand.
///
/// Only supports commands defined in this crate, i.e. `BuiltinCommand`.
pub(crate) struct Factory<T> {
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

/// The shell session: verb table, environment and the current streams.
///
/// Lines enter through [`Interpreter::execute_line`], which recognizes `|`, `>` and
/// `>>` before anything is tokenized, and ends in [`Interpreter::dispatch`] for each
/// simple command.
///
/// Example
/// ```
/// use fs_shell::{Environment, Interpreter, Streams};
/// let (io, out, _err) = Streams::captured(true);
/// let mut sh = Interpreter::new(Environment::at("/"), io);
/// sh.execute_line("pwd");
/// assert_eq!(out.borrow().as_slice(), b"/\n");
/// ```
pub struct Interpreter {
    env: Environment,
    io: Streams,
    commands: HashMap<&'static str, Box<dyn CommandFactory>>,
    last_status: ExitCode,
}

impl Interpreter {
    /// Create a session with the built-in verb table.
    pub fn new(env: Environment, io: Streams) -> Self {
        use crate::builtin::*;
        let mut sh = Self {
            env,
            io,
            commands: HashMap::new(),
            last_status: 0,
        };
        sh.builtin::<Exit>();
        sh.builtin::<Help>();
        sh.builtin::<Mkdir>();
        sh.builtin::<Rmdir>();
        sh.builtin::<Touch>();
        sh.builtin::<Rm>();
        sh.builtin::<Cat>();
        sh.builtin::<Mv>();
        sh.builtin::<Ls>();
        sh.builtin::<Pwd>();
        sh.builtin::<Cd>();
        sh
    }

    fn builtin<T: crate::builtin::BuiltinCommand + 'static>(&mut self) {
        self.register(T::name(), Box::new(Factory::<T>::default()));
    }

    /// Add or replace the handler for `verb`.
    pub fn register(&mut self, verb: &'static str, factory: Box<dyn CommandFactory>) {
        self.commands.insert(verb, factory);
    }

    /// `true` once `exit` has run.
    pub fn should_exit(&self) -> bool {
        self.env.should_exit
    }

    /// Status of the most recent line: the last command's exit code, or 1 if an
    /// error was reported by the shell itself.
    pub fn last_status(&self) -> ExitCode {
        self.last_status
    }

    /// Run one raw command line, handling pipes and redirections.
    pub fn execute_line(&mut self, line: &str) {
        self.last_status = 0;
        match parser::parse_line(line) {
            Ok(Line::Empty) => {}
            Ok(Line::Simple(command)) => self.dispatch(command),
            Ok(Line::Pipe { left, right }) => self.pipe(left, right),
            Ok(Line::Redirect {
                command,
                target,
                kind,
            }) => self.redirect(command, target, kind),
            Err(e) => self.report(e),
        }
    }

    /// Tokenize a simple command and run the handler registered for its verb.
    ///
    /// The line must not contain operators; they would be passed on as arguments.
    pub fn dispatch(&mut self, line: &str) {
        let tokens = parser::tokenize(line);
        let Some(&verb) = tokens.first() else {
            return;
        };

        let command = match self.commands.get(verb) {
            Some(factory) => factory.create(&tokens),
            None => {
                self.report(format_args!("Unknown command: {verb}"));
                return;
            }
        };

        debug!(verb, args = ?&tokens[1..], "dispatching");
        match command.execute(&mut self.io, &mut self.env) {
            Ok(code) => {
                debug!(verb, code, "command finished");
                self.last_status = code;
            }
            Err(e) => self.report(format_args!("{verb}: {e:#}")),
        }
    }

    /// `command > target` / `command >> target`.
    ///
    /// The target is opened before the command runs; if that fails the command is
    /// never executed.
    fn redirect(&mut self, command: &str, target: &str, kind: RedirectKind) {
        let path = self.env.resolve(target);
        let sink = match file_sink(&path, kind) {
            Ok(sink) => sink,
            Err(e) => {
                self.report(format_args!(
                    "Error with file redirection: Unable to write to {target}: {e}"
                ));
                return;
            }
        };

        info!(path = %path.display(), %kind, "redirecting output");
        let mut scoped = Scoped::new(self).stdout(sink);
        scoped.execute_line(command);
        if let Some(mut sink) = scoped.restore() {
            if let Err(e) = sink.flush() {
                self.report(format_args!(
                    "Error with file redirection: Unable to write to {target}: {e}"
                ));
                return;
            }
        }
        info!(path = %path.display(), "redirection completed");
    }

    /// `left | right`.
    ///
    /// Everything `left` prints is buffered first, then fed to `right` as its input.
    /// Only `cat` without arguments consumes piped input.
    fn pipe(&mut self, left: &str, right: &str) {
        let (capture, captured) = MemWriter::with_handle();
        {
            let mut scoped = Scoped::new(self).stdout(Box::new(capture));
            scoped.execute_line(left);
        }
        let input = mem::take(&mut *captured.borrow_mut());
        debug!(bytes = input.len(), "captured left side of pipe");

        if parser::tokenize(right) != ["cat"] {
            self.report(format_args!("Unknown command for piped input: {right}"));
            return;
        }

        let mut scoped = Scoped::new(self).stdin(Box::new(MemReader::new(input)));
        scoped.dispatch(right);
    }

    /// Print a shell-level error to the error sink.
    fn report(&mut self, message: impl fmt::Display) {
        self.last_status = 1;
        if let Err(e) = writeln!(self.io.stderr, "{message}") {
            warn!("failed to write to error sink: {e}");
        }
    }

    /// Read-Eval-Print Loop on the terminal until `exit` or end of input.
    pub fn repl(&mut self, prompt: &str) -> rustyline::Result<()> {
        let mut rl = DefaultEditor::new()?;

        while !self.should_exit() {
            match rl.readline(prompt) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        if let Err(e) = rl.add_history_entry(line.as_str()) {
                            warn!("failed to record history: {e}");
                        }
                    }
                    self.execute_line(&line);
                    if let Err(e) = self.io.stdout.flush() {
                        warn!("failed to flush output: {e}");
                    }
                }
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => break,
                Err(err) => self.report(format_args!("Error reading input: {err}")),
            }
        }

        Ok(())
    }
}

impl Default for Interpreter {
    /// A session on the process terminal, starting in the process working directory.
    fn default() -> Self {
        Self::new(Environment::new(), Streams::terminal())
    }
}

/// Streams substituted for the duration of a sub-command.
///
/// Whatever was replaced is put back when the value is dropped, so an early return
/// or a panic inside the sub-command cannot leave a file or buffer as the session's
/// sink.
struct Scoped<'a> {
    shell: &'a mut Interpreter,
    saved_stdout: Option<Box<dyn Write>>,
    saved_stdin: Option<Box<dyn BufRead>>,
}

impl<'a> Scoped<'a> {
    fn new(shell: &'a mut Interpreter) -> Self {
        Self {
            shell,
            saved_stdout: None,
            saved_stdin: None,
        }
    }

    fn stdout(mut self, sink: Box<dyn Write>) -> Self {
        debug_assert!(self.saved_stdout.is_none());
        self.saved_stdout = Some(mem::replace(&mut self.shell.io.stdout, sink));
        debug!("output sink substituted");
        self
    }

    fn stdin(mut self, input: Box<dyn BufRead>) -> Self {
        debug_assert!(self.saved_stdin.is_none());
        self.saved_stdin = Some(mem::replace(&mut self.shell.io.stdin, input));
        self
    }

    /// Put the originals back now and return the substituted output sink, if any.
    fn restore(mut self) -> Option<Box<dyn Write>> {
        self.put_back()
    }

    fn put_back(&mut self) -> Option<Box<dyn Write>> {
        if let Some(stdin) = self.saved_stdin.take() {
            self.shell.io.stdin = stdin;
        }
        let previous = self.saved_stdout.take()?;
        debug!("output sink restored");
        Some(mem::replace(&mut self.shell.io.stdout, previous))
    }
}

impl Deref for Scoped<'_> {
    type Target = Interpreter;

    fn deref(&self) -> &Interpreter {
        self.shell
    }
}

impl DerefMut for Scoped<'_> {
    fn deref_mut(&mut self) -> &mut Interpreter {
        self.shell
    }
}

impl Drop for Scoped<'_> {
    fn drop(&mut self) {
        if let Some(mut sink) = self.put_back() {
            if let Err(e) = sink.flush() {
                warn!("failed to flush substituted sink: {e}");
            }
        }
    }
}
