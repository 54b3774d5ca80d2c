use crate::env::Environment;
use crate::io_adapters::Streams;
use anyhow::Result;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
pub type ExitCode = i32;

/// Object-safe trait for any command that can be executed by the shell.
///
/// Built-ins get it through a blanket impl; anything else that wants to sit in the
/// verb table can implement it directly.
pub trait ExecutableCommand {
    /// Executes the command against the session streams and environment.
    ///
    /// Output goes to `io.stdout`, which may be the terminal, a file or a capture
    /// buffer; the command cannot tell which.
    fn execute(self: Box<Self>, io: &mut Streams, env: &mut Environment) -> Result<ExitCode>;
}

/// Builds a ready-to-run command from its token sequence.
///
/// Factories are stored in the verb table keyed by verb name.
pub trait CommandFactory {
    /// Create a command for `tokens`, where `tokens[0]` is the verb.
    fn create(&self, tokens: &[&str]) -> Box<dyn ExecutableCommand>;
}
