//! A small interactive file-system shell.
//!
//! The shell understands a fixed set of verbs (`ls`, `cd`, `pwd`, `mkdir`, `rmdir`,
//! `touch`, `rm`, `mv`, `cat`, `help`, `exit`) and two ways of composing them:
//! output redirection (`>`, `>>`) and a single pipe into `cat` (`|`).
//!
//! The main entry point is [`Interpreter`], which owns the session state: the
//! [`Environment`] (working directory, exit flag) and the [`Streams`] every command
//! writes to. Redirections and pipes swap the output stream for the duration of one
//! sub-command and always put the previous one back.

mod builtin;
pub mod command;
pub mod env;
mod interpreter;
pub mod io_adapters;
pub mod parser;

pub use env::Environment;
pub use interpreter::Interpreter;
pub use io_adapters::{Confirm, MemReader, MemWriter, Streams};
