use std::env as stdenv;
use std::path::{Component, Path, PathBuf};

/// Mutable, session-level state shared by every command.
///
/// The environment contains:
/// - `current_dir`: the directory relative paths are resolved against. The process
///   working directory is never changed; `cd` only updates this field.
/// - `home`: where a bare `cd` goes, if known.
/// - `should_exit`: a flag that the interactive loop checks after every line.
#[derive(Debug, Clone)]
pub struct Environment {
    /// The current working directory of the session.
    pub current_dir: PathBuf,
    /// Home directory, taken from `HOME` at start-up.
    pub home: Option<PathBuf>,
    /// Set by `exit`; the loop terminates once it observes it.
    pub should_exit: bool,
}

impl Environment {
    /// Capture the current process state into a new `Environment` instance.
    pub fn new() -> Self {
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            current_dir,
            home: stdenv::var_os("HOME").map(PathBuf::from),
            should_exit: false,
        }
    }

    /// Environment rooted at `dir`, with no home directory.
    pub fn at(dir: impl Into<PathBuf>) -> Self {
        Self {
            current_dir: dir.into(),
            home: None,
            should_exit: false,
        }
    }

    /// Resolve a user-supplied path against the current directory.
    ///
    /// Absolute paths are returned unchanged.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.current_dir.join(path)
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

/// Lexically normalize a path: drop `.` components and let `..` pop the previous one.
///
/// The filesystem is not consulted, so symlinks are not resolved. A `..` that would
/// climb above the root is ignored.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other),
        }
    }
    out
}
