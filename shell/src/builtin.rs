use crate::command::{CommandFactory, ExecutableCommand, ExitCode};
use crate::env::{Environment, normalize};
use crate::interpreter::Factory;
use crate::io_adapters::Streams;
use anyhow::{Context, Result, anyhow, bail};
use argh::{EarlyExit, FromArgs};
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::time::SystemTime;

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed directly
/// in-process.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "ls" or "cd".
    fn name() -> &'static str;

    /// Executes the command using the session streams and environment.
    ///
    /// An `Err` is printed to the error sink by the caller, so messages should
    /// already carry the verb prefix.
    fn execute(self, io: &mut Streams, env: &mut Environment) -> Result<ExitCode>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(self: Box<Self>, io: &mut Streams, env: &mut Environment) -> Result<ExitCode> {
        match <T as BuiltinCommand>::execute(*self, io, env) {
            Ok(x) => Ok(x),
            Err(e) => {
                writeln!(io.stderr, "{e:#}")?;
                Ok(1)
            }
        }
    }
}

/// Result of argh refusing the arguments (or `--help`).
struct InvalidArgs {
    verb: &'static str,
    output: String,
    is_error: bool,
}

impl ExecutableCommand for InvalidArgs {
    fn execute(self: Box<Self>, io: &mut Streams, _env: &mut Environment) -> Result<ExitCode> {
        let output = self.output.trim_end();
        if self.is_error {
            writeln!(io.stderr, "{}: {}", self.verb, output)?;
            Ok(1)
        } else {
            writeln!(io.stdout, "{output}")?;
            Ok(0)
        }
    }
}

/// Put flags before a `--` and every other word after it.
///
/// Flags may appear anywhere on the line, while a word such as `help` always
/// reaches the handler as a path instead of being taken as a request for usage.
fn flags_first<'a>(args: &[&'a str]) -> Vec<&'a str> {
    let mut flags = Vec::new();
    let mut operands = Vec::new();
    let mut rest = args.iter().copied();
    for arg in rest.by_ref() {
        match arg {
            "--" => break,
            flag if flag.len() > 1 && flag.starts_with('-') => flags.push(flag),
            operand => operands.push(operand),
        }
    }
    operands.extend(rest);

    flags.push("--");
    flags.extend(operands);
    flags
}

impl<T: BuiltinCommand + 'static> CommandFactory for Factory<T> {
    fn create(&self, tokens: &[&str]) -> Box<dyn ExecutableCommand> {
        let args = flags_first(tokens.get(1..).unwrap_or_default());
        match T::from_args(&[T::name()], &args) {
            Ok(cmd) => Box::new(cmd),
            Err(EarlyExit { output, status }) => Box::new(InvalidArgs {
                verb: T::name(),
                output,
                is_error: status.is_err(),
            }),
        }
    }
}

const HELP_TEXT: &str = "\
Available commands:
  pwd                  Print current working directory
  cd [dir]             Change directory (home directory when omitted)
  ls [-a] [-r] [dir]   List directory contents (-a: include dotfiles, -r: reverse order)
  mkdir <dir>          Create a new directory
  rmdir <dir>          Remove an empty directory
  touch <file>         Create a new file or update its timestamp
  mv <src>... <dst>    Move or rename files
  rm <file>            Remove a file
  cat [file...]        Display file contents (echoes input when no file is given)
  exit                 Exit the shell
  help                 Show this help message
Operators:
  cmd > file           Redirect output to file (overwrite)
  cmd >> file          Redirect output to file (append)
  cmd | cat            Pipe the output of one command into another";

#[derive(FromArgs)]
/// show the available commands.
pub struct Help {}

impl BuiltinCommand for Help {
    fn name() -> &'static str {
        "help"
    }

    fn execute(self, io: &mut Streams, _env: &mut Environment) -> Result<ExitCode> {
        writeln!(io.stdout, "{HELP_TEXT}")?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// print the current working directory.
pub struct Pwd {}

impl BuiltinCommand for Pwd {
    fn name() -> &'static str {
        "pwd"
    }

    fn execute(self, io: &mut Streams, env: &mut Environment) -> Result<ExitCode> {
        writeln!(io.stdout, "{}", env.current_dir.display())?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// change the current working directory.
pub struct Cd {
    #[argh(positional)]
    /// directory to switch to; absolute or relative to the current directory. Defaults to the home directory when omitted. Only the first one is used.
    pub target: Vec<String>,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn execute(self, io: &mut Streams, env: &mut Environment) -> Result<ExitCode> {
        let new_dir = match self.target.first().map(String::as_str) {
            None => env.home.clone().ok_or_else(|| anyhow!("cd: missing argument"))?,
            Some("..") => match env.current_dir.parent() {
                Some(parent) => parent.to_path_buf(),
                None => env.current_dir.clone(),
            },
            Some(target) => normalize(&env.current_dir.join(target)),
        };

        if !new_dir.is_dir() {
            bail!("cd: no such directory: {}", new_dir.display());
        }

        env.current_dir = new_dir;
        writeln!(io.stdout, "Changed directory to: {}", env.current_dir.display())?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// exit the shell.
pub struct Exit {
    #[argh(positional, greedy)]
    /// ignored.
    pub _args: Vec<String>,
}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn execute(self, io: &mut Streams, env: &mut Environment) -> Result<ExitCode> {
        writeln!(io.stdout, "Exiting...")?;
        env.should_exit = true;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// list directory contents sorted by name.
pub struct Ls {
    #[argh(switch, short = 'a')]
    /// include entries whose names start with a dot.
    pub all: bool,

    #[argh(switch, short = 'r')]
    /// list in reverse order.
    pub reverse: bool,

    #[argh(positional)]
    /// directory to list; only the first one is used. Defaults to the current directory.
    pub dirs: Vec<String>,
}

/// Names in `dir`, sorted, optionally without dotfiles and optionally reversed.
fn list_entries(dir: &Path, all: bool, reverse: bool) -> io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let name = entry?.file_name().to_string_lossy().into_owned();
        if all || !name.starts_with('.') {
            names.push(name);
        }
    }
    names.sort();
    if reverse {
        names.reverse();
    }
    Ok(names)
}

impl BuiltinCommand for Ls {
    fn name() -> &'static str {
        "ls"
    }

    fn execute(self, io: &mut Streams, env: &mut Environment) -> Result<ExitCode> {
        let (shown, dir) = match self.dirs.first() {
            Some(d) => (d.as_str(), env.resolve(d)),
            None => (".", env.current_dir.clone()),
        };
        if !dir.is_dir() {
            bail!("ls: cannot access '{shown}': No such directory");
        }

        let names = list_entries(&dir, self.all, self.reverse)
            .with_context(|| format!("ls: cannot read '{shown}'"))?;

        writeln!(io.stdout, "Listing directory: {}", dir.display())?;
        for name in names {
            writeln!(io.stdout, "{name}")?;
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// create a directory.
pub struct Mkdir {
    #[argh(positional)]
    /// directory to create; its parent must exist. Further arguments are ignored.
    pub dir: Vec<String>,
}

impl BuiltinCommand for Mkdir {
    fn name() -> &'static str {
        "mkdir"
    }

    fn execute(self, io: &mut Streams, env: &mut Environment) -> Result<ExitCode> {
        let Some(name) = self.dir.into_iter().next() else {
            bail!("mkdir: missing argument");
        };
        let path = env.resolve(&name);
        if path.exists() {
            bail!("mkdir: directory already exists: {name}");
        }

        fs::create_dir(&path).with_context(|| format!("mkdir: cannot create directory '{name}'"))?;
        writeln!(io.stdout, "Directory created: {name}")?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// remove an empty directory.
pub struct Rmdir {
    #[argh(positional)]
    /// directory to remove; further arguments are ignored.
    pub dir: Vec<String>,
}

impl BuiltinCommand for Rmdir {
    fn name() -> &'static str {
        "rmdir"
    }

    fn execute(self, io: &mut Streams, env: &mut Environment) -> Result<ExitCode> {
        let Some(name) = self.dir.into_iter().next() else {
            bail!("rmdir: missing argument");
        };
        let path = env.resolve(&name);
        if !path.is_dir() {
            bail!("rmdir: no such directory: {name}");
        }

        let mut entries =
            fs::read_dir(&path).with_context(|| format!("rmdir: failed to remove '{name}'"))?;
        if entries.next().is_some() {
            bail!("rmdir: failed to remove '{name}': Directory not empty");
        }

        fs::remove_dir(&path).with_context(|| format!("rmdir: failed to remove '{name}'"))?;
        writeln!(io.stdout, "Directory removed: {name}")?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// create a file or update its modification time.
pub struct Touch {
    #[argh(positional)]
    /// file to create or touch; further arguments are ignored.
    pub file: Vec<String>,
}

impl BuiltinCommand for Touch {
    fn name() -> &'static str {
        "touch"
    }

    fn execute(self, io: &mut Streams, env: &mut Environment) -> Result<ExitCode> {
        let Some(name) = self.file.into_iter().next() else {
            bail!("touch: missing argument");
        };
        let path = env.resolve(&name);

        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("touch: cannot touch '{name}'"))?;
        file.set_modified(SystemTime::now())
            .with_context(|| format!("touch: cannot touch '{name}'"))?;

        writeln!(io.stdout, "File created/updated: {name}")?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// remove a file.
pub struct Rm {
    #[argh(positional)]
    /// file to remove; directories are refused. Further arguments are ignored.
    pub file: Vec<String>,
}

impl BuiltinCommand for Rm {
    fn name() -> &'static str {
        "rm"
    }

    fn execute(self, io: &mut Streams, env: &mut Environment) -> Result<ExitCode> {
        let Some(name) = self.file.into_iter().next() else {
            bail!("rm: missing argument");
        };
        let path = env.resolve(&name);

        match fs::symlink_metadata(&path) {
            Err(_) => bail!("rm: no such file: {name}"),
            Ok(meta) if meta.is_dir() => bail!("rm: cannot remove '{name}': Is a directory"),
            Ok(_) => {}
        }

        fs::remove_file(&path).with_context(|| format!("rm: cannot remove '{name}'"))?;
        writeln!(io.stdout, "File removed: {name}")?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// print file(s) to the output, or echo the input when no file is given.
pub struct Cat {
    #[argh(positional, greedy)]
    /// files to print in order.
    pub files: Vec<String>,
}

/// Copy `input` to `out` line by line until end of input.
///
/// A final line without a newline gets one.
fn echo_lines(input: &mut dyn BufRead, out: &mut dyn Write) -> io::Result<()> {
    let mut line = Vec::new();
    loop {
        line.clear();
        if input.read_until(b'\n', &mut line)? == 0 {
            return Ok(());
        }
        out.write_all(&line)?;
        if !line.ends_with(b"\n") {
            out.write_all(b"\n")?;
        }
    }
}

impl BuiltinCommand for Cat {
    fn name() -> &'static str {
        "cat"
    }

    fn execute(self, io: &mut Streams, env: &mut Environment) -> Result<ExitCode> {
        if self.files.is_empty() {
            echo_lines(io.stdin.as_mut(), io.stdout.as_mut()).context("cat")?;
            return Ok(0);
        }

        let mut status = 0;
        for name in &self.files {
            match fs::read(env.resolve(name)) {
                Ok(bytes) => {
                    io.stdout.write_all(&bytes)?;
                    if !bytes.is_empty() && !bytes.ends_with(b"\n") {
                        writeln!(io.stdout)?;
                    }
                }
                Err(e) => {
                    writeln!(io.stderr, "cat: {name}: {e}")?;
                    status = 1;
                }
            }
        }
        Ok(status)
    }
}

#[derive(FromArgs)]
/// move or rename files.
pub struct Mv {
    #[argh(positional, greedy)]
    /// sources followed by the destination. With several sources the destination must be a directory.
    pub paths: Vec<String>,
}

/// Rename, falling back to copy and delete when a rename is impossible
/// (for example across filesystems).
fn rename_or_copy(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if from.is_file() => {
            tracing::debug!(from = %from.display(), to = %to.display(), "rename failed ({e}), copying");
            fs::copy(from, to)?;
            fs::remove_file(from)
        }
        Err(e) => Err(e),
    }
}

impl Mv {
    /// Move one existing `from` to exactly `to`, asking first if `to` exists.
    fn move_entry(io: &mut Streams, source: &str, from: &Path, to: &Path) -> Result<()> {
        if to.exists() {
            let target_name = to.file_name().unwrap_or(to.as_os_str()).to_string_lossy();
            let question = format!("Overwrite {target_name}? (y/n): ");
            if !io.confirm.confirm(&question) {
                writeln!(io.stdout, "Skipped: {source}")?;
                return Ok(());
            }
        }

        rename_or_copy(from, to).with_context(|| format!("mv: failed to move {source}"))?;
        writeln!(io.stdout, "Moved: {source} to {}", to.display())?;
        Ok(())
    }
}

impl BuiltinCommand for Mv {
    fn name() -> &'static str {
        "mv"
    }

    fn execute(self, io: &mut Streams, env: &mut Environment) -> Result<ExitCode> {
        let (target, sources) = match self.paths.split_last() {
            Some((target, sources)) if !sources.is_empty() => (target, sources),
            _ => bail!("mv: missing argument"),
        };
        let dest = env.resolve(target);

        if let [source] = sources {
            let from = env.resolve(source);
            if fs::symlink_metadata(&from).is_err() {
                bail!("mv: no such file: {source}");
            }
            let to = match from.file_name() {
                Some(file_name) if dest.is_dir() => dest.join(file_name),
                _ => dest,
            };
            Self::move_entry(io, source, &from, &to)?;
            return Ok(0);
        }

        if !dest.is_dir() {
            bail!("mv: target is not a directory: {target}");
        }

        let mut status = 0;
        for source in sources {
            let from = env.resolve(source);
            let outcome = match from.file_name() {
                _ if fs::symlink_metadata(&from).is_err() => {
                    Err(anyhow!("mv: no such file: {source}"))
                }
                Some(file_name) => Self::move_entry(io, source, &from, &dest.join(file_name)),
                None => Err(anyhow!("mv: cannot move '{source}': invalid file name")),
            };
            if let Err(e) = outcome {
                writeln!(io.stderr, "{e:#}")?;
                status = 1;
            }
        }
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::path::PathBuf;
    use std::rc::Rc;
    use tempfile::TempDir;

    struct Run {
        code: ExitCode,
        out: String,
        err: String,
    }

    fn text(buf: &Rc<RefCell<Vec<u8>>>) -> String {
        String::from_utf8(buf.borrow().clone()).unwrap()
    }

    fn run_with<T: BuiltinCommand>(cmd: T, env: &mut Environment, answer: bool) -> Run {
        let (mut io, out, err) = Streams::captured(answer);
        let code = ExecutableCommand::execute(Box::new(cmd), &mut io, env).unwrap();
        Run {
            code,
            out: text(&out),
            err: text(&err),
        }
    }

    fn run<T: BuiltinCommand>(cmd: T, env: &mut Environment) -> Run {
        run_with(cmd, env, true)
    }

    fn sandbox() -> (TempDir, Environment) {
        let dir = TempDir::new().expect("failed to create temp dir");
        let env = Environment::at(dir.path());
        (dir, env)
    }

    fn listing(out: &str) -> Vec<&str> {
        out.lines().skip(1).collect()
    }

    #[test]
    fn test_pwd_prints_current_dir() {
        let (dir, mut env) = sandbox();
        let r = run(Pwd {}, &mut env);

        assert_eq!(r.code, 0);
        assert_eq!(r.out, format!("{}\n", dir.path().display()));
    }

    #[test]
    fn test_missing_argument_is_reported_once_without_side_effects() {
        let (dir, mut env) = sandbox();

        let cases: Vec<(Run, &str)> = vec![
            (run(Mkdir { dir: vec![] }, &mut env), "mkdir: missing argument\n"),
            (run(Rmdir { dir: vec![] }, &mut env), "rmdir: missing argument\n"),
            (run(Touch { file: vec![] }, &mut env), "touch: missing argument\n"),
            (run(Rm { file: vec![] }, &mut env), "rm: missing argument\n"),
            (run(Mv { paths: vec!["a".into()] }, &mut env), "mv: missing argument\n"),
        ];

        for (r, expected) in cases {
            assert_eq!(r.code, 1);
            assert_eq!(r.err, expected);
            assert!(r.out.is_empty());
        }
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_cd_relative_and_parent() {
        let (dir, mut env) = sandbox();
        fs::create_dir(dir.path().join("sub")).unwrap();

        let r = run(Cd { target: vec!["./sub/../sub".into()] }, &mut env);
        assert_eq!(r.code, 0);
        assert_eq!(env.current_dir, dir.path().join("sub"));
        assert_eq!(
            r.out,
            format!("Changed directory to: {}\n", dir.path().join("sub").display())
        );

        run(Cd { target: vec!["..".into()] }, &mut env);
        assert_eq!(env.current_dir, dir.path());
    }

    #[test]
    fn test_cd_rejects_missing_or_file_target() {
        let (dir, mut env) = sandbox();
        fs::write(dir.path().join("plain.txt"), "x").unwrap();

        for target in ["nowhere", "plain.txt"] {
            let r = run(Cd { target: vec![target.into()] }, &mut env);
            assert_eq!(r.code, 1);
            assert!(r.err.starts_with("cd: no such directory: "), "{}", r.err);
            assert_eq!(env.current_dir, dir.path());
        }
    }

    #[test]
    fn test_cd_without_target_goes_home() {
        let (dir, mut env) = sandbox();
        let home = TempDir::new().unwrap();
        env.home = Some(home.path().to_path_buf());

        run(Cd { target: vec![] }, &mut env);
        assert_eq!(env.current_dir, home.path());

        env.home = None;
        let r = run(Cd { target: vec![] }, &mut env);
        assert_eq!(r.err, "cd: missing argument\n");
        assert_eq!(env.current_dir, home.path());
        drop(dir);
    }

    #[test]
    fn test_ls_flags() {
        let (dir, mut env) = sandbox();
        for name in [".h", "a.txt", "b.txt"] {
            fs::write(dir.path().join(name), "").unwrap();
        }

        let plain = run(Ls { all: false, reverse: false, dirs: vec![] }, &mut env);
        assert_eq!(listing(&plain.out), vec!["a.txt", "b.txt"]);
        assert_eq!(
            plain.out.lines().next().unwrap(),
            format!("Listing directory: {}", dir.path().display())
        );

        let all = run(Ls { all: true, reverse: false, dirs: vec![] }, &mut env);
        assert_eq!(listing(&all.out), vec![".h", "a.txt", "b.txt"]);

        let reversed = run(Ls { all: false, reverse: true, dirs: vec![] }, &mut env);
        assert_eq!(listing(&reversed.out), vec!["b.txt", "a.txt"]);
    }

    #[test]
    fn test_ls_uses_first_directory_argument() {
        let (dir, mut env) = sandbox();
        fs::create_dir(dir.path().join("one")).unwrap();
        fs::write(dir.path().join("one").join("inside.txt"), "").unwrap();

        let r = run(
            Ls { all: false, reverse: false, dirs: vec!["one".into(), "two".into()] },
            &mut env,
        );
        assert_eq!(listing(&r.out), vec!["inside.txt"]);
    }

    #[test]
    fn test_ls_missing_directory_differs_from_empty_directory() {
        let (dir, mut env) = sandbox();
        fs::create_dir(dir.path().join("empty")).unwrap();

        let empty = run(
            Ls { all: true, reverse: false, dirs: vec!["empty".into()] },
            &mut env,
        );
        assert_eq!(empty.code, 0);
        assert_eq!(empty.out.lines().count(), 1);
        assert!(empty.out.starts_with("Listing directory: "));

        let missing = run(
            Ls { all: false, reverse: false, dirs: vec!["missing".into()] },
            &mut env,
        );
        assert_eq!(missing.code, 1);
        assert!(missing.out.is_empty());
        assert_eq!(missing.err, "ls: cannot access 'missing': No such directory\n");
    }

    #[test]
    fn test_mkdir_and_existing() {
        let (dir, mut env) = sandbox();

        let r = run(Mkdir { dir: vec!["made".into()] }, &mut env);
        assert_eq!(r.out, "Directory created: made\n");
        assert!(dir.path().join("made").is_dir());

        let again = run(Mkdir { dir: vec!["made".into()] }, &mut env);
        assert_eq!(again.err, "mkdir: directory already exists: made\n");
    }

    #[test]
    fn test_rmdir_refuses_non_empty_directory() {
        let (dir, mut env) = sandbox();
        let full = dir.path().join("full");
        fs::create_dir(&full).unwrap();
        fs::write(full.join("file.txt"), "keep").unwrap();

        let r = run(Rmdir { dir: vec!["full".into()] }, &mut env);
        assert_eq!(r.code, 1);
        assert_eq!(r.err, "rmdir: failed to remove 'full': Directory not empty\n");
        assert_eq!(fs::read_to_string(full.join("file.txt")).unwrap(), "keep");
    }

    #[test]
    fn test_rmdir_removes_empty_directory() {
        let (dir, mut env) = sandbox();
        fs::create_dir(dir.path().join("empty")).unwrap();

        let r = run(Rmdir { dir: vec!["empty".into()] }, &mut env);
        assert_eq!(r.out, "Directory removed: empty\n");
        assert!(!dir.path().join("empty").exists());

        let missing = run(Rmdir { dir: vec!["empty".into()] }, &mut env);
        assert_eq!(missing.err, "rmdir: no such directory: empty\n");
    }

    #[test]
    fn test_touch_creates_and_keeps_content() {
        let (dir, mut env) = sandbox();
        let path = dir.path().join("note.txt");

        let r = run(Touch { file: vec!["note.txt".into()] }, &mut env);
        assert_eq!(r.out, "File created/updated: note.txt\n");
        assert!(path.is_file());

        fs::write(&path, "content").unwrap();
        run(Touch { file: vec!["note.txt".into()] }, &mut env);
        assert_eq!(fs::read_to_string(&path).unwrap(), "content");
    }

    #[test]
    fn test_rm_file_directory_and_missing() {
        let (dir, mut env) = sandbox();
        fs::write(dir.path().join("gone.txt"), "").unwrap();
        fs::create_dir(dir.path().join("folder")).unwrap();

        let r = run(Rm { file: vec!["gone.txt".into()] }, &mut env);
        assert_eq!(r.out, "File removed: gone.txt\n");
        assert!(!dir.path().join("gone.txt").exists());

        let folder = run(Rm { file: vec!["folder".into()] }, &mut env);
        assert_eq!(folder.err, "rm: cannot remove 'folder': Is a directory\n");
        assert!(dir.path().join("folder").is_dir());

        let missing = run(Rm { file: vec!["gone.txt".into()] }, &mut env);
        assert_eq!(missing.err, "rm: no such file: gone.txt\n");
    }

    #[test]
    fn test_cat_reads_files_and_reports_missing_ones() {
        let (dir, mut env) = sandbox();
        fs::write(dir.path().join("a.txt"), "alpha\n").unwrap();
        fs::write(dir.path().join("b.txt"), "beta").unwrap();

        let r = run(
            Cat { files: vec!["a.txt".into(), "nope.txt".into(), "b.txt".into()] },
            &mut env,
        );
        assert_eq!(r.code, 1);
        assert_eq!(r.out, "alpha\nbeta\n");
        assert!(r.err.starts_with("cat: nope.txt: "), "{}", r.err);
    }

    #[test]
    fn test_cat_reads_stdin_when_no_args() {
        let (_dir, mut env) = sandbox();
        let (mut io, out, _err) = Streams::captured(true);
        io.stdin = Box::new(crate::io_adapters::MemReader::new(b"line one\nline two".to_vec()));

        let code =
            ExecutableCommand::execute(Box::new(Cat { files: vec![] }), &mut io, &mut env).unwrap();
        assert_eq!(code, 0);
        assert_eq!(text(&out), "line one\nline two\n");
    }

    #[test]
    fn test_mv_renames_single_file() {
        let (dir, mut env) = sandbox();
        fs::write(dir.path().join("old.txt"), "payload").unwrap();

        let r = run(Mv { paths: vec!["old.txt".into(), "new.txt".into()] }, &mut env);
        assert_eq!(r.code, 0);
        assert!(!dir.path().join("old.txt").exists());
        assert_eq!(fs::read_to_string(dir.path().join("new.txt")).unwrap(), "payload");
        assert_eq!(
            r.out,
            format!("Moved: old.txt to {}\n", dir.path().join("new.txt").display())
        );
    }

    #[test]
    fn test_mv_declined_overwrite_keeps_both_files() {
        let (dir, mut env) = sandbox();
        fs::write(dir.path().join("src.txt"), "new").unwrap();
        fs::write(dir.path().join("dst.txt"), "old").unwrap();

        let r = run_with(
            Mv { paths: vec!["src.txt".into(), "dst.txt".into()] },
            &mut env,
            false,
        );
        assert_eq!(r.out, "Skipped: src.txt\n");
        assert_eq!(fs::read_to_string(dir.path().join("dst.txt")).unwrap(), "old");
        assert!(dir.path().join("src.txt").exists());
    }

    #[test]
    fn test_mv_asks_before_overwriting() {
        let (dir, mut env) = sandbox();
        fs::write(dir.path().join("src.txt"), "new").unwrap();
        fs::write(dir.path().join("dst.txt"), "old").unwrap();

        let asked: Rc<RefCell<Vec<String>>> = Rc::default();
        let (mut io, _out, _err) = Streams::captured(true);
        let log = asked.clone();
        io.confirm = Box::new(move |q: &str| {
            log.borrow_mut().push(q.to_string());
            true
        });

        let mv = Mv { paths: vec!["src.txt".into(), "dst.txt".into()] };
        ExecutableCommand::execute(Box::new(mv), &mut io, &mut env).unwrap();

        assert_eq!(asked.borrow().as_slice(), ["Overwrite dst.txt? (y/n): "]);
        assert_eq!(fs::read_to_string(dir.path().join("dst.txt")).unwrap(), "new");
    }

    #[test]
    fn test_mv_many_files_into_directory() {
        let (dir, mut env) = sandbox();
        fs::create_dir(dir.path().join("d")).unwrap();
        fs::write(dir.path().join("a"), "first file").unwrap();
        fs::write(dir.path().join("b"), [0u8, 1, 2, 255]).unwrap();

        let r = run(
            Mv { paths: vec!["a".into(), "b".into(), "d".into()] },
            &mut env,
        );
        assert_eq!(r.code, 0);
        assert!(!dir.path().join("a").exists());
        assert!(!dir.path().join("b").exists());
        assert_eq!(fs::read(dir.path().join("d/a")).unwrap(), b"first file");
        assert_eq!(fs::read(dir.path().join("d/b")).unwrap(), vec![0u8, 1, 2, 255]);
    }

    #[test]
    fn test_mv_batch_continues_after_failure() {
        let (dir, mut env) = sandbox();
        fs::create_dir(dir.path().join("d")).unwrap();
        fs::write(dir.path().join("present"), "here").unwrap();

        let r = run(
            Mv { paths: vec!["absent".into(), "present".into(), "d".into()] },
            &mut env,
        );
        assert_eq!(r.code, 1);
        assert_eq!(r.err, "mv: no such file: absent\n");
        assert!(dir.path().join("d/present").exists());
    }

    #[test]
    fn test_mv_many_files_requires_directory() {
        let (dir, mut env) = sandbox();
        fs::write(dir.path().join("a"), "").unwrap();
        fs::write(dir.path().join("b"), "").unwrap();

        let r = run(
            Mv { paths: vec!["a".into(), "b".into(), "c".into()] },
            &mut env,
        );
        assert_eq!(r.err, "mv: target is not a directory: c\n");
        assert!(dir.path().join("a").exists());
    }

    #[test]
    fn test_exit_sets_flag() {
        let (_dir, mut env) = sandbox();
        let r = run(Exit { _args: vec![] }, &mut env);

        assert_eq!(r.out, "Exiting...\n");
        assert!(env.should_exit);
    }

    #[test]
    fn test_factory_reports_bad_flags_with_verb_prefix() {
        let (_dir, mut env) = sandbox();
        let (mut io, _out, err) = Streams::captured(true);

        let cmd = Factory::<Ls>::default().create(&["ls", "--bogus"]);
        let code = cmd.execute(&mut io, &mut env).unwrap();

        assert_eq!(code, 1);
        assert!(text(&err).starts_with("ls: "));
    }

    #[test]
    fn test_factory_parses_flags_anywhere() {
        let (dir, mut env) = sandbox();
        let sub: PathBuf = dir.path().join("sub");
        fs::create_dir(&sub).unwrap();
        for name in [".hidden", "x", "y"] {
            fs::write(sub.join(name), "").unwrap();
        }
        let (mut io, out, _err) = Streams::captured(true);

        let cmd = Factory::<Ls>::default().create(&["ls", "-r", "sub", "-a"]);
        cmd.execute(&mut io, &mut env).unwrap();

        assert_eq!(listing(&text(&out)), vec!["y", "x", ".hidden"]);
    }

    fn create_and_run<T: BuiltinCommand + 'static>(tokens: &[&str], env: &mut Environment) -> Run {
        let (mut io, out, err) = Streams::captured(true);
        let code = Factory::<T>::default()
            .create(tokens)
            .execute(&mut io, env)
            .unwrap();
        Run {
            code,
            out: text(&out),
            err: text(&err),
        }
    }

    #[test]
    fn test_help_word_is_a_path_not_a_usage_request() {
        let (dir, mut env) = sandbox();

        let made = create_and_run::<Mkdir>(&["mkdir", "help"], &mut env);
        assert_eq!(made.code, 0);
        assert_eq!(made.out, "Directory created: help\n");
        assert!(dir.path().join("help").is_dir());

        let removed = create_and_run::<Rmdir>(&["rmdir", "help"], &mut env);
        assert_eq!(removed.out, "Directory removed: help\n");

        create_and_run::<Touch>(&["touch", "help"], &mut env);
        fs::write(dir.path().join("help"), "inside\n").unwrap();
        let shown = create_and_run::<Cat>(&["cat", "help"], &mut env);
        assert_eq!(shown.out, "inside\n");

        fs::create_dir(dir.path().join("d")).unwrap();
        let moved = create_and_run::<Mv>(&["mv", "help", "d"], &mut env);
        assert_eq!(moved.code, 0);
        assert!(dir.path().join("d").join("help").is_file());

        let entered = create_and_run::<Cd>(&["cd", "d"], &mut env);
        assert_eq!(entered.code, 0);
        let gone = create_and_run::<Rm>(&["rm", "help"], &mut env);
        assert_eq!(gone.out, "File removed: help\n");
        assert!(!dir.path().join("d").join("help").exists());
    }

    #[test]
    fn test_double_dash_help_still_prints_usage() {
        let (dir, mut env) = sandbox();
        let r = create_and_run::<Mkdir>(&["mkdir", "--help"], &mut env);

        assert_eq!(r.code, 0);
        assert!(r.out.starts_with("Usage: mkdir"));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_ls_lists_directory_named_help() {
        let (dir, mut env) = sandbox();
        fs::create_dir(dir.path().join("help")).unwrap();
        fs::write(dir.path().join("help").join("inner"), "").unwrap();

        let r = create_and_run::<Ls>(&["ls", "help", "-r"], &mut env);
        assert_eq!(r.code, 0);
        assert_eq!(listing(&r.out), vec!["inner"]);
    }

    #[test]
    fn test_extra_arguments_are_ignored() {
        let (dir, mut env) = sandbox();

        let r = create_and_run::<Mkdir>(&["mkdir", "a", "b"], &mut env);
        assert_eq!(r.code, 0);
        assert!(r.err.is_empty());
        assert!(dir.path().join("a").is_dir());
        assert!(!dir.path().join("b").exists());

        create_and_run::<Touch>(&["touch", "f", "g"], &mut env);
        assert!(dir.path().join("f").is_file());
        assert!(!dir.path().join("g").exists());

        let r = create_and_run::<Cd>(&["cd", "a", "elsewhere"], &mut env);
        assert_eq!(r.code, 0);
        assert_eq!(env.current_dir, dir.path().join("a"));
    }

    #[test]
    fn test_help_lists_every_verb_and_operator() {
        let (_dir, mut env) = sandbox();
        let r = run(Help {}, &mut env);

        assert_eq!(r.code, 0);
        let verbs = [
            "pwd", "cd", "ls", "mkdir", "rmdir", "touch", "mv", "rm", "cat", "exit", "help",
        ];
        for verb in verbs {
            assert!(
                r.out.lines().any(|l| l.trim_start().starts_with(verb)),
                "{verb} missing from help"
            );
        }
        for op in ["cmd > file", "cmd >> file", "cmd | cat"] {
            assert!(r.out.contains(op), "{op} missing from help");
        }
    }
}
