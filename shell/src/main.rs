use argh::FromArgs;
use fs_shell::Interpreter;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(FromArgs)]
/// An interactive shell for everyday file operations.
struct Options {
    #[argh(option, default = "String::from(\"fsh> \")")]
    /// prompt shown before every line.
    prompt: String,

    #[argh(option, short = 'c')]
    /// run a single command line and exit.
    command: Option<String>,

    #[argh(switch, short = 'q')]
    /// do not print the start-up banner.
    quiet: bool,

    #[argh(switch, short = 'd')]
    /// log debug output to stderr.
    debug: bool,
}

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn main() -> ExitCode {
    let options: Options = argh::from_env();
    init_logging(options.debug);

    let mut sh = Interpreter::default();

    if let Some(line) = options.command {
        sh.execute_line(&line);
        return if sh.last_status() == 0 {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        };
    }

    if !options.quiet {
        println!("fsh - type 'help' for available commands.");
    }
    if let Err(e) = sh.repl(&options.prompt) {
        eprintln!("Error: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
