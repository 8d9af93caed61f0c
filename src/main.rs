use loomcss::{Compiler, config};
use std::io::Write;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(message) = run() {
        eprintln!("error: {}", message);
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("loomcss.toml"));

    let config = config::load(&path).map_err(|err| err.to_string())?;
    let compiler = Compiler::new(&config).map_err(|err| err.to_string())?;
    let output = compiler.compile();

    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(output.css.as_bytes())
        .and_then(|()| stdout.flush())
        .map_err(|err| format!("failed to write css: {}", err))
}
