//! Workload driver
//!
//! Reads relation file paths from stdin until a `Done` line, then executes
//! one query per line, printing space-separated decimal checksums. `F`
//! lines mark batch boundaries and are ignored.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use parajoin::{Engine, EngineConfig};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let config = match parse_args()? {
        Some(path) => EngineConfig::from_json_file(&path)?,
        None => EngineConfig::default(),
    };
    let mut engine = Engine::new(config)?;

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    for line in lines.by_ref() {
        let line = line.context("reading relation list")?;
        let line = line.trim();
        if line == "Done" {
            break;
        }
        if line.is_empty() {
            continue;
        }
        engine.load_relation(Path::new(line))?;
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for line in lines {
        let line = line.context("reading query")?;
        let line = line.trim();
        if line.is_empty() || line == "F" {
            continue;
        }
        let result = engine.execute(line)?;
        let rendered: Vec<String> = result.checksums.iter().map(u64::to_string).collect();
        writeln!(out, "{}", rendered.join(" "))?;
    }
    Ok(())
}

fn parse_args() -> Result<Option<PathBuf>> {
    let mut args = std::env::args().skip(1);
    match args.next() {
        Some(flag) if flag == "--config" => {
            let path = args.next().context("--config requires a file path")?;
            Ok(Some(PathBuf::from(path)))
        }
        Some(other) => anyhow::bail!("unknown argument: {other}"),
        None => Ok(None),
    }
}
