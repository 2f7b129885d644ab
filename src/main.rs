//! Rill - CLI
//!
//! Decodes a file (or stdin) through a stream pipeline and prints every
//! record in inspect form.

use anyhow::{Context, Result};
use clap::Parser;
use std::fs::File;
use std::path::PathBuf;
use tracing::{info, warn};

use rill::runtime::io::{Io, IoMode};
use rill::runtime::scheduler::EventLoop;
use rill::runtime::stream::{stream_fn, Stream, StreamMode};
use rill::runtime::value::{Displayable, Value};
use rill::util::{config, logger};
use rill::{decode, Format, NAME, VERSION};

/// Decode separated-values records through a Rill stream pipeline
#[derive(Parser, Debug)]
#[command(name = "rill")]
#[command(author = "Rill Team")]
#[command(version = VERSION)]
#[command(about = NAME, long_about = None)]
struct Args {
    /// Input format: csv, tsv, ltsv or lines
    #[arg(value_name = "FORMAT")]
    format: Format,

    /// Input file; stdin when omitted
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,

    /// Configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = config::load(args.config.as_deref()).context("Failed to load configuration")?;
    let level = if args.verbose {
        logger::LogLevel::Debug
    } else {
        config.log.level
    };
    logger::init_with_level(level);

    let event_loop = EventLoop::current();
    event_loop.configure(config.scheduler_config());

    let input = match &args.file {
        Some(path) => {
            let file = File::open(path).with_context(|| format!("Failed to open: {}", path.display()))?;
            Io::from_file(file, IoMode::READ)
        }
        None => Io::open(libc::STDIN_FILENO, IoMode::READ),
    };
    let output = Io::open(libc::STDOUT_FILENO, IoMode::WRITE);

    let records = decode(&input, args.format, &event_loop).context("Failed to build pipeline")?;
    let inspect = Stream::new(
        StreamMode::Filter,
        stream_fn(|strm, v| strm.emit(Value::Str(v.inspect()), None)),
    );
    records.connect(&inspect)?;
    inspect.connect(&output.stream(IoMode::WRITE)?)?;

    event_loop.run().context("Pipeline aborted")?;

    let errors = event_loop.take_errors();
    if !errors.is_empty() {
        warn!(count = errors.len(), "records rejected");
    }
    info!(stats = ?event_loop.stats(), "done");
    Ok(())
}
