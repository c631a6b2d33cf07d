//! Consumer binary: read volumes in order, reconstruct the stream on stdout.

use clap::Parser;
use splitpipe::cli::{ignore_sigpipe, init_tracing, install_break_flag};
use splitpipe::{ConsoleStatus, ConsumerPipeline, JoinConfig};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "joinpipe",
    version,
    about = "Joins volumes written by splitpipe back into one stream on standard output"
)]
struct Args {
    /// Volume devices or files, in order (default: standard input)
    #[arg(value_name = "DEVICE")]
    inputs: Vec<PathBuf>,

    /// Do not wait for the operator between volumes
    #[arg(short = 'n', long = "no-prompt")]
    no_prompt: bool,

    /// Verbose progress output
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Debug diagnostics
    #[arg(short = 'd', long = "debug")]
    debug: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose, args.debug);

    ignore_sigpipe()?;
    let break_flag = install_break_flag()?;

    let cfg = JoinConfig {
        inputs: args.inputs,
        no_prompt: args.no_prompt,
    };

    let stdout = std::io::stdout().lock();
    let status = ConsoleStatus::new(args.verbose);
    let pipeline = ConsumerPipeline::new(cfg, stdout, break_flag, status);
    match pipeline.run() {
        Ok(report) => {
            if args.verbose {
                eprintln!(
                    "joinpipe: session complete - {} volume(s), {} bytes out",
                    report.volumes, report.bytes_out
                );
            }
            Ok(())
        }
        Err(e) if e.is_interrupt() => {
            std::process::exit(1);
        }
        Err(e) => Err(anyhow::Error::from(e).context("fatal")),
    }
}
