//! Producer binary: read stdin, emit framed volumes via a writer command.

use anyhow::Context;
use clap::Parser;
use splitpipe::cli::{ignore_sigpipe, init_tracing, install_break_flag, resolve_volume_size};
use splitpipe::{ConsoleStatus, ProducerPipeline, SplitConfig};
use std::fs::File;
use std::os::fd::AsFd;

#[derive(Parser)]
#[command(
    name = "splitpipe",
    version,
    about = "Spans a byte stream from standard input across bounded volumes via a writer command"
)]
struct Args {
    /// In-memory buffer size, in kilobytes
    #[arg(short = 'b', long = "buffer-size", value_name = "KB", default_value_t = 1000)]
    buffer_size: u64,

    /// Volume capacity: kilobytes, or one of floppy, CD, CD-80, CDR-80, DVD, DVD-5
    #[arg(
        short = 's',
        long = "volume-size",
        value_name = "TOKEN",
        default_value = "DVD-5",
        value_parser = resolve_volume_size
    )]
    volume_size: u64,

    /// Writer command, evaluated by /bin/sh, receiving each volume on stdin
    #[arg(short = 'o', long = "output", value_name = "CMD")]
    output: Option<String>,

    /// Session label recorded on every volume
    #[arg(short = 'L', long = "label", value_name = "TEXT")]
    label: Option<String>,

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

    let Some(output_command) = args.output else {
        eprintln!("splitpipe: no writer command specified - unable to write data\n");
        eprintln!("suggested command for cd:");
        eprintln!("  cdrecord dev=/dev/cdrom speed=24 -eject -dummy -tao");
        eprintln!("\nsuggested command for dvd:");
        eprintln!("  growisofs -Z/dev/dvd=/dev/stdin -dry-run");
        std::process::exit(1);
    };
    if args.buffer_size == 0 {
        anyhow::bail!("buffer size of zero is unsupported; try 1000 for one megabyte");
    }
    if args.volume_size == 0 {
        anyhow::bail!("volume size of zero is unsupported; try --volume-size DVD");
    }

    let cfg = SplitConfig {
        buffer_size: (args.buffer_size * 1024) as usize,
        volume_size: args.volume_size,
        output_command,
        label: args.label,
        no_prompt: args.no_prompt,
    };

    if args.verbose {
        eprintln!(
            "splitpipe: buffer size {:.2} MB, volume size {:.2} MB",
            cfg.buffer_size as f64 / 1_000_000.0,
            cfg.volume_size as f64 / 1_000_000.0
        );
    }

    ignore_sigpipe()?;
    let break_flag = install_break_flag()?;

    let input = std::io::stdin()
        .as_fd()
        .try_clone_to_owned()
        .context("cloning the standard input descriptor")?;

    let status = ConsoleStatus::new(args.verbose);
    let pipeline = ProducerPipeline::new(cfg, File::from(input), break_flag, status)?;
    match pipeline.run() {
        Ok(report) => {
            if args.verbose {
                eprintln!(
                    "splitpipe: session complete - {} volume(s), {} bytes in, {} bytes out",
                    report.volumes, report.bytes_in, report.bytes_out
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
