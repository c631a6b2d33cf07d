//! Shared glue for the two binaries: size-token resolution, logging setup
//! and signal installation.

use crate::error::PipeError;
use nix::sys::signal::{signal, SigHandler, Signal};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Predefined media sizes, in bytes. Tokens match case-insensitively.
pub const PREDEFINED_SIZES: &[(&str, u64)] = &[
    ("floppy", 1_440_000),
    ("CD", 650_000_384),
    ("CD-80", 700_000_256),
    ("CDR-80", 700_000_256),
    ("DVD", 4_700_000_256),
    ("DVD-5", 4_700_000_256),
];

/// Resolves a volume-size token: a predefined media name, or an integer
/// number of kilobytes.
pub fn resolve_volume_size(token: &str) -> Result<u64, String> {
    for (name, bytes) in PREDEFINED_SIZES {
        if name.eq_ignore_ascii_case(token) {
            return Ok(*bytes);
        }
    }
    token.parse::<u64>().map(|kb| kb * 1024).map_err(|_| {
        format!(
            "unrecognized volume size '{token}'; use kilobytes or one of: {}",
            PREDEFINED_SIZES
                .iter()
                .map(|(name, _)| *name)
                .collect::<Vec<_>>()
                .join(", ")
        )
    })
}

/// Installs the stderr tracing subscriber. `RUST_LOG` overrides the level
/// implied by the verbosity flags.
pub fn init_tracing(verbose: bool, debug: bool) {
    let default_level = if debug {
        "debug"
    } else if verbose {
        "info"
    } else {
        "warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Registers SIGINT to raise a break flag observed at loop boundaries.
pub fn install_break_flag() -> Result<Arc<AtomicBool>, PipeError> {
    let flag = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&flag))
        .map_err(|e| PipeError::io("installing the interrupt handler", e))?;
    Ok(flag)
}

/// Ignores SIGPIPE process-wide; a closed pipe must surface as a write
/// error, not kill the process.
pub fn ignore_sigpipe() -> Result<(), PipeError> {
    // SAFETY: installing the kernel's ignore disposition touches no Rust
    // state and is done before any pipe writes.
    unsafe { signal(Signal::SIGPIPE, SigHandler::SigIgn) }
        .map_err(|e| PipeError::io("ignoring SIGPIPE", e.into()))?;
    Ok(())
}
