//! Operator prompting on the controlling terminal.
//!
//! Standard input carries payload on the producer and volumes may arrive on
//! it on the consumer, so operator acknowledgements are read from `/dev/tty`
//! instead. The consumer blocks for a whole line; the producer polls the
//! descriptor through its multiplexer and watches for a return key.

use crate::error::PipeError;
use std::fs::File;
use std::io::{BufRead, BufReader};

/// Opens the controlling terminal for reading.
pub fn open_tty() -> Result<File, PipeError> {
    File::open("/dev/tty")
        .map_err(|e| PipeError::io("opening of /dev/tty for operator input", e))
}

/// Blocks until the operator presses return.
pub fn wait_for_return() -> Result<(), PipeError> {
    let tty = open_tty()?;
    let mut line = String::new();
    BufReader::new(tty)
        .read_line(&mut line)
        .map_err(|e| PipeError::io("reading operator acknowledgement from /dev/tty", e))?;
    Ok(())
}

/// True when a chunk of terminal input contains a return key press.
#[inline]
pub fn saw_return(bytes: &[u8]) -> bool {
    bytes.iter().any(|&b| b == b'\r' || b == b'\n')
}
