//! The consumer pipeline.
//!
//! Opens volumes in the order given, decodes stretches with exact pulls so
//! nothing past the end-of-volume marker is ever read, validates session
//! identity, volume sequence and the running checksum, and writes the
//! reconstructed payload to the output.

use crate::error::PipeError;
use crate::status::StatusSink;
use crate::tty::wait_for_return;
use splitpipe_wire::{
    hex_dump, FrameDecoder, FrameKind, RawFrame, RunningDigest, SessionId, WireError, HEADER_LEN,
    SESSION_ID_LEN,
};
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Consumer-side configuration, owned by the runner.
#[derive(Debug, Clone)]
pub struct JoinConfig {
    /// Volume sources in order. Empty means standard input; when volumes
    /// outnumber the listed paths the last one is re-opened after each
    /// media swap.
    pub inputs: Vec<PathBuf>,
    /// Skip the operator prompt between volumes.
    pub no_prompt: bool,
}

/// Totals reported after a completed session.
#[derive(Debug, Clone, Copy)]
pub struct JoinReport {
    pub volumes: u64,
    pub bytes_out: u64,
}

/// Reads volumes and reconstructs the payload stream.
pub struct ConsumerPipeline<S: StatusSink, W: Write> {
    cfg: JoinConfig,
    status: S,
    out: W,
    digest: RunningDigest,
    session: Option<SessionId>,
    expected_volume: u16,
    volumes_seen: u64,
    bytes_out: u64,
    break_flag: Arc<AtomicBool>,
}

impl<S: StatusSink, W: Write> ConsumerPipeline<S, W> {
    pub fn new(cfg: JoinConfig, out: W, break_flag: Arc<AtomicBool>, status: S) -> Self {
        Self {
            cfg,
            status,
            out,
            digest: RunningDigest::new(),
            session: None,
            expected_volume: 0,
            volumes_seen: 0,
            bytes_out: 0,
            break_flag,
        }
    }

    /// Runs until the end-of-session stretch or a fatal decode error.
    pub fn run(mut self) -> Result<JoinReport, PipeError> {
        let inputs = if self.cfg.inputs.is_empty() {
            vec![PathBuf::from("/dev/stdin")]
        } else {
            self.cfg.inputs.clone()
        };

        let mut index = 0;
        let mut source = open_source(&inputs[index])?;
        let mut decoder = FrameDecoder::new();
        let mut scratch = vec![0u8; 64 * 1024];

        loop {
            if self.break_flag.load(Ordering::Relaxed) {
                self.status.log("joinpipe: received interrupt request");
                return Err(PipeError::Interrupted);
            }

            let frame = read_frame(&mut source, &mut decoder, &mut scratch)?;
            match frame.kind() {
                Some(FrameKind::SessionUuid) => self.on_session_uuid(&frame)?,
                Some(FrameKind::VolumeNumber) => self.on_volume_number(&frame)?,
                Some(FrameKind::Data) => self.on_data(&frame)?,
                Some(FrameKind::Md5Checksum) => self.on_checksum(&frame)?,
                Some(FrameKind::VolumeEof) => {
                    // Frames never straddle volumes; the decoder must be at
                    // a header boundary when the medium changes.
                    debug_assert_eq!(decoder.needed(), HEADER_LEN);
                    drop(source);

                    self.status.set_log_emphasis(true);
                    self.status
                        .log("joinpipe: end of volume, change media and press enter");
                    self.status.set_log_emphasis(false);
                    if !self.cfg.no_prompt {
                        wait_for_return()?;
                    }

                    if index + 1 < inputs.len() {
                        index += 1;
                    }
                    source = open_source(&inputs[index])?;
                }
                Some(FrameKind::SessionEof) => {
                    self.status.log("joinpipe: end of session");
                    break;
                }
                Some(FrameKind::SessionName) => {
                    let name = String::from_utf8_lossy(&frame.payload);
                    tracing::info!(%name, "session name");
                }
                Some(FrameKind::VolumeDate) => {
                    let stamp = frame.volume_date()?;
                    tracing::info!(stamp, "volume date (seconds since epoch)");
                }
                Some(FrameKind::Sha1Checksum) => {
                    tracing::debug!("sha-1 checksum stretch present, not verified");
                }
                None => {
                    self.status.log(&format!(
                        "joinpipe: unknown stretch type {} of length {}",
                        frame.tag,
                        frame.payload.len()
                    ));
                    self.status.log(&hex_dump(&frame.payload));
                }
            }
            self.status.refresh();
        }

        self.out
            .flush()
            .map_err(|e| PipeError::io("flushing standard output", e))?;

        Ok(JoinReport {
            volumes: self.volumes_seen,
            bytes_out: self.bytes_out,
        })
    }

    // ---------------------------------------------------------------------
    // DISPATCH
    // ---------------------------------------------------------------------

    fn on_session_uuid(&mut self, frame: &RawFrame) -> Result<(), PipeError> {
        let found =
            SessionId::from_wire(&frame.payload).ok_or(WireError::BadLength {
                kind: FrameKind::SessionUuid,
                expected: SESSION_ID_LEN,
                got: frame.payload.len(),
            })?;

        match self.session {
            None => {
                self.status
                    .log(&format!("joinpipe: session id is '{found}'"));
                self.session = Some(found);
            }
            Some(expected) if expected == found => {}
            Some(expected) => return Err(PipeError::WrongSession { expected, found }),
        }
        Ok(())
    }

    fn on_volume_number(&mut self, frame: &RawFrame) -> Result<(), PipeError> {
        let found = frame.volume_number()?;
        if found != self.expected_volume {
            return Err(PipeError::WrongVolume {
                expected: self.expected_volume,
                found,
            });
        }
        tracing::info!(volume = found, "found volume, as expected");
        self.expected_volume = self.expected_volume.wrapping_add(1);
        self.volumes_seen += 1;
        Ok(())
    }

    fn on_data(&mut self, frame: &RawFrame) -> Result<(), PipeError> {
        self.out
            .write_all(&frame.payload)
            .map_err(|e| PipeError::io("writing to standard output", e))?;
        self.digest.update(&frame.payload);
        self.bytes_out += frame.payload.len() as u64;
        Ok(())
    }

    fn on_checksum(&mut self, frame: &RawFrame) -> Result<(), PipeError> {
        let computed = self.digest.snapshot();
        if frame.payload.as_slice() == computed {
            self.status.log("joinpipe: running checksum correct");
            Ok(())
        } else {
            Err(PipeError::ChecksumMismatch {
                computed: hex_dump(&computed),
                stored: hex_dump(&frame.payload),
            })
        }
    }
}

fn open_source(path: &Path) -> Result<File, PipeError> {
    File::open(path)
        .map_err(|e| PipeError::io(format!("opening of {} for input", path.display()), e))
}

/// Pulls exactly one frame off the source.
///
/// Reads are bounded by what the decoder asks for, so the source position
/// never runs past the frame being assembled. A zero read mid-frame or
/// between frames is a truncated stream.
fn read_frame(
    source: &mut File,
    decoder: &mut FrameDecoder,
    scratch: &mut [u8],
) -> Result<RawFrame, PipeError> {
    loop {
        if let Some(frame) = decoder.take() {
            return Ok(frame);
        }

        let want = decoder.needed().min(scratch.len());
        debug_assert!(want > 0);
        match source.read(&mut scratch[..want]) {
            Ok(0) => return Err(PipeError::UnexpectedEof),
            Ok(n) => {
                let consumed = decoder.feed(&scratch[..n]);
                debug_assert_eq!(consumed, n);
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(PipeError::io("read of a stretch", e)),
        }
    }
}
