//! The producer pipeline.
//!
//! Reads payload from an input descriptor into the byte ring, wraps it in
//! framed stretches and pushes it to one writer command per volume. The
//! whole pipeline is one cooperative loop: every iteration reconciles the
//! state machine, waits on the multiplexer, then services ready descriptors
//! in priority order (writer diagnostics, terminal, input, writer stdin).

use crate::child::{describe_exit, ChildWriter};
use crate::error::PipeError;
use crate::mux::{Interest, Multiplexer, Ready};
use crate::status::{DiagLineBuffer, StatusSink, StatusThrottle};
use crate::tty::{open_tty, saw_return};
use crate::util::{epoch_seconds, set_nonblocking};
use splitpipe_ring::ByteRing;
use splitpipe_wire::{
    encode_frame, stretch_header, FrameKind, RunningDigest, SessionId, HEADER_LEN, MAX_PAYLOAD,
};
use std::fs::File;
use std::io::{self, Read};
use std::os::fd::AsFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Bytes held back from the configured volume size so the trailing checksum
/// and end-of-volume stretches always fit.
const VOLUME_TRAILER_RESERVE: u64 = 2048;

/// Ring fill ratio above which the next writer is launched.
const LAUNCH_FILL_RATIO: f64 = 0.5;

/// Smallest volume room worth opening a data stretch for: the three header
/// bytes plus at least one payload byte.
const MIN_STRETCH_ROOM: u64 = (HEADER_LEN + 1) as u64;

/// Producer-side configuration, owned by the runner.
#[derive(Debug, Clone)]
pub struct SplitConfig {
    /// Ring capacity in bytes.
    pub buffer_size: usize,
    /// Configured volume capacity in bytes, before the trailer reserve.
    pub volume_size: u64,
    /// Writer command, evaluated by `/bin/sh -c` once per volume.
    pub output_command: String,
    /// Optional session label recorded on every volume.
    pub label: Option<String>,
    /// Skip the operator prompt between volumes.
    pub no_prompt: bool,
}

/// Totals reported after a completed session.
#[derive(Debug, Clone, Copy)]
pub struct ProducerReport {
    pub volumes: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// No writer live; the launch decision has not been taken yet.
    Dead,
    /// No writer live; accumulating input until the launch gate opens.
    Prebuffering,
    /// Waiting for the operator to confirm fresh media.
    WaitingOperator,
    /// A writer is live and stretches are flowing.
    Working,
    /// Volume trailer flushed and writer input closed; awaiting exit.
    Dying,
    /// Session trailer flushed; awaiting the final writer exit.
    SessionClosing,
    Done,
}

#[derive(Debug, Clone, Copy)]
enum CloseKind {
    Volume,
    Session,
}

/// Wire cost of the fixed per-volume header stretches.
fn volume_header_bytes(label: Option<&str>) -> u64 {
    let fixed = (HEADER_LEN + 16) + (HEADER_LEN + 4) + (HEADER_LEN + 2);
    let label = label.map_or(0, |l| HEADER_LEN + l.len());
    (fixed + label) as u64
}

/// Bookkeeping for the live volume.
#[derive(Debug)]
struct VolumeAccount {
    /// Configured size minus the trailer reserve.
    budget: u64,
    /// Bytes committed to this volume, headers and payload alike.
    bytes_emitted: u64,
    /// Payload bytes left inside the open data stretch; zero means no
    /// stretch is open.
    stretch_remaining: u64,
}

impl VolumeAccount {
    fn new(budget: u64) -> Self {
        Self {
            budget,
            bytes_emitted: 0,
            stretch_remaining: 0,
        }
    }

    fn reset(&mut self) {
        self.bytes_emitted = 0;
        self.stretch_remaining = 0;
    }

    #[inline]
    fn room(&self) -> u64 {
        self.budget.saturating_sub(self.bytes_emitted)
    }

    fn percent_done(&self) -> u8 {
        if self.budget == 0 {
            100
        } else {
            (self.bytes_emitted.min(self.budget) * 100 / self.budget) as u8
        }
    }
}

/// Control bytes (stretch headers and trailers) queued for the writer.
///
/// Everything staged here drains through the same non-blocking write path
/// as payload, ahead of it.
#[derive(Debug)]
struct Staged {
    buf: Vec<u8>,
    pos: usize,
}

impl Staged {
    fn new() -> Self {
        Self {
            buf: Vec::new(),
            pos: 0,
        }
    }

    #[inline]
    fn is_empty(&self) -> bool {
        self.pos == self.buf.len()
    }

    #[inline]
    fn window(&self) -> &[u8] {
        &self.buf[self.pos..]
    }

    fn consume(&mut self, n: usize) {
        self.pos += n;
        if self.is_empty() {
            self.buf.clear();
            self.pos = 0;
        }
    }

    fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }
}

/// The producer state machine plus everything it owns.
#[derive(Debug)]
pub struct ProducerPipeline<S: StatusSink> {
    cfg: SplitConfig,
    status: S,
    ring: ByteRing,
    digest: RunningDigest,
    session: SessionId,
    state: State,
    child: Option<ChildWriter>,
    account: VolumeAccount,
    staged: Staged,
    close_after_flush: Option<CloseKind>,
    volume_seq: u16,
    volumes_written: u64,
    first_volume: bool,
    input: File,
    input_eof: bool,
    tty: Option<File>,
    break_flag: Arc<AtomicBool>,
    mux: Multiplexer,
    scratch: Vec<u8>,
    bytes_in: u64,
    bytes_out: u64,
    throttle: StatusThrottle,
    diag: DiagLineBuffer,
}

impl<S: StatusSink> ProducerPipeline<S> {
    /// Builds a pipeline reading payload from `input`.
    ///
    /// The descriptor is switched to non-blocking; regular stdin is the
    /// normal case but any readable descriptor works.
    pub fn new(
        cfg: SplitConfig,
        input: File,
        break_flag: Arc<AtomicBool>,
        status: S,
    ) -> Result<Self, PipeError> {
        set_nonblocking(&input, "setting the input descriptor to nonblocking")?;

        let budget = cfg.volume_size.saturating_sub(VOLUME_TRAILER_RESERVE);
        let header_bytes = volume_header_bytes(cfg.label.as_deref());
        if budget < header_bytes + MIN_STRETCH_ROOM {
            return Err(PipeError::VolumeTooSmall {
                configured: cfg.volume_size,
            });
        }

        let ring = ByteRing::new(cfg.buffer_size);

        Ok(Self {
            cfg,
            status,
            ring,
            digest: RunningDigest::new(),
            session: SessionId::generate(),
            state: State::Dead,
            child: None,
            account: VolumeAccount::new(budget),
            staged: Staged::new(),
            close_after_flush: None,
            volume_seq: 0,
            volumes_written: 0,
            first_volume: true,
            input,
            input_eof: false,
            tty: None,
            break_flag,
            mux: Multiplexer::new(),
            scratch: vec![0u8; 64 * 1024],
            bytes_in: 0,
            bytes_out: 0,
            throttle: StatusThrottle::new(),
            diag: DiagLineBuffer::new(),
        })
    }

    /// Runs the session to completion.
    pub fn run(mut self) -> Result<ProducerReport, PipeError> {
        tracing::debug!(
            buffer = self.cfg.buffer_size,
            volume = self.cfg.volume_size,
            session = %self.session,
            "session started"
        );

        loop {
            if self.break_flag.load(Ordering::Relaxed) {
                return Err(self.shutdown_on_break());
            }

            self.reconcile()?;
            if self.state == State::Done {
                break;
            }

            let ready = self.wait()?;
            self.dispatch(ready)?;
            self.publish_status();
        }

        Ok(ProducerReport {
            volumes: self.volumes_written,
            bytes_in: self.bytes_in,
            bytes_out: self.bytes_out,
        })
    }

    // ---------------------------------------------------------------------
    // STATE RECONCILIATION
    // ---------------------------------------------------------------------

    fn reconcile(&mut self) -> Result<(), PipeError> {
        match self.state {
            State::Dead | State::Prebuffering => self.reconcile_launch(),
            State::Working => self.reconcile_working(),
            State::Dying | State::SessionClosing => self.reconcile_exit(),
            State::WaitingOperator | State::Done => Ok(()),
        }
    }

    /// The prebuffer gate: launch once input hit EOF or the ring is more
    /// than half full. Later volumes wait for the operator first.
    fn reconcile_launch(&mut self) -> Result<(), PipeError> {
        let gate_open = self.input_eof || self.ring.fill_ratio() > LAUNCH_FILL_RATIO;
        if !gate_open {
            if self.state == State::Dead {
                self.state = State::Prebuffering;
                tracing::debug!("prebuffering until the launch gate opens");
            }
            return Ok(());
        }

        if self.first_volume || self.cfg.no_prompt {
            self.start_volume()
        } else {
            self.status.set_log_emphasis(true);
            self.status
                .log("splitpipe: reload media, if necessary, and press enter to continue");
            self.status.set_log_emphasis(false);
            self.ensure_tty()?;
            self.state = State::WaitingOperator;
            Ok(())
        }
    }

    fn reconcile_working(&mut self) -> Result<(), PipeError> {
        if !self.staged.is_empty() {
            return Ok(());
        }

        // Trailer fully drained: close the writer's input and wait it out.
        if let Some(close) = self.close_after_flush.take() {
            if let Some(child) = self.child.as_mut() {
                child.close_input();
            }
            self.state = match close {
                CloseKind::Volume => State::Dying,
                CloseKind::Session => State::SessionClosing,
            };
            return Ok(());
        }

        if self.account.stretch_remaining > 0 {
            return Ok(());
        }

        if self.input_eof && self.ring.is_empty() {
            self.stage_trailer(CloseKind::Session)?;
            self.status
                .log("splitpipe: done with input, waiting for the writer command to exit");
        } else if self.account.room() < MIN_STRETCH_ROOM {
            self.stage_trailer(CloseKind::Volume)?;
            self.status.set_log_emphasis(true);
            self.status
                .log("splitpipe: wrote a full volume, waiting for the writer command to exit");
            self.status.set_log_emphasis(false);
        } else if !self.ring.is_empty() {
            self.open_stretch();
        }
        Ok(())
    }

    /// Dying / SessionClosing: the writer is winding down. Done only once
    /// the exit status is in and both diagnostic pipes hit EOF.
    fn reconcile_exit(&mut self) -> Result<(), PipeError> {
        let (exited, diag_done) = match self.child.as_mut() {
            Some(child) => (child.poll_exit(false)?, child.diag_eof()),
            None => (None, true),
        };
        let Some(status) = exited else {
            return Ok(());
        };
        if !diag_done {
            return Ok(());
        }

        let sink = &mut self.status;
        self.diag.flush(|line| sink.log(line));
        sink.log(&format!("splitpipe: {}", describe_exit(status)));

        self.child = None;
        if self.state == State::Dying {
            self.account.reset();
            self.state = State::Dead;
            tracing::debug!("volume closed, back to the launch decision");
        } else {
            self.state = State::Done;
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // VOLUME LIFECYCLE
    // ---------------------------------------------------------------------

    /// Spawns the next writer and stages the per-volume header stretches in
    /// their fixed order.
    fn start_volume(&mut self) -> Result<(), PipeError> {
        debug_assert!(
            self.child.is_none(),
            "previous writer must be reaped before the next spawn"
        );

        let fill = self.ring.fill_ratio() * 100.0;
        let child = ChildWriter::spawn(&self.cfg.output_command)?;
        self.status.log(&format!(
            "splitpipe: bringing the writer command online - buffer {fill:.0}% full"
        ));

        self.account.reset();
        let mut frames = Vec::with_capacity(64);
        encode_frame(&mut frames, FrameKind::SessionUuid, self.session.as_bytes())?;
        encode_frame(&mut frames, FrameKind::VolumeDate, &epoch_seconds().to_be_bytes())?;
        if let Some(label) = self.cfg.label.as_deref() {
            encode_frame(&mut frames, FrameKind::SessionName, label.as_bytes())?;
        }
        encode_frame(&mut frames, FrameKind::VolumeNumber, &self.volume_seq.to_be_bytes())?;
        self.stage(&frames);

        tracing::debug!(volume = self.volume_seq, "volume opened");
        self.volume_seq = self.volume_seq.wrapping_add(1);
        self.volumes_written += 1;
        self.first_volume = false;
        self.child = Some(child);
        self.state = State::Working;
        Ok(())
    }

    /// Stages the checksum snapshot plus the end-of-volume or end-of-session
    /// stretch. These live in the trailer reserve, not the data budget.
    fn stage_trailer(&mut self, close: CloseKind) -> Result<(), PipeError> {
        let mut frames = Vec::with_capacity(32);
        encode_frame(&mut frames, FrameKind::Md5Checksum, &self.digest.snapshot())?;
        let eof_kind = match close {
            CloseKind::Volume => FrameKind::VolumeEof,
            CloseKind::Session => FrameKind::SessionEof,
        };
        encode_frame(&mut frames, eof_kind, &[])?;
        self.stage(&frames);
        self.close_after_flush = Some(close);
        Ok(())
    }

    /// Opens a data stretch sized to the ring, the wire limit and the
    /// remaining volume room.
    fn open_stretch(&mut self) {
        let len = (MAX_PAYLOAD as u64)
            .min(self.ring.available() as u64)
            .min(self.account.room() - HEADER_LEN as u64);
        debug_assert!(len >= 1);

        self.stage(&stretch_header(FrameKind::Data, len as u16));
        self.account.stretch_remaining = len;
        tracing::trace!(len, "opened a data stretch");
    }

    /// Queues control bytes and accounts them against the volume at commit
    /// time, so the room arithmetic never runs ahead of what is promised.
    fn stage(&mut self, bytes: &[u8]) {
        self.account.bytes_emitted += bytes.len() as u64;
        self.staged.extend(bytes);
    }

    // ---------------------------------------------------------------------
    // READINESS + DISPATCH
    // ---------------------------------------------------------------------

    fn wait(&self) -> Result<Ready, PipeError> {
        let mut interest = Interest::default();

        if !self.input_eof && self.ring.room() > 0 {
            interest.stdin = Some(self.input.as_fd());
        }
        if let Some(child) = self.child.as_ref() {
            interest.child_stdout = child.stdout_fd();
            interest.child_stderr = child.stderr_fd();

            let has_bytes_to_push = !self.staged.is_empty()
                || (self.account.stretch_remaining > 0 && !self.ring.is_empty());
            if self.state == State::Working && has_bytes_to_push {
                interest.child_stdin = child.stdin_fd();
            }
        }
        if self.state == State::WaitingOperator {
            interest.tty = self.tty.as_ref().map(AsFd::as_fd);
        }

        self.mux.wait(&interest)
    }

    /// Service order: writer diagnostics, terminal, input, writer stdin.
    fn dispatch(&mut self, ready: Ready) -> Result<(), PipeError> {
        if ready.child_stdout || ready.child_stderr {
            self.pump_diag()?;
        }
        if ready.tty {
            self.pump_tty()?;
        }
        if ready.stdin {
            self.pump_input()?;
        }
        if ready.child_stdin {
            self.pump_child()?;
        }
        Ok(())
    }

    fn pump_diag(&mut self) -> Result<(), PipeError> {
        let Some(child) = self.child.as_mut() else {
            return Ok(());
        };
        let diag = &mut self.diag;
        let sink = &mut self.status;
        child.drain_diag(|chunk| diag.push(chunk, |line| sink.log(line)))
    }

    fn pump_tty(&mut self) -> Result<(), PipeError> {
        let Some(tty) = self.tty.as_mut() else {
            return Ok(());
        };
        let mut buf = [0u8; 64];
        match tty.read(&mut buf) {
            // A vanished terminal counts as an acknowledgement; the
            // alternative is spinning on a dead descriptor.
            Ok(0) => {
                if self.state == State::WaitingOperator {
                    tracing::debug!("terminal closed, continuing without acknowledgement");
                    self.start_volume()?;
                }
            }
            Ok(n) => {
                if self.state == State::WaitingOperator && saw_return(&buf[..n]) {
                    self.start_volume()?;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(PipeError::io("reading operator input from /dev/tty", e)),
        }
        Ok(())
    }

    fn pump_input(&mut self) -> Result<(), PipeError> {
        if self.input_eof {
            return Ok(());
        }
        let room = self.ring.room();
        if room == 0 {
            return Ok(());
        }

        let want = room.min(self.scratch.len());
        match self.input.read(&mut self.scratch[..want]) {
            Ok(0) => {
                self.input_eof = true;
                tracing::debug!(room, "end of input");
            }
            Ok(n) => {
                self.ring.store(&self.scratch[..n])?;
                self.bytes_in += n as u64;
                tracing::trace!(n, "buffered input");
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(PipeError::io("reading from standard input", e)),
        }
        Ok(())
    }

    /// Pushes staged control bytes, then payload for the open stretch, until
    /// the pipe would block or there is nothing left to push.
    fn pump_child(&mut self) -> Result<(), PipeError> {
        loop {
            if self.state != State::Working {
                return Ok(());
            }

            if !self.staged.is_empty() {
                let Some(child) = self.child.as_mut() else {
                    return Ok(());
                };
                match child.write_payload(self.staged.window())? {
                    None => return Ok(()),
                    Some(n) => {
                        self.staged.consume(n);
                        self.bytes_out += n as u64;
                        continue;
                    }
                }
            }

            // Closing and stretch opening are reconcile's business.
            if self.close_after_flush.is_some() || self.account.stretch_remaining == 0 {
                return Ok(());
            }

            let written = {
                let Some(child) = self.child.as_mut() else {
                    return Ok(());
                };
                let window = self.ring.read_window();
                let n = window.len().min(self.account.stretch_remaining as usize);
                if n == 0 {
                    return Ok(());
                }
                match child.write_payload(&window[..n])? {
                    None => return Ok(()),
                    Some(written) => {
                        self.digest.update(&window[..written]);
                        written
                    }
                }
            };

            self.ring.advance(written)?;
            self.account.stretch_remaining -= written as u64;
            self.account.bytes_emitted += written as u64;
            self.bytes_out += written as u64;
            tracing::trace!(
                written,
                remaining = self.account.stretch_remaining,
                "pushed payload to the writer"
            );
        }
    }

    // ---------------------------------------------------------------------
    // SUPPORT
    // ---------------------------------------------------------------------

    fn ensure_tty(&mut self) -> Result<(), PipeError> {
        if self.tty.is_none() {
            let tty = open_tty()?;
            set_nonblocking(&tty, "setting /dev/tty to nonblocking")?;
            self.tty = Some(tty);
        }
        Ok(())
    }

    fn shutdown_on_break(&mut self) -> PipeError {
        self.status.set_log_emphasis(true);
        self.status
            .log("splitpipe: received interrupt request, terminating output");
        self.status.set_log_emphasis(false);

        if let Some(child) = self.child.as_mut() {
            child.close_input();
            if let Ok(Some(status)) = child.poll_exit(true) {
                let _ = child.drain_diag(|_| {});
                self.status.log(&format!("splitpipe: {}", describe_exit(status)));
            }
        }
        self.child = None;
        PipeError::Interrupted
    }

    fn publish_status(&mut self) {
        let capacity = self.ring.capacity();
        let pct = if capacity == 0 {
            0
        } else {
            (self.ring.available() * 100 / capacity) as u8
        };
        if self.throttle.buffer_percent_changed(pct) {
            self.status.set_buffer_percent(pct);
        }
        if self.throttle.totals_due(Instant::now()) {
            self.status.set_totals(
                self.bytes_in,
                self.bytes_out,
                self.ring.available() as u64,
                self.account.percent_done(),
            );
        }
        self.status.refresh();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_room_is_budget_minus_emitted() {
        let mut account = VolumeAccount::new(1000);
        assert_eq!(account.room(), 1000);
        account.bytes_emitted = 997;
        assert_eq!(account.room(), 3);
        assert!(account.room() < MIN_STRETCH_ROOM);
        account.bytes_emitted = 1200;
        assert_eq!(account.room(), 0);
        assert_eq!(account.percent_done(), 100);
    }

    #[test]
    fn staged_bytes_drain_in_order() {
        let mut staged = Staged::new();
        staged.extend(b"abc");
        staged.extend(b"de");
        assert_eq!(staged.window(), b"abcde");
        staged.consume(2);
        assert_eq!(staged.window(), b"cde");
        staged.consume(3);
        assert!(staged.is_empty());
    }

    #[test]
    fn trailer_reserve_covers_worst_case_trailers() {
        // Checksum stretch plus both end markers.
        let worst = (HEADER_LEN + 16) + HEADER_LEN + HEADER_LEN;
        assert!((worst as u64) < VOLUME_TRAILER_RESERVE);
    }

    #[test]
    fn header_cost_includes_the_label() {
        assert_eq!(volume_header_bytes(None), 31);
        assert_eq!(volume_header_bytes(Some("backup")), 31 + 3 + 6);
    }

    #[test]
    fn undersized_volumes_are_rejected() {
        let cfg = SplitConfig {
            buffer_size: 1024,
            volume_size: VOLUME_TRAILER_RESERVE + 20,
            output_command: "cat".into(),
            label: None,
            no_prompt: true,
        };
        let err = ProducerPipeline::new(
            cfg,
            tempfile::tempfile().unwrap(),
            Arc::new(AtomicBool::new(false)),
            crate::status::NullStatus,
        )
        .unwrap_err();
        assert!(matches!(err, PipeError::VolumeTooSmall { .. }));
    }
}
