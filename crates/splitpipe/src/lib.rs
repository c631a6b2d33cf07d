//! splitpipe / joinpipe — transporting a byte stream across bounded media.
//!
//! The producer ([`ProducerPipeline`]) reads from an input descriptor,
//! smooths stalls through a fixed-capacity byte ring, wraps the bytes in the
//! framed wire format and feeds them to a spawned writer command, one writer
//! invocation per volume. The consumer ([`ConsumerPipeline`]) reads volumes
//! back in order, validates session identity, volume sequence and the running
//! checksum, and reconstructs the original stream on standard output.
//!
//! Both sides are single-threaded and cooperative: on the producer every
//! suspension point is a readiness wait inside the [`Multiplexer`], so a slow
//! writer, a slow input and an operator at the terminal can all be serviced
//! from one loop.

pub mod child;
pub mod cli;
pub mod consumer;
pub mod error;
pub mod mux;
pub mod producer;
pub mod status;
pub mod tty;
pub mod util;

pub use child::ChildWriter;
pub use consumer::{ConsumerPipeline, JoinConfig, JoinReport};
pub use error::PipeError;
pub use mux::{Interest, Multiplexer, Ready};
pub use producer::{ProducerPipeline, ProducerReport, SplitConfig};
pub use status::{ConsoleStatus, NullStatus, StatusSink};
