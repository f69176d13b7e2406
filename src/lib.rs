//! # xz-pipe: Streaming XZ compression through the system tool
//!
//! `xz-pipe` compresses and decompresses byte streams by piping them through
//! the XZ Utils command-line tool (`xz`) when it is installed, and falls back
//! transparently to the in-process liblzma stream (the `xz2` crate) when it
//! is not. Which backend serves a stream is decided once, at construction,
//! and hidden behind plain [`std::io::Write`] / [`std::io::Read`] adapters.
//!
//! ## Features
//!
//! - **Zero-copy piping**: writes and reads pass straight through to the
//!   tool's pipes; backpressure comes from the OS pipe, not from a buffer
//! - **Transparent fallback**: one probe per process decides tool vs.
//!   in-process stream; output is valid `.xz` either way
//! - **Cancellation**: a [`CancelToken`] bound at construction terminates the
//!   subprocess and fails the stream
//! - **Honest shutdown**: close reconciles pipe errors with the tool's exit
//!   status, so a truncated stream is reported instead of silently accepted
//!
//! ## Quick Start
//!
//! ### Compressing
//!
//! ```no_run
//! use std::io::Write;
//! use xz_pipe::{CancelToken, XzWriter};
//!
//! let mut writer = XzWriter::new(CancelToken::new(), Vec::new())?;
//! writer.write_all(b"Hello, world!")?;
//! let compressed: Vec<u8> = writer.finish()?;
//! # Ok::<(), xz_pipe::XzPipeError>(())
//! ```
//!
//! ### Decompressing
//!
//! ```no_run
//! use std::io::{Cursor, Read};
//! use xz_pipe::{CancelToken, XzReader};
//!
//! # let compressed = Vec::new();
//! let mut reader = XzReader::new(CancelToken::new(), Cursor::new(compressed))?;
//! let mut data = Vec::new();
//! reader.read_to_end(&mut data)?;
//! # Ok::<(), xz_pipe::XzPipeError>(())
//! ```
//!
//! ### Tuning the tool
//!
//! ```no_run
//! use std::io::Write;
//! use xz_pipe::{CancelToken, XzOptions, XzWriter};
//!
//! let opts = XzOptions::new()
//!     .level(XzOptions::BEST)?
//!     .extreme()
//!     .verbose(std::io::stderr());
//! let mut writer = XzWriter::with_options(CancelToken::new(), Vec::new(), opts)?;
//! writer.write_all(b"...")?;
//! writer.close()?;
//! # Ok::<(), xz_pipe::XzPipeError>(())
//! ```

pub mod cancel;
pub mod error;
pub mod options;
pub mod reader;
pub mod writer;

mod process;
mod tool;

pub use cancel::CancelToken;
pub use error::{Result, XzPipeError};
pub use options::XzOptions;
pub use reader::XzReader;
pub use writer::XzWriter;
