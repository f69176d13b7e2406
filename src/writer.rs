//! Streaming XZ write adapter
//!
//! [`XzWriter`] wraps a destination sink and compresses everything written
//! through it, piping the bytes through an `xz` subprocess when the tool is
//! available and through the in-process liblzma encoder otherwise. Writes are
//! a direct passthrough to the active backend; backpressure comes entirely
//! from the pipe, so a write blocks while the consumer is slower than the
//! producer.

use std::io::{self, Write};

use tracing::warn;
use xz2::stream::{Check, Stream};
use xz2::write::XzEncoder;

use crate::cancel::CancelToken;
use crate::error::{Result, XzPipeError};
use crate::options::XzOptions;
use crate::process::{self, ToolWriter};
use crate::tool::{self, Backend};

/// liblzma preset modifier matching the tool's `--extreme` flag.
const LZMA_PRESET_EXTREME: u32 = 1 << 31;

enum State<W: Write + Send + 'static> {
    Tool(ToolWriter<W>),
    Library(XzEncoder<W>),
    Finished(Option<W>),
}

/// A `Write` implementation that XZ-compresses into the wrapped sink.
///
/// Call [`close`](Self::close) or [`finish`](Self::finish) when done; writes
/// alone do not terminate the compressed stream. A writer dropped without
/// closing is closed best-effort, so the subprocess can never be leaked, but
/// any shutdown error is only logged.
pub struct XzWriter<W: Write + Send + 'static> {
    token: CancelToken,
    state: State<W>,
}

impl<W: Write + Send + 'static> XzWriter<W> {
    /// Create a compressor around `sink` with default options.
    pub fn new(token: CancelToken, sink: W) -> Result<Self> {
        Self::with_options(token, sink, XzOptions::new())
    }

    /// Create a compressor around `sink` with the given options. Fails fast
    /// on an already-cancelled token; no subprocess is left behind on any
    /// construction failure.
    pub fn with_options(token: CancelToken, sink: W, options: XzOptions) -> Result<Self> {
        if token.is_cancelled() {
            return Err(XzPipeError::Io(process::cancelled_error()));
        }
        let state = match tool::select(options.library_only) {
            Backend::Tool(path) => State::Tool(process::spawn_writer(&token, path, sink, options)?),
            Backend::Library => State::Library(library_encoder(sink, &options)?),
        };
        Ok(XzWriter { token, state })
    }

    /// Terminate the compressed stream and reconcile with the backend: for
    /// the subprocess this ends its input, waits for it to exit and surfaces
    /// a pipe or exit error; for the in-process encoder it flushes the final
    /// blocks. Safe to call after a failed write; calls after the first
    /// return `Ok(())`.
    pub fn close(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.state, State::Finished(None)) {
            State::Tool(mut tool) => {
                let (sink, result) = tool.reconcile();
                self.state = State::Finished(sink);
                result
            }
            State::Library(encoder) => match encoder.finish() {
                Ok(sink) => {
                    self.state = State::Finished(Some(sink));
                    Ok(())
                }
                Err(e) => Err(XzPipeError::Io(e)),
            },
            State::Finished(sink) => {
                self.state = State::Finished(sink);
                Ok(())
            }
        }
    }

    /// Close the stream and hand back the destination sink.
    pub fn finish(mut self) -> Result<W> {
        self.close()?;
        match std::mem::replace(&mut self.state, State::Finished(None)) {
            State::Finished(Some(sink)) => Ok(sink),
            _ => Err(XzPipeError::Io(io::Error::new(
                io::ErrorKind::Other,
                "destination sink was lost",
            ))),
        }
    }
}

fn library_encoder<W: Write>(sink: W, options: &XzOptions) -> Result<XzEncoder<W>> {
    let mut preset = options.level;
    if options.extreme {
        preset |= LZMA_PRESET_EXTREME;
    }
    let stream = Stream::new_easy_encoder(preset, Check::Crc64)
        .map_err(|e| XzPipeError::Io(e.into()))?;
    Ok(XzEncoder::new_stream(sink, stream))
}

impl<W: Write + Send + 'static> Write for XzWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.token.is_cancelled() {
            return Err(process::cancelled_error());
        }
        match &mut self.state {
            State::Tool(tool) => tool.write(buf),
            State::Library(encoder) => encoder.write(buf),
            State::Finished(_) => Err(io::Error::new(
                io::ErrorKind::Other,
                "xz stream already closed",
            )),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.token.is_cancelled() {
            return Err(process::cancelled_error());
        }
        match &mut self.state {
            State::Tool(tool) => tool.flush(),
            State::Library(encoder) => encoder.flush(),
            State::Finished(_) => Err(io::Error::new(
                io::ErrorKind::Other,
                "xz stream already closed",
            )),
        }
    }
}

impl<W: Write + Send + 'static> Drop for XzWriter<W> {
    fn drop(&mut self) {
        if !matches!(self.state, State::Finished(_)) {
            if let Err(e) = self.close() {
                warn!(error = %e, "xz writer dropped without close");
            }
        }
    }
}
