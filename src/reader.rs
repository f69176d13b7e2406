//! Streaming XZ read adapter
//!
//! [`XzReader`] wraps a source of compressed bytes and yields the
//! decompressed stream, draining an `xz` subprocess when the tool is
//! available and the in-process liblzma decoder otherwise.
//!
//! A short input often ends exactly when the subprocess does, so a benign
//! end-of-stream can hide a decompression failure. The first read that
//! observes end-of-stream (or any error) therefore waits for the subprocess
//! and reports its non-zero exit instead, making truncated or corrupt input
//! visible rather than a silent short read.

use std::io::{self, Read};

use tracing::warn;
use xz2::read::XzDecoder;

use crate::cancel::CancelToken;
use crate::error::{Result, XzPipeError};
use crate::options::XzOptions;
use crate::process::{self, ToolReader};
use crate::tool::{self, Backend};

enum State<R: Read + Send + 'static> {
    Tool(ToolReader),
    Library(XzDecoder<R>),
    Finished,
}

/// A `Read` implementation that XZ-decompresses the wrapped source.
///
/// Reading to end-of-stream reaps the subprocess on its own; call
/// [`close`](Self::close) to release a reader early. A reader dropped without
/// closing is closed best-effort.
pub struct XzReader<R: Read + Send + 'static> {
    token: CancelToken,
    state: State<R>,
}

impl<R: Read + Send + 'static> XzReader<R> {
    /// Create a decompressor around `source` with default options.
    pub fn new(token: CancelToken, source: R) -> Result<Self> {
        Self::with_options(token, source, XzOptions::new())
    }

    /// Create a decompressor around `source`. Compression level and extreme
    /// mode are write-path options and have no effect here; the backend
    /// override and the verbose sink apply.
    pub fn with_options(token: CancelToken, source: R, options: XzOptions) -> Result<Self> {
        if token.is_cancelled() {
            return Err(XzPipeError::Io(process::cancelled_error()));
        }
        let state = match tool::select(options.library_only) {
            Backend::Tool(path) => State::Tool(process::spawn_reader(&token, path, source, options)?),
            Backend::Library => State::Library(XzDecoder::new(source)),
        };
        Ok(XzReader { token, state })
    }

    /// Release the reader: terminates and reaps a subprocess that has not
    /// finished yet. Reading past end-of-stream already reconciles with the
    /// subprocess, so closing then is a no-op. Calls after the first return
    /// `Ok(())`.
    pub fn close(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.state, State::Finished) {
            State::Tool(mut tool) => tool.close(),
            State::Library(_) => Ok(()),
            State::Finished => Ok(()),
        }
    }
}

impl<R: Read + Send + 'static> Read for XzReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.token.is_cancelled() {
            return Err(process::cancelled_error());
        }
        match &mut self.state {
            State::Tool(tool) => tool.read(buf),
            State::Library(decoder) => decoder.read(buf),
            State::Finished => Ok(0),
        }
    }
}

impl<R: Read + Send + 'static> Drop for XzReader<R> {
    fn drop(&mut self) {
        if !matches!(self.state, State::Finished) {
            if let Err(e) = self.close() {
                warn!(error = %e, "xz reader dropped without close");
            }
        }
    }
}
