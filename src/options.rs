//! Stream construction options
//!
//! Options are applied as a chain of setters consuming `self`; setters with a
//! validity domain return `Result` so the first illegal value aborts the chain
//! before a writer or reader is ever constructed. No subprocess is spawned for
//! a rejected option set.

use std::io::Write;

use crate::error::{Result, XzPipeError};

/// Immutable option set consumed by [`XzWriter`](crate::XzWriter) and
/// [`XzReader`](crate::XzReader) constructors.
///
/// ```
/// use xz_pipe::XzOptions;
///
/// let opts = XzOptions::new().level(XzOptions::BEST)?.extreme();
/// # Ok::<(), xz_pipe::XzPipeError>(())
/// ```
pub struct XzOptions {
    pub(crate) level: u32,
    pub(crate) extreme: bool,
    pub(crate) verbose: Option<Box<dyn Write + Send>>,
    pub(crate) process_group: bool,
    pub(crate) niceness: Option<u32>,
    pub(crate) library_only: bool,
}

impl XzOptions {
    /// Fastest compression, least effort (`-0`, the tool's `--fast`).
    pub const FAST: u32 = 0;
    /// Standard effort (`-6`), the default.
    pub const DEFAULT: u32 = 6;
    /// Best compression, most effort (`-9`, the tool's `--best`).
    pub const BEST: u32 = 9;

    /// Default option set: level 6, quiet, no extreme mode.
    pub fn new() -> Self {
        XzOptions {
            level: Self::DEFAULT,
            extreme: false,
            verbose: None,
            process_group: false,
            niceness: None,
            library_only: false,
        }
    }

    /// Set the compression level between 0 ([`FAST`](Self::FAST)) and
    /// 9 ([`BEST`](Self::BEST)). Only affects the write path.
    pub fn level(mut self, level: u32) -> Result<Self> {
        if level > Self::BEST {
            return Err(XzPipeError::OptionIllegal(format!(
                "compression level {} not in 0..=9",
                level
            )));
        }
        self.level = level;
        Ok(self)
    }

    /// Spend extra CPU time for a slightly better ratio (the tool's
    /// `--extreme`, the encoder's extreme preset). Only affects the write path.
    pub fn extreme(mut self) -> Self {
        self.extreme = true;
        self
    }

    /// Route the subprocess's diagnostic output to `sink` instead of
    /// suppressing it. With the external tool this connects `sink` to the
    /// subprocess's stderr and passes `--verbose` instead of `--quiet`; the
    /// in-process backend produces no diagnostics.
    pub fn verbose<W: Write + Send + 'static>(mut self, sink: W) -> Self {
        self.verbose = Some(Box::new(sink));
        self
    }

    /// Run the subprocess in its own process group, so an interrupt signal
    /// sent to the parent's terminal session does not reach it. Useful when
    /// the calling program handles SIGINT itself and wants to finish the
    /// stream gracefully; without this, the shell delivers the signal to the
    /// whole foreground group and xz dies mid-stream.
    ///
    /// Unix only; fails with [`XzPipeError::OptionIllegal`] elsewhere.
    pub fn process_group(self) -> Result<Self> {
        if cfg!(not(unix)) {
            return Err(XzPipeError::OptionIllegal(
                "process group isolation is not supported on this platform".to_string(),
            ));
        }
        let mut opts = self;
        opts.process_group = true;
        Ok(opts)
    }

    /// Lower the subprocess's scheduling priority by `niceness` (0 to 20).
    ///
    /// Unix only; fails with [`XzPipeError::OptionIllegal`] elsewhere.
    pub fn niceness(self, niceness: u32) -> Result<Self> {
        if niceness > 20 {
            return Err(XzPipeError::OptionIllegal(format!(
                "niceness {} not in 0..=20",
                niceness
            )));
        }
        if cfg!(not(unix)) {
            return Err(XzPipeError::OptionIllegal(
                "niceness is not supported on this platform".to_string(),
            ));
        }
        let mut opts = self;
        opts.niceness = Some(niceness);
        Ok(opts)
    }

    /// Skip the external tool and always use the in-process stream, even when
    /// `xz` is on `$PATH`. Mainly useful for testing parity between backends.
    pub fn library_only(mut self) -> Self {
        self.library_only = true;
        self
    }
}

impl Default for XzOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for XzOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XzOptions")
            .field("level", &self.level)
            .field("extreme", &self.extreme)
            .field("verbose", &self.verbose.is_some())
            .field("process_group", &self.process_group)
            .field("niceness", &self.niceness)
            .field("library_only", &self.library_only)
            .finish()
    }
}
