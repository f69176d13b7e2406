//! Watch the xz tool's own diagnostics while compressing a larger buffer.
//!
//! Run with `xz` installed to see its progress output on stderr; without the
//! tool, the in-process backend is used and no diagnostics appear.

use std::fs::File;
use std::io::Write;

use xz_pipe::{CancelToken, XzOptions, XzWriter};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut payload = Vec::with_capacity(32 * 1024 * 1024);
    let mut state = 0x2545f491u64;
    while payload.len() < 32 * 1024 * 1024 {
        // Mildly compressible pseudo-random filler.
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        payload.extend_from_slice(&(state >> 32).to_le_bytes());
        payload.extend_from_slice(b"........");
    }

    let out = File::create("verbose_demo.xz")?;
    let opts = XzOptions::new()
        .level(XzOptions::BEST)?
        .verbose(std::io::stderr());
    let mut writer = XzWriter::with_options(CancelToken::new(), out, opts)?;
    writer.write_all(&payload)?;
    writer.close()?;

    println!("wrote verbose_demo.xz ({} bytes in)", payload.len());
    Ok(())
}
