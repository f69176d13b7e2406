//! Basic usage example for xz-pipe

use std::io::{Cursor, Read, Write};

use xz_pipe::{CancelToken, XzReader, XzWriter};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("=== xz-pipe Roundtrip Example ===\n");

    let payload = "Hello, world!".repeat(10_000);
    println!("Compressing {} bytes...", payload.len());

    let mut writer = XzWriter::new(CancelToken::new(), Vec::new())?;
    writer.write_all(payload.as_bytes())?;
    let compressed = writer.finish()?;
    println!(
        "✓ Compressed to {} bytes ({:.1}%)\n",
        compressed.len(),
        compressed.len() as f64 / payload.len() as f64 * 100.0
    );

    println!("Decompressing...");
    let mut reader = XzReader::new(CancelToken::new(), Cursor::new(compressed))?;
    let mut restored = String::new();
    reader.read_to_string(&mut restored)?;

    assert_eq!(restored, payload);
    println!("✓ Recovered {} bytes, contents match", restored.len());

    Ok(())
}
