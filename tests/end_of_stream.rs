use std::io::{Cursor, Read, Write};
use std::process::Command;

use xz_pipe::{CancelToken, XzOptions, XzReader, XzWriter};

fn xz_available() -> bool {
    Command::new("xz").arg("--version").output().is_ok()
}

fn compress_library(data: &[u8]) -> Vec<u8> {
    let mut writer = XzWriter::with_options(
        CancelToken::new(),
        Vec::new(),
        XzOptions::new().library_only(),
    )
    .unwrap();
    writer.write_all(data).unwrap();
    writer.finish().unwrap()
}

fn read_all(compressed: Vec<u8>, library_only: bool) -> std::io::Result<Vec<u8>> {
    let opts = if library_only {
        XzOptions::new().library_only()
    } else {
        XzOptions::new()
    };
    let mut reader =
        XzReader::with_options(CancelToken::new(), Cursor::new(compressed), opts).unwrap();
    let mut data = Vec::new();
    reader.read_to_end(&mut data)?;
    Ok(data)
}

// A truncated stream ends exactly when the subprocess dies; the exit status
// must surface as an error instead of a silent short read.
#[test]
fn truncated_stream_errors_on_tool() {
    if !xz_available() {
        eprintln!("skipping test: `xz` not found");
        return;
    }
    let compressed = compress_library(b"Hello, world!");
    let truncated = compressed[..compressed.len() / 2].to_vec();
    assert!(read_all(truncated, false).is_err());
}

#[test]
fn truncated_stream_errors_on_library() {
    let compressed = compress_library(b"Hello, world!");
    let truncated = compressed[..compressed.len() / 2].to_vec();
    assert!(read_all(truncated, true).is_err());
}

#[test]
fn garbage_input_errors_on_both_backends() {
    let garbage = b"this is not an xz stream at all".to_vec();
    assert!(read_all(garbage.clone(), true).is_err());
    if xz_available() {
        assert!(read_all(garbage, false).is_err());
    }
}

// After the first error the outcome is cached: every further read reports
// the same failure instead of a fresh wait on the subprocess.
#[test]
fn tool_read_error_is_sticky() {
    if !xz_available() {
        eprintln!("skipping test: `xz` not found");
        return;
    }
    let compressed = compress_library(b"Hello, world!");
    let truncated = compressed[..compressed.len() / 2].to_vec();
    let mut reader = XzReader::new(CancelToken::new(), Cursor::new(truncated)).unwrap();

    let mut sink = Vec::new();
    assert!(reader.read_to_end(&mut sink).is_err());
    let mut buf = [0u8; 16];
    assert!(reader.read(&mut buf).is_err());
    assert!(reader.read(&mut buf).is_err());
}

#[test]
fn clean_end_of_stream_reads_zero_after_reconcile() {
    if !xz_available() {
        eprintln!("skipping test: `xz` not found");
        return;
    }
    let compressed = compress_library(b"Hello, world!");
    let mut reader = XzReader::new(CancelToken::new(), Cursor::new(compressed)).unwrap();
    let mut data = Vec::new();
    reader.read_to_end(&mut data).unwrap();
    assert_eq!(data, b"Hello, world!");

    let mut buf = [0u8; 16];
    assert_eq!(reader.read(&mut buf).unwrap(), 0);
    reader.close().unwrap();
}
