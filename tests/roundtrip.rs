use std::fs::File;
use std::io::{self, Cursor, Read, Write};
use std::process::Command;
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::thread;

use xz_pipe::{CancelToken, XzOptions, XzReader, XzWriter};

const MSG: &[u8] = b"Hello, world!";

// External-tool tests are skipped when `xz` is not installed, so the suite
// stays green on minimal systems; the library backend is always covered.
fn xz_available() -> bool {
    Command::new("xz").arg("--version").output().is_ok()
}

fn opts(library_only: bool) -> XzOptions {
    if library_only {
        XzOptions::new().library_only()
    } else {
        XzOptions::new()
    }
}

fn compress(data: &[u8], library_only: bool) -> Vec<u8> {
    let mut writer =
        XzWriter::with_options(CancelToken::new(), Vec::new(), opts(library_only)).unwrap();
    writer.write_all(data).unwrap();
    writer.finish().unwrap()
}

fn decompress(compressed: Vec<u8>, library_only: bool) -> io::Result<Vec<u8>> {
    let mut reader = XzReader::with_options(
        CancelToken::new(),
        Cursor::new(compressed),
        opts(library_only),
    )
    .unwrap();
    let mut data = Vec::new();
    reader.read_to_end(&mut data)?;
    Ok(data)
}

fn generate_compressible_data(size: usize) -> Vec<u8> {
    let pattern = b"The quick brown fox jumps over the lazy dog. ";
    let mut data = Vec::with_capacity(size);
    while data.len() < size {
        data.extend_from_slice(pattern);
    }
    data.truncate(size);
    data
}

#[test]
fn hello_world_roundtrip_library() {
    let compressed = compress(MSG, true);
    let data = decompress(compressed, true).unwrap();
    assert_eq!(data, MSG);
    assert_eq!(data.len(), 13);
}

#[test]
fn hello_world_roundtrip_tool() {
    if !xz_available() {
        eprintln!("skipping test: `xz` not found");
        return;
    }
    let compressed = compress(MSG, false);
    let data = decompress(compressed, false).unwrap();
    assert_eq!(data, MSG);
    assert_eq!(data.len(), 13);
}

#[test]
fn backend_parity_both_directions() {
    if !xz_available() {
        eprintln!("skipping test: `xz` not found");
        return;
    }
    let payload = generate_compressible_data(200_000);

    let via_tool = compress(&payload, false);
    let via_library = compress(&payload, true);

    // Either compressed form must decode identically on either backend.
    assert_eq!(decompress(via_tool.clone(), true).unwrap(), payload);
    assert_eq!(decompress(via_tool, false).unwrap(), payload);
    assert_eq!(decompress(via_library.clone(), false).unwrap(), payload);
    assert_eq!(decompress(via_library, true).unwrap(), payload);
}

#[test]
fn empty_payload_roundtrip() {
    for library_only in [true, false] {
        if !library_only && !xz_available() {
            continue;
        }
        let compressed = compress(b"", library_only);
        assert!(!compressed.is_empty(), "an empty stream still has a container");
        let data = decompress(compressed, library_only).unwrap();
        assert!(data.is_empty());
    }
}

#[test]
fn large_payload_roundtrip_library() {
    let payload = generate_compressible_data(4 * 1024 * 1024);
    let compressed = compress(&payload, true);
    assert!(compressed.len() < payload.len() / 2);
    assert_eq!(decompress(compressed, true).unwrap(), payload);
}

// Payloads well past the OS pipe buffer exercise backpressure through the
// subprocess without deadlocking.
#[test]
fn large_payload_roundtrip_tool() {
    if !xz_available() {
        eprintln!("skipping test: `xz` not found");
        return;
    }
    let payload = generate_compressible_data(4 * 1024 * 1024);
    let compressed = compress(&payload, false);
    assert_eq!(decompress(compressed, false).unwrap(), payload);
}

#[test]
fn roundtrip_via_file() {
    use tempfile::tempdir;

    let dir = tempdir().unwrap();
    let path = dir.path().join("payload.xz");
    let payload = generate_compressible_data(100_000);

    let file = File::create(&path).unwrap();
    let mut writer = XzWriter::new(CancelToken::new(), file).unwrap();
    writer.write_all(&payload).unwrap();
    let file = writer.finish().unwrap();
    drop(file);

    let mut reader = XzReader::new(CancelToken::new(), File::open(&path).unwrap()).unwrap();
    let mut data = Vec::new();
    reader.read_to_end(&mut data).unwrap();
    assert_eq!(data, payload);
}

// Minimal bounded pipe: the writer side blocks once the channel is full, the
// reader side blocks until a chunk arrives, like an OS pipe.
struct ChanWriter {
    tx: SyncSender<Vec<u8>>,
}

impl Write for ChanWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.tx
            .send(buf.to_vec())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "reader side gone"))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct ChanReader {
    rx: Receiver<Vec<u8>>,
    pending: Vec<u8>,
    pos: usize,
}

impl Read for ChanReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos == self.pending.len() {
            match self.rx.recv() {
                Ok(chunk) => {
                    self.pending = chunk;
                    self.pos = 0;
                }
                Err(_) => return Ok(0),
            }
        }
        let n = (self.pending.len() - self.pos).min(buf.len());
        buf[..n].copy_from_slice(&self.pending[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

fn chan_pipe(depth: usize) -> (ChanWriter, ChanReader) {
    let (tx, rx) = sync_channel(depth);
    (
        ChanWriter { tx },
        ChanReader {
            rx,
            pending: Vec::new(),
            pos: 0,
        },
    )
}

// A producer thread compressing into a bounded pipe while this thread drains
// the decompressor must finish without deadlock for payloads far beyond the
// pipe depth.
#[test]
fn concurrent_producer_consumer() {
    for library_only in [true, false] {
        if !library_only && !xz_available() {
            continue;
        }
        let payload = generate_compressible_data(2 * 1024 * 1024);
        let (chan_writer, chan_reader) = chan_pipe(4);

        let producer = {
            let payload = payload.clone();
            thread::spawn(move || {
                let mut writer =
                    XzWriter::with_options(CancelToken::new(), chan_writer, opts(library_only))
                        .unwrap();
                writer.write_all(&payload).unwrap();
                writer.close().unwrap();
            })
        };

        let mut reader =
            XzReader::with_options(CancelToken::new(), chan_reader, opts(library_only)).unwrap();
        let mut data = Vec::new();
        reader.read_to_end(&mut data).unwrap();

        producer.join().unwrap();
        assert_eq!(data, payload);
    }
}
