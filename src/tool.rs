//! External tool discovery and backend selection
//!
//! Resolves the `xz` executable through `$PATH` and verifies it with a
//! `--help` identity probe. The probe spawns one short-lived subprocess and
//! its result is cached for the life of the process; the environment is
//! assumed stable during a single run.

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;

use tracing::debug;

/// Marker the XZ Utils print in their `--help` output.
const XZ_HELP_MARKER: &str = "tukaani.org/xz";

static XZ_TOOL: OnceLock<Option<PathBuf>> = OnceLock::new();

/// Backend a stream adapter is bound to. Chosen once at construction and
/// never switched mid-stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Backend {
    /// Pipe through the external tool at this path.
    Tool(&'static Path),
    /// In-process liblzma stream.
    Library,
}

pub(crate) fn select(library_only: bool) -> Backend {
    if library_only {
        return Backend::Library;
    }
    match xz_path() {
        Some(path) => Backend::Tool(path),
        None => Backend::Library,
    }
}

/// Resolved path of a usable `xz` binary, probed at most once per process.
pub(crate) fn xz_path() -> Option<&'static Path> {
    XZ_TOOL.get_or_init(find_xz).as_deref()
}

fn find_xz() -> Option<PathBuf> {
    let path = match search_path("xz") {
        Some(path) => path,
        None => {
            debug!("xz not found on PATH, using the in-process stream");
            return None;
        }
    };
    let output = match Command::new(&path).arg("--help").output() {
        Ok(output) => output,
        Err(e) => {
            debug!(tool = %path.display(), error = %e, "xz probe failed to run");
            return None;
        }
    };
    if !output.status.success() {
        debug!(tool = %path.display(), status = %output.status, "xz probe exited non-zero");
        return None;
    }
    if !marker_in(&output.stdout) && !marker_in(&output.stderr) {
        debug!(tool = %path.display(), "probe output does not identify XZ Utils");
        return None;
    }
    debug!(tool = %path.display(), "using external xz");
    Some(path)
}

fn marker_in(output: &[u8]) -> bool {
    String::from_utf8_lossy(output).contains(XZ_HELP_MARKER)
}

fn search_path(name: &str) -> Option<PathBuf> {
    let paths = env::var_os("PATH")?;
    for dir in env::split_paths(&paths) {
        if dir.as_os_str().is_empty() {
            continue;
        }
        let candidate = dir.join(name);
        if is_executable(&candidate) {
            return Some(candidate);
        }
        if cfg!(windows) {
            let candidate = candidate.with_extension("exe");
            if is_executable(&candidate) {
                return Some(candidate);
            }
        }
    }
    None
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
