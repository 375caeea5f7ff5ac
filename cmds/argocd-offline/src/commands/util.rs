//! Utilities for command handlers.

use std::{
	io::{self, ErrorKind, Write},
	path::PathBuf,
};

/// A writer wrapper that silently handles broken pipe errors.
///
/// When the underlying writer returns a broken pipe error (EPIPE), this wrapper
/// converts it to a successful write. This allows commands to exit cleanly when
/// output is piped to a process that closes early (e.g.
/// `argocd-offline appset preview-apps appset.yaml | head -1`).
pub struct BrokenPipeGuard<W> {
	inner: W,
}

impl<W> BrokenPipeGuard<W> {
	pub fn new(inner: W) -> Self {
		Self { inner }
	}
}

impl<W: Write> Write for BrokenPipeGuard<W> {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		match self.inner.write(buf) {
			Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(buf.len()),
			other => other,
		}
	}

	fn flush(&mut self) -> io::Result<()> {
		match self.inner.flush() {
			Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(()),
			other => other,
		}
	}
}

/// Parse a `repoURL=localPath` mapping.
///
/// Only the first `=` separates the two halves, so paths may contain `=`.
pub fn parse_local_repo(value: &str) -> Result<(String, PathBuf), String> {
	match value.split_once('=') {
		Some((url, path)) if !url.is_empty() && !path.is_empty() => {
			Ok((url.to_string(), PathBuf::from(path)))
		}
		_ => Err(format!(
			"invalid local repository mapping '{value}': expected 'repoURL=localPath'"
		)),
	}
}
