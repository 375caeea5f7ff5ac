//! Repository read API used by the generators.

use std::{collections::BTreeMap, io, path::PathBuf};

use thiserror::Error;

pub mod local;

/// Errors that can occur when querying a repository.
#[derive(Debug, Error)]
pub enum RepoError {
	#[error("no local mapping found for repository URL: {repo_url}")]
	NoMapping { repo_url: String },

	#[error("error matching pattern {pattern}")]
	Pattern {
		pattern: String,
		#[source]
		source: globset::Error,
	},

	#[error("error reading {}", path.display())]
	Io {
		path: PathBuf,
		#[source]
		source: io::Error,
	},
}

/// Read access to the contents of source repositories.
///
/// `revision`, `project`, `no_revision_cache` and `verify_commit` describe how
/// a remote implementation would pick and validate a commit; implementations
/// without revisions may ignore them.
pub trait Repos {
	/// Contents of the files (not directories) matching `pattern`, keyed by
	/// their `/`-separated path relative to the repository root.
	fn get_files(
		&self,
		repo_url: &str,
		revision: &str,
		project: &str,
		pattern: &str,
		no_revision_cache: bool,
		verify_commit: bool,
	) -> Result<BTreeMap<String, Vec<u8>>, RepoError>;

	/// All directories of the repository, relative to its root.
	fn get_directories(
		&self,
		repo_url: &str,
		revision: &str,
		project: &str,
		no_revision_cache: bool,
		verify_commit: bool,
	) -> Result<Vec<String>, RepoError>;
}
