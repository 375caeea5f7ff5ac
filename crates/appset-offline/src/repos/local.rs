//! Repositories served from local directories.
//!
//! Each repository URL is mapped to a directory holding a checkout of it. The
//! mapping ignores revisions: whatever is on disk is the snapshot every query
//! sees.

use std::{
	collections::BTreeMap,
	fs,
	path::{Component, Path, PathBuf},
};

use globset::GlobBuilder;
use indexmap::IndexMap;
use tracing::{debug, instrument, trace, warn};
use walkdir::WalkDir;

use super::{RepoError, Repos};

/// Normalize a repository URL for comparison by removing one trailing slash
/// and then one `.git` suffix.
pub fn normalize_repo_url(url: &str) -> &str {
	let url = url.strip_suffix('/').unwrap_or(url);
	url.strip_suffix(".git").unwrap_or(url)
}

/// Repository URL to local directory mappings, in the order they were given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepoMappings {
	entries: IndexMap<String, PathBuf>,
}

impl RepoMappings {
	pub fn new() -> Self {
		Self::default()
	}

	/// Map `repo_url` to `local_path`. Mapping an URL again replaces its path.
	pub fn insert(&mut self, repo_url: impl Into<String>, local_path: impl Into<PathBuf>) {
		self.entries.insert(repo_url.into(), local_path.into());
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
		self.entries
			.iter()
			.map(|(url, path)| (url.as_str(), path.as_path()))
	}
}

impl<K: Into<String>, V: Into<PathBuf>> FromIterator<(K, V)> for RepoMappings {
	fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
		let mut mappings = Self::new();
		mappings.extend(iter);
		mappings
	}
}

impl<K: Into<String>, V: Into<PathBuf>> Extend<(K, V)> for RepoMappings {
	fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
		for (url, path) in iter {
			self.insert(url, path);
		}
	}
}

/// Resolves repository URLs to local directories.
#[derive(Debug, Clone, Default)]
pub struct RepoLocator {
	mappings: RepoMappings,
}

impl RepoLocator {
	pub fn new(mappings: RepoMappings) -> Self {
		Self { mappings }
	}

	pub fn mappings(&self) -> &RepoMappings {
		&self.mappings
	}

	/// Local directory for `repo_url`.
	///
	/// An exact match wins; otherwise the first mapping whose normalized URL
	/// equals the normalized `repo_url` is used.
	pub fn resolve(&self, repo_url: &str) -> Result<&Path, RepoError> {
		if let Some(path) = self.mappings.entries.get(repo_url) {
			return Ok(path);
		}

		let normalized = normalize_repo_url(repo_url);
		self.mappings
			.iter()
			.find(|(url, _)| normalize_repo_url(url) == normalized)
			.map(|(_, path)| path)
			.ok_or_else(|| RepoError::NoMapping {
				repo_url: repo_url.to_string(),
			})
	}
}

/// [`Repos`] implementation reading repositories from local directories.
#[derive(Debug, Clone, Default)]
pub struct LocalRepos {
	locator: RepoLocator,
}

impl LocalRepos {
	pub fn new(mappings: RepoMappings) -> Self {
		Self::from_locator(RepoLocator::new(mappings))
	}

	pub fn from_locator(locator: RepoLocator) -> Self {
		Self { locator }
	}

	pub fn locator(&self) -> &RepoLocator {
		&self.locator
	}
}

impl Repos for LocalRepos {
	#[instrument(skip_all, fields(repo_url = %repo_url, pattern = %pattern))]
	fn get_files(
		&self,
		repo_url: &str,
		_revision: &str,
		_project: &str,
		pattern: &str,
		_no_revision_cache: bool,
		_verify_commit: bool,
	) -> Result<BTreeMap<String, Vec<u8>>, RepoError> {
		let root = self.locator.resolve(repo_url)?;

		let matcher = GlobBuilder::new(pattern)
			.literal_separator(true)
			.build()
			.map_err(|source| RepoError::Pattern {
				pattern: pattern.to_string(),
				source,
			})?
			.compile_matcher();

		let mut files = BTreeMap::new();

		let prefix = literal_prefix(pattern);
		let start = root.join(&prefix);
		if !start.is_dir() {
			debug!(start = %start.display(), "pattern base does not exist");
			return Ok(files);
		}

		let mut walker = WalkDir::new(&start).min_depth(1).sort_by_file_name();
		if let Some(depth) = max_match_depth(pattern, &prefix) {
			walker = walker.max_depth(depth);
		}

		for entry in walker {
			let entry = entry.map_err(|err| walk_error(&start, err))?;
			let relative = relative_slash_path(root, entry.path());
			if !matcher.is_match(&relative) {
				continue;
			}

			let full_path = entry.path();
			let metadata = fs::metadata(full_path).map_err(|source| RepoError::Io {
				path: full_path.to_path_buf(),
				source,
			})?;

			if metadata.is_dir() {
				continue;
			}

			let content = fs::read(full_path).map_err(|source| RepoError::Io {
				path: full_path.to_path_buf(),
				source,
			})?;
			trace!(file = %relative, bytes = content.len(), "matched file");
			files.insert(relative, content);
		}

		debug!(count = files.len(), "matched files");
		Ok(files)
	}

	#[instrument(skip_all, fields(repo_url = %repo_url))]
	fn get_directories(
		&self,
		repo_url: &str,
		_revision: &str,
		_project: &str,
		_no_revision_cache: bool,
		_verify_commit: bool,
	) -> Result<Vec<String>, RepoError> {
		let root = self.locator.resolve(repo_url)?;

		let mut directories = Vec::new();
		for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
			let entry = entry.map_err(|err| walk_error(root, err))?;
			if entry.file_type().is_dir() {
				directories.push(relative_slash_path(root, entry.path()));
			}
		}

		debug!(count = directories.len(), "listed directories");
		Ok(directories)
	}
}

/// Leading directory segments of `pattern` that contain no glob syntax.
///
/// The last segment always names the entries being matched, so it is never
/// part of the prefix.
fn literal_prefix(pattern: &str) -> PathBuf {
	let mut segments: Vec<&str> = pattern.split('/').collect();
	segments.pop();
	segments
		.into_iter()
		.take_while(|segment| {
			!segment.is_empty()
				&& *segment != "."
				&& *segment != ".."
				&& !segment.contains(['*', '?', '[', '{', '\\'])
		})
		.collect()
}

/// Deepest entry below the walk start that `pattern` can match, or `None`
/// when a `**` lets it match at any depth.
fn max_match_depth(pattern: &str, prefix: &Path) -> Option<usize> {
	if pattern.contains("**") {
		return None;
	}
	let segments = pattern.split('/').count();
	Some(segments.saturating_sub(prefix.components().count()).max(1))
}

/// `path` relative to `root`, joined with `/` on every platform.
fn relative_slash_path(root: &Path, path: &Path) -> String {
	let relative = path.strip_prefix(root).unwrap_or(path);
	let joined = relative
		.components()
		.filter_map(|component| match component {
			Component::Normal(name) => Some(name.to_string_lossy()),
			_ => None,
		})
		.collect::<Vec<_>>()
		.join("/");
	if relative.to_str().is_none() {
		warn!(path = %joined, "path is not valid UTF-8, using a lossy name");
	}
	joined
}

fn walk_error(root: &Path, err: walkdir::Error) -> RepoError {
	let path = err.path().unwrap_or(root).to_path_buf();
	RepoError::Io {
		path,
		source: err.into(),
	}
}
