//! Configuration file support for argocd-offline
//!
//! Supports `.argocd-offline.yaml` files placed next to an ApplicationSet
//! manifest or in any directory above it. argocd-offline searches from the
//! manifest's directory upward to the filesystem root.

use std::{
	fs,
	path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use appset_offline::RepoMappings;
use indexmap::IndexMap;
use serde::Deserialize;
use tracing::debug;

use crate::output::OutputFormat;

/// The name of the config file argocd-offline looks for
pub const CONFIG_FILE_NAME: &str = ".argocd-offline.yaml";

/// Root configuration structure for .argocd-offline.yaml
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineConfig {
	/// Repository URL to local checkout, in file order, relative paths being
	/// resolved against the directory holding the config file
	#[serde(default)]
	pub local_repos: IndexMap<String, PathBuf>,

	/// Output format used when `--output` is not given
	#[serde(default)]
	pub output: Option<OutputFormat>,

	#[serde(skip)]
	base_dir: PathBuf,
}

impl OfflineConfig {
	/// Load config by searching from the given directory upward
	pub fn load_from_directory(start_dir: &Path) -> Result<Option<Self>> {
		match find_config_file(start_dir) {
			Some(config_path) => Self::load_from_file(&config_path).map(Some),
			None => Ok(None),
		}
	}

	/// Load config from a specific file path
	pub fn load_from_file(path: &Path) -> Result<Self> {
		let content = fs::read_to_string(path)
			.with_context(|| format!("failed to read config file: {}", path.display()))?;
		let mut config: OfflineConfig = serde_yaml::from_str(&content)
			.with_context(|| format!("failed to parse config file: {}", path.display()))?;
		config.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
		debug!(path = %path.display(), repos = config.local_repos.len(), "loaded config");
		Ok(config)
	}

	/// Repository mappings declared in the file, with paths made absolute
	/// relative to the file's directory.
	pub fn repo_mappings(&self) -> RepoMappings {
		self.local_repos
			.iter()
			.map(|(url, path)| (url.clone(), self.base_dir.join(path)))
			.collect()
	}
}

/// Search for a config file starting from `start_dir` and walking up to the filesystem root
pub fn find_config_file(start_dir: &Path) -> Option<PathBuf> {
	let start = start_dir
		.canonicalize()
		.unwrap_or_else(|_| start_dir.to_path_buf());

	start
		.ancestors()
		.map(|dir| dir.join(CONFIG_FILE_NAME))
		.find(|config_path| config_path.is_file())
}

#[cfg(test)]
mod tests {
	use appset_offline::RepoLocator;
	use indoc::indoc;
	use tempfile::TempDir;

	use super::*;

	#[test]
	fn test_find_config_in_current_dir() {
		let temp = TempDir::new().unwrap();
		fs::write(temp.path().join(CONFIG_FILE_NAME), "{}").unwrap();

		let found = find_config_file(temp.path());
		// Compare file names only to avoid canonicalization issues on macOS
		assert_eq!(
			found.unwrap().file_name().unwrap(),
			std::ffi::OsStr::new(CONFIG_FILE_NAME)
		);
	}

	#[test]
	fn test_find_config_in_parent_dir() {
		let temp = TempDir::new().unwrap();
		fs::write(temp.path().join(CONFIG_FILE_NAME), "{}").unwrap();
		let subdir = temp.path().join("appsets/prod");
		fs::create_dir_all(&subdir).unwrap();

		assert!(find_config_file(&subdir).is_some());
	}

	#[test]
	fn test_no_config_found() {
		let temp = TempDir::new().unwrap();
		assert!(OfflineConfig::load_from_directory(temp.path())
			.unwrap()
			.is_none());
	}

	#[test]
	fn test_load_config() {
		let temp = TempDir::new().unwrap();
		let config_path = temp.path().join(CONFIG_FILE_NAME);
		fs::write(
			&config_path,
			indoc! {"
				localRepos:
				  https://github.com/argoproj/argocd-example-apps.git: ../example-apps
				  https://github.com/org/absolute.git: /srv/absolute
				output: yaml
			"},
		)
		.unwrap();

		let config = OfflineConfig::load_from_file(&config_path).unwrap();

		assert_eq!(config.output, Some(OutputFormat::Yaml));
		let mappings: Vec<_> = config
			.repo_mappings()
			.iter()
			.map(|(url, path)| (url.to_string(), path.to_path_buf()))
			.collect();
		assert_eq!(
			mappings,
			vec![
				(
					"https://github.com/argoproj/argocd-example-apps.git".to_string(),
					temp.path().join("../example-apps")
				),
				(
					"https://github.com/org/absolute.git".to_string(),
					PathBuf::from("/srv/absolute")
				),
			]
		);
	}

	#[test]
	fn test_config_mappings_keep_file_order() {
		let temp = TempDir::new().unwrap();
		let config_path = temp.path().join(CONFIG_FILE_NAME);
		fs::write(
			&config_path,
			indoc! {"
				localRepos:
				  https://x/repo/: /first
				  https://x/repo.git: /second
			"},
		)
		.unwrap();

		let mappings = OfflineConfig::load_from_file(&config_path)
			.unwrap()
			.repo_mappings();

		let urls: Vec<_> = mappings.iter().map(|(url, _)| url).collect();
		assert_eq!(urls, vec!["https://x/repo/", "https://x/repo.git"]);
		assert_eq!(
			RepoLocator::new(mappings).resolve("https://x/repo").unwrap(),
			Path::new("/first")
		);
	}

	#[test]
	fn test_load_config_invalid_output() {
		let temp = TempDir::new().unwrap();
		let config_path = temp.path().join(CONFIG_FILE_NAME);
		fs::write(&config_path, "output: table").unwrap();

		let err = OfflineConfig::load_from_file(&config_path).unwrap_err();
		assert!(err.to_string().contains("failed to parse config file"));
	}
}
