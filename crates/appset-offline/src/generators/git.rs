//! Git generator: parameters from the directories or files of a repository.

use std::{collections::BTreeMap, time::Duration};

use globset::{GlobBuilder, GlobMatcher};
use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

use super::{Generator, GeneratorError, Params};
use crate::{
	client::{Client, ObjectKey},
	repos::Repos,
	template::{replace_templated_string, sanitize_name},
	types::{
		AppProject, ApplicationSet, ApplicationSetGenerator, ApplicationSetTemplate,
		GitGeneratorSpec, GitPathItem,
	},
};

/// Requeue interval used when the generator doesn't set `requeueAfterSeconds`.
pub const DEFAULT_REQUEUE_AFTER: Duration = Duration::from_secs(3 * 60);

/// Generates one parameter set per matching directory, or per object found in
/// matching files.
pub struct GitGenerator<R> {
	repos: R,
	/// Namespace AppProjects are read from; the ApplicationSet's own namespace
	/// when unset.
	namespace: Option<String>,
}

impl<R: Repos> GitGenerator<R> {
	pub fn new(repos: R) -> Self {
		Self {
			repos,
			namespace: None,
		}
	}

	pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
		self.namespace = Some(namespace.into());
		self
	}

	pub fn repos(&self) -> &R {
		&self.repos
	}

	/// Whether commits must be signature-verified, per the template's AppProject.
	fn verify_commit(
		&self,
		app_set: &ApplicationSet,
		client: &dyn Client,
	) -> Result<bool, GeneratorError> {
		let project = app_set.spec.template.project().unwrap_or_default();
		// A templated project can't be resolved before rendering
		if project.contains("{{") {
			return Ok(false);
		}

		let namespace = self
			.namespace
			.as_deref()
			.unwrap_or_else(|| app_set.namespace());
		let mut app_project = AppProject::default();
		client
			.get(&ObjectKey::new(namespace, project), &mut app_project)
			.map_err(|source| GeneratorError::Project {
				project: project.to_string(),
				source,
			})?;

		Ok(!app_project.spec.signature_keys.is_empty())
	}

	fn generate_from_directories(
		&self,
		git: &GitGeneratorSpec,
		app_set: &ApplicationSet,
		no_revision_cache: bool,
		verify_commit: bool,
	) -> Result<Vec<Params>, GeneratorError> {
		let project = app_set.spec.template.project().unwrap_or_default();
		let all_paths = self.repos.get_directories(
			&git.repo_url,
			&git.revision,
			project,
			no_revision_cache,
			verify_commit,
		)?;
		debug!(count = all_paths.len(), "listed repository directories");

		let requested = compile_path_items(&git.directories);
		let use_go_template = app_set.spec.go_template;
		let options = &app_set.spec.go_template_options;

		let mut res = Vec::new();
		for path in all_paths.iter().filter(|p| path_selected(&requested, p)) {
			let mut params = Params::new();
			append_path_params(&mut params, path, None, &git.path_param_prefix, use_go_template);
			append_templated_values(&mut params, &git.values, use_go_template, options)?;
			res.push(params);
		}
		Ok(res)
	}

	fn generate_from_files(
		&self,
		git: &GitGeneratorSpec,
		app_set: &ApplicationSet,
		no_revision_cache: bool,
		verify_commit: bool,
	) -> Result<Vec<Params>, GeneratorError> {
		let project = app_set.spec.template.project().unwrap_or_default();
		let get_files = |pattern: &str| {
			self.repos.get_files(
				&git.repo_url,
				&git.revision,
				project,
				pattern,
				no_revision_cache,
				verify_commit,
			)
		};

		let mut files = BTreeMap::new();
		for item in git.files.iter().filter(|item| !item.exclude) {
			files.extend(get_files(&item.path)?);
		}
		for item in git.files.iter().filter(|item| item.exclude) {
			for path in get_files(&item.path)?.keys() {
				files.remove(path);
			}
		}
		debug!(count = files.len(), "collected generator files");

		let use_go_template = app_set.spec.go_template;
		let options = &app_set.spec.go_template_options;

		let mut res = Vec::new();
		for (path, content) in &files {
			for object in parse_file(path, content)? {
				let mut params = if use_go_template {
					object
				} else {
					let mut flat = Params::new();
					flatten_into(&mut flat, None, &Value::Object(object));
					flat
				};

				let (dir, filename) = split_file_path(path);
				append_path_params(
					&mut params,
					dir,
					Some(filename),
					&git.path_param_prefix,
					use_go_template,
				);
				append_templated_values(&mut params, &git.values, use_go_template, options)?;
				res.push(params);
			}
		}
		Ok(res)
	}
}

impl<R: Repos> Generator for GitGenerator<R> {
	fn get_template<'a>(
		&self,
		generator: &'a ApplicationSetGenerator,
	) -> Option<&'a ApplicationSetTemplate> {
		generator.git.as_ref().map(|git| &git.template)
	}

	fn get_requeue_after(&self, generator: &ApplicationSetGenerator) -> Duration {
		generator
			.git
			.as_ref()
			.and_then(|git| git.requeue_after_seconds)
			.map(Duration::from_secs)
			.unwrap_or(DEFAULT_REQUEUE_AFTER)
	}

	#[instrument(skip_all, fields(app_set = %app_set.name()))]
	fn generate_params(
		&self,
		generator: &ApplicationSetGenerator,
		app_set: &ApplicationSet,
		client: &dyn Client,
	) -> Result<Vec<Params>, GeneratorError> {
		let git = generator.git.as_ref().ok_or(GeneratorError::EmptyGenerator)?;

		let no_revision_cache = app_set.refresh_required();
		let verify_commit = self.verify_commit(app_set, client)?;
		debug!(
			repo_url = %git.repo_url,
			revision = %git.revision,
			no_revision_cache,
			verify_commit,
			"generating git params"
		);

		if !git.directories.is_empty() {
			self.generate_from_directories(git, app_set, no_revision_cache, verify_commit)
		} else if !git.files.is_empty() {
			self.generate_from_files(git, app_set, no_revision_cache, verify_commit)
		} else {
			Err(GeneratorError::EmptyGenerator)
		}
	}
}

fn compile_path_items(items: &[GitPathItem]) -> Vec<(GlobMatcher, bool)> {
	items
		.iter()
		.filter_map(|item| {
			match GlobBuilder::new(&item.path).literal_separator(true).build() {
				Ok(glob) => Some((glob.compile_matcher(), item.exclude)),
				Err(err) => {
					warn!(pattern = %item.path, error = %err, "skipping invalid path pattern");
					None
				}
			}
		})
		.collect()
}

/// A path is selected when an include pattern matches it and no exclude
/// pattern does.
fn path_selected(requested: &[(GlobMatcher, bool)], path: &str) -> bool {
	let mut include = false;
	for (matcher, exclude) in requested {
		if matcher.is_match(path) {
			if *exclude {
				return false;
			}
			include = true;
		}
	}
	include
}

/// Decode a generator file as one object or a list of objects.
///
/// Empty files and empty lists still yield a single empty object.
fn parse_file(path: &str, content: &[u8]) -> Result<Vec<Params>, GeneratorError> {
	if let Ok(single) = serde_yaml::from_slice::<Option<Params>>(content) {
		return Ok(vec![single.unwrap_or_default()]);
	}
	let objects =
		serde_yaml::from_slice::<Vec<Params>>(content).map_err(|source| GeneratorError::ParseFile {
			path: path.to_string(),
			source,
		})?;
	if objects.is_empty() {
		return Ok(vec![Params::new()]);
	}
	Ok(objects)
}

/// Flatten nested objects and arrays into dot-separated string parameters.
fn flatten_into(out: &mut Params, prefix: Option<&str>, value: &Value) {
	let key = |k: &str| match prefix {
		Some(prefix) => format!("{prefix}.{k}"),
		None => k.to_string(),
	};
	match value {
		Value::Object(map) if !map.is_empty() || prefix.is_none() => {
			for (k, v) in map {
				flatten_into(out, Some(&key(k)), v);
			}
		}
		Value::Array(items) if !items.is_empty() => {
			for (i, v) in items.iter().enumerate() {
				flatten_into(out, Some(&key(&i.to_string())), v);
			}
		}
		_ => {
			if let Some(prefix) = prefix {
				out.insert(prefix.to_string(), Value::String(display_value(value)));
			}
		}
	}
}

fn display_value(value: &Value) -> String {
	match value {
		Value::Null => "<nil>".to_string(),
		Value::String(s) => s.clone(),
		Value::Object(_) => "map[]".to_string(),
		Value::Array(_) => "[]".to_string(),
		Value::Bool(_) | Value::Number(_) => value.to_string(),
	}
}

/// Split a file path into its directory (`.` at the root) and file name.
fn split_file_path(path: &str) -> (&str, &str) {
	path.rsplit_once('/').unwrap_or((".", path))
}

fn basename(path: &str) -> &str {
	let trimmed = path.trim_end_matches('/');
	match trimmed.rsplit_once('/') {
		Some((_, base)) => base,
		None if trimmed.is_empty() => ".",
		None => trimmed,
	}
}

fn append_path_params(
	params: &mut Params,
	path: &str,
	filename: Option<&str>,
	prefix: &str,
	use_go_template: bool,
) {
	let base = basename(path);
	let segments = path.split('/');

	if use_go_template {
		let mut path_params = Map::new();
		path_params.insert("path".to_string(), path.into());
		path_params.insert("basename".to_string(), base.into());
		path_params.insert("basenameNormalized".to_string(), sanitize_name(base).into());
		path_params.insert(
			"segments".to_string(),
			Value::Array(segments.map(Value::from).collect()),
		);
		if let Some(filename) = filename {
			path_params.insert("filename".to_string(), filename.into());
			path_params.insert(
				"filenameNormalized".to_string(),
				sanitize_name(filename).into(),
			);
		}

		if prefix.is_empty() {
			params.insert("path".to_string(), Value::Object(path_params));
		} else {
			let mut prefixed = Map::new();
			prefixed.insert("path".to_string(), Value::Object(path_params));
			params.insert(prefix.to_string(), Value::Object(prefixed));
		}
		return;
	}

	let name = if prefix.is_empty() {
		"path".to_string()
	} else {
		format!("{prefix}.path")
	};
	params.insert(name.clone(), path.into());
	params.insert(format!("{name}.basename"), base.into());
	params.insert(format!("{name}.basenameNormalized"), sanitize_name(base).into());
	for (i, segment) in segments.enumerate().filter(|(_, s)| !s.is_empty()) {
		params.insert(format!("{name}[{i}]"), segment.into());
	}
	if let Some(filename) = filename {
		params.insert(format!("{name}.filename"), filename.into());
		params.insert(
			format!("{name}.filenameNormalized"),
			sanitize_name(filename).into(),
		);
	}
}

/// Render the generator's `values` against `params` and add them.
///
/// Go templates always get a `values` object, empty when none are declared.
fn append_templated_values(
	params: &mut Params,
	values: &BTreeMap<String, String>,
	use_go_template: bool,
	options: &[String],
) -> Result<(), GeneratorError> {
	let mut rendered = Map::new();
	for (key, value) in values {
		let result = replace_templated_string(value, params, use_go_template, options)?;
		rendered.insert(key.clone(), Value::String(result));
	}

	if use_go_template {
		params.insert("values".to_string(), Value::Object(rendered));
	} else {
		for (key, value) in rendered {
			params.insert(format!("values.{key}"), value);
		}
	}
	Ok(())
}
