//! Previewing ApplicationSets: generated Applications and the resources they
//! would deploy.

use std::{
	collections::BTreeMap,
	fs, io,
	path::{Path, PathBuf},
};

use globset::{Glob, GlobMatcher};
use kube::core::GroupVersionKind;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::{
	client::{BuiltinRestMapper, DisconnectedClient, ResourceScope, RestMapper, Scheme},
	generators::{
		list::ListGenerator, offline::OfflineGitGenerator, Generator, GeneratorError,
	},
	repos::{local::LocalRepos, RepoError, Repos},
	template::{merge_templates, render_application, TemplateError},
	types::{Application, ApplicationSet, ApplicationSource},
};

/// Manifest extensions a plain directory source deploys.
const MANIFEST_EXTENSIONS: &str = "{yaml,yml,json}";

/// Files whose presence turns a directory into a Kustomize or Helm source.
const TOOL_MARKERS: &[&str] = &[
	"kustomization.yaml",
	"kustomization.yml",
	"Kustomization",
	"Chart.yaml",
];

#[derive(Debug, Error)]
pub enum PreviewError {
	#[error("failed to read {}", path.display())]
	Read {
		path: PathBuf,
		#[source]
		source: io::Error,
	},

	#[error("failed to parse {}", path.display())]
	Parse {
		path: PathBuf,
		#[source]
		source: serde_yaml::Error,
	},

	#[error("invalid {kind} in {}", path.display())]
	Decode {
		kind: String,
		path: PathBuf,
		#[source]
		source: serde_json::Error,
	},

	#[error("unsupported generator: {kind}")]
	UnsupportedGenerator { kind: String },

	#[error("failed to generate params for ApplicationSet {app_set}")]
	Generator {
		app_set: String,
		#[source]
		source: GeneratorError,
	},

	#[error(transparent)]
	Template(#[from] TemplateError),

	#[error("Application {app}: {reason}")]
	UnsupportedSource { app: String, reason: String },

	#[error("invalid glob {pattern}")]
	Pattern {
		pattern: String,
		#[source]
		source: globset::Error,
	},

	#[error(transparent)]
	Repo(#[from] RepoError),

	#[error("failed to parse manifest {path}")]
	Manifest {
		path: String,
		#[source]
		source: serde_yaml::Error,
	},

	#[error("manifest {path} contains a non-object document")]
	NotAnObject { path: String },
}

/// Argo CD documents found in a manifest file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Manifests {
	pub app_sets: Vec<ApplicationSet>,
	pub applications: Vec<Application>,
}

/// Load every ApplicationSet and Application from a (multi-document) YAML file.
///
/// Documents of other kinds are skipped.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_manifests(path: &Path) -> Result<Manifests, PreviewError> {
	let content = fs::read_to_string(path).map_err(|source| PreviewError::Read {
		path: path.to_path_buf(),
		source,
	})?;

	let scheme = Scheme::argoproj();
	let mut manifests = Manifests::default();

	for document in serde_yaml::Deserializer::from_str(&content) {
		let value = Value::deserialize(document).map_err(|source| PreviewError::Parse {
			path: path.to_path_buf(),
			source,
		})?;
		if value.is_null() {
			continue;
		}

		let api_version = value.get("apiVersion").and_then(Value::as_str).unwrap_or_default();
		let kind = value.get("kind").and_then(Value::as_str).unwrap_or_default().to_string();
		if !scheme.recognizes(api_version, &kind) {
			debug!(api_version, kind = %kind, "skipping document");
			continue;
		}

		let decode = |source| PreviewError::Decode {
			kind: kind.clone(),
			path: path.to_path_buf(),
			source,
		};
		match kind.as_str() {
			"ApplicationSet" => manifests
				.app_sets
				.push(serde_json::from_value(value).map_err(decode)?),
			"Application" => manifests
				.applications
				.push(serde_json::from_value(value).map_err(decode)?),
			_ => debug!(kind = %kind, "skipping document"),
		}
	}

	Ok(manifests)
}

/// Generators available to a preview, by generator kind.
pub struct GeneratorSet {
	generators: BTreeMap<&'static str, Box<dyn Generator>>,
}

impl GeneratorSet {
	pub fn empty() -> Self {
		Self {
			generators: BTreeMap::new(),
		}
	}

	/// The offline Git generator over `repos`, plus the List generator.
	pub fn offline(repos: LocalRepos) -> Self {
		Self::empty()
			.with("git", OfflineGitGenerator::new(repos))
			.with("list", ListGenerator::new())
	}

	pub fn with(mut self, kind: &'static str, generator: impl Generator + 'static) -> Self {
		self.generators.insert(kind, Box::new(generator));
		self
	}

	pub fn get(&self, kind: &str) -> Option<&dyn Generator> {
		self.generators.get(kind).map(|g| g.as_ref())
	}
}

/// Render the Applications an ApplicationSet generates, in generator order.
///
/// Generators are handed a [`DisconnectedClient`], so a generator that reads
/// an AppProject fails unless it supplies its own client, as
/// [`OfflineGitGenerator`] does.
#[instrument(skip_all, fields(app_set = %app_set.name()))]
pub fn preview_applications(
	app_set: &ApplicationSet,
	generators: &GeneratorSet,
) -> Result<Vec<Application>, PreviewError> {
	let client = DisconnectedClient::new();
	let mut applications = Vec::new();

	for entry in &app_set.spec.generators {
		let kind = entry.kind().unwrap_or("<none>");
		let generator = generators
			.get(kind)
			.ok_or_else(|| PreviewError::UnsupportedGenerator {
				kind: kind.to_string(),
			})?;

		let params = generator
			.generate_params(entry, app_set, &client)
			.map_err(|source| PreviewError::Generator {
				app_set: app_set.name().to_string(),
				source,
			})?;
		debug!(kind, count = params.len(), "generated params");

		let template = merge_templates(&app_set.spec.template, generator.get_template(entry))?;
		for params in &params {
			applications.push(render_application(&template, params, app_set)?);
		}
	}

	info!(count = applications.len(), "rendered applications");
	Ok(applications)
}

/// Resources deployed by a plain directory Application source.
///
/// Objects without a namespace get the destination namespace unless their kind
/// is cluster-wide. With `kind` set, only objects of that kind (compared
/// case-insensitively) are returned.
#[instrument(skip_all, fields(app = %app.name()))]
pub fn preview_resources(
	app: &Application,
	repos: &dyn Repos,
	kind: Option<&str>,
) -> Result<Vec<Value>, PreviewError> {
	let source = directory_source(app)?;
	let base = source.path.trim_start_matches("./").trim_matches('/');
	let base = if base == "." { "" } else { base };
	let join = |rest: &str| {
		if base.is_empty() {
			rest.to_string()
		} else {
			format!("{base}/{rest}")
		}
	};

	let project = app
		.spec
		.extra
		.get("project")
		.and_then(Value::as_str)
		.unwrap_or_default();
	let get_files = |pattern: &str| {
		repos.get_files(
			&source.repo_url,
			&source.target_revision,
			project,
			pattern,
			false,
			false,
		)
	};

	for marker in TOOL_MARKERS {
		if !get_files(&join(marker))?.is_empty() {
			return Err(unsupported(app, format!("{marker} sources are not supported")));
		}
	}

	let directory = source.directory.clone().unwrap_or_default();
	let pattern = if directory.recurse {
		join(&format!("**/*.{MANIFEST_EXTENSIONS}"))
	} else {
		join(&format!("*.{MANIFEST_EXTENSIONS}"))
	};
	let include = directory.include.as_deref().map(compile_glob).transpose()?;
	let exclude = directory.exclude.as_deref().map(compile_glob).transpose()?;

	let namespace = app
		.spec
		.destination
		.as_ref()
		.and_then(|d| d.namespace.as_deref())
		.filter(|ns| !ns.is_empty());

	let mut resources = Vec::new();
	for (path, content) in get_files(&pattern)? {
		let relative = path
			.strip_prefix(base)
			.map(|p| p.trim_start_matches('/'))
			.unwrap_or(&path);
		if include.as_ref().is_some_and(|g| !g.is_match(relative))
			|| exclude.as_ref().is_some_and(|g| g.is_match(relative))
		{
			debug!(file = %path, "file filtered out");
			continue;
		}

		for mut object in parse_resources(&path, &content)? {
			if let Some(namespace) = namespace {
				inject_namespace(&mut object, namespace);
			}
			resources.push(object);
		}
	}

	if let Some(kind) = kind {
		resources.retain(|object| {
			object
				.get("kind")
				.and_then(Value::as_str)
				.is_some_and(|k| k.eq_ignore_ascii_case(kind))
		});
	}

	info!(count = resources.len(), "collected resources");
	Ok(resources)
}

fn unsupported(app: &Application, reason: impl Into<String>) -> PreviewError {
	PreviewError::UnsupportedSource {
		app: app.name().to_string(),
		reason: reason.into(),
	}
}

fn directory_source(app: &Application) -> Result<&ApplicationSource, PreviewError> {
	if !app.spec.sources.is_empty() {
		return Err(unsupported(app, "multi-source Applications are not supported"));
	}
	let source = app
		.spec
		.source
		.as_ref()
		.ok_or_else(|| unsupported(app, "no source"))?;

	if source.chart.is_some() || source.helm.is_some() {
		return Err(unsupported(app, "Helm sources are not supported"));
	}
	if source.kustomize.is_some() {
		return Err(unsupported(app, "Kustomize sources are not supported"));
	}
	if source.plugin.is_some() {
		return Err(unsupported(app, "plugin sources are not supported"));
	}
	Ok(source)
}

fn compile_glob(pattern: &str) -> Result<GlobMatcher, PreviewError> {
	Glob::new(pattern)
		.map(|glob| glob.compile_matcher())
		.map_err(|source| PreviewError::Pattern {
			pattern: pattern.to_string(),
			source,
		})
}

/// Split a manifest file into objects, expanding `*List` kinds into their items.
fn parse_resources(path: &str, content: &[u8]) -> Result<Vec<Value>, PreviewError> {
	let mut objects = Vec::new();
	for document in serde_yaml::Deserializer::from_slice(content) {
		let value = Value::deserialize(document).map_err(|source| PreviewError::Manifest {
			path: path.to_string(),
			source,
		})?;
		match value {
			Value::Null => {}
			Value::Object(mut object) => {
				let is_list = object
					.get("kind")
					.and_then(Value::as_str)
					.is_some_and(|kind| kind.ends_with("List"));
				match object.remove("items") {
					Some(Value::Array(items)) if is_list => objects.extend(items),
					Some(items) => {
						object.insert("items".to_string(), items);
						objects.push(Value::Object(object));
					}
					None => objects.push(Value::Object(object)),
				}
			}
			_ => {
				return Err(PreviewError::NotAnObject {
					path: path.to_string(),
				})
			}
		}
	}
	Ok(objects)
}

fn gvk_of(object: &Value) -> GroupVersionKind {
	let api_version = object.get("apiVersion").and_then(Value::as_str).unwrap_or_default();
	let kind = object.get("kind").and_then(Value::as_str).unwrap_or_default();
	let (group, version) = api_version.rsplit_once('/').unwrap_or(("", api_version));
	GroupVersionKind::gvk(group, version, kind)
}

fn inject_namespace(object: &mut Value, namespace: &str) {
	let namespaced = BuiltinRestMapper
		.scope_of(&gvk_of(object))
		.is_ok_and(|scope| scope == ResourceScope::Namespaced);
	if !namespaced {
		return;
	}
	let Some(object) = object.as_object_mut() else {
		return;
	};
	let metadata = object
		.entry("metadata")
		.or_insert_with(|| Value::Object(Default::default()));
	if let Some(metadata) = metadata.as_object_mut() {
		let has_namespace = metadata
			.get("namespace")
			.and_then(Value::as_str)
			.is_some_and(|ns| !ns.is_empty());
		if !has_namespace {
			metadata.insert("namespace".to_string(), namespace.into());
		}
	}
}
