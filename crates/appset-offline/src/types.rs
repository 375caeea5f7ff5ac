//! Argo CD resource types used during offline generation.
//!
//! Only the fields the generators, the renderer and the resource preview read
//! are typed; everything else is carried through as raw JSON so that rendered
//! Applications keep whatever the ApplicationSet template declared.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// API version shared by all Argo CD resources.
pub const ARGOPROJ_API_VERSION: &str = "argoproj.io/v1alpha1";

/// Annotation requesting that an ApplicationSet bypasses revision caches.
pub const REFRESH_ANNOTATION: &str = "argocd.argoproj.io/application-set-refresh";

fn default_api_version() -> String {
	ARGOPROJ_API_VERSION.to_string()
}

fn is_false(value: &bool) -> bool {
	!value
}

/// ApplicationSet (argoproj.io/v1alpha1)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSet {
	#[serde(default = "default_api_version")]
	pub api_version: String,
	#[serde(default)]
	pub kind: String,
	#[serde(default)]
	pub metadata: ObjectMeta,
	#[serde(default)]
	pub spec: ApplicationSetSpec,
}

impl ApplicationSet {
	/// Name of the ApplicationSet, or an empty string when unnamed.
	pub fn name(&self) -> &str {
		self.metadata.name.as_deref().unwrap_or_default()
	}

	/// Namespace of the ApplicationSet, or an empty string when unset.
	pub fn namespace(&self) -> &str {
		self.metadata.namespace.as_deref().unwrap_or_default()
	}

	/// Whether the refresh annotation asks generators to skip revision caches.
	pub fn refresh_required(&self) -> bool {
		self.metadata
			.annotations
			.as_ref()
			.and_then(|annotations| annotations.get(REFRESH_ANNOTATION))
			.is_some_and(|value| value == "true")
	}
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSetSpec {
	#[serde(default, skip_serializing_if = "is_false")]
	pub go_template: bool,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub go_template_options: Vec<String>,
	#[serde(default)]
	pub generators: Vec<ApplicationSetGenerator>,
	#[serde(default)]
	pub template: ApplicationSetTemplate,
}

/// A single entry of `spec.generators`.
///
/// Exactly one generator kind is expected per entry. Kinds without offline
/// support are kept verbatim in `other` so they can be reported by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSetGenerator {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub git: Option<GitGeneratorSpec>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub list: Option<ListGeneratorSpec>,
	#[serde(flatten)]
	pub other: Map<String, Value>,
}

impl ApplicationSetGenerator {
	/// Name of the generator kind configured in this entry.
	pub fn kind(&self) -> Option<&str> {
		if self.git.is_some() {
			return Some("git");
		}
		if self.list.is_some() {
			return Some("list");
		}
		self.other
			.keys()
			.map(String::as_str)
			.find(|key| *key != "selector")
	}
}

/// `git` generator configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitGeneratorSpec {
	#[serde(rename = "repoURL")]
	pub repo_url: String,
	#[serde(default)]
	pub revision: String,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub directories: Vec<GitPathItem>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub files: Vec<GitPathItem>,
	#[serde(default)]
	pub template: ApplicationSetTemplate,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub requeue_after_seconds: Option<u64>,
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub values: BTreeMap<String, String>,
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub path_param_prefix: String,
}

/// Path pattern of a `directories` or `files` item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitPathItem {
	pub path: String,
	#[serde(default, skip_serializing_if = "is_false")]
	pub exclude: bool,
}

/// `list` generator configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListGeneratorSpec {
	#[serde(default)]
	pub elements: Vec<Value>,
	#[serde(default)]
	pub template: ApplicationSetTemplate,
}

/// Application template, either the ApplicationSet's or a generator override.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicationSetTemplate {
	#[serde(default, skip_serializing_if = "ApplicationSetTemplateMeta::is_empty")]
	pub metadata: ApplicationSetTemplateMeta,
	#[serde(default, skip_serializing_if = "Value::is_null")]
	pub spec: Value,
}

impl ApplicationSetTemplate {
	/// The `spec.project` the template deploys into, if it is a plain string.
	pub fn project(&self) -> Option<&str> {
		self.spec.get("project").and_then(Value::as_str)
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationSetTemplateMeta {
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub name: String,
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub namespace: String,
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub labels: BTreeMap<String, String>,
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub annotations: BTreeMap<String, String>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub finalizers: Vec<String>,
}

impl ApplicationSetTemplateMeta {
	pub fn is_empty(&self) -> bool {
		self.name.is_empty()
			&& self.namespace.is_empty()
			&& self.labels.is_empty()
			&& self.annotations.is_empty()
			&& self.finalizers.is_empty()
	}
}

/// Application (argoproj.io/v1alpha1)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
	#[serde(default = "default_api_version")]
	pub api_version: String,
	#[serde(default)]
	pub kind: String,
	#[serde(default)]
	pub metadata: ObjectMeta,
	#[serde(default)]
	pub spec: ApplicationSpec,
}

impl Application {
	pub fn name(&self) -> &str {
		self.metadata.name.as_deref().unwrap_or_default()
	}
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicationSpec {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub source: Option<ApplicationSource>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub sources: Vec<ApplicationSource>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub destination: Option<ApplicationDestination>,
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSource {
	#[serde(rename = "repoURL")]
	pub repo_url: String,
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub path: String,
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub target_revision: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub chart: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub directory: Option<DirectorySource>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub helm: Option<Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub kustomize: Option<Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub plugin: Option<Value>,
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectorySource {
	#[serde(default, skip_serializing_if = "is_false")]
	pub recurse: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub include: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub exclude: Option<String>,
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationDestination {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub server: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub namespace: Option<String>,
}

/// AppProject (argoproj.io/v1alpha1)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppProject {
	#[serde(default = "default_api_version")]
	pub api_version: String,
	#[serde(default)]
	pub kind: String,
	#[serde(default)]
	pub metadata: ObjectMeta,
	#[serde(default)]
	pub spec: AppProjectSpec,
}

impl Default for AppProject {
	fn default() -> Self {
		Self {
			api_version: default_api_version(),
			kind: "AppProject".to_string(),
			metadata: ObjectMeta::default(),
			spec: AppProjectSpec::default(),
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppProjectSpec {
	/// GnuPG keys that commits must be signed with. Empty means no signature
	/// verification is required.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub signature_keys: Vec<SignatureKey>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub source_repos: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureKey {
	#[serde(rename = "keyID")]
	pub key_id: String,
}
