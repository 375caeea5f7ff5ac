//! Common test utilities.

use std::{cell::RefCell, collections::BTreeMap};

use globset::GlobBuilder;
use kube::core::{
	params::{DeleteParams, ListParams, Patch, PatchParams, PostParams},
	GroupVersionKind,
};
use serde_json::Value;

use crate::{
	client::{
		Client, ClientError, Object, ObjectKey, ObjectList, RestMapper, Scheme,
		SubResourceClient,
	},
	repos::{RepoError, Repos},
	types::{AppProject, SignatureKey},
};

/// An in-memory repository for testing.
///
/// Holds a single tree of files; directories are derived from the file paths.
#[derive(Default)]
pub struct MemoryRepos {
	files: BTreeMap<String, Vec<u8>>,
	calls: RefCell<Vec<RepoCall>>,
}

/// Arguments a [`MemoryRepos`] was queried with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoCall {
	pub repo_url: String,
	pub revision: String,
	pub project: String,
	pub no_revision_cache: bool,
	pub verify_commit: bool,
}

impl MemoryRepos {
	pub fn new() -> Self {
		Self::default()
	}

	/// Builder-style method to add a file.
	pub fn with_file(mut self, path: &str, content: impl Into<Vec<u8>>) -> Self {
		self.files.insert(path.to_string(), content.into());
		self
	}

	pub fn calls(&self) -> Vec<RepoCall> {
		self.calls.borrow().clone()
	}

	fn record(&self, repo_url: &str, revision: &str, project: &str, no_cache: bool, verify: bool) {
		self.calls.borrow_mut().push(RepoCall {
			repo_url: repo_url.to_string(),
			revision: revision.to_string(),
			project: project.to_string(),
			no_revision_cache: no_cache,
			verify_commit: verify,
		});
	}
}

impl Repos for MemoryRepos {
	fn get_files(
		&self,
		repo_url: &str,
		revision: &str,
		project: &str,
		pattern: &str,
		no_revision_cache: bool,
		verify_commit: bool,
	) -> Result<BTreeMap<String, Vec<u8>>, RepoError> {
		self.record(repo_url, revision, project, no_revision_cache, verify_commit);
		let matcher = GlobBuilder::new(pattern)
			.literal_separator(true)
			.build()
			.map_err(|source| RepoError::Pattern {
				pattern: pattern.to_string(),
				source,
			})?
			.compile_matcher();

		Ok(self
			.files
			.iter()
			.filter(|(path, _)| matcher.is_match(path.as_str()))
			.map(|(path, content)| (path.clone(), content.clone()))
			.collect())
	}

	fn get_directories(
		&self,
		repo_url: &str,
		revision: &str,
		project: &str,
		no_revision_cache: bool,
		verify_commit: bool,
	) -> Result<Vec<String>, RepoError> {
		self.record(repo_url, revision, project, no_revision_cache, verify_commit);
		let mut dirs = Vec::new();
		for path in self.files.keys() {
			let mut dir = path.as_str();
			while let Some((parent, _)) = dir.rsplit_once('/') {
				if !dirs.iter().any(|d: &String| d == parent) {
					dirs.push(parent.to_string());
				}
				dir = parent;
			}
		}
		dirs.sort();
		Ok(dirs)
	}
}

/// A client serving a single AppProject with fixed signature keys.
///
/// Reads of other kinds fail, and every key passed to `get` is recorded.
#[derive(Default)]
pub struct ProjectClient {
	signature_keys: Vec<String>,
	missing: bool,
	gets: RefCell<Vec<ObjectKey>>,
}

impl ProjectClient {
	pub fn with_signature_keys(keys: &[&str]) -> Self {
		Self {
			signature_keys: keys.iter().map(|k| k.to_string()).collect(),
			..Default::default()
		}
	}

	/// A client that has no AppProjects at all.
	pub fn missing() -> Self {
		Self {
			missing: true,
			..Default::default()
		}
	}

	pub fn gets(&self) -> Vec<ObjectKey> {
		self.gets.borrow().clone()
	}
}

impl Client for ProjectClient {
	fn get(&self, key: &ObjectKey, obj: &mut dyn Object) -> Result<(), ClientError> {
		self.gets.borrow_mut().push(key.clone());
		let kind = obj.group_version_kind().kind;
		let project = obj
			.as_any_mut()
			.downcast_mut::<AppProject>()
			.filter(|_| !self.missing)
			.ok_or_else(|| ClientError::NotFound {
				kind,
				key: key.clone(),
			})?;
		project.metadata.name = Some(key.name.clone());
		project.metadata.namespace = Some(key.namespace.clone());
		project.spec.signature_keys = self
			.signature_keys
			.iter()
			.map(|key_id| SignatureKey {
				key_id: key_id.clone(),
			})
			.collect();
		Ok(())
	}

	fn list(&self, _list: &mut dyn ObjectList, _params: &ListParams) -> Result<(), ClientError> {
		Err(ClientError::Unsupported { operation: "list" })
	}

	fn create(&self, _obj: &mut dyn Object, _params: &PostParams) -> Result<(), ClientError> {
		Err(ClientError::Unsupported { operation: "create" })
	}

	fn update(&self, _obj: &mut dyn Object, _params: &PostParams) -> Result<(), ClientError> {
		Err(ClientError::Unsupported { operation: "update" })
	}

	fn delete(&self, _obj: &dyn Object, _params: &DeleteParams) -> Result<(), ClientError> {
		Err(ClientError::Unsupported { operation: "delete" })
	}

	fn patch(
		&self,
		_obj: &mut dyn Object,
		_patch: &Patch<Value>,
		_params: &PatchParams,
	) -> Result<(), ClientError> {
		Err(ClientError::Unsupported { operation: "patch" })
	}

	fn delete_all_of(
		&self,
		_obj: &dyn Object,
		_delete: &DeleteParams,
		_list: &ListParams,
	) -> Result<(), ClientError> {
		Err(ClientError::Unsupported {
			operation: "delete_all_of",
		})
	}

	fn status(&self) -> Option<&dyn SubResourceClient> {
		None
	}

	fn sub_resource(&self, _sub_resource: &str) -> Option<&dyn SubResourceClient> {
		None
	}

	fn scheme(&self) -> Option<&Scheme> {
		None
	}

	fn rest_mapper(&self) -> Option<&dyn RestMapper> {
		None
	}

	fn group_version_kind_for(&self, obj: &dyn Object) -> Result<GroupVersionKind, ClientError> {
		Ok(obj.group_version_kind())
	}

	fn is_object_namespaced(&self, _obj: &dyn Object) -> Result<bool, ClientError> {
		Ok(true)
	}
}

/// A client that fails the test if it is used at all.
pub struct PanickingClient;

impl Client for PanickingClient {
	fn get(&self, key: &ObjectKey, _obj: &mut dyn Object) -> Result<(), ClientError> {
		panic!("unexpected read of {key}")
	}

	fn list(&self, _list: &mut dyn ObjectList, _params: &ListParams) -> Result<(), ClientError> {
		panic!("unexpected list")
	}

	fn create(&self, _obj: &mut dyn Object, _params: &PostParams) -> Result<(), ClientError> {
		panic!("unexpected create")
	}

	fn update(&self, _obj: &mut dyn Object, _params: &PostParams) -> Result<(), ClientError> {
		panic!("unexpected update")
	}

	fn delete(&self, _obj: &dyn Object, _params: &DeleteParams) -> Result<(), ClientError> {
		panic!("unexpected delete")
	}

	fn patch(
		&self,
		_obj: &mut dyn Object,
		_patch: &Patch<Value>,
		_params: &PatchParams,
	) -> Result<(), ClientError> {
		panic!("unexpected patch")
	}

	fn delete_all_of(
		&self,
		_obj: &dyn Object,
		_delete: &DeleteParams,
		_list: &ListParams,
	) -> Result<(), ClientError> {
		panic!("unexpected delete_all_of")
	}

	fn status(&self) -> Option<&dyn SubResourceClient> {
		panic!("unexpected status")
	}

	fn sub_resource(&self, sub_resource: &str) -> Option<&dyn SubResourceClient> {
		panic!("unexpected sub_resource {sub_resource}")
	}

	fn scheme(&self) -> Option<&Scheme> {
		panic!("unexpected scheme")
	}

	fn rest_mapper(&self) -> Option<&dyn RestMapper> {
		panic!("unexpected rest_mapper")
	}

	fn group_version_kind_for(&self, _obj: &dyn Object) -> Result<GroupVersionKind, ClientError> {
		panic!("unexpected group_version_kind_for")
	}

	fn is_object_namespaced(&self, _obj: &dyn Object) -> Result<bool, ClientError> {
		panic!("unexpected is_object_namespaced")
	}
}
