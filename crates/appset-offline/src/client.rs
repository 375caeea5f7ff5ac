//! Kubernetes client capability surface consumed by generators.
//!
//! Generators only ever read AppProjects through this interface, but the trait
//! mirrors the full read/write surface of a controller client so that any
//! implementation handed to a generator is interchangeable with a live one.

use std::{any::Any, fmt};

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::core::{
	params::{DeleteParams, ListParams, Patch, PatchParams, PostParams},
	GroupVersionKind,
};
use serde_json::Value;
use thiserror::Error;

use crate::types::{AppProject, Application, ApplicationSet};

/// Kubernetes API resource scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceScope {
	/// Resource is namespaced (e.g., Deployment, ConfigMap).
	Namespaced,

	/// Resource is cluster-wide (e.g., Namespace, ClusterRole).
	ClusterWide,
}

/// Name and namespace identifying a single object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ObjectKey {
	pub namespace: String,
	pub name: String,
}

impl ObjectKey {
	pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
		Self {
			namespace: namespace.into(),
			name: name.into(),
		}
	}
}

impl fmt::Display for ObjectKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.namespace.is_empty() {
			write!(f, "{}", self.name)
		} else {
			write!(f, "{}/{}", self.namespace, self.name)
		}
	}
}

/// Errors returned by [`Client`] implementations.
#[derive(Debug, Error)]
pub enum ClientError {
	#[error("{kind} {key} not found")]
	NotFound { kind: String, key: ObjectKey },

	#[error("{operation} is not supported by this client")]
	Unsupported { operation: &'static str },
}

/// A typed Kubernetes object a [`Client`] can read into or write from.
pub trait Object: Any + Send {
	fn group_version_kind(&self) -> GroupVersionKind;
	fn meta(&self) -> &ObjectMeta;
	fn meta_mut(&mut self) -> &mut ObjectMeta;
	fn as_any(&self) -> &dyn Any;
	fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// A list of objects a [`Client`] can fill.
pub trait ObjectList: Any + Send {
	fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Object> ObjectList for Vec<T> {
	fn as_any_mut(&mut self) -> &mut dyn Any {
		self
	}
}

macro_rules! impl_argoproj_object {
	($($ty:ident),* $(,)?) => {$(
		impl Object for $ty {
			fn group_version_kind(&self) -> GroupVersionKind {
				GroupVersionKind::gvk("argoproj.io", "v1alpha1", stringify!($ty))
			}

			fn meta(&self) -> &ObjectMeta {
				&self.metadata
			}

			fn meta_mut(&mut self) -> &mut ObjectMeta {
				&mut self.metadata
			}

			fn as_any(&self) -> &dyn Any {
				self
			}

			fn as_any_mut(&mut self) -> &mut dyn Any {
				self
			}
		}
	)*};
}

impl_argoproj_object!(AppProject, Application, ApplicationSet);

/// Reads and writes of an object's sub-resource (e.g. `status`).
pub trait SubResourceClient {
	fn get(&self, obj: &dyn Object, sub_resource: &mut dyn Object) -> Result<(), ClientError>;
	fn update(&self, obj: &mut dyn Object, params: &PostParams) -> Result<(), ClientError>;
	fn patch(
		&self,
		obj: &mut dyn Object,
		patch: &Patch<Value>,
		params: &PatchParams,
	) -> Result<(), ClientError>;
}

/// Resolves the scope of a kind.
pub trait RestMapper {
	fn scope_of(&self, gvk: &GroupVersionKind) -> Result<ResourceScope, ClientError>;
}

/// Kinds known to be cluster-wide; everything else is assumed namespaced.
const CLUSTER_WIDE_KINDS: &[&str] = &[
	"APIService",
	"CertificateSigningRequest",
	"ClusterRole",
	"ClusterRoleBinding",
	"ComponentStatus",
	"CSIDriver",
	"CSINode",
	"CustomResourceDefinition",
	"MutatingWebhookConfiguration",
	"Namespace",
	"Node",
	"PersistentVolume",
	"PriorityClass",
	"RuntimeClass",
	"StorageClass",
	"ValidatingWebhookConfiguration",
	"VolumeAttachment",
];

/// [`RestMapper`] backed by the built-in Kubernetes kinds, usable without
/// API discovery.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinRestMapper;

impl RestMapper for BuiltinRestMapper {
	fn scope_of(&self, gvk: &GroupVersionKind) -> Result<ResourceScope, ClientError> {
		if CLUSTER_WIDE_KINDS.contains(&gvk.kind.as_str()) {
			Ok(ResourceScope::ClusterWide)
		} else {
			Ok(ResourceScope::Namespaced)
		}
	}
}

/// Registry of the object kinds this crate knows how to decode.
#[derive(Debug, Clone, Default)]
pub struct Scheme {
	kinds: Vec<GroupVersionKind>,
}

impl Scheme {
	/// Scheme with the Argo CD kinds registered.
	pub fn argoproj() -> Self {
		let mut scheme = Self::default();
		for kind in ["AppProject", "Application", "ApplicationSet"] {
			scheme.register(GroupVersionKind::gvk("argoproj.io", "v1alpha1", kind));
		}
		scheme
	}

	pub fn register(&mut self, gvk: GroupVersionKind) {
		if !self.kinds.contains(&gvk) {
			self.kinds.push(gvk);
		}
	}

	/// Whether `api_version` + `kind` name a registered kind.
	pub fn recognizes(&self, api_version: &str, kind: &str) -> bool {
		self.kinds
			.iter()
			.any(|gvk| gvk.kind == kind && gvk.api_version() == api_version)
	}
}

/// Controller client capability set.
///
/// Generators receive a `&dyn Client` and are expected to only read from it.
pub trait Client {
	/// Read the object identified by `key` into `obj`.
	fn get(&self, key: &ObjectKey, obj: &mut dyn Object) -> Result<(), ClientError>;
	fn list(&self, list: &mut dyn ObjectList, params: &ListParams) -> Result<(), ClientError>;
	fn create(&self, obj: &mut dyn Object, params: &PostParams) -> Result<(), ClientError>;
	fn update(&self, obj: &mut dyn Object, params: &PostParams) -> Result<(), ClientError>;
	fn delete(&self, obj: &dyn Object, params: &DeleteParams) -> Result<(), ClientError>;
	fn patch(
		&self,
		obj: &mut dyn Object,
		patch: &Patch<Value>,
		params: &PatchParams,
	) -> Result<(), ClientError>;
	fn delete_all_of(
		&self,
		obj: &dyn Object,
		delete: &DeleteParams,
		list: &ListParams,
	) -> Result<(), ClientError>;
	fn status(&self) -> Option<&dyn SubResourceClient>;
	fn sub_resource(&self, sub_resource: &str) -> Option<&dyn SubResourceClient>;
	fn scheme(&self) -> Option<&Scheme>;
	fn rest_mapper(&self) -> Option<&dyn RestMapper>;
	fn group_version_kind_for(&self, obj: &dyn Object) -> Result<GroupVersionKind, ClientError>;
	fn is_object_namespaced(&self, obj: &dyn Object) -> Result<bool, ClientError>;
}

/// [`Client`] with no cluster behind it.
///
/// Every object is reported as missing and every write fails with
/// [`ClientError::Unsupported`]. Kind and scope queries are answered from
/// [`Scheme::argoproj`] and [`BuiltinRestMapper`].
#[derive(Debug, Clone, Default)]
pub struct DisconnectedClient {
	scheme: Scheme,
}

impl DisconnectedClient {
	pub fn new() -> Self {
		Self {
			scheme: Scheme::argoproj(),
		}
	}
}

impl Client for DisconnectedClient {
	fn get(&self, key: &ObjectKey, obj: &mut dyn Object) -> Result<(), ClientError> {
		Err(ClientError::NotFound {
			kind: obj.group_version_kind().kind,
			key: key.clone(),
		})
	}

	fn list(&self, _list: &mut dyn ObjectList, _params: &ListParams) -> Result<(), ClientError> {
		Ok(())
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
		Some(&self.scheme)
	}

	fn rest_mapper(&self) -> Option<&dyn RestMapper> {
		Some(&BuiltinRestMapper)
	}

	fn group_version_kind_for(&self, obj: &dyn Object) -> Result<GroupVersionKind, ClientError> {
		Ok(obj.group_version_kind())
	}

	fn is_object_namespaced(&self, obj: &dyn Object) -> Result<bool, ClientError> {
		let scope = BuiltinRestMapper.scope_of(&obj.group_version_kind())?;
		Ok(scope == ResourceScope::Namespaced)
	}
}

#[cfg(test)]
mod tests {
	use assert_matches::assert_matches;
	use rstest::rstest;

	use super::*;

	#[test]
	fn test_disconnected_client_finds_nothing() {
		let client = DisconnectedClient::new();
		let mut project = AppProject::default();

		let result = client.get(&ObjectKey::new("argocd", "default"), &mut project);

		assert_matches!(
			result,
			Err(ClientError::NotFound { kind, key })
				if kind == "AppProject" && key == ObjectKey::new("argocd", "default")
		);
		assert_eq!(project, AppProject::default());
	}

	#[test]
	fn test_disconnected_client_rejects_writes() {
		let client = DisconnectedClient::new();
		let mut project = AppProject::default();

		assert_matches!(
			client.create(&mut project, &PostParams::default()),
			Err(ClientError::Unsupported { operation: "create" })
		);
		assert_matches!(
			client.delete(&project, &DeleteParams::default()),
			Err(ClientError::Unsupported { operation: "delete" })
		);
		assert!(client
			.scheme()
			.is_some_and(|scheme| scheme.recognizes("argoproj.io/v1alpha1", "AppProject")));
		assert!(client.is_object_namespaced(&project).unwrap());
	}

	#[rstest]
	#[case::namespace("v1", "Namespace", ResourceScope::ClusterWide)]
	#[case::cluster_role("rbac.authorization.k8s.io/v1", "ClusterRole", ResourceScope::ClusterWide)]
	#[case::config_map("v1", "ConfigMap", ResourceScope::Namespaced)]
	#[case::deployment("apps/v1", "Deployment", ResourceScope::Namespaced)]
	#[case::unknown_crd("example.com/v1", "Widget", ResourceScope::Namespaced)]
	fn test_builtin_rest_mapper_scope(
		#[case] api_version: &str,
		#[case] kind: &str,
		#[case] expected: ResourceScope,
	) {
		let (group, version) = api_version.rsplit_once('/').unwrap_or(("", api_version));
		let gvk = GroupVersionKind::gvk(group, version, kind);
		assert_eq!(BuiltinRestMapper.scope_of(&gvk).unwrap(), expected);
	}

	#[test]
	fn test_argoproj_scheme_recognizes_argo_kinds() {
		let scheme = Scheme::argoproj();
		assert!(scheme.recognizes("argoproj.io/v1alpha1", "ApplicationSet"));
		assert!(scheme.recognizes("argoproj.io/v1alpha1", "Application"));
		assert!(!scheme.recognizes("argoproj.io/v1beta1", "Application"));
		assert!(!scheme.recognizes("v1", "ConfigMap"));
	}

	#[test]
	fn test_object_key_display() {
		assert_eq!(ObjectKey::new("argocd", "default").to_string(), "argocd/default");
		assert_eq!(ObjectKey::new("", "default").to_string(), "default");
	}

	#[test]
	fn test_argoproj_objects_report_their_kind() {
		let project = AppProject::default();
		let gvk = project.group_version_kind();
		assert_eq!(gvk.kind, "AppProject");
		assert_eq!(gvk.api_version(), "argoproj.io/v1alpha1");
	}
}
