//! Policy bypass client.
//!
//! The Git generator reads the ApplicationSet's AppProject to decide whether
//! commits must carry a trusted GnuPG signature. [`PolicyBypassClient`] answers
//! that read with a project that lists no signature keys, which is the only
//! point where trust checks are switched off in offline mode.

use kube::core::{
	params::{DeleteParams, ListParams, Patch, PatchParams, PostParams},
	GroupVersionKind,
};
use serde_json::Value;
use tracing::trace;

use crate::{
	client::{
		Client, ClientError, Object, ObjectKey, ObjectList, RestMapper, Scheme,
		SubResourceClient,
	},
	types::AppProject,
};

/// Stateless [`Client`] whose reads always succeed.
///
/// `get` fills AppProjects with the requested name and namespace and an empty
/// signature key list. Other kinds are left untouched. Every other operation
/// reports success without doing anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyBypassClient;

impl PolicyBypassClient {
	pub fn new() -> Self {
		Self
	}
}

impl Client for PolicyBypassClient {
	fn get(&self, key: &ObjectKey, obj: &mut dyn Object) -> Result<(), ClientError> {
		if let Some(project) = obj.as_any_mut().downcast_mut::<AppProject>() {
			trace!(project = %key, "answering AppProject read without signature keys");
			project.metadata.name = Some(key.name.clone());
			project.metadata.namespace = Some(key.namespace.clone());
			project.spec.signature_keys = Vec::new();
		}
		Ok(())
	}

	fn list(&self, _list: &mut dyn ObjectList, _params: &ListParams) -> Result<(), ClientError> {
		Ok(())
	}

	fn create(&self, _obj: &mut dyn Object, _params: &PostParams) -> Result<(), ClientError> {
		Ok(())
	}

	fn update(&self, _obj: &mut dyn Object, _params: &PostParams) -> Result<(), ClientError> {
		Ok(())
	}

	fn delete(&self, _obj: &dyn Object, _params: &DeleteParams) -> Result<(), ClientError> {
		Ok(())
	}

	fn patch(
		&self,
		_obj: &mut dyn Object,
		_patch: &Patch<Value>,
		_params: &PatchParams,
	) -> Result<(), ClientError> {
		Ok(())
	}

	fn delete_all_of(
		&self,
		_obj: &dyn Object,
		_delete: &DeleteParams,
		_list: &ListParams,
	) -> Result<(), ClientError> {
		Ok(())
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

	fn group_version_kind_for(&self, _obj: &dyn Object) -> Result<GroupVersionKind, ClientError> {
		Ok(GroupVersionKind::gvk("", "", ""))
	}

	fn is_object_namespaced(&self, _obj: &dyn Object) -> Result<bool, ClientError> {
		Ok(true)
	}
}
