//! ApplicationSet generators.

use std::time::Duration;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::{
	client::{Client, ClientError},
	repos::RepoError,
	template::TemplateError,
	types::{ApplicationSet, ApplicationSetGenerator, ApplicationSetTemplate},
};

pub mod git;
pub mod list;
pub mod offline;

/// One set of template parameters produced by a generator.
pub type Params = Map<String, Value>;

/// Errors that can occur while generating parameters.
#[derive(Debug, Error)]
pub enum GeneratorError {
	#[error("ApplicationSet is empty")]
	EmptyGenerator,

	#[error("error getting project {project}")]
	Project {
		project: String,
		#[source]
		source: ClientError,
	},

	#[error("error generating params from git")]
	Repo(#[from] RepoError),

	#[error("unable to parse file {path}")]
	ParseFile {
		path: String,
		#[source]
		source: serde_yaml::Error,
	},

	#[error("error parsing list element {index}: {reason}")]
	ListElement { index: usize, reason: String },

	#[error(transparent)]
	Template(#[from] TemplateError),
}

/// A source of template parameters for an ApplicationSet.
pub trait Generator {
	/// Template override declared on the generator entry itself.
	fn get_template<'a>(
		&self,
		generator: &'a ApplicationSetGenerator,
	) -> Option<&'a ApplicationSetTemplate>;

	/// How long to wait before generating again.
	fn get_requeue_after(&self, generator: &ApplicationSetGenerator) -> Duration;

	/// Parameter sets for `generator`, one per Application to render.
	fn generate_params(
		&self,
		generator: &ApplicationSetGenerator,
		app_set: &ApplicationSet,
		client: &dyn Client,
	) -> Result<Vec<Params>, GeneratorError>;
}
