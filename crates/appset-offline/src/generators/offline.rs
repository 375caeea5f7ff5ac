//! Offline wrapper around a generator.

use std::time::Duration;

use tracing::trace;

use super::{git::GitGenerator, Generator, GeneratorError, Params};
use crate::{
	client::Client,
	policy::PolicyBypassClient,
	repos::local::LocalRepos,
	types::{ApplicationSet, ApplicationSetGenerator, ApplicationSetTemplate},
};

/// Runs a generator without a cluster.
///
/// Template and requeue queries are forwarded unchanged. `generate_params`
/// does NOT forward its `client` argument: the wrapped generator always gets
/// a fresh [`PolicyBypassClient`] instead, so its AppProject lookups succeed
/// and report no signature keys. Errors from the wrapped generator are
/// returned as-is.
pub struct OfflineGitGenerator<G = GitGenerator<LocalRepos>> {
	inner: G,
}

impl OfflineGitGenerator {
	/// Git generator reading from local repository snapshots.
	pub fn new(repos: LocalRepos) -> Self {
		Self::wrap(GitGenerator::new(repos))
	}
}

impl<G: Generator> OfflineGitGenerator<G> {
	pub fn wrap(inner: G) -> Self {
		Self { inner }
	}

	pub fn inner(&self) -> &G {
		&self.inner
	}
}

impl<G: Generator> Generator for OfflineGitGenerator<G> {
	fn get_template<'a>(
		&self,
		generator: &'a ApplicationSetGenerator,
	) -> Option<&'a ApplicationSetTemplate> {
		self.inner.get_template(generator)
	}

	fn get_requeue_after(&self, generator: &ApplicationSetGenerator) -> Duration {
		self.inner.get_requeue_after(generator)
	}

	fn generate_params(
		&self,
		generator: &ApplicationSetGenerator,
		app_set: &ApplicationSet,
		_client: &dyn Client,
	) -> Result<Vec<Params>, GeneratorError> {
		trace!("substituting policy bypass client");
		self.inner
			.generate_params(generator, app_set, &PolicyBypassClient::new())
	}
}
