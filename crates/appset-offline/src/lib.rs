//! Offline ApplicationSet generation.
//!
//! Runs Argo CD style generators against local directory snapshots of the
//! repositories they reference, without a cluster and without network access.
//! Repository reads go through [`LocalRepos`]. [`OfflineGitGenerator`] answers
//! the Git generator's AppProject read with [`PolicyBypassClient`]; every
//! other generator only sees a [`DisconnectedClient`].

pub mod client;
pub mod generators;
pub mod policy;
pub mod preview;
pub mod repos;
pub mod template;
pub mod types;

#[cfg(test)]
mod test_utils;

pub use client::DisconnectedClient;
pub use generators::{
	git::GitGenerator, list::ListGenerator, offline::OfflineGitGenerator, Generator,
	GeneratorError, Params,
};
pub use policy::PolicyBypassClient;
pub use repos::{
	local::{LocalRepos, RepoLocator, RepoMappings},
	RepoError, Repos,
};
