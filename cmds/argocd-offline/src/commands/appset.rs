//! `appset` command handlers.

use std::{
	io::Write,
	path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use appset_offline::{
	preview::{load_manifests, preview_applications, preview_resources, GeneratorSet},
	types::Application,
	LocalRepos, RepoMappings,
};
use clap::{Args, Subcommand};
use tracing::{debug, info, Level};

use super::util::parse_local_repo;
use crate::{
	config::OfflineConfig,
	output::{write_applications, write_resources, OutputFormat},
};

#[derive(Args)]
pub struct AppSetArgs {
	#[command(subcommand)]
	pub command: AppSetCommands,
}

#[derive(Subcommand)]
pub enum AppSetCommands {
	/// Preview Application(s) generated from an ApplicationSet
	PreviewApps(PreviewAppsArgs),

	/// Preview Kubernetes resource(s) generated from an ApplicationSet/Application
	PreviewResources(PreviewResourcesArgs),
}

impl AppSetArgs {
	pub fn log_level(&self) -> Option<Level> {
		match &self.command {
			AppSetCommands::PreviewApps(args) => args.common.log_level,
			AppSetCommands::PreviewResources(args) => args.common.log_level,
		}
	}
}

/// Flags shared by every preview command.
#[derive(Args, Clone, Default)]
pub struct CommonArgs {
	/// Output format [default: name]
	#[arg(short, long, value_enum)]
	pub output: Option<OutputFormat>,

	/// Local repository mapping in the format 'repoURL=localPath' (can be specified multiple times)
	#[arg(short = 'l', long = "local-repo", value_parser = parse_local_repo)]
	pub local_repos: Vec<(String, PathBuf)>,

	/// Config file (default: .argocd-offline.yaml searched upward from the manifest)
	#[arg(long)]
	pub config: Option<PathBuf>,

	/// Log level (possible values: error, warn, info, debug, trace)
	#[arg(long)]
	pub log_level: Option<Level>,
}

#[derive(Args)]
pub struct PreviewAppsArgs {
	/// ApplicationSet manifest
	#[arg(value_name = "APPSETMANIFEST")]
	pub manifest: PathBuf,

	/// Name of the Application to preview
	#[arg(short, long)]
	pub name: Option<String>,

	#[command(flatten)]
	pub common: CommonArgs,
}

#[derive(Args)]
pub struct PreviewResourcesArgs {
	/// ApplicationSet or Application manifest
	#[arg(value_name = "APPSETMANIFEST")]
	pub manifest: PathBuf,

	/// Kind of resources to preview
	#[arg(short, long)]
	pub kind: Option<String>,

	/// Name of the Application to preview
	#[arg(short, long)]
	pub name: Option<String>,

	#[command(flatten)]
	pub common: CommonArgs,
}

/// Effective settings after merging the config file and the command line.
#[derive(Debug, Clone)]
pub struct Settings {
	pub mappings: RepoMappings,
	pub output: OutputFormat,
}

impl Settings {
	/// Command-line values override config file values.
	pub fn resolve(common: &CommonArgs, manifest: &Path) -> Result<Self> {
		let config = match &common.config {
			Some(path) => Some(OfflineConfig::load_from_file(path)?),
			None => {
				let dir = manifest
					.parent()
					.filter(|p| !p.as_os_str().is_empty())
					.unwrap_or(Path::new("."));
				OfflineConfig::load_from_directory(dir)?
			}
		};

		let mut mappings = config
			.as_ref()
			.map(OfflineConfig::repo_mappings)
			.unwrap_or_default();
		mappings.extend(common.local_repos.iter().cloned());

		let output = common
			.output
			.or_else(|| config.as_ref().and_then(|c| c.output))
			.unwrap_or_default();

		debug!(repos = mappings.len(), ?output, "resolved settings");
		Ok(Self { mappings, output })
	}
}

pub fn run<W: Write>(args: AppSetArgs, writer: W) -> Result<()> {
	match args.command {
		AppSetCommands::PreviewApps(args) => run_preview_apps(args, writer),
		AppSetCommands::PreviewResources(args) => run_preview_resources(args, writer),
	}
}

/// Applications defined by the manifest: those generated by each
/// ApplicationSet followed by literal Applications, optionally narrowed to one
/// name.
fn collect_applications(
	manifest: &Path,
	repos: LocalRepos,
	name: Option<&str>,
) -> Result<Vec<Application>> {
	let manifests = load_manifests(manifest)
		.with_context(|| format!("failed to load {}", manifest.display()))?;
	let generators = GeneratorSet::offline(repos);

	let mut applications = Vec::new();
	for app_set in &manifests.app_sets {
		let generated = preview_applications(app_set, &generators)
			.with_context(|| format!("failed to preview ApplicationSet {}", app_set.name()))?;
		applications.extend(generated);
	}
	applications.extend(manifests.applications);

	if let Some(name) = name {
		applications.retain(|app| app.name() == name);
		if applications.is_empty() {
			bail!("Application {name} not found in {}", manifest.display());
		}
	}

	Ok(applications)
}

pub fn run_preview_apps<W: Write>(args: PreviewAppsArgs, mut writer: W) -> Result<()> {
	let settings = Settings::resolve(&args.common, &args.manifest)?;
	let repos = LocalRepos::new(settings.mappings);

	let applications = collect_applications(&args.manifest, repos, args.name.as_deref())?;
	info!(count = applications.len(), "previewing applications");

	write_applications(&mut writer, &applications, settings.output)
}

pub fn run_preview_resources<W: Write>(args: PreviewResourcesArgs, mut writer: W) -> Result<()> {
	let settings = Settings::resolve(&args.common, &args.manifest)?;
	let repos = LocalRepos::new(settings.mappings);

	let applications = collect_applications(&args.manifest, repos.clone(), args.name.as_deref())?;

	let mut resources = Vec::new();
	for app in &applications {
		let found = preview_resources(app, &repos, args.kind.as_deref())
			.with_context(|| format!("failed to preview resources of Application {}", app.name()))?;
		resources.extend(found);
	}
	info!(count = resources.len(), "previewing resources");

	write_resources(&mut writer, &resources, settings.output)
}
