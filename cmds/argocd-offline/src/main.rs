use anyhow::Result;
use argocd_offline::{
	commands::{self, util::BrokenPipeGuard},
	telemetry,
};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "argocd-offline")]
#[command(about = "An Argo CD CLI offline utility")]
#[command(
	long_about = "Preview the Applications and Kubernetes resources an ApplicationSet \
	              produces, without a running Argo CD server."
)]
#[command(version)]
struct Cli {
	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand)]
enum Commands {
	/// Preview ApplicationSets
	Appset(commands::appset::AppSetArgs),
}

fn main() -> Result<()> {
	let cli = Cli::parse();

	let log_level = match &cli.command {
		Commands::Appset(args) => args.log_level(),
	};
	telemetry::init(log_level)?;

	let stdout = BrokenPipeGuard::new(std::io::stdout());

	match cli.command {
		Commands::Appset(args) => commands::appset::run(args, stdout),
	}
}
