use clap::Parser;
use linkfarm_cli::{app, cli::Cli, logging, settings::Settings};
use tracing::error;

#[tokio::main(flavor = "current_thread")]
async fn main() {
	// A missing .env is the normal case.
	let _ = dotenvy::dotenv();

	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	let settings = match Settings::from_cli(cli, dirs::data_dir().as_deref()) {
		Ok(settings) => settings,
		Err(err) => {
			error!(target = "linkfarm", error = %err, "startup failed");
			std::process::exit(2);
		}
	};

	if let Err(err) = app::run(settings).await {
		error!(target = "linkfarm", error = %err, "linkfarm failed");
		std::process::exit(1);
	}
}
