//! Validated process configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use linkfarm::{LinkSettings, OperatorId, RetryPolicy, RotationSettings};
use linkfarm_runtime::LaunchOptions;
use url::Url;

use crate::cli::Cli;
use crate::error::{CliError, Result};

const APP_DIR: &str = "linkfarm";

#[derive(Debug, Clone)]
pub struct Settings {
	pub instance_id: String,
	pub bot_token: String,
	pub admin_id: OperatorId,
	pub db_path: PathBuf,
	pub profiles_dir: PathBuf,
	pub target_url: Url,
	pub chrome_path: Option<PathBuf>,
	pub headless: bool,
	pub no_sandbox: bool,
	pub rotation_interval: Duration,
	pub dwell_min: Duration,
	pub dwell_max: Duration,
	pub ready_timeout: Duration,
	pub nav_timeout: Duration,
	pub failure_backoff: Duration,
	pub poll_timeout: Duration,
}

impl Settings {
	/// Validates parsed arguments, resolving default paths under `data_dir`.
	pub fn from_cli(cli: Cli, data_dir: Option<&Path>) -> Result<Self> {
		let instance_id = cli.instance_id.trim().to_string();
		if instance_id.is_empty() || !instance_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
			return Err(CliError::config(format!(
				"instance id {instance_id:?} may only contain letters, digits, '_' and '-'"
			)));
		}

		let bot_token = cli
			.bot_token
			.map(|t| t.trim().to_string())
			.filter(|t| !t.is_empty())
			.ok_or_else(|| CliError::config("LINKFARM_BOT_TOKEN is required"))?;
		let admin_id = cli.admin_id.ok_or_else(|| CliError::config("LINKFARM_ADMIN_ID is required"))?;

		let target_url = Url::parse(&cli.target_url).map_err(|e| CliError::config(format!("target url {:?}: {e}", cli.target_url)))?;
		if !matches!(target_url.scheme(), "http" | "https") {
			return Err(CliError::config(format!("target url must be http(s), got {target_url}")));
		}

		if cli.rotation_interval_secs == 0 {
			return Err(CliError::config("rotation interval must be greater than zero"));
		}
		if cli.dwell_min_secs > cli.dwell_max_secs {
			return Err(CliError::config(format!(
				"dwell min ({}s) exceeds dwell max ({}s)",
				cli.dwell_min_secs, cli.dwell_max_secs
			)));
		}
		if cli.nav_timeout_secs == 0 {
			return Err(CliError::config("navigation timeout must be greater than zero"));
		}

		let app_root = || {
			data_dir
				.map(|dir| dir.join(APP_DIR))
				.ok_or_else(|| CliError::config("no data directory available; set LINKFARM_DB_PATH and LINKFARM_PROFILES_DIR"))
		};
		let db_path = match cli.db_path {
			Some(path) => path,
			None => app_root()?.join(format!("{instance_id}.sqlite3")),
		};
		let profiles_dir = match cli.profiles_dir {
			Some(path) => path,
			None => app_root()?.join("profiles"),
		};

		Ok(Self {
			instance_id,
			bot_token,
			admin_id,
			db_path,
			profiles_dir,
			target_url,
			chrome_path: cli.chrome_path,
			headless: cli.headless,
			no_sandbox: cli.no_sandbox,
			rotation_interval: Duration::from_secs(cli.rotation_interval_secs),
			dwell_min: Duration::from_secs(cli.dwell_min_secs),
			dwell_max: Duration::from_secs(cli.dwell_max_secs),
			ready_timeout: Duration::from_secs(cli.ready_timeout_secs),
			nav_timeout: Duration::from_secs(cli.nav_timeout_secs),
			failure_backoff: Duration::from_secs(cli.failure_backoff_secs),
			poll_timeout: Duration::from_secs(cli.poll_timeout_secs),
		})
	}

	pub fn launch_options(&self) -> LaunchOptions {
		let mut options = LaunchOptions::new(&self.profiles_dir);
		options.headless = self.headless;
		options.executable = self.chrome_path.clone();
		options.no_sandbox = self.no_sandbox;
		options
	}

	pub fn link_settings(&self) -> LinkSettings {
		LinkSettings {
			instance_id: self.instance_id.clone(),
			target_url: self.target_url.to_string(),
			nav_timeout: self.nav_timeout,
		}
	}

	pub fn rotation_settings(&self) -> RotationSettings {
		RotationSettings {
			target_url: self.target_url.to_string(),
			interval: self.rotation_interval,
			dwell_min: self.dwell_min,
			dwell_max: self.dwell_max,
			ready_timeout: self.ready_timeout,
			nav_timeout: self.nav_timeout,
			retry: RetryPolicy {
				failure_backoff: self.failure_backoff,
			},
		}
	}
}
