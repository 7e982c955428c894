use std::path::PathBuf;

use clap::{ArgAction, Parser};

/// Runs the linkfarm session orchestrator and its chat control bot.
///
/// Every option can also be supplied through the listed environment
/// variable or a `.env` file in the working directory.
#[derive(Parser, Debug, Clone)]
#[command(name = "linkfarm", version, about)]
pub struct Cli {
	/// Increase log verbosity (-v info, -vv debug, -vvv trace). `RUST_LOG` wins when set.
	#[arg(short, long, action = ArgAction::Count, global = true)]
	pub verbose: u8,

	/// Identifier of this deployment; partitions browser profiles.
	#[arg(long, env = "LINKFARM_INSTANCE_ID", default_value = "default")]
	pub instance_id: String,

	/// Bot API token of the control bot.
	#[arg(long, env = "LINKFARM_BOT_TOKEN", hide_env_values = true)]
	pub bot_token: Option<String>,

	/// Operator id of the administrator.
	#[arg(long, env = "LINKFARM_ADMIN_ID")]
	pub admin_id: Option<i64>,

	/// SQLite database file [default: <data dir>/linkfarm/<instance>.sqlite3]
	#[arg(long, env = "LINKFARM_DB_PATH", value_name = "FILE")]
	pub db_path: Option<PathBuf>,

	/// Root of the per-phone browser profiles [default: <data dir>/linkfarm/profiles]
	#[arg(long, env = "LINKFARM_PROFILES_DIR", value_name = "DIR")]
	pub profiles_dir: Option<PathBuf>,

	/// Root URL of the chat web application.
	#[arg(long, env = "LINKFARM_TARGET_URL", default_value = "https://web.whatsapp.com/")]
	pub target_url: String,

	/// Browser executable; discovered on PATH when omitted.
	#[arg(long, env = "LINKFARM_CHROME_PATH", value_name = "FILE")]
	pub chrome_path: Option<PathBuf>,

	/// Run the browser without a window.
	#[arg(long, env = "LINKFARM_HEADLESS", default_value_t = true, action = ArgAction::Set)]
	pub headless: bool,

	/// Disable the browser sandbox (needed when running as root in a container).
	#[arg(long, env = "LINKFARM_NO_SANDBOX", default_value_t = false, action = ArgAction::Set)]
	pub no_sandbox: bool,

	#[arg(long, env = "LINKFARM_ROTATION_INTERVAL_SECS", default_value_t = 45)]
	pub rotation_interval_secs: u64,

	#[arg(long, env = "LINKFARM_DWELL_MIN_SECS", default_value_t = 10)]
	pub dwell_min_secs: u64,

	#[arg(long, env = "LINKFARM_DWELL_MAX_SECS", default_value_t = 25)]
	pub dwell_max_secs: u64,

	/// How long rotation waits for the chat list before giving up.
	#[arg(long, env = "LINKFARM_READY_TIMEOUT_SECS", default_value_t = 60)]
	pub ready_timeout_secs: u64,

	#[arg(long, env = "LINKFARM_NAV_TIMEOUT_SECS", default_value_t = 45)]
	pub nav_timeout_secs: u64,

	/// Minimum pause before retrying an account whose rotation failed (0 retries every tick).
	#[arg(long, env = "LINKFARM_FAILURE_BACKOFF_SECS", default_value_t = 0)]
	pub failure_backoff_secs: u64,

	/// Long-poll timeout for bot updates.
	#[arg(long, env = "LINKFARM_POLL_TIMEOUT_SECS", default_value_t = 30)]
	pub poll_timeout_secs: u64,
}
