use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
	#[error("invalid configuration: {0}")]
	Config(String),

	#[error(transparent)]
	Core(#[from] linkfarm::Error),

	/// Transport failure talking to the bot API. The URL is stripped since it
	/// embeds the bot token.
	#[error("bot API request failed: {0}")]
	Http(#[from] reqwest::Error),

	#[error("bot API rejected {method}: {description}")]
	Api { method: &'static str, description: String },

	#[error(transparent)]
	Io(#[from] std::io::Error),
}

impl CliError {
	pub fn config(message: impl Into<String>) -> Self {
		CliError::Config(message.into())
	}
}
