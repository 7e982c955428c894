//! Parsing of operator text and button presses into commands.

use linkfarm::{OperatorId, normalize_phone};

pub const CB_PROMPT: &str = "link:prompt";
pub const CB_ENTER: &str = "link:enter";
pub const CB_SNAPSHOT: &str = "link:snapshot";
pub const CB_REFRESH: &str = "link:refresh";
pub const CB_DONE: &str = "link:done";
pub const CB_ABORT: &str = "link:abort";
pub const CB_APPROVE_PREFIX: &str = "access:approve:";

pub const HELP: &str = "\
/link <phone> - open a browser session for a new number
/prompt - switch the linking screen to phone-number mode
/enter - type the number and request the pairing code
/snapshot - show the current page
/refresh - reload the page
/done - the phone confirmed the link
/abort - give up on the current number
/status - farm and session status
/help - this message";

pub const ADMIN_HELP: &str = "\
/accounts - list linked accounts and access requests
/approve <id> - grant an operator access
/revoke <id> - withdraw an operator's access";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
	Start,
	Help,
	Link(String),
	Prompt,
	Enter,
	Snapshot,
	Refresh,
	Done,
	Abort,
	Status,
	Accounts,
	Approve(OperatorId),
	Revoke(OperatorId),
}

impl Command {
	/// Parses a text message. `Err` carries a usage hint for the operator.
	pub fn parse(text: &str) -> Result<Self, String> {
		let text = text.trim();
		let Some(rest) = text.strip_prefix('/') else {
			return match normalize_phone(text) {
				Ok(_) => Ok(Command::Link(text.to_string())),
				Err(_) => Err("Send /link <phone> to link a number, or /help for all commands.".to_string()),
			};
		};

		let (name, arg) = match rest.split_once(char::is_whitespace) {
			Some((name, arg)) => (name, arg.trim()),
			None => (rest, ""),
		};
		// Group chats address commands as /name@botname.
		let name = name.split('@').next().unwrap_or(name).to_ascii_lowercase();

		match name.as_str() {
			"start" => Ok(Command::Start),
			"help" => Ok(Command::Help),
			"link" if arg.is_empty() => Err("Usage: /link <phone>, e.g. /link +7 700 123 45 67".to_string()),
			"link" => Ok(Command::Link(arg.to_string())),
			"prompt" => Ok(Command::Prompt),
			"enter" => Ok(Command::Enter),
			"snapshot" => Ok(Command::Snapshot),
			"refresh" => Ok(Command::Refresh),
			"done" => Ok(Command::Done),
			"abort" | "cancel" => Ok(Command::Abort),
			"status" => Ok(Command::Status),
			"accounts" => Ok(Command::Accounts),
			"approve" => operator_arg(arg, "approve").map(Command::Approve),
			"revoke" => operator_arg(arg, "revoke").map(Command::Revoke),
			_ => Err(format!("Unknown command /{name}. Send /help for the list.")),
		}
	}

	/// Maps inline-button callback data to a command.
	pub fn from_callback(data: &str) -> Option<Self> {
		match data {
			CB_PROMPT => Some(Command::Prompt),
			CB_ENTER => Some(Command::Enter),
			CB_SNAPSHOT => Some(Command::Snapshot),
			CB_REFRESH => Some(Command::Refresh),
			CB_DONE => Some(Command::Done),
			CB_ABORT => Some(Command::Abort),
			other => other
				.strip_prefix(CB_APPROVE_PREFIX)
				.and_then(|id| id.parse().ok())
				.map(Command::Approve),
		}
	}

	/// Commands open to operators without approved access.
	pub fn is_public(&self) -> bool {
		matches!(self, Command::Start | Command::Help)
	}

	pub fn is_admin_only(&self) -> bool {
		matches!(self, Command::Accounts | Command::Approve(_) | Command::Revoke(_))
	}
}

fn operator_arg(arg: &str, name: &str) -> Result<OperatorId, String> {
	arg.parse().map_err(|_| format!("Usage: /{name} <operator id>"))
}
