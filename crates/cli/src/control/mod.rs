//! Operator command handling, independent of the bot transport.
//!
//! Every command produces a list of [`Outgoing`] replies: usually one for
//! the issuing operator, sometimes an extra notification for the admin or for
//! the operator a decision concerns.

use std::sync::Arc;

use linkfarm::{AccessStore, AccountStore, Error, FlowStatus, LinkState, LinkingService, OperatorId, SessionSlot};
use linkfarm_protocol::InlineKeyboardMarkup;
use linkfarm_runtime::DriverError;
use tracing::{info, warn};

pub mod command;
pub mod keyboards;

pub use command::Command;

/// Accounts listed per `/accounts` message before truncating.
const ACCOUNT_LIST_LIMIT: usize = 50;

/// Who sent a command and where to answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operator {
	pub id: OperatorId,
	pub chat_id: i64,
	pub display_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
	pub text: String,
	/// PNG to send instead of a plain message; `text` becomes its caption.
	pub image: Option<Vec<u8>>,
	pub keyboard: Option<InlineKeyboardMarkup>,
}

impl Reply {
	pub fn text(text: impl Into<String>) -> Self {
		Self {
			text: text.into(),
			..Self::default()
		}
	}

	pub fn with_keyboard(mut self, keyboard: Option<InlineKeyboardMarkup>) -> Self {
		self.keyboard = keyboard;
		self
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outgoing {
	pub chat_id: i64,
	pub reply: Reply,
}

impl Outgoing {
	pub fn new(chat_id: i64, reply: Reply) -> Self {
		Self { chat_id, reply }
	}
}

pub struct ControlSurface {
	linking: Arc<LinkingService>,
	accounts: AccountStore,
	access: AccessStore,
	slot: SessionSlot,
	admin: OperatorId,
}

impl ControlSurface {
	pub fn new(linking: Arc<LinkingService>, accounts: AccountStore, access: AccessStore, slot: SessionSlot, admin: OperatorId) -> Self {
		Self {
			linking,
			accounts,
			access,
			slot,
			admin,
		}
	}

	pub fn is_admin(&self, operator: OperatorId) -> bool {
		operator == self.admin
	}

	/// Parses and runs a text message.
	pub async fn handle_text(&self, operator: &Operator, text: &str) -> Vec<Outgoing> {
		match Command::parse(text) {
			Ok(command) => self.handle(operator, command).await,
			Err(usage) => vec![Outgoing::new(operator.chat_id, Reply::text(usage))],
		}
	}

	/// Runs `command` for `operator` after checking access.
	pub async fn handle(&self, operator: &Operator, command: Command) -> Vec<Outgoing> {
		if let Err(denied) = self.authorize(operator, &command).await {
			return vec![Outgoing::new(operator.chat_id, denied)];
		}

		info!(target = "linkfarm.bot", operator = operator.id, ?command, "command");
		match self.dispatch(operator, command).await {
			Ok(outgoing) => outgoing,
			Err(err) => {
				warn!(target = "linkfarm.bot", operator = operator.id, error = %err, "command failed");
				let reply = Reply::text(describe_error(&err)).with_keyboard(self.flow_keyboard(operator.id));
				vec![Outgoing::new(operator.chat_id, reply)]
			}
		}
	}

	async fn authorize(&self, operator: &Operator, command: &Command) -> Result<(), Reply> {
		if command.is_public() || self.is_admin(operator.id) {
			return Ok(());
		}
		if command.is_admin_only() {
			return Err(Reply::text("Only the administrator can do that."));
		}
		match self.access.is_approved(operator.id).await {
			Ok(true) => Ok(()),
			Ok(false) => Err(Reply::text("You do not have access yet. Send /start to request it.")),
			Err(err) => {
				warn!(target = "linkfarm.bot", operator = operator.id, error = %err, "access lookup failed");
				Err(Reply::text(describe_error(&err)))
			}
		}
	}

	/// Buttons for the operator's own flow, if they have one.
	fn flow_keyboard(&self, operator: OperatorId) -> Option<InlineKeyboardMarkup> {
		self.linking
			.status()
			.filter(|status| status.owner == operator)
			.and_then(|status| keyboards::for_state(status.state))
	}

	fn flow_phone(&self, operator: OperatorId) -> String {
		self.linking
			.status()
			.filter(|status| status.owner == operator)
			.and_then(|status| status.phone)
			.unwrap_or_default()
	}

	async fn dispatch(&self, operator: &Operator, command: Command) -> linkfarm::Result<Vec<Outgoing>> {
		let reply = |r: Reply| Ok(vec![Outgoing::new(operator.chat_id, r)]);

		match command {
			Command::Start => self.start(operator).await,
			Command::Help => reply(Reply::text(self.help(operator.id))),
			Command::Link(raw) => {
				let status = self.linking.begin_link(operator.id, &raw).await?;
				let phone = status.phone.unwrap_or_default();
				reply(
					Reply::text(format!(
						"Browser session open for +{phone}. Press \"Link with phone number\" to switch the page to phone linking."
					))
					.with_keyboard(keyboards::for_state(status.state)),
				)
			}
			Command::Prompt => {
				let state = self.linking.request_link_prompt(operator.id).await?;
				let phone = self.flow_phone(operator.id);
				reply(
					Reply::text(format!("Phone linking screen is open. Press \"Enter number\" to type +{phone}."))
						.with_keyboard(keyboards::for_state(state)),
				)
			}
			Command::Enter => {
				let outcome = self.linking.request_number_entry(operator.id).await?;
				let phone = self.flow_phone(operator.id);
				let text = if outcome.advanced {
					format!(
						"Typed +{phone} and pressed Next. Press Snapshot to see the pairing code, enter it on the phone, then press \"Linked, done\"."
					)
				} else {
					format!("Typed +{phone}, but no Next button was found. Press Snapshot to check the page.")
				};
				reply(Reply::text(text).with_keyboard(keyboards::for_state(LinkState::NumberTyped)))
			}
			Command::Snapshot => {
				let png = self.linking.snapshot(operator.id).await?;
				let phone = self.flow_phone(operator.id);
				reply(Reply {
					text: format!("Current page for +{phone}"),
					image: Some(png),
					keyboard: self.flow_keyboard(operator.id),
				})
			}
			Command::Refresh => {
				self.linking.refresh(operator.id).await?;
				reply(Reply::text("Page reloaded.").with_keyboard(keyboards::for_state(LinkState::SessionOpen)))
			}
			Command::Done => {
				let account = self.linking.confirm_link(operator.id).await?;
				reply(Reply::text(format!("+{} is linked and joins the rotation.", account.phone)))
			}
			Command::Abort => self.abort(operator).await,
			Command::Status => reply(Reply::text(self.status_text().await?).with_keyboard(self.flow_keyboard(operator.id))),
			Command::Accounts => reply(Reply::text(self.accounts_text().await?)),
			Command::Approve(id) => self.approve(operator, id).await,
			Command::Revoke(id) => self.revoke(operator, id).await,
		}
	}

	fn help(&self, operator: OperatorId) -> String {
		if self.is_admin(operator) {
			format!("{}\n{}", command::HELP, command::ADMIN_HELP)
		} else {
			command::HELP.to_string()
		}
	}

	async fn start(&self, operator: &Operator) -> linkfarm::Result<Vec<Outgoing>> {
		if self.is_admin(operator.id) {
			let text = format!("Welcome back. You are the administrator.\n\n{}", self.help(operator.id));
			return Ok(vec![Outgoing::new(operator.chat_id, Reply::text(text))]);
		}

		let request = self.access.request(operator.id, &operator.display_name).await?;
		if request.approved {
			let text = format!("Welcome back.\n\n{}", command::HELP);
			return Ok(vec![Outgoing::new(operator.chat_id, Reply::text(text))]);
		}

		info!(target = "linkfarm.bot", operator = operator.id, name = %operator.display_name, "access requested");
		let notice = Reply {
			text: format!("{} (id {}) requests access.", operator.display_name, operator.id),
			image: None,
			keyboard: Some(keyboards::approve(operator.id)),
		};
		Ok(vec![
			Outgoing::new(
				operator.chat_id,
				Reply::text("Access requested. You will be notified once the administrator approves it."),
			),
			Outgoing::new(self.admin, notice),
		])
	}

	async fn abort(&self, operator: &Operator) -> linkfarm::Result<Vec<Outgoing>> {
		let previous_owner = self.linking.status().map(|status| status.owner);
		let force = self.is_admin(operator.id);

		let mut outgoing = Vec::new();
		match self.linking.abort(operator.id, force).await? {
			Some(phone) => {
				outgoing.push(Outgoing::new(operator.chat_id, Reply::text(format!("Linking of +{phone} abandoned."))));
				if let Some(owner) = previous_owner.filter(|owner| *owner != operator.id) {
					outgoing.push(Outgoing::new(
						owner,
						Reply::text(format!("The administrator abandoned your linking of +{phone}.")),
					));
				}
			}
			None => outgoing.push(Outgoing::new(operator.chat_id, Reply::text("Nothing to abort."))),
		}
		Ok(outgoing)
	}

	async fn status_text(&self) -> linkfarm::Result<String> {
		let counts = self.accounts.counts().await?;
		let browser = match self.slot.holder() {
			Some(holder) => format!("busy ({} session for +{})", holder.kind, holder.phone),
			None => "idle".to_string(),
		};
		let linking = match self.linking.status() {
			Some(FlowStatus { owner, phone, state }) => {
				format!("+{} ({state}) by operator {owner}", phone.unwrap_or_default())
			}
			None => "none".to_string(),
		};
		Ok(format!(
			"Accounts: {} active, {} pending\nBrowser: {browser}\nLinking: {linking}",
			counts.active, counts.pending
		))
	}

	async fn accounts_text(&self) -> linkfarm::Result<String> {
		let accounts = self.accounts.list().await?;
		let requests = self.access.pending().await?;

		let mut lines = Vec::new();
		if accounts.is_empty() {
			lines.push("No accounts yet.".to_string());
		}
		for account in accounts.iter().take(ACCOUNT_LIST_LIMIT) {
			lines.push(format!(
				"+{} {} last active {} ({} visits)",
				account.phone,
				account.status,
				format_timestamp(account.last_active),
				account.activity_counter
			));
		}
		if accounts.len() > ACCOUNT_LIST_LIMIT {
			lines.push(format!("... and {} more", accounts.len() - ACCOUNT_LIST_LIMIT));
		}
		if !requests.is_empty() {
			lines.push(String::new());
			lines.push("Awaiting access:".to_string());
			lines.extend(requests.iter().map(|r| format!("{} {} (/approve {})", r.owner, r.display_name, r.owner)));
		}
		Ok(lines.join("\n"))
	}

	async fn approve(&self, operator: &Operator, id: OperatorId) -> linkfarm::Result<Vec<Outgoing>> {
		if !self.access.approve(id).await? {
			return Ok(vec![Outgoing::new(operator.chat_id, Reply::text(format!("No access request from {id}.")))]);
		}
		info!(target = "linkfarm.bot", operator = id, "access approved");
		Ok(vec![
			Outgoing::new(operator.chat_id, Reply::text(format!("Operator {id} approved."))),
			Outgoing::new(id, Reply::text(format!("Access granted.\n\n{}", command::HELP))),
		])
	}

	async fn revoke(&self, operator: &Operator, id: OperatorId) -> linkfarm::Result<Vec<Outgoing>> {
		if self.is_admin(id) {
			return Ok(vec![Outgoing::new(operator.chat_id, Reply::text("The administrator cannot be revoked."))]);
		}
		if !self.access.revoke(id).await? {
			return Ok(vec![Outgoing::new(operator.chat_id, Reply::text(format!("No access request from {id}.")))]);
		}
		info!(target = "linkfarm.bot", operator = id, "access revoked");
		Ok(vec![
			Outgoing::new(operator.chat_id, Reply::text(format!("Operator {id} revoked."))),
			Outgoing::new(id, Reply::text("Your access was withdrawn.")),
		])
	}
}

fn format_timestamp(ts: i64) -> String {
	if ts <= 0 {
		return "never".to_string();
	}
	chrono::DateTime::from_timestamp(ts, 0)
		.map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
		.unwrap_or_else(|| ts.to_string())
}

/// Operator-facing wording for a failed command.
pub fn describe_error(err: &Error) -> String {
	match err {
		Error::Busy { phone } => format!("The browser is busy linking +{phone}. Try again when it finishes."),
		Error::InvalidPhone(raw) => {
			format!("{raw:?} is not a valid phone number. Send 10 to 15 digits with the country code, e.g. +7 700 123 45 67.")
		}
		Error::NoActiveFlow => "No linking in progress. Send /link <phone> to start.".to_string(),
		Error::NotFlowOwner => "Another operator is linking a number right now.".to_string(),
		Error::InvalidTransition { .. } => format!("That step is out of order: {err}."),
		Error::Driver(DriverError::ElementNotFound(what)) => {
			format!("Could not find the {what} on the page. Press Refresh and try again, or Snapshot to see the page.")
		}
		Error::Driver(driver) => format!("Browser error: {driver}."),
		Error::LoadTimeout { .. } => format!("{err}."),
		Error::NotActive { .. } => format!("{err}."),
		Error::Abandoned { phone } => format!("Linking of +{phone} abandoned."),
		Error::SlotClosed => "Shutting down; try again later.".to_string(),
		Error::Persistence(_) => "Storage error; nothing was saved. Try again.".to_string(),
		Error::Config(message) => message.clone(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn missing_affordance_suggests_refresh() {
		let err = Error::Driver(DriverError::ElementNotFound("link with phone number".into()));
		let text = describe_error(&err);
		assert!(text.contains("link with phone number"));
		assert!(text.contains("Refresh"));
	}

	#[test]
	fn busy_names_the_number_in_flight() {
		let text = describe_error(&Error::Busy {
			phone: "77001234567".into(),
		});
		assert!(text.contains("+77001234567"));
	}

	#[test]
	fn abandoned_and_inactive_name_the_number() {
		let abandoned = describe_error(&Error::Abandoned {
			phone: "77001234567".into(),
		});
		assert_eq!(abandoned, "Linking of +77001234567 abandoned.");

		let inactive = describe_error(&Error::NotActive {
			phone: "77001234567".into(),
		});
		assert_eq!(inactive, "77001234567 is no longer an active account.");
	}

	#[test]
	fn timestamps_render_in_utc() {
		assert_eq!(format_timestamp(0), "never");
		assert_eq!(format_timestamp(1_700_000_000), "2023-11-14 22:13 UTC");
	}
}
