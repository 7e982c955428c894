//! Operator-driven linking of a new account.
//!
//! A [`LinkingFlow`] walks one phone number through
//! `Idle → PhoneCollected → SessionOpen → LinkPromptRequested → NumberTyped`
//! and ends in `Confirmed` or `Abandoned`. Each step is triggered by an
//! explicit operator command; nothing advances on its own. Success of the
//! link on the phone side is never verified automatically: the operator's
//! confirmation is what promotes the account to active.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use linkfarm_runtime::{DriverError, DriverFactory};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::locator::{self, LINK_WITH_PHONE, NEXT_BUTTON, PHONE_INPUT};
use crate::phone::{normalize_phone, profile_tag};
use crate::session::Session;
use crate::slot::{FlowKind, SessionSlot, SlotHolder};
use crate::store::{Account, AccountStore, OperatorId, now_ts};

mod service;

pub use service::{FlowStatus, LinkingService};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LinkState {
	Idle,
	PhoneCollected,
	SessionOpen,
	LinkPromptRequested,
	NumberTyped,
	Confirmed,
	Abandoned,
}

impl LinkState {
	pub fn is_terminal(self) -> bool {
		matches!(self, LinkState::Confirmed | LinkState::Abandoned)
	}

	/// States in which a driver session is held.
	pub fn has_session(self) -> bool {
		matches!(self, LinkState::SessionOpen | LinkState::LinkPromptRequested | LinkState::NumberTyped)
	}
}

impl fmt::Display for LinkState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let label = match self {
			LinkState::Idle => "idle",
			LinkState::PhoneCollected => "phone collected",
			LinkState::SessionOpen => "session open",
			LinkState::LinkPromptRequested => "link prompt requested",
			LinkState::NumberTyped => "number typed",
			LinkState::Confirmed => "confirmed",
			LinkState::Abandoned => "abandoned",
		};
		f.write_str(label)
	}
}

#[derive(Debug, Clone)]
pub struct LinkSettings {
	/// Partitions profile tags between deployments sharing storage.
	pub instance_id: String,
	/// Root URL of the target web application.
	pub target_url: String,
	pub nav_timeout: Duration,
}

/// Collaborators shared by every linking flow in the process.
#[derive(Clone)]
pub struct LinkContext {
	pub slot: SessionSlot,
	pub factory: Arc<dyn DriverFactory>,
	pub accounts: AccountStore,
	pub settings: LinkSettings,
}

/// Result of typing the number into the linking form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryOutcome {
	/// Whether a "next" button was found and clicked.
	pub advanced: bool,
}

/// One operator's linking attempt for one phone number.
pub struct LinkingFlow {
	ctx: LinkContext,
	owner: OperatorId,
	phone: Option<String>,
	state: LinkState,
	session: Option<Session>,
}

impl LinkingFlow {
	pub fn new(ctx: LinkContext, owner: OperatorId) -> Self {
		Self {
			ctx,
			owner,
			phone: None,
			state: LinkState::Idle,
			session: None,
		}
	}

	pub fn state(&self) -> LinkState {
		self.state
	}

	pub fn owner(&self) -> OperatorId {
		self.owner
	}

	pub fn phone(&self) -> Option<&str> {
		self.phone.as_deref()
	}

	fn profile_tag(&self, phone: &str) -> String {
		profile_tag(&self.ctx.settings.instance_id, phone)
	}

	fn require(&self, allowed: &[LinkState], action: &'static str) -> Result<()> {
		if allowed.contains(&self.state) {
			Ok(())
		} else {
			Err(Error::InvalidTransition { state: self.state, action })
		}
	}

	fn session_mut(&mut self) -> Result<&mut Session> {
		let state = self.state;
		self.session.as_mut().ok_or(Error::InvalidTransition {
			state,
			action: "use the browser session",
		})
	}

	/// `Idle → PhoneCollected`. Nothing is persisted yet.
	pub fn collect_phone(&mut self, raw: &str) -> Result<&str> {
		self.require(&[LinkState::Idle], "collect a phone number")?;
		let phone = normalize_phone(raw)?;
		self.state = LinkState::PhoneCollected;
		Ok(self.phone.insert(phone).as_str())
	}

	/// `PhoneCollected → SessionOpen`: waits for the slot, launches a driver on
	/// the phone's profile and loads the application root.
	///
	/// Firing `cancel` while the slot is still queued ends the flow as
	/// `Abandoned` without launching anything. On any other failure the flow
	/// returns to `Idle`; the slot is already released.
	pub async fn open_session(&mut self, cancel: &CancellationToken) -> Result<()> {
		self.require(&[LinkState::PhoneCollected], "open a session")?;
		let phone = self.phone.clone().unwrap_or_default();
		let tag = self.profile_tag(&phone);

		let slot = self.ctx.slot.clone();
		let waiting = slot.acquire(SlotHolder::new(&phone, FlowKind::Interactive));
		let guard = tokio::select! {
			biased;
			_ = cancel.cancelled() => {
				info!(target = "linkfarm.link", %phone, "linking flow abandoned while waiting for the browser");
				self.state = LinkState::Abandoned;
				return Err(Error::Abandoned { phone });
			}
			guard = waiting => guard,
		};

		let opened = match guard {
			Ok(guard) => {
				Session::open(
					guard,
					self.ctx.factory.as_ref(),
					&tag,
					&self.ctx.settings.target_url,
					self.ctx.settings.nav_timeout,
				)
				.await
			}
			Err(err) => Err(err),
		};

		match opened {
			Ok(session) => {
				self.session = Some(session);
				self.state = LinkState::SessionOpen;
				info!(target = "linkfarm.link", %phone, owner = self.owner, "linking session open");
				Ok(())
			}
			Err(err) => {
				self.phone = None;
				self.state = LinkState::Idle;
				Err(err)
			}
		}
	}

	/// `SessionOpen → LinkPromptRequested`: activates "link with phone number".
	///
	/// When no strategy matches the state is left unchanged and an
	/// element-not-found error is returned; the operator should refresh and
	/// retry.
	pub async fn request_link_prompt(&mut self) -> Result<()> {
		self.require(&[LinkState::SessionOpen, LinkState::LinkPromptRequested], "request the link prompt")?;
		let session = self.session_mut()?;

		let Some(probe) = locator::probe_first(session.driver(), &LINK_WITH_PHONE).await else {
			info!(target = "linkfarm.link", phone = %session.phone(), "link-with-phone affordance not found");
			return Err(DriverError::ElementNotFound("link with phone number".into()).into());
		};
		session.driver().click(probe.element).await?;

		self.state = LinkState::LinkPromptRequested;
		Ok(())
	}

	/// `LinkPromptRequested → NumberTyped`: types the number and presses "next".
	pub async fn request_number_entry(&mut self) -> Result<EntryOutcome> {
		self.require(&[LinkState::LinkPromptRequested, LinkState::NumberTyped], "enter the number")?;
		let phone = self.phone.clone().unwrap_or_default();
		let session = self.session_mut()?;

		let Some(input) = locator::probe_first(session.driver(), &PHONE_INPUT).await else {
			return Err(DriverError::ElementNotFound("phone number input".into()).into());
		};
		session.driver().fill(input.element, &format!("+{phone}")).await?;

		let advanced = match locator::probe_first(session.driver(), &NEXT_BUTTON).await {
			Some(next) => {
				session.driver().click(next.element).await?;
				true
			}
			None => {
				info!(target = "linkfarm.link", %phone, "next button not found; number left in the form");
				false
			}
		};

		self.state = LinkState::NumberTyped;
		let tag = self.profile_tag(&phone);
		if let Err(err) = self.ctx.accounts.record_pending(&phone, self.owner, &tag).await {
			warn!(target = "linkfarm.link", %phone, error = %err, "failed to record pending account");
		}
		Ok(EntryOutcome { advanced })
	}

	/// Point-in-time render of the page. Never changes state.
	pub async fn snapshot(&mut self) -> Result<Vec<u8>> {
		let session = self.session_mut()?;
		Ok(session.driver().snapshot().await?)
	}

	/// Reloads the application root, returning to `SessionOpen`.
	pub async fn refresh(&mut self) -> Result<()> {
		self.require(
			&[LinkState::SessionOpen, LinkState::LinkPromptRequested, LinkState::NumberTyped],
			"refresh the page",
		)?;
		let url = self.ctx.settings.target_url.clone();
		let timeout = self.ctx.settings.nav_timeout;
		let session = self.session_mut()?;
		session.driver().navigate(&url, timeout).await?;
		self.state = LinkState::SessionOpen;
		Ok(())
	}

	/// `NumberTyped → Confirmed`: the operator reports the link succeeded.
	///
	/// Persists the account as active, closes the session and releases the
	/// slot. When persistence fails the session stays open so the operator
	/// can retry.
	pub async fn confirm(&mut self) -> Result<Account> {
		self.require(&[LinkState::NumberTyped], "confirm the link")?;
		let phone = self.phone.clone().unwrap_or_default();
		let tag = self.profile_tag(&phone);

		let account = self.ctx.accounts.confirm_active(&phone, self.owner, &tag, now_ts()).await?;
		if let Some(session) = self.session.take() {
			session.close().await;
		}
		self.state = LinkState::Confirmed;
		info!(target = "linkfarm.link", %phone, owner = self.owner, "account linked");
		Ok(account)
	}

	/// Ends the flow from any state, closing the browser best-effort.
	pub async fn abort(&mut self) {
		if self.state.is_terminal() {
			return;
		}
		if let Some(session) = self.session.take() {
			session.close().await;
		}
		info!(target = "linkfarm.link", phone = ?self.phone, state = %self.state, "linking flow abandoned");
		self.state = LinkState::Abandoned;
	}
}
