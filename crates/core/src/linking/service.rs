//! Process-wide holder of the single in-progress linking flow.

use parking_lot::Mutex as SyncMutex;
use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{EntryOutcome, LinkContext, LinkState, LinkingFlow};
use crate::error::{Error, Result};
use crate::store::{Account, OperatorId};

/// Snapshot of the current flow for status reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowStatus {
	pub owner: OperatorId,
	pub phone: Option<String>,
	pub state: LinkState,
}

/// A `begin-link` still queued for the browser.
struct Opening {
	owner: OperatorId,
	phone: String,
	cancel: CancellationToken,
}

/// Clears the registered [`Opening`] however `begin_link` exits.
struct OpeningGuard<'a> {
	slot: &'a SyncMutex<Option<Opening>>,
}

impl<'a> OpeningGuard<'a> {
	fn register(slot: &'a SyncMutex<Option<Opening>>, opening: Opening) -> Self {
		*slot.lock() = Some(opening);
		Self { slot }
	}
}

impl Drop for OpeningGuard<'_> {
	fn drop(&mut self) {
		self.slot.lock().take();
	}
}

/// Runs linking commands against at most one flow at a time.
///
/// Commands never queue behind each other: while one is still running, or
/// while another operator's flow holds the browser, new commands fail fast
/// with [`Error::Busy`]. Only the slot itself queues, so a new flow may
/// still wait for a rotation tick to finish, and `abort` can cancel that
/// wait.
pub struct LinkingService {
	ctx: LinkContext,
	flow: Mutex<Option<LinkingFlow>>,
	status: SyncMutex<Option<FlowStatus>>,
	opening: SyncMutex<Option<Opening>>,
}

impl LinkingService {
	pub fn new(ctx: LinkContext) -> Self {
		Self {
			ctx,
			flow: Mutex::new(None),
			status: SyncMutex::new(None),
			opening: SyncMutex::new(None),
		}
	}

	/// Current flow as of the last completed command.
	pub fn status(&self) -> Option<FlowStatus> {
		self.status.lock().clone()
	}

	fn busy(&self) -> Error {
		let phone = self.status.lock().as_ref().and_then(|s| s.phone.clone()).unwrap_or_else(|| "another number".to_string());
		Error::Busy { phone }
	}

	fn try_lock(&self) -> Result<MutexGuard<'_, Option<LinkingFlow>>> {
		self.flow.try_lock().map_err(|_| self.busy())
	}

	/// Locks the flow owned by `operator`.
	fn lock_owned(&self, operator: OperatorId) -> Result<MutexGuard<'_, Option<LinkingFlow>>> {
		let guard = self.try_lock()?;
		match guard.as_ref().map(LinkingFlow::owner) {
			None => Err(Error::NoActiveFlow),
			Some(owner) if owner != operator => Err(Error::NotFlowOwner),
			Some(_) => Ok(guard),
		}
	}

	/// Publishes the flow's state and drops it once terminal.
	fn settle(&self, slot: &mut Option<LinkingFlow>) {
		let status = slot.as_ref().map(|flow| FlowStatus {
			owner: flow.owner(),
			phone: flow.phone().map(str::to_string),
			state: flow.state(),
		});
		if status.as_ref().is_some_and(|s| s.state.is_terminal() || s.state == LinkState::Idle) {
			debug!(target = "linkfarm.link", state = ?status.as_ref().map(|s| s.state), "linking flow finished");
			*slot = None;
			*self.status.lock() = None;
		} else {
			*self.status.lock() = status;
		}
	}

	/// `begin-link`: collects `raw_phone` and opens a session for it.
	pub async fn begin_link(&self, operator: OperatorId, raw_phone: &str) -> Result<FlowStatus> {
		let mut guard = self.try_lock()?;
		if let Some(existing) = guard.as_ref() {
			if existing.state() >= LinkState::SessionOpen && !existing.state().is_terminal() {
				return Err(Error::Busy {
					phone: existing.phone().unwrap_or_default().to_string(),
				});
			}
		}

		let mut flow = LinkingFlow::new(self.ctx.clone(), operator);
		let phone = flow.collect_phone(raw_phone)?.to_string();
		*self.status.lock() = Some(FlowStatus {
			owner: operator,
			phone: Some(phone.clone()),
			state: flow.state(),
		});
		info!(target = "linkfarm.link", %phone, owner = operator, "linking flow started");

		let cancel = CancellationToken::new();
		let opened = {
			let _opening = OpeningGuard::register(
				&self.opening,
				Opening {
					owner: operator,
					phone: phone.clone(),
					cancel: cancel.clone(),
				},
			);
			flow.open_session(&cancel).await
		};

		// An abort that landed after the slot was granted still wins.
		if opened.is_ok() && cancel.is_cancelled() {
			flow.abort().await;
		}
		*guard = Some(flow);
		self.settle(&mut guard);
		if cancel.is_cancelled() {
			return Err(Error::Abandoned { phone });
		}
		opened?;

		Ok(FlowStatus {
			owner: operator,
			phone: Some(phone),
			state: LinkState::SessionOpen,
		})
	}

	/// `request-link-prompt`.
	pub async fn request_link_prompt(&self, operator: OperatorId) -> Result<LinkState> {
		let mut guard = self.lock_owned(operator)?;
		let result = match guard.as_mut() {
			Some(flow) => flow.request_link_prompt().await.map(|()| flow.state()),
			None => Err(Error::NoActiveFlow),
		};
		self.settle(&mut guard);
		result
	}

	/// `request-number-entry`.
	pub async fn request_number_entry(&self, operator: OperatorId) -> Result<EntryOutcome> {
		let mut guard = self.lock_owned(operator)?;
		let result = match guard.as_mut() {
			Some(flow) => flow.request_number_entry().await,
			None => Err(Error::NoActiveFlow),
		};
		self.settle(&mut guard);
		result
	}

	/// `request-snapshot`: a PNG of the current page.
	pub async fn snapshot(&self, operator: OperatorId) -> Result<Vec<u8>> {
		let mut guard = self.lock_owned(operator)?;
		match guard.as_mut() {
			Some(flow) => flow.snapshot().await,
			None => Err(Error::NoActiveFlow),
		}
	}

	/// Reloads the application root after a missing affordance.
	pub async fn refresh(&self, operator: OperatorId) -> Result<()> {
		let mut guard = self.lock_owned(operator)?;
		let result = match guard.as_mut() {
			Some(flow) => flow.refresh().await,
			None => Err(Error::NoActiveFlow),
		};
		self.settle(&mut guard);
		result
	}

	/// `confirm-link`: persists the account as active and ends the flow.
	pub async fn confirm_link(&self, operator: OperatorId) -> Result<Account> {
		let mut guard = self.lock_owned(operator)?;
		let result = match guard.as_mut() {
			Some(flow) => flow.confirm().await,
			None => Err(Error::NoActiveFlow),
		};
		self.settle(&mut guard);
		result
	}

	/// Abandons the flow. `force` lets an admin end someone else's flow.
	///
	/// Returns the phone of the abandoned flow.
	pub async fn abort(&self, operator: OperatorId, force: bool) -> Result<Option<String>> {
		if let Some(opening) = self.opening.lock().as_ref() {
			if !force && opening.owner != operator {
				return Err(Error::NotFlowOwner);
			}
			opening.cancel.cancel();
			info!(target = "linkfarm.link", phone = %opening.phone, "cancelling linking flow queued for the browser");
			return Ok(Some(opening.phone.clone()));
		}

		let mut guard = if force { self.try_lock()? } else { self.lock_owned(operator)? };
		let Some(flow) = guard.as_mut() else {
			return Ok(None);
		};
		let phone = flow.phone().map(str::to_string);
		flow.abort().await;
		self.settle(&mut guard);
		Ok(phone)
	}

	/// Aborts whatever flow exists, waiting for a running command to finish.
	pub async fn shutdown(&self) {
		if let Some(opening) = self.opening.lock().as_ref() {
			opening.cancel.cancel();
		}
		let mut guard = self.flow.lock().await;
		if let Some(flow) = guard.as_mut() {
			flow.abort().await;
		}
		self.settle(&mut guard);
	}
}
