//! Background rotation that keeps linked accounts warm.
//!
//! Every tick picks the active account that has gone longest without a
//! session, opens it, waits for the chat list to render, lingers for a
//! randomized dwell and records the heartbeat. Rotation only ever refreshes
//! `last_active`; it never changes an account's status.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use linkfarm_runtime::DriverFactory;
use rand::Rng;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::locator::{self, AUTHENTICATED_MARKERS};
use crate::session::Session;
use crate::slot::{FlowKind, SessionSlot, SlotHolder};
use crate::store::{Account, AccountStore, now_ts};

const READY_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// What to do with accounts whose last visit failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryPolicy {
	/// Minimum time before a failed account is selected again. Zero retries
	/// it on the very next tick, indefinitely.
	pub failure_backoff: Duration,
}

#[derive(Debug, Clone)]
pub struct RotationSettings {
	pub target_url: String,
	pub interval: Duration,
	pub dwell_min: Duration,
	pub dwell_max: Duration,
	/// Bound on waiting for the authenticated chat list.
	pub ready_timeout: Duration,
	pub nav_timeout: Duration,
	pub retry: RetryPolicy,
}

/// Result of one rotation tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
	/// No active account is eligible.
	Idle,
	/// The stalest account is mid-way through an interactive flow.
	SkippedInteractive { phone: String },
	Refreshed { phone: String },
	Failed { phone: String, error: String },
}

pub struct RotationScheduler {
	accounts: AccountStore,
	slot: SessionSlot,
	factory: Arc<dyn DriverFactory>,
	settings: RotationSettings,
	failures: HashMap<String, Instant>,
}

impl RotationScheduler {
	pub fn new(accounts: AccountStore, slot: SessionSlot, factory: Arc<dyn DriverFactory>, settings: RotationSettings) -> Self {
		Self {
			accounts,
			slot,
			factory,
			settings,
			failures: HashMap::new(),
		}
	}

	/// Starts the rotation loop; it stops at the next suspension point once
	/// `cancel` fires.
	pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
		tokio::spawn(self.run(cancel))
	}

	pub async fn run(mut self, cancel: CancellationToken) {
		let mut ticker = tokio::time::interval(self.settings.interval);
		ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
		info!(target = "linkfarm.rotation", interval_secs = self.settings.interval.as_secs(), "rotation started");

		loop {
			tokio::select! {
				_ = cancel.cancelled() => break,
				_ = ticker.tick() => {}
			}

			tokio::select! {
				_ = cancel.cancelled() => break,
				outcome = self.tick() => log_outcome(&outcome),
			}
		}
		info!(target = "linkfarm.rotation", "rotation stopped");
	}

	/// Runs one rotation cycle. Errors never escape; they become outcomes.
	pub async fn tick(&mut self) -> TickOutcome {
		let candidate = match self.select_candidate().await {
			Ok(Some(account)) => account,
			Ok(None) => return TickOutcome::Idle,
			Err(err) => {
				warn!(target = "linkfarm.rotation", error = %err, "candidate lookup failed");
				return TickOutcome::Idle;
			}
		};

		if self.slot.held_for(&candidate.phone) == Some(FlowKind::Interactive) {
			return TickOutcome::SkippedInteractive { phone: candidate.phone };
		}

		match self.visit(&candidate).await {
			Ok(()) => {
				self.failures.remove(&candidate.phone);
				TickOutcome::Refreshed { phone: candidate.phone }
			}
			Err(err) => {
				self.failures.insert(candidate.phone.clone(), Instant::now());
				TickOutcome::Failed {
					phone: candidate.phone,
					error: err.to_string(),
				}
			}
		}
	}

	async fn select_candidate(&self) -> Result<Option<Account>> {
		let backoff = self.settings.retry.failure_backoff;
		if backoff.is_zero() || self.failures.is_empty() {
			return self.accounts.oldest_active().await;
		}

		let now = Instant::now();
		let cooling = |phone: &str| self.failures.get(phone).is_some_and(|failed_at| now.duration_since(*failed_at) < backoff);
		Ok(self
			.accounts
			.list_active_by_staleness()
			.await?
			.into_iter()
			.find(|account| !cooling(&account.phone)))
	}

	fn dwell(&self) -> Duration {
		let (min, max) = (self.settings.dwell_min, self.settings.dwell_max);
		if max <= min {
			return min;
		}
		let millis = rand::rng().random_range(min.as_millis() as u64..=max.as_millis() as u64);
		Duration::from_millis(millis)
	}

	async fn visit(&self, account: &Account) -> Result<()> {
		let guard = self.slot.acquire(SlotHolder::new(&account.phone, FlowKind::Rotation)).await?;
		let mut session = Session::open(
			guard,
			self.factory.as_ref(),
			&account.profile_tag,
			&self.settings.target_url,
			self.settings.nav_timeout,
		)
		.await?;

		let result = match self.exercise(&mut session).await {
			Ok(()) => self.heartbeat(&account.phone).await,
			Err(err) => Err(err),
		};
		session.close().await;
		result
	}

	/// Records the visit. An account that stopped being active in the
	/// meantime counts as a failed visit.
	async fn heartbeat(&self, phone: &str) -> Result<()> {
		if self.accounts.touch(phone, now_ts()).await? {
			Ok(())
		} else {
			Err(Error::NotActive { phone: phone.to_string() })
		}
	}

	/// Waits for the authenticated UI, then idles for the dwell period.
	async fn exercise(&self, session: &mut Session) -> Result<()> {
		let deadline = Instant::now() + self.settings.ready_timeout;
		loop {
			if locator::probe_first(session.driver(), &AUTHENTICATED_MARKERS).await.is_some() {
				break;
			}
			if Instant::now() + READY_POLL_INTERVAL > deadline {
				return Err(Error::LoadTimeout {
					phone: session.phone().to_string(),
					timeout: self.settings.ready_timeout,
				});
			}
			tokio::time::sleep(READY_POLL_INTERVAL).await;
		}

		let dwell = self.dwell();
		debug!(target = "linkfarm.rotation", phone = %session.phone(), dwell_ms = dwell.as_millis() as u64, "account loaded; dwelling");
		tokio::time::sleep(dwell).await;
		Ok(())
	}
}

fn log_outcome(outcome: &TickOutcome) {
	match outcome {
		TickOutcome::Idle => debug!(target = "linkfarm.rotation", "no active accounts to rotate"),
		TickOutcome::SkippedInteractive { phone } => {
			info!(target = "linkfarm.rotation", %phone, "skipping tick; account is being linked")
		}
		TickOutcome::Refreshed { phone } => info!(target = "linkfarm.rotation", %phone, "account refreshed"),
		TickOutcome::Failed { phone, error } => warn!(target = "linkfarm.rotation", %phone, %error, "rotation visit failed"),
	}
}
