//! The single process-wide browser slot.
//!
//! Every driver session is opened under a [`SlotGuard`]. The slot has exactly
//! one permit and waiters are woken in arrival order, so the interactive
//! linking flow and the rotation scheduler queue behind each other without
//! either being able to preempt or starve the other.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, trace};

use crate::error::{Error, Result};

/// Which logical flow holds the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowKind {
	Interactive,
	Rotation,
}

impl fmt::Display for FlowKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			FlowKind::Interactive => f.write_str("interactive"),
			FlowKind::Rotation => f.write_str("rotation"),
		}
	}
}

/// Identity of the current slot holder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotHolder {
	pub phone: String,
	pub kind: FlowKind,
}

impl SlotHolder {
	pub fn new(phone: impl Into<String>, kind: FlowKind) -> Self {
		Self { phone: phone.into(), kind }
	}
}

/// Counters for verifying exclusivity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlotStats {
	pub acquisitions: u64,
	pub releases: u64,
	/// Highest number of simultaneously held guards ever observed.
	pub peak_concurrent: usize,
}

struct SlotInner {
	permits: Arc<Semaphore>,
	holder: Mutex<Option<SlotHolder>>,
	held: AtomicUsize,
	peak: AtomicUsize,
	acquisitions: AtomicU64,
	releases: AtomicU64,
}

/// Capacity-one gate in front of the driver factory.
#[derive(Clone)]
pub struct SessionSlot {
	inner: Arc<SlotInner>,
}

impl Default for SessionSlot {
	fn default() -> Self {
		Self::new()
	}
}

impl SessionSlot {
	pub fn new() -> Self {
		Self {
			inner: Arc::new(SlotInner {
				permits: Arc::new(Semaphore::new(1)),
				holder: Mutex::new(None),
				held: AtomicUsize::new(0),
				peak: AtomicUsize::new(0),
				acquisitions: AtomicU64::new(0),
				releases: AtomicU64::new(0),
			}),
		}
	}

	/// Suspends until the slot is free, then grants it to `holder`.
	///
	/// Fails only after [`SessionSlot::close`].
	pub async fn acquire(&self, holder: SlotHolder) -> Result<SlotGuard> {
		trace!(target = "linkfarm.slot", phone = %holder.phone, kind = %holder.kind, "waiting for slot");
		let permit = Arc::clone(&self.inner.permits).acquire_owned().await.map_err(|_| Error::SlotClosed)?;
		Ok(self.grant(permit, holder))
	}

	fn grant(&self, permit: OwnedSemaphorePermit, holder: SlotHolder) -> SlotGuard {
		let held = self.inner.held.fetch_add(1, Ordering::SeqCst) + 1;
		self.inner.peak.fetch_max(held, Ordering::SeqCst);
		self.inner.acquisitions.fetch_add(1, Ordering::SeqCst);
		debug!(target = "linkfarm.slot", phone = %holder.phone, kind = %holder.kind, "slot acquired");
		*self.inner.holder.lock() = Some(holder.clone());

		SlotGuard {
			inner: Arc::clone(&self.inner),
			holder,
			_permit: permit,
		}
	}

	/// Current holder, if any.
	pub fn holder(&self) -> Option<SlotHolder> {
		self.inner.holder.lock().clone()
	}

	/// The flow currently holding a live session for `phone`, if any.
	pub fn held_for(&self, phone: &str) -> Option<FlowKind> {
		self.inner.holder.lock().as_ref().filter(|h| h.phone == phone).map(|h| h.kind)
	}

	pub fn is_free(&self) -> bool {
		self.inner.permits.available_permits() > 0
	}

	pub fn stats(&self) -> SlotStats {
		SlotStats {
			acquisitions: self.inner.acquisitions.load(Ordering::SeqCst),
			releases: self.inner.releases.load(Ordering::SeqCst),
			peak_concurrent: self.inner.peak.load(Ordering::SeqCst),
		}
	}

	/// Rejects current and future waiters. Held guards stay valid.
	pub fn close(&self) {
		self.inner.permits.close();
	}
}

/// Exclusive use of the slot; released on drop along every exit path.
pub struct SlotGuard {
	inner: Arc<SlotInner>,
	holder: SlotHolder,
	_permit: OwnedSemaphorePermit,
}

impl SlotGuard {
	/// The phone and flow this guard was granted to.
	pub fn holder(&self) -> &SlotHolder {
		&self.holder
	}
}

impl Drop for SlotGuard {
	fn drop(&mut self) {
		self.inner.holder.lock().take();
		self.inner.held.fetch_sub(1, Ordering::SeqCst);
		self.inner.releases.fetch_add(1, Ordering::SeqCst);
		debug!(target = "linkfarm.slot", phone = %self.holder.phone, kind = %self.holder.kind, "slot released");
	}
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use super::*;

	#[tokio::test]
	async fn guard_drop_frees_slot_and_clears_holder() {
		let slot = SessionSlot::new();
		let guard = slot.acquire(SlotHolder::new("77001234567", FlowKind::Interactive)).await.unwrap();

		assert!(!slot.is_free());
		assert_eq!(slot.held_for("77001234567"), Some(FlowKind::Interactive));
		assert_eq!(slot.held_for("70000000000"), None);
		assert_eq!(guard.holder(), &SlotHolder::new("77001234567", FlowKind::Interactive));

		drop(guard);
		assert!(slot.is_free());
		assert_eq!(slot.holder(), None);
		assert_eq!(slot.stats(), SlotStats { acquisitions: 1, releases: 1, peak_concurrent: 1 });
	}

	#[tokio::test(start_paused = true)]
	async fn waiters_are_served_in_arrival_order() {
		let slot = SessionSlot::new();
		let first = slot.acquire(SlotHolder::new("1", FlowKind::Interactive)).await.unwrap();
		let order = Arc::new(Mutex::new(Vec::new()));

		let mut tasks = Vec::new();
		for (phone, kind) in [("2", FlowKind::Rotation), ("3", FlowKind::Interactive), ("4", FlowKind::Rotation)] {
			let slot = slot.clone();
			let order = Arc::clone(&order);
			tasks.push(tokio::spawn(async move {
				let _guard = slot.acquire(SlotHolder::new(phone, kind)).await.unwrap();
				order.lock().push(phone);
				tokio::time::sleep(Duration::from_millis(10)).await;
			}));
			// Let the task enqueue before spawning the next one.
			tokio::task::yield_now().await;
		}

		drop(first);
		for task in tasks {
			task.await.unwrap();
		}

		assert_eq!(*order.lock(), vec!["2", "3", "4"]);
		assert_eq!(slot.stats().peak_concurrent, 1);
		assert_eq!(slot.stats().releases, 4);
	}

	#[tokio::test]
	async fn closed_slot_rejects_waiters() {
		let slot = SessionSlot::new();
		let guard = slot.acquire(SlotHolder::new("1", FlowKind::Rotation)).await.unwrap();

		let waiter = {
			let slot = slot.clone();
			tokio::spawn(async move { slot.acquire(SlotHolder::new("2", FlowKind::Interactive)).await.map(|_| ()) })
		};
		tokio::task::yield_now().await;
		slot.close();

		assert!(matches!(waiter.await.unwrap(), Err(Error::SlotClosed)));
		drop(guard);
	}
}
