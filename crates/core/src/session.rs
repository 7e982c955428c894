//! A live driver bound to one phone under the session slot.

use std::time::Duration;

use linkfarm_runtime::{Driver, DriverFactory};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::slot::{SlotGuard, SlotHolder};

/// Exclusive binding between a phone and an open driver.
///
/// Owned by whichever flow opened it. Dropping a session releases the slot;
/// [`Session::close`] additionally shuts the browser down cleanly.
pub struct Session {
	phone: String,
	profile_tag: String,
	driver: Box<dyn Driver>,
	_guard: SlotGuard,
}

impl Session {
	/// Launches a driver for `profile_tag` under an acquired slot and loads `url`.
	///
	/// The phone and flow kind come from the guard's holder. On launch or
	/// navigation failure the driver is closed and the slot is released before
	/// the error is returned.
	pub async fn open(guard: SlotGuard, factory: &dyn DriverFactory, profile_tag: &str, url: &str, nav_timeout: Duration) -> Result<Self> {
		let SlotHolder { phone, kind } = guard.holder().clone();

		let mut driver = factory.open(profile_tag).await.map_err(|err| {
			warn!(target = "linkfarm.slot", %phone, %kind, error = %err, "driver launch failed");
			err
		})?;

		if let Err(err) = driver.navigate(url, nav_timeout).await {
			warn!(target = "linkfarm.slot", %phone, %kind, %url, error = %err, "initial navigation failed");
			driver.close().await;
			return Err(err.into());
		}

		info!(target = "linkfarm.slot", %phone, %kind, profile = %profile_tag, "session opened");
		Ok(Self {
			phone,
			profile_tag: profile_tag.to_string(),
			driver,
			_guard: guard,
		})
	}

	pub fn phone(&self) -> &str {
		&self.phone
	}

	pub fn profile_tag(&self) -> &str {
		&self.profile_tag
	}

	pub fn driver(&mut self) -> &mut dyn Driver {
		self.driver.as_mut()
	}

	/// Closes the driver (best effort) and releases the slot.
	pub async fn close(self) {
		let Session { phone, driver, _guard: guard, .. } = self;
		driver.close().await;
		debug!(target = "linkfarm.slot", %phone, "session closed");
		drop(guard);
	}
}
