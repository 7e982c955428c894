//! Error types for the orchestration core.

use std::time::Duration;

use linkfarm_runtime::DriverError;
use thiserror::Error;

use crate::linking::LinkState;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
	#[error(transparent)]
	Driver(#[from] DriverError),

	#[error("account store error: {0}")]
	Persistence(String),

	#[error("invalid phone number {0:?}: expected 10 to 15 digits")]
	InvalidPhone(String),

	/// Another linking flow already holds the browser session.
	#[error("linking flow for {phone} is in progress")]
	Busy { phone: String },

	#[error("no linking flow in progress")]
	NoActiveFlow,

	#[error("cannot {action} while {state}")]
	InvalidTransition { state: LinkState, action: &'static str },

	#[error("linking flow belongs to another operator")]
	NotFlowOwner,

	#[error("{phone} did not finish loading within {}s", timeout.as_secs())]
	LoadTimeout { phone: String, timeout: Duration },

	/// A heartbeat found no active row for the phone.
	#[error("{phone} is no longer an active account")]
	NotActive { phone: String },

	/// The flow was abandoned while it waited for the browser.
	#[error("linking of {phone} was abandoned")]
	Abandoned { phone: String },

	/// The session slot was closed for shutdown.
	#[error("session slot closed")]
	SlotClosed,

	#[error("{0}")]
	Config(String),
}

impl From<rusqlite::Error> for Error {
	fn from(err: rusqlite::Error) -> Self {
		Error::Persistence(err.to_string())
	}
}

impl From<tokio::task::JoinError> for Error {
	fn from(err: tokio::task::JoinError) -> Self {
		Error::Persistence(format!("store worker failed: {err}"))
	}
}

impl Error {
	/// True for the recoverable "affordance missing" dead-end of the linking flow.
	pub fn is_element_not_found(&self) -> bool {
		matches!(self, Error::Driver(DriverError::ElementNotFound(_)))
	}
}
