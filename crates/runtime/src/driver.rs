//! Automation driver contract consumed by the orchestration core.
//!
//! A [`DriverFactory`] opens one isolated browser session per profile tag.
//! The returned [`Driver`] owns that session until [`Driver::close`] is
//! called. Element lookups go through the narrower [`PageQuery`] capability
//! so locator probing can run against a fake page.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Failures surfaced by a browser driver.
#[derive(Debug, Error)]
pub enum DriverError {
	/// The browser could not be started for the requested profile.
	#[error("failed to launch browser: {0}")]
	Launch(String),

	#[error("navigation to {url} failed: {message}")]
	Navigation { url: String, message: String },

	#[error("navigation to {url} timed out after {}s", timeout.as_secs())]
	NavigationTimeout { url: String, timeout: Duration },

	#[error("element not found: {0}")]
	ElementNotFound(String),

	#[error("script evaluation failed: {0}")]
	Script(String),

	#[error("snapshot capture failed: {0}")]
	Snapshot(String),

	/// The session was already torn down underneath the caller.
	#[error("browser session is closed")]
	Closed,
}

/// A single strategy for finding an element on the rendered page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
	/// First visible match of a CSS selector.
	Css(String),
	/// First visible match of an XPath expression.
	XPath(String),
	/// First visible element under `scope` whose trimmed, lowercased text
	/// equals (`exact`) or contains one of `needles`.
	Text { scope: String, needles: Vec<String>, exact: bool },
}

impl Locator {
	pub fn css(selector: impl Into<String>) -> Self {
		Self::Css(selector.into())
	}

	pub fn xpath(expression: impl Into<String>) -> Self {
		Self::XPath(expression.into())
	}

	/// Case-insensitive substring match on visible text.
	pub fn text_containing(scope: impl Into<String>, needles: &[&str]) -> Self {
		Self::Text {
			scope: scope.into(),
			needles: needles.iter().map(|n| n.to_lowercase()).collect(),
			exact: false,
		}
	}

	/// Case-insensitive whole-label match on visible text.
	pub fn text_exact(scope: impl Into<String>, needles: &[&str]) -> Self {
		Self::Text {
			scope: scope.into(),
			needles: needles.iter().map(|n| n.to_lowercase()).collect(),
			exact: true,
		}
	}
}

impl fmt::Display for Locator {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Locator::Css(selector) => write!(f, "css={selector}"),
			Locator::XPath(expression) => write!(f, "xpath={expression}"),
			Locator::Text { scope, needles, exact } => {
				let mode = if *exact { "text=" } else { "text~" };
				write!(f, "{mode}{}@{scope}", needles.join("|"))
			}
		}
	}
}

/// Opaque handle to an element previously returned by [`PageQuery::locate`].
///
/// Handles are only meaningful to the driver that produced them and become
/// stale once the page navigates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementId(pub usize);

/// Read-only element lookup against the current page render.
#[async_trait]
pub trait PageQuery: Send {
	/// Resolves `locator` to an element, or `None` when nothing matches.
	async fn locate(&mut self, locator: &Locator) -> Result<Option<ElementId>, DriverError>;
}

/// An open, exclusively owned browser session bound to one profile.
#[async_trait]
pub trait Driver: PageQuery {
	/// Navigates the session's page and waits for load, bounded by `timeout`.
	async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), DriverError>;

	async fn click(&mut self, element: ElementId) -> Result<(), DriverError>;

	/// Replaces the value of an input element and fires `input` and `change`
	/// events so reactive page logic picks the new value up.
	async fn fill(&mut self, element: ElementId, value: &str) -> Result<(), DriverError>;

	async fn run_script(&mut self, code: &str) -> Result<serde_json::Value, DriverError>;

	/// Captures a PNG of the current viewport.
	async fn snapshot(&mut self) -> Result<Vec<u8>, DriverError>;

	/// Shuts the session down. Failures are logged and swallowed.
	async fn close(self: Box<Self>);
}

/// Produces isolated browser sessions keyed by profile tag.
#[async_trait]
pub trait DriverFactory: Send + Sync {
	async fn open(&self, profile_tag: &str) -> Result<Box<dyn Driver>, DriverError>;
}
