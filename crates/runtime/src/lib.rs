//! Browser driver lifecycle for linkfarm.
//!
//! Defines the driver contract the orchestration core programs against and
//! the Chromium implementation used in production. Only one process-wide
//! session is expected to be open at a time; enforcing that is the caller's
//! job, not this crate's.

pub mod browser_finder;
pub mod chromium;
pub mod driver;
pub mod process;
mod scripts;

pub use chromium::{ChromiumDriver, ChromiumFactory, LaunchOptions};
pub use driver::{Driver, DriverError, DriverFactory, ElementId, Locator, PageQuery};
