#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use linkfarm::{Database, LinkContext, LinkSettings, SessionSlot};
use linkfarm_runtime::{Driver, DriverError, DriverFactory, ElementId, Locator, PageQuery};
use parking_lot::Mutex;

pub const TARGET_URL: &str = "https://web.example.test/";

/// Observable state shared by a [`FakeFactory`] and every driver it opens.
#[derive(Default)]
pub struct Browser {
	pub open_now: usize,
	pub peak: usize,
	pub opened: Vec<String>,
	pub closed: Vec<String>,
	pub fail_launch: HashSet<String>,
	pub fail_navigate: bool,
	/// Selectors and lowercased labels currently rendered.
	pub visible: HashSet<String>,
	pub fills: Vec<String>,
	pub clicks: Vec<String>,
	pub navigations: Vec<String>,
	/// Delay applied inside every `navigate` call.
	pub navigate_delay: Duration,
}

#[derive(Clone, Default)]
pub struct FakeFactory {
	pub browser: Arc<Mutex<Browser>>,
}

impl FakeFactory {
	pub fn new() -> Self {
		Self::default()
	}

	/// Renders `markers` on every page.
	pub fn show(&self, markers: &[&str]) {
		let mut browser = self.browser.lock();
		browser.visible.extend(markers.iter().map(|m| m.to_lowercase()));
	}

	pub fn hide(&self, marker: &str) {
		self.browser.lock().visible.remove(&marker.to_lowercase());
	}

	pub fn fail_launch_for(&self, profile_tag: &str) {
		self.browser.lock().fail_launch.insert(profile_tag.to_string());
	}

	pub fn peak(&self) -> usize {
		self.browser.lock().peak
	}

	pub fn open_now(&self) -> usize {
		self.browser.lock().open_now
	}

	pub fn opened(&self) -> Vec<String> {
		self.browser.lock().opened.clone()
	}
}

#[async_trait]
impl DriverFactory for FakeFactory {
	async fn open(&self, profile_tag: &str) -> Result<Box<dyn Driver>, DriverError> {
		let mut browser = self.browser.lock();
		if browser.fail_launch.contains(profile_tag) {
			return Err(DriverError::Launch(format!("profile {profile_tag} is corrupt")));
		}
		browser.open_now += 1;
		browser.peak = browser.peak.max(browser.open_now);
		browser.opened.push(profile_tag.to_string());
		Ok(Box::new(FakeDriver {
			tag: profile_tag.to_string(),
			browser: Arc::clone(&self.browser),
			elements: Vec::new(),
			closed: false,
		}))
	}
}

pub struct FakeDriver {
	tag: String,
	browser: Arc<Mutex<Browser>>,
	elements: Vec<String>,
	closed: bool,
}

impl FakeDriver {
	fn element(&self, id: ElementId) -> Result<String, DriverError> {
		self.elements.get(id.0).cloned().ok_or(DriverError::Closed)
	}

	fn release(&mut self) {
		if !self.closed {
			self.closed = true;
			let mut browser = self.browser.lock();
			browser.open_now -= 1;
			browser.closed.push(self.tag.clone());
		}
	}
}

#[async_trait]
impl PageQuery for FakeDriver {
	async fn locate(&mut self, locator: &Locator) -> Result<Option<ElementId>, DriverError> {
		let found = {
			let browser = self.browser.lock();
			match locator {
				Locator::Css(s) | Locator::XPath(s) => browser.visible.contains(&s.to_lowercase()).then(|| s.clone()),
				Locator::Text { needles, .. } => needles.iter().find(|n| browser.visible.contains(*n)).cloned(),
			}
		};
		Ok(found.map(|label| {
			self.elements.push(label);
			ElementId(self.elements.len() - 1)
		}))
	}
}

#[async_trait]
impl Driver for FakeDriver {
	async fn navigate(&mut self, url: &str, _timeout: Duration) -> Result<(), DriverError> {
		let (delay, fail) = {
			let mut browser = self.browser.lock();
			browser.navigations.push(url.to_string());
			(browser.navigate_delay, browser.fail_navigate)
		};
		if !delay.is_zero() {
			tokio::time::sleep(delay).await;
		}
		if fail {
			return Err(DriverError::Navigation {
				url: url.to_string(),
				message: "net::ERR_NAME_NOT_RESOLVED".into(),
			});
		}
		self.elements.clear();
		Ok(())
	}

	async fn click(&mut self, element: ElementId) -> Result<(), DriverError> {
		let label = self.element(element)?;
		self.browser.lock().clicks.push(label);
		Ok(())
	}

	async fn fill(&mut self, element: ElementId, value: &str) -> Result<(), DriverError> {
		self.element(element)?;
		self.browser.lock().fills.push(value.to_string());
		Ok(())
	}

	async fn run_script(&mut self, _code: &str) -> Result<serde_json::Value, DriverError> {
		Ok(serde_json::Value::Null)
	}

	async fn snapshot(&mut self) -> Result<Vec<u8>, DriverError> {
		Ok(b"\x89PNG fake".to_vec())
	}

	async fn close(mut self: Box<Self>) {
		self.release();
	}
}

impl Drop for FakeDriver {
	fn drop(&mut self) {
		self.release();
	}
}

pub struct Harness {
	pub db: Database,
	pub slot: SessionSlot,
	pub factory: FakeFactory,
}

impl Harness {
	pub fn new() -> Self {
		Self {
			db: Database::open_in_memory().unwrap(),
			slot: SessionSlot::new(),
			factory: FakeFactory::new(),
		}
	}

	pub fn link_context(&self) -> LinkContext {
		LinkContext {
			slot: self.slot.clone(),
			factory: Arc::new(self.factory.clone()),
			accounts: self.db.accounts(),
			settings: LinkSettings {
				instance_id: "test".into(),
				target_url: TARGET_URL.into(),
				nav_timeout: Duration::from_secs(5),
			},
		}
	}
}
