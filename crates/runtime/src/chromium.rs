//! Chromium-backed [`DriverFactory`] built on the DevTools protocol.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::element::Element;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures_util::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::browser_finder::find_chrome_executable;
use crate::driver::{Driver, DriverError, DriverFactory, ElementId, Locator, PageQuery};
use crate::process::clear_stale_profile_lock;
use crate::scripts;

/// Launch parameters shared by every session the factory opens.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
	/// Root under which each profile tag gets its own user-data-dir.
	pub profiles_dir: PathBuf,
	pub headless: bool,
	/// Explicit browser binary; discovered on `PATH` when unset.
	pub executable: Option<PathBuf>,
	/// Disable the Chromium sandbox (required when running as root in containers).
	pub no_sandbox: bool,
	pub window_size: (u32, u32),
	/// Value for `--lang`, which drives the target page's UI locale.
	pub lang: String,
}

impl LaunchOptions {
	pub fn new(profiles_dir: impl Into<PathBuf>) -> Self {
		Self {
			profiles_dir: profiles_dir.into(),
			headless: true,
			executable: None,
			no_sandbox: false,
			window_size: (1280, 900),
			lang: "en-US".to_string(),
		}
	}
}

/// Opens one Chromium process per session, each bound to its own profile.
#[derive(Debug, Clone)]
pub struct ChromiumFactory {
	options: LaunchOptions,
}

impl ChromiumFactory {
	pub fn new(options: LaunchOptions) -> Self {
		Self { options }
	}

	/// Directory holding cookies and local storage for `profile_tag`.
	pub fn profile_dir(&self, profile_tag: &str) -> PathBuf {
		self.options.profiles_dir.join(profile_tag)
	}

	fn browser_config(&self, user_data_dir: &Path) -> Result<BrowserConfig, DriverError> {
		let (width, height) = self.options.window_size;
		let mut builder = BrowserConfig::builder()
			.user_data_dir(user_data_dir)
			.window_size(width, height)
			.arg("--no-first-run")
			.arg("--no-default-browser-check")
			.arg("--disable-blink-features=AutomationControlled")
			.arg(format!("--lang={}", self.options.lang));

		if !self.options.headless {
			builder = builder.with_head();
		}
		if self.options.no_sandbox {
			builder = builder.no_sandbox();
		}
		if let Some(executable) = self.options.executable.clone().or_else(find_chrome_executable) {
			builder = builder.chrome_executable(executable);
		}

		builder.build().map_err(DriverError::Launch)
	}
}

#[async_trait]
impl DriverFactory for ChromiumFactory {
	async fn open(&self, profile_tag: &str) -> Result<Box<dyn Driver>, DriverError> {
		let user_data_dir = self.profile_dir(profile_tag);
		std::fs::create_dir_all(&user_data_dir)
			.map_err(|e| DriverError::Launch(format!("cannot create profile dir {}: {e}", user_data_dir.display())))?;
		clear_stale_profile_lock(&user_data_dir);

		let config = self.browser_config(&user_data_dir)?;
		debug!(target = "linkfarm.driver", profile = %profile_tag, dir = %user_data_dir.display(), "launching chromium");

		let (mut browser, mut handler) = Browser::launch(config).await.map_err(|e| DriverError::Launch(e.to_string()))?;
		let handler_task = tokio::spawn(async move {
			while let Some(event) = handler.next().await {
				if let Err(err) = event {
					debug!(target = "linkfarm.driver", error = %err, "cdp handler stopped");
					break;
				}
			}
		});

		let page = match browser.new_page("about:blank").await {
			Ok(page) => page,
			Err(err) => {
				let _ = browser.close().await;
				let _ = browser.wait().await;
				handler_task.abort();
				return Err(DriverError::Launch(format!("cannot open page: {err}")));
			}
		};

		info!(target = "linkfarm.driver", profile = %profile_tag, "chromium session opened");
		Ok(Box::new(ChromiumDriver {
			profile_tag: profile_tag.to_string(),
			browser,
			page,
			handler_task,
			elements: Vec::new(),
			next_mark: 0,
		}))
	}
}

/// One live Chromium process and its single page.
pub struct ChromiumDriver {
	profile_tag: String,
	browser: Browser,
	page: Page,
	handler_task: JoinHandle<()>,
	elements: Vec<Element>,
	next_mark: usize,
}

impl ChromiumDriver {
	fn element(&self, id: ElementId) -> Result<&Element, DriverError> {
		self.elements.get(id.0).ok_or_else(|| DriverError::ElementNotFound(format!("stale element handle {}", id.0)))
	}
}

#[async_trait]
impl PageQuery for ChromiumDriver {
	async fn locate(&mut self, locator: &Locator) -> Result<Option<ElementId>, DriverError> {
		self.next_mark += 1;
		let mark = self.next_mark;

		let tagged = self
			.page
			.evaluate(scripts::tag_script(locator, mark))
			.await
			.map_err(|e| DriverError::Script(e.to_string()))?
			.into_value::<bool>()
			.map_err(|e| DriverError::Script(e.to_string()))?;
		if !tagged {
			return Ok(None);
		}

		let element = self
			.page
			.find_element(scripts::marked_selector(mark))
			.await
			.map_err(|e| DriverError::ElementNotFound(format!("{locator}: {e}")))?;
		self.elements.push(element);
		Ok(Some(ElementId(self.elements.len() - 1)))
	}
}

#[async_trait]
impl Driver for ChromiumDriver {
	async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), DriverError> {
		self.elements.clear();
		match tokio::time::timeout(timeout, self.page.goto(url)).await {
			Ok(Ok(_)) => Ok(()),
			Ok(Err(err)) => Err(DriverError::Navigation {
				url: url.to_string(),
				message: err.to_string(),
			}),
			Err(_) => Err(DriverError::NavigationTimeout {
				url: url.to_string(),
				timeout,
			}),
		}
	}

	async fn click(&mut self, element: ElementId) -> Result<(), DriverError> {
		self.element(element)?
			.click()
			.await
			.map(|_| ())
			.map_err(|e| DriverError::Script(format!("click failed: {e}")))
	}

	async fn fill(&mut self, element: ElementId, value: &str) -> Result<(), DriverError> {
		self.element(element)?
			.call_js_fn(scripts::fill_function(value), false)
			.await
			.map(|_| ())
			.map_err(|e| DriverError::Script(format!("fill failed: {e}")))
	}

	async fn run_script(&mut self, code: &str) -> Result<serde_json::Value, DriverError> {
		let result = self.page.evaluate(code).await.map_err(|e| DriverError::Script(e.to_string()))?;
		Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
	}

	async fn snapshot(&mut self) -> Result<Vec<u8>, DriverError> {
		self.page
			.screenshot(ScreenshotParams::builder().build())
			.await
			.map_err(|e| DriverError::Snapshot(e.to_string()))
	}

	async fn close(mut self: Box<Self>) {
		if let Err(err) = self.browser.close().await {
			warn!(target = "linkfarm.driver", profile = %self.profile_tag, error = %err, "browser close failed");
		}
		if let Err(err) = self.browser.wait().await {
			debug!(target = "linkfarm.driver", profile = %self.profile_tag, error = %err, "browser wait failed");
		}
		self.handler_task.abort();
		info!(target = "linkfarm.driver", profile = %self.profile_tag, "chromium session closed");
	}
}

impl Drop for ChromiumDriver {
	fn drop(&mut self) {
		self.handler_task.abort();
	}
}
