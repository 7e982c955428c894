//! Chromium executable discovery for hosts without an explicit path.

use std::path::{Path, PathBuf};

fn linux_candidates() -> &'static [&'static str] {
	&[
		"chromium",
		"chromium-browser",
		"google-chrome-stable",
		"google-chrome",
		"/usr/bin/chromium",
		"/usr/bin/chromium-browser",
		"/usr/bin/google-chrome-stable",
		"/usr/bin/google-chrome",
		"/snap/bin/chromium",
	]
}

fn macos_candidates() -> &'static [&'static str] {
	&[
		"/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
		"/Applications/Chromium.app/Contents/MacOS/Chromium",
	]
}

/// Locates a Chromium-family executable on `PATH` or at a well-known path.
pub fn find_chrome_executable() -> Option<PathBuf> {
	let candidates = if cfg!(target_os = "macos") { macos_candidates() } else { linux_candidates() };

	candidates.iter().find_map(|candidate| {
		if candidate.starts_with('/') {
			let path = Path::new(candidate);
			path.exists().then(|| path.to_path_buf())
		} else {
			which::which(candidate).ok()
		}
	})
}
