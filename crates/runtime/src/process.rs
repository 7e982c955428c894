//! Profile-directory and browser-process hygiene.

use std::path::Path;

use tracing::{debug, warn};

/// Files Chromium leaves behind to claim a user-data-dir.
const SINGLETON_FILES: [&str; 3] = ["SingletonLock", "SingletonCookie", "SingletonSocket"];

/// Whether the browser that wrote a lock with this `pid` may still be running.
///
/// Unknown means alive: a lock is only cleared when its owner is provably gone.
pub fn pid_is_alive(pid: u32) -> bool {
	if pid == 0 {
		return false;
	}
	if pid == std::process::id() {
		return true;
	}

	let proc_root = Path::new("/proc");
	if proc_root.join("self").exists() {
		return proc_root.join(pid.to_string()).exists();
	}

	#[cfg(unix)]
	{
		match std::process::Command::new("kill").args(["-0", &pid.to_string()]).output() {
			Ok(output) => output.status.success(),
			Err(_) => true,
		}
	}

	#[cfg(not(unix))]
	{
		true
	}
}

/// Splits a `SingletonLock` target (`<hostname>-<pid>`) into its parts.
fn lock_owner(target: &str) -> Option<(&str, u32)> {
	let (host, pid) = target.rsplit_once('-')?;
	Some((host, pid.parse().ok()?))
}

fn local_hostname() -> Option<String> {
	hostname::get().ok().map(|h| h.to_string_lossy().into_owned())
}

/// Whether a lock written by `host`/`pid` can be proven abandoned from here.
///
/// A lock from another host sharing the profiles directory is never stale:
/// its pid means nothing on this machine.
fn lock_is_stale(host: &str, pid: u32, local_host: Option<&str>) -> bool {
	local_host == Some(host) && !pid_is_alive(pid)
}

/// Removes the singleton lock of a profile whose owning browser is gone.
///
/// A browser killed mid-session keeps its profile claimed, and the next
/// launch against that directory exits immediately. Returns `true` when a
/// stale lock was removed.
pub fn clear_stale_profile_lock(profile_dir: &Path) -> bool {
	let lock = profile_dir.join(SINGLETON_FILES[0]);
	let Ok(target) = std::fs::read_link(&lock) else {
		return false;
	};

	let target = target.to_string_lossy();
	let local_host = local_hostname();
	match lock_owner(&target) {
		Some((host, pid)) if !lock_is_stale(host, pid, local_host.as_deref()) => {
			debug!(target = "linkfarm.driver", profile = %profile_dir.display(), %host, pid, "profile lock held by a live or foreign browser");
			false
		}
		_ => {
			for name in SINGLETON_FILES {
				let path = profile_dir.join(name);
				if let Err(err) = std::fs::remove_file(&path) {
					if err.kind() != std::io::ErrorKind::NotFound {
						warn!(target = "linkfarm.driver", path = %path.display(), error = %err, "failed to remove stale profile lock");
					}
				}
			}
			debug!(target = "linkfarm.driver", profile = %profile_dir.display(), lock = %target, "removed stale profile lock");
			true
		}
	}
}
