use tracing_subscriber::EnvFilter;

/// Filter applied when `RUST_LOG` is unset.
pub fn default_directive(verbosity: u8) -> &'static str {
	match verbosity {
		0 => "warn,linkfarm=info,linkfarm_cli=info,linkfarm_runtime=info",
		1 => "info",
		2 => "debug",
		_ => "trace",
	}
}

/// Installs the global subscriber. Safe to call more than once.
pub fn init_logging(verbosity: u8) {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));
	let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(true).try_init();
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn default_filter_enables_every_workspace_crate() {
		let filter = EnvFilter::new(default_directive(0)).to_string();
		for krate in ["linkfarm=info", "linkfarm_cli=info", "linkfarm_runtime=info"] {
			assert!(filter.contains(krate), "{krate} missing from {filter}");
		}
	}

	#[test]
	fn verbosity_widens_filter() {
		assert_eq!(default_directive(0), "warn,linkfarm=info,linkfarm_cli=info,linkfarm_runtime=info");
		assert_eq!(default_directive(2), "debug");
		assert_eq!(default_directive(9), "trace");
	}
}
