//! Process wiring: store, slot, driver factory, rotation task, and bot loop.

use std::sync::Arc;

use linkfarm::{Database, LinkContext, LinkingService, RotationScheduler, SessionSlot};
use linkfarm_runtime::{ChromiumFactory, DriverFactory};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::bot::{self, BotClient};
use crate::control::ControlSurface;
use crate::error::Result;
use crate::settings::Settings;

/// Runs until Ctrl-C, then shuts every component down in order.
pub async fn run(settings: Settings) -> Result<()> {
	info!(
		target = "linkfarm",
		instance = %settings.instance_id,
		db = %settings.db_path.display(),
		profiles = %settings.profiles_dir.display(),
		"starting linkfarm"
	);

	let db = Database::open(&settings.db_path)?;
	std::fs::create_dir_all(&settings.profiles_dir)?;

	let slot = SessionSlot::new();
	let factory: Arc<dyn DriverFactory> = Arc::new(ChromiumFactory::new(settings.launch_options()));
	let linking = Arc::new(LinkingService::new(LinkContext {
		slot: slot.clone(),
		factory: Arc::clone(&factory),
		accounts: db.accounts(),
		settings: settings.link_settings(),
	}));
	let control = Arc::new(ControlSurface::new(
		Arc::clone(&linking),
		db.accounts(),
		db.access(),
		slot.clone(),
		settings.admin_id,
	));
	let client = BotClient::new(&settings.bot_token)?;

	let cancel = CancellationToken::new();
	let rotation = RotationScheduler::new(db.accounts(), slot.clone(), factory, settings.rotation_settings()).spawn(cancel.child_token());
	let bot = tokio::spawn(bot::run(client, control, settings.poll_timeout, cancel.child_token()));

	match tokio::signal::ctrl_c().await {
		Ok(()) => info!(target = "linkfarm", "interrupt received; shutting down"),
		Err(err) => error!(target = "linkfarm", error = %err, "cannot listen for interrupt; shutting down"),
	}

	cancel.cancel();
	if let Err(err) = bot.await {
		warn!(target = "linkfarm", error = %err, "bot task ended abnormally");
	}
	if let Err(err) = rotation.await {
		warn!(target = "linkfarm", error = %err, "rotation task ended abnormally");
	}
	linking.shutdown().await;
	slot.close();

	info!(target = "linkfarm", "shutdown complete");
	Ok(())
}
