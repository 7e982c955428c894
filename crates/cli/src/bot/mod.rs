//! Long-polling loop connecting the bot API to the [`ControlSurface`].

use std::sync::Arc;
use std::time::Duration;

use linkfarm_protocol::Update;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::control::{Command, ControlSurface, Operator, Outgoing, Reply};

pub mod client;

pub use client::BotClient;

/// Pause after a failed poll before trying again.
const RETRY_DELAY: Duration = Duration::from_secs(5);

/// One actionable update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
	Text { operator: Operator, text: String },
	Callback { id: String, operator: Operator, data: String },
}

impl Event {
	/// Extracts the event from `update`, ignoring bots and unsupported kinds.
	pub fn from_update(update: Update) -> Option<Self> {
		if let Some(message) = update.message {
			let from = message.from.filter(|user| !user.is_bot)?;
			let text = message.text?;
			return Some(Event::Text {
				operator: Operator {
					id: from.id,
					chat_id: message.chat.id,
					display_name: from.display_name(),
				},
				text,
			});
		}

		let callback = update.callback_query?;
		let chat_id = callback.message.as_ref().map_or(callback.from.id, |m| m.chat.id);
		Some(Event::Callback {
			operator: Operator {
				id: callback.from.id,
				chat_id,
				display_name: callback.from.display_name(),
			},
			id: callback.id,
			data: callback.data.unwrap_or_default(),
		})
	}

	async fn process(self, client: &BotClient, control: &ControlSurface) -> Vec<Outgoing> {
		match self {
			Event::Text { operator, text } => control.handle_text(&operator, &text).await,
			Event::Callback { id, operator, data } => {
				if let Err(err) = client.answer_callback(&id, None).await {
					debug!(target = "linkfarm.bot", error = %err, "callback acknowledgement failed");
				}
				match Command::from_callback(&data) {
					Some(command) => control.handle(&operator, command).await,
					None => vec![Outgoing::new(operator.chat_id, Reply::text("That button is no longer valid."))],
				}
			}
		}
	}
}

async fn deliver(client: &BotClient, outgoing: Vec<Outgoing>) {
	for Outgoing { chat_id, reply } in outgoing {
		let sent = match reply.image {
			Some(png) => client.send_photo(chat_id, png, &reply.text, reply.keyboard.as_ref()).await,
			None => client.send_message(chat_id, &reply.text, reply.keyboard.as_ref()).await,
		};
		if let Err(err) = sent {
			warn!(target = "linkfarm.bot", chat_id, error = %err, "failed to deliver reply");
		}
	}
}

/// Polls for updates until `cancel` fires. Each update is handled on its own
/// task so a command waiting for the browser never blocks the others.
pub async fn run(client: BotClient, control: Arc<ControlSurface>, poll_timeout: Duration, cancel: CancellationToken) {
	let mut offset = 0;
	let mut tasks = JoinSet::new();
	info!(target = "linkfarm.bot", "bot polling started");

	loop {
		let polled = tokio::select! {
			_ = cancel.cancelled() => break,
			polled = client.get_updates(offset, poll_timeout) => polled,
		};

		match polled {
			Ok(updates) => {
				for update in updates {
					offset = offset.max(update.update_id + 1);
					let Some(event) = Event::from_update(update) else {
						continue;
					};
					let (client, control) = (client.clone(), Arc::clone(&control));
					tasks.spawn(async move {
						let outgoing = event.process(&client, &control).await;
						deliver(&client, outgoing).await;
					});
				}
			}
			Err(err) => {
				warn!(target = "linkfarm.bot", error = %err, "polling failed; retrying");
				tokio::select! {
					_ = cancel.cancelled() => break,
					_ = tokio::time::sleep(RETRY_DELAY) => {}
				}
			}
		}

		while let Some(finished) = tasks.try_join_next() {
			if let Err(err) = finished {
				warn!(target = "linkfarm.bot", error = %err, "update handler panicked");
			}
		}
	}

	tasks.shutdown().await;
	info!(target = "linkfarm.bot", "bot polling stopped");
}
