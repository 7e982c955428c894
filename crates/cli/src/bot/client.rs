//! Minimal bot HTTP API client: long polling plus the few send methods the
//! control surface needs.

use std::time::Duration;

use linkfarm_protocol::{AnswerCallbackQuery, ApiResponse, GetUpdates, InlineKeyboardMarkup, SendMessage, Update};
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::trace;
use url::Url;

use crate::error::{CliError, Result};

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Slack added on top of the long-poll timeout before the request is aborted.
const POLL_GRACE: Duration = Duration::from_secs(10);
const SEND_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct BotClient {
	http: reqwest::Client,
	endpoint: Url,
}

impl std::fmt::Debug for BotClient {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("BotClient").field("host", &self.endpoint.host_str()).finish_non_exhaustive()
	}
}

impl BotClient {
	pub fn new(token: &str) -> Result<Self> {
		Self::with_api_base(DEFAULT_API_BASE, token)
	}

	pub fn with_api_base(api_base: &str, token: &str) -> Result<Self> {
		let base = Url::parse(api_base).map_err(|e| CliError::config(format!("bot api base {api_base:?}: {e}")))?;
		let endpoint = base
			.join(&format!("./bot{token}/"))
			.map_err(|_| CliError::config("bot token contains characters not allowed in a URL"))?;
		let http = reqwest::Client::builder().build()?;
		Ok(Self { http, endpoint })
	}

	pub(crate) fn method_url(&self, method: &str) -> Result<Url> {
		self.endpoint
			.join(method)
			.map_err(|e| CliError::config(format!("bad bot api method {method}: {e}")))
	}

	async fn send<T: DeserializeOwned>(&self, method: &'static str, request: reqwest::RequestBuilder) -> Result<T> {
		trace!(target = "linkfarm.bot", method, "bot api call");
		let response = request.send().await.map_err(|e| CliError::Http(e.without_url()))?;
		let envelope: ApiResponse<T> = response.json().await.map_err(|e| CliError::Http(e.without_url()))?;
		unwrap_envelope(method, envelope)
	}

	async fn call<B: Serialize, T: DeserializeOwned>(&self, method: &'static str, body: &B, timeout: Duration) -> Result<T> {
		let request = self.http.post(self.method_url(method)?).json(body).timeout(timeout);
		self.send(method, request).await
	}

	/// Long-polls for updates after `offset`.
	pub async fn get_updates(&self, offset: i64, poll_timeout: Duration) -> Result<Vec<Update>> {
		let body = GetUpdates::new(offset, poll_timeout.as_secs());
		self.call("getUpdates", &body, poll_timeout + POLL_GRACE).await
	}

	pub async fn send_message(&self, chat_id: i64, text: &str, keyboard: Option<&InlineKeyboardMarkup>) -> Result<()> {
		let body = SendMessage {
			chat_id,
			text,
			reply_markup: keyboard.filter(|k| !k.is_empty()),
		};
		self.call::<_, serde_json::Value>("sendMessage", &body, SEND_TIMEOUT).await?;
		Ok(())
	}

	/// Uploads a PNG with an optional caption.
	pub async fn send_photo(&self, chat_id: i64, png: Vec<u8>, caption: &str, keyboard: Option<&InlineKeyboardMarkup>) -> Result<()> {
		let photo = Part::bytes(png).file_name("snapshot.png").mime_str("image/png")?;
		let mut form = Form::new().text("chat_id", chat_id.to_string()).part("photo", photo);
		if !caption.is_empty() {
			form = form.text("caption", caption.to_string());
		}
		if let Some(keyboard) = keyboard.filter(|k| !k.is_empty()) {
			let markup = serde_json::to_string(keyboard).map_err(|e| CliError::config(format!("keyboard encoding: {e}")))?;
			form = form.text("reply_markup", markup);
		}

		let request = self.http.post(self.method_url("sendPhoto")?).multipart(form).timeout(SEND_TIMEOUT);
		self.send::<serde_json::Value>("sendPhoto", request).await?;
		Ok(())
	}

	pub async fn answer_callback(&self, callback_query_id: &str, text: Option<&str>) -> Result<()> {
		let body = AnswerCallbackQuery { callback_query_id, text };
		self.call::<_, serde_json::Value>("answerCallbackQuery", &body, SEND_TIMEOUT).await?;
		Ok(())
	}
}

fn unwrap_envelope<T>(method: &'static str, envelope: ApiResponse<T>) -> Result<T> {
	match envelope {
		ApiResponse { ok: true, result: Some(result), .. } => Ok(result),
		ApiResponse { description, error_code, .. } => Err(CliError::Api {
			method,
			description: match (error_code, description) {
				(Some(code), Some(text)) => format!("{code} {text}"),
				(None, Some(text)) => text,
				(Some(code), None) => code.to_string(),
				(None, None) => "empty response".to_string(),
			},
		}),
	}
}
