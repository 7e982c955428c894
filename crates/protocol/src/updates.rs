//! Inbound update payloads.

use serde::{Deserialize, Serialize};

/// Envelope wrapping every bot API response.
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ApiResponse<T> {
	pub ok: bool,
	#[serde(default)]
	pub result: Option<T>,
	#[serde(default)]
	pub description: Option<String>,
	#[serde(default)]
	pub error_code: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
	pub id: i64,
	#[serde(default)]
	pub is_bot: bool,
	pub first_name: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub last_name: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub username: Option<String>,
}

impl User {
	/// Human-readable name used in access requests and admin notifications.
	pub fn display_name(&self) -> String {
		let full = match &self.last_name {
			Some(last) => format!("{} {}", self.first_name, last),
			None => self.first_name.clone(),
		};
		match &self.username {
			Some(username) => format!("{full} (@{username})"),
			None => full,
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chat {
	pub id: i64,
	#[serde(rename = "type", default)]
	pub kind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
	pub message_id: i64,
	#[serde(default)]
	pub from: Option<User>,
	pub chat: Chat,
	#[serde(default)]
	pub date: i64,
	#[serde(default)]
	pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackQuery {
	pub id: String,
	pub from: User,
	#[serde(default)]
	pub message: Option<Message>,
	#[serde(default)]
	pub data: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Update {
	pub update_id: i64,
	#[serde(default)]
	pub message: Option<Message>,
	#[serde(default)]
	pub callback_query: Option<CallbackQuery>,
}
