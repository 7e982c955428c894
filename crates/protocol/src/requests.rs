//! Outbound request bodies.

use serde::Serialize;

use crate::keyboard::InlineKeyboardMarkup;

#[derive(Debug, Clone, Serialize)]
pub struct GetUpdates {
	pub offset: i64,
	/// Long-poll timeout in seconds.
	pub timeout: u64,
	pub allowed_updates: Vec<String>,
}

impl GetUpdates {
	pub fn new(offset: i64, timeout: u64) -> Self {
		Self {
			offset,
			timeout,
			allowed_updates: vec!["message".to_string(), "callback_query".to_string()],
		}
	}
}

#[derive(Debug, Clone, Serialize)]
pub struct SendMessage<'a> {
	pub chat_id: i64,
	pub text: &'a str,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub reply_markup: Option<&'a InlineKeyboardMarkup>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnswerCallbackQuery<'a> {
	pub callback_query_id: &'a str,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub text: Option<&'a str>,
}
