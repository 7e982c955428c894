//! Inline keyboard markup attached to outgoing messages.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InlineKeyboardButton {
	pub text: String,
	pub callback_data: String,
}

impl InlineKeyboardButton {
	pub fn callback(text: impl Into<String>, data: impl Into<String>) -> Self {
		Self {
			text: text.into(),
			callback_data: data.into(),
		}
	}
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct InlineKeyboardMarkup {
	pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

impl InlineKeyboardMarkup {
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends a row of buttons.
	pub fn row(mut self, buttons: Vec<InlineKeyboardButton>) -> Self {
		if !buttons.is_empty() {
			self.inline_keyboard.push(buttons);
		}
		self
	}

	pub fn is_empty(&self) -> bool {
		self.inline_keyboard.is_empty()
	}
}
