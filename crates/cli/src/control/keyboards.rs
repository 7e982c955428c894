use linkfarm::{LinkState, OperatorId};
use linkfarm_protocol::{InlineKeyboardButton, InlineKeyboardMarkup};

use super::command::{CB_ABORT, CB_APPROVE_PREFIX, CB_DONE, CB_ENTER, CB_PROMPT, CB_REFRESH, CB_SNAPSHOT};

fn button(text: &str, data: &str) -> InlineKeyboardButton {
	InlineKeyboardButton::callback(text, data)
}

/// Next-step buttons for a flow in `state`; `None` once nothing is left to do.
pub fn for_state(state: LinkState) -> Option<InlineKeyboardMarkup> {
	let primary = match state {
		LinkState::SessionOpen => vec![button("Link with phone number", CB_PROMPT)],
		LinkState::LinkPromptRequested => vec![button("Enter number", CB_ENTER)],
		LinkState::NumberTyped => vec![button("Linked, done", CB_DONE), button("Enter again", CB_ENTER)],
		_ => return None,
	};
	Some(
		InlineKeyboardMarkup::new()
			.row(primary)
			.row(vec![button("Snapshot", CB_SNAPSHOT), button("Refresh", CB_REFRESH)])
			.row(vec![button("Abort", CB_ABORT)]),
	)
}

/// Offered to the admin alongside a new access request.
pub fn approve(operator: OperatorId) -> InlineKeyboardMarkup {
	InlineKeyboardMarkup::new().row(vec![button("Approve", &format!("{CB_APPROVE_PREFIX}{operator}"))])
}

#[cfg(test)]
mod tests {
	use super::*;

	fn callbacks(markup: &InlineKeyboardMarkup) -> Vec<&str> {
		markup.inline_keyboard.iter().flatten().map(|b| b.callback_data.as_str()).collect()
	}

	#[test]
	fn number_typed_offers_confirmation() {
		let markup = for_state(LinkState::NumberTyped).unwrap();
		assert_eq!(callbacks(&markup), vec![CB_DONE, CB_ENTER, CB_SNAPSHOT, CB_REFRESH, CB_ABORT]);
	}

	#[test]
	fn finished_flows_have_no_buttons() {
		assert!(for_state(LinkState::Confirmed).is_none());
		assert!(for_state(LinkState::Idle).is_none());
	}

	#[test]
	fn approve_button_carries_operator_id() {
		assert_eq!(callbacks(&approve(77)), vec!["access:approve:77"]);
	}
}
