//! Page-side scripts used by the Chromium driver.
//!
//! Every locator is resolved in the page: the first visible match gets a
//! `data-linkfarm-id` marker which the driver then looks up over CDP.

use crate::driver::Locator;

pub(crate) const MARK_ATTRIBUTE: &str = "data-linkfarm-id";

const VISIBLE_FN: &str = "const visible = (el) => { \
	if (!el || !el.getBoundingClientRect) return false; \
	const r = el.getBoundingClientRect(); \
	const s = window.getComputedStyle(el); \
	return r.width > 0 && r.height > 0 && s.visibility !== 'hidden' && s.display !== 'none'; \
};";

fn js_string(value: &str) -> String {
	serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

/// Builds an expression that tags the first visible match of `locator` with
/// `mark` and evaluates to `true` when something was tagged.
pub(crate) fn tag_script(locator: &Locator, mark: usize) -> String {
	let tag = format!("el.setAttribute('{MARK_ATTRIBUTE}', '{mark}'); return true;");
	let body = match locator {
		Locator::Css(selector) => format!(
			"for (const el of document.querySelectorAll({sel})) {{ if (visible(el)) {{ {tag} }} }} return false;",
			sel = js_string(selector),
		),
		Locator::XPath(expression) => format!(
			"const found = document.evaluate({expr}, document, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null); \
			for (let i = 0; i < found.snapshotLength; i++) {{ const el = found.snapshotItem(i); if (visible(el)) {{ {tag} }} }} return false;",
			expr = js_string(expression),
		),
		Locator::Text { scope, needles, exact } => format!(
			"const needles = {needles}; \
			for (const el of document.querySelectorAll({scope})) {{ \
				if (!visible(el)) continue; \
				const text = (el.innerText || el.textContent || '').trim().toLowerCase(); \
				if (!text) continue; \
				if (needles.some((n) => {exact} ? text === n : text.includes(n))) {{ {tag} }} \
			}} return false;",
			needles = serde_json::to_string(needles).unwrap_or_else(|_| "[]".to_string()),
			scope = js_string(scope),
			exact = exact,
		),
	};
	format!("(() => {{ {VISIBLE_FN} {body} }})()")
}

/// CSS selector for an element tagged by [`tag_script`].
pub(crate) fn marked_selector(mark: usize) -> String {
	format!("[{MARK_ATTRIBUTE}=\"{mark}\"]")
}

/// Function declaration invoked with `this` bound to an input element.
///
/// Goes through the native value setter so frameworks that track the
/// previous value notice the change.
pub(crate) fn fill_function(value: &str) -> String {
	format!(
		"function() {{ \
			const proto = this instanceof HTMLTextAreaElement ? HTMLTextAreaElement.prototype : HTMLInputElement.prototype; \
			const setter = Object.getOwnPropertyDescriptor(proto, 'value').set; \
			this.focus(); \
			setter.call(this, {value}); \
			this.dispatchEvent(new Event('input', {{ bubbles: true }})); \
			this.dispatchEvent(new Event('change', {{ bubbles: true }})); \
			return this.value; \
		}}",
		value = js_string(value),
	)
}
