//! Ordered locator strategies for the target chat application.
//!
//! Page markup changes often and differs per locale, so each affordance is
//! described by several strategies tried in order. The first strategy that
//! resolves wins; a strategy that errors is skipped like one that misses.

use std::sync::LazyLock;

use linkfarm_runtime::{ElementId, Locator, PageQuery};
use tracing::{debug, trace};

/// Labels of the "link with phone number" affordance.
const LINK_WITH_PHONE_LABELS: &[&str] = &[
	"link with phone number",
	"log in with phone number",
	"войти по номеру телефона",
	"связать по номеру телефона",
	"телефон нөмірі арқылы байланыстыру",
	"mit telefonnummer verknüpfen",
	"vincular con el número de teléfono",
];

/// Accepted labels for the "next" button across locales.
pub const NEXT_LABELS: &[&str] = &[
	"next",
	"continue",
	"далее",
	"продолжить",
	"келесі",
	"weiter",
	"siguiente",
	"suivant",
	"avançar",
];

const ACTIONABLE: &str = "button, [role='button'], a, span[role='button'], div[role='button']";

/// Strategies for the affordance that switches QR linking to phone linking.
pub static LINK_WITH_PHONE: LazyLock<Vec<Locator>> = LazyLock::new(|| {
	vec![
		Locator::css("[data-testid='link-device-phone-number-code-screen-link']"),
		Locator::text_containing(ACTIONABLE, LINK_WITH_PHONE_LABELS),
		Locator::xpath("//span[@role='button'][contains(translate(., 'PHONE', 'phone'), 'phone')]"),
		Locator::text_containing("span, div", LINK_WITH_PHONE_LABELS),
	]
});

/// Strategies for the phone number input on the linking screen.
pub static PHONE_INPUT: LazyLock<Vec<Locator>> = LazyLock::new(|| {
	vec![
		Locator::css("input[aria-label='Type your phone number.']"),
		Locator::css("input[aria-label*='phone' i]"),
		Locator::css("input[aria-label*='телефон' i]"),
		Locator::css("form input[type='text']"),
		Locator::css("input[type='tel']"),
	]
});

/// Strategies for the "next" button after typing the number.
pub static NEXT_BUTTON: LazyLock<Vec<Locator>> = LazyLock::new(|| vec![Locator::text_exact(ACTIONABLE, NEXT_LABELS)]);

/// Elements only rendered once the chat list of a linked account has loaded.
pub static AUTHENTICATED_MARKERS: LazyLock<Vec<Locator>> = LazyLock::new(|| {
	vec![
		Locator::css("#pane-side"),
		Locator::css("[data-testid='chat-list']"),
		Locator::css("div[aria-label='Chat list']"),
		Locator::css("div[aria-label='Список чатов']"),
	]
});

/// A strategy that matched, with its position in the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Probe {
	pub index: usize,
	pub element: ElementId,
}

/// Tries `strategies` in order and returns the first match.
pub async fn probe_first<Q>(page: &mut Q, strategies: &[Locator]) -> Option<Probe>
where
	Q: PageQuery + ?Sized,
{
	for (index, locator) in strategies.iter().enumerate() {
		match page.locate(locator).await {
			Ok(Some(element)) => {
				debug!(target = "linkfarm.link", %locator, index, "locator matched");
				return Some(Probe { index, element });
			}
			Ok(None) => trace!(target = "linkfarm.link", %locator, "locator missed"),
			Err(err) => trace!(target = "linkfarm.link", %locator, error = %err, "locator failed; trying next"),
		}
	}
	None
}
