use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use linkfarm::{AccountStatus, Database, LinkContext, LinkSettings, LinkingService, SessionSlot};
use linkfarm_cli::control::{Command, ControlSurface, Operator, Outgoing};
use linkfarm_runtime::{Driver, DriverError, DriverFactory, ElementId, Locator, PageQuery};
use parking_lot::Mutex;

const ADMIN: i64 = 1;
const OPERATOR: i64 = 500;

/// Renders a fixed set of selectors and labels on every page.
struct StaticPage {
	visible: HashSet<String>,
	opened: Arc<Mutex<usize>>,
}

struct StaticDriver {
	visible: HashSet<String>,
}

#[async_trait]
impl DriverFactory for StaticPage {
	async fn open(&self, _profile_tag: &str) -> Result<Box<dyn Driver>, DriverError> {
		*self.opened.lock() += 1;
		Ok(Box::new(StaticDriver {
			visible: self.visible.clone(),
		}))
	}
}

#[async_trait]
impl PageQuery for StaticDriver {
	async fn locate(&mut self, locator: &Locator) -> Result<Option<ElementId>, DriverError> {
		let hit = match locator {
			Locator::Css(s) | Locator::XPath(s) => self.visible.contains(s),
			Locator::Text { needles, .. } => needles.iter().any(|n| self.visible.contains(n)),
		};
		Ok(hit.then_some(ElementId(0)))
	}
}

#[async_trait]
impl Driver for StaticDriver {
	async fn navigate(&mut self, _url: &str, _timeout: Duration) -> Result<(), DriverError> {
		Ok(())
	}

	async fn click(&mut self, _element: ElementId) -> Result<(), DriverError> {
		Ok(())
	}

	async fn fill(&mut self, _element: ElementId, _value: &str) -> Result<(), DriverError> {
		Ok(())
	}

	async fn run_script(&mut self, _code: &str) -> Result<serde_json::Value, DriverError> {
		Ok(serde_json::Value::Null)
	}

	async fn snapshot(&mut self) -> Result<Vec<u8>, DriverError> {
		Ok(vec![0x89, b'P', b'N', b'G'])
	}

	async fn close(self: Box<Self>) {}
}

struct Fixture {
	db: Database,
	slot: SessionSlot,
	opened: Arc<Mutex<usize>>,
	control: ControlSurface,
}

fn fixture() -> Fixture {
	let db = Database::open_in_memory().unwrap();
	let slot = SessionSlot::new();
	let opened = Arc::new(Mutex::new(0));
	let page = StaticPage {
		visible: ["link with phone number", "input[type='tel']", "next"].into_iter().map(String::from).collect(),
		opened: Arc::clone(&opened),
	};
	let linking = Arc::new(LinkingService::new(LinkContext {
		slot: slot.clone(),
		factory: Arc::new(page),
		accounts: db.accounts(),
		settings: LinkSettings {
			instance_id: "bot".into(),
			target_url: "https://web.example.test/".into(),
			nav_timeout: Duration::from_secs(5),
		},
	}));
	let control = ControlSurface::new(linking, db.accounts(), db.access(), slot.clone(), ADMIN);
	Fixture { db, slot, opened, control }
}

fn operator(id: i64) -> Operator {
	Operator {
		id,
		chat_id: id,
		display_name: format!("op{id}"),
	}
}

fn texts(outgoing: &[Outgoing]) -> Vec<&str> {
	outgoing.iter().map(|o| o.reply.text.as_str()).collect()
}

#[tokio::test]
async fn unapproved_operator_is_gated_until_admin_approves() {
	let f = fixture();
	let op = operator(OPERATOR);

	let denied = f.control.handle_text(&op, "/link +77001234567").await;
	assert!(denied[0].reply.text.contains("/start"));
	assert_eq!(*f.opened.lock(), 0);

	let start = f.control.handle_text(&op, "/start").await;
	assert_eq!(start.len(), 2);
	assert_eq!(start[1].chat_id, ADMIN);
	let approve_button = &start[1].reply.keyboard.as_ref().unwrap().inline_keyboard[0][0];
	let approve = Command::from_callback(&approve_button.callback_data).unwrap();
	assert_eq!(approve, Command::Approve(OPERATOR));

	let approved = f.control.handle(&operator(ADMIN), approve).await;
	assert_eq!(approved.iter().map(|o| o.chat_id).collect::<Vec<_>>(), vec![ADMIN, OPERATOR]);

	let linked = f.control.handle_text(&op, "+7 700 123 45 67").await;
	assert!(linked[0].reply.text.contains("+77001234567"), "{:?}", texts(&linked));
	assert!(linked[0].reply.keyboard.is_some());
}

#[tokio::test]
async fn admin_only_commands_are_refused_to_operators() {
	let f = fixture();
	f.db.access().request(OPERATOR, "op").await.unwrap();
	f.db.access().approve(OPERATOR).await.unwrap();

	let refused = f.control.handle_text(&operator(OPERATOR), "/accounts").await;
	assert_eq!(texts(&refused), vec!["Only the administrator can do that."]);

	let refused = f.control.handle_text(&operator(OPERATOR), "/revoke 77").await;
	assert_eq!(texts(&refused), vec!["Only the administrator can do that."]);
}

#[tokio::test]
async fn admin_walks_a_number_through_linking() {
	let f = fixture();
	let admin = operator(ADMIN);

	for step in ["/link 77001234567", "/prompt", "/enter"] {
		let out = f.control.handle_text(&admin, step).await;
		assert_eq!(out.len(), 1);
		assert!(out[0].reply.keyboard.is_some(), "{step}: {:?}", texts(&out));
	}

	let snapshot = f.control.handle_text(&admin, "/snapshot").await;
	assert!(snapshot[0].reply.image.is_some());

	let done = f.control.handle_text(&admin, "/done").await;
	assert_eq!(texts(&done), vec!["+77001234567 is linked and joins the rotation."]);
	assert!(f.slot.is_free());

	let account = f.db.accounts().get("77001234567").await.unwrap().unwrap();
	assert_eq!(account.status, AccountStatus::Active);
	assert_eq!(account.profile_tag, "bot_77001234567");

	let listing = f.control.handle_text(&admin, "/accounts").await;
	assert!(listing[0].reply.text.starts_with("+77001234567 active"), "{:?}", texts(&listing));
}

#[tokio::test]
async fn second_operator_sees_busy_and_admin_can_abort() {
	let f = fixture();
	f.db.access().request(OPERATOR, "op").await.unwrap();
	f.db.access().approve(OPERATOR).await.unwrap();

	f.control.handle_text(&operator(OPERATOR), "/link 77001234567").await;

	let busy = f.control.handle_text(&operator(ADMIN), "/link 77007654321").await;
	assert!(busy[0].reply.text.contains("busy linking +77001234567"), "{:?}", texts(&busy));

	let status = f.control.handle_text(&operator(ADMIN), "/status").await;
	assert!(status[0].reply.text.contains("Linking: +77001234567 (session open)"), "{:?}", texts(&status));

	let aborted = f.control.handle_text(&operator(ADMIN), "/abort").await;
	assert_eq!(aborted.len(), 2);
	assert_eq!(aborted[1].chat_id, OPERATOR);
	assert!(f.slot.is_free());
}

#[tokio::test]
async fn out_of_order_step_is_explained() {
	let f = fixture();
	let admin = operator(ADMIN);

	let out = f.control.handle_text(&admin, "/done").await;
	assert_eq!(texts(&out), vec!["No linking in progress. Send /link <phone> to start."]);

	f.control.handle_text(&admin, "/link 77001234567").await;
	let out = f.control.handle_text(&admin, "/done").await;
	assert!(out[0].reply.text.contains("out of order"), "{:?}", texts(&out));
}
