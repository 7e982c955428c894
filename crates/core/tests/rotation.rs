mod support;

use std::sync::Arc;
use std::time::Duration;

use linkfarm::{
	AccountStatus, FlowKind, LinkingService, RetryPolicy, RotationScheduler, RotationSettings, SlotHolder, TickOutcome,
};
use support::{Harness, TARGET_URL};
use tokio_util::sync::CancellationToken;

const A: &str = "77000000001";
const B: &str = "77000000002";
const CHAT_LIST: &str = "#pane-side";

fn settings(retry: RetryPolicy) -> RotationSettings {
	RotationSettings {
		target_url: TARGET_URL.into(),
		interval: Duration::from_secs(45),
		dwell_min: Duration::ZERO,
		dwell_max: Duration::ZERO,
		ready_timeout: Duration::from_secs(3),
		nav_timeout: Duration::from_secs(5),
		retry,
	}
}

fn scheduler(harness: &Harness, retry: RetryPolicy) -> RotationScheduler {
	RotationScheduler::new(harness.db.accounts(), harness.slot.clone(), Arc::new(harness.factory.clone()), settings(retry))
}

async fn seed(harness: &Harness) {
	let accounts = harness.db.accounts();
	accounts.confirm_active(A, 1, "test_77000000001", 100).await.unwrap();
	accounts.confirm_active(B, 1, "test_77000000002", 200).await.unwrap();
	accounts.record_pending("77000000003", 1, "test_77000000003").await.unwrap();
}

#[tokio::test]
async fn stalest_active_account_is_refreshed_first() {
	let harness = Harness::new();
	harness.factory.show(&[CHAT_LIST]);
	seed(&harness).await;
	let mut rotation = scheduler(&harness, RetryPolicy::default());

	assert_eq!(rotation.tick().await, TickOutcome::Refreshed { phone: A.into() });
	let a = harness.db.accounts().get(A).await.unwrap().unwrap();
	assert!(a.last_active > 200);
	assert_eq!(a.activity_counter, 2);
	assert_eq!(a.status, AccountStatus::Active);

	assert_eq!(rotation.tick().await, TickOutcome::Refreshed { phone: B.into() });
	assert_eq!(harness.factory.opened(), vec!["test_77000000001".to_string(), "test_77000000002".to_string()]);
	assert!(harness.slot.is_free());
	assert_eq!(harness.factory.open_now(), 0);
}

#[tokio::test]
async fn pending_accounts_are_never_rotated() {
	let harness = Harness::new();
	harness.factory.show(&[CHAT_LIST]);
	harness.db.accounts().record_pending(A, 1, "test_77000000001").await.unwrap();
	let mut rotation = scheduler(&harness, RetryPolicy::default());

	assert_eq!(rotation.tick().await, TickOutcome::Idle);
	assert!(harness.factory.opened().is_empty());
}

#[tokio::test]
async fn account_in_interactive_flow_is_skipped() {
	let harness = Harness::new();
	harness.factory.show(&[CHAT_LIST]);
	seed(&harness).await;
	let mut rotation = scheduler(&harness, RetryPolicy::default());

	let guard = harness.slot.acquire(SlotHolder::new(A, FlowKind::Interactive)).await.unwrap();
	assert_eq!(rotation.tick().await, TickOutcome::SkippedInteractive { phone: A.into() });
	drop(guard);

	assert!(harness.factory.opened().is_empty());
	assert_eq!(harness.db.accounts().get(A).await.unwrap().unwrap().last_active, 100);
}

#[tokio::test]
async fn load_timeout_keeps_account_active() {
	let harness = Harness::new();
	seed(&harness).await;
	let mut rotation = RotationScheduler::new(
		harness.db.accounts(),
		harness.slot.clone(),
		Arc::new(harness.factory.clone()),
		RotationSettings {
			ready_timeout: Duration::ZERO,
			..settings(RetryPolicy::default())
		},
	);

	let outcome = rotation.tick().await;
	assert!(matches!(outcome, TickOutcome::Failed { ref phone, .. } if phone == A), "{outcome:?}");

	let a = harness.db.accounts().get(A).await.unwrap().unwrap();
	assert_eq!(a.status, AccountStatus::Active);
	assert_eq!(a.last_active, 100);
	assert!(harness.slot.is_free());
	assert_eq!(harness.factory.open_now(), 0);
}

#[tokio::test]
async fn failed_account_is_retried_next_tick_without_backoff() {
	let harness = Harness::new();
	harness.factory.show(&[CHAT_LIST]);
	harness.factory.fail_launch_for("test_77000000001");
	seed(&harness).await;
	let mut rotation = scheduler(&harness, RetryPolicy::default());

	for _ in 0..2 {
		assert!(matches!(rotation.tick().await, TickOutcome::Failed { ref phone, .. } if phone == A));
	}
	assert!(harness.slot.is_free());
}

#[tokio::test]
async fn failure_backoff_moves_on_to_the_next_account() {
	let harness = Harness::new();
	harness.factory.show(&[CHAT_LIST]);
	harness.factory.fail_launch_for("test_77000000001");
	seed(&harness).await;
	let mut rotation = scheduler(
		&harness,
		RetryPolicy {
			failure_backoff: Duration::from_secs(600),
		},
	);

	assert!(matches!(rotation.tick().await, TickOutcome::Failed { ref phone, .. } if phone == A));
	assert_eq!(rotation.tick().await, TickOutcome::Refreshed { phone: B.into() });
	assert_eq!(harness.db.accounts().get(A).await.unwrap().unwrap().status, AccountStatus::Active);
}

#[tokio::test]
async fn rotation_and_linking_never_hold_two_sessions() {
	let harness = Harness::new();
	harness.factory.show(&[CHAT_LIST, "link with phone number"]);
	harness.factory.browser.lock().navigate_delay = Duration::from_millis(30);
	seed(&harness).await;

	let mut rotation = scheduler(&harness, RetryPolicy::default());
	let tick = tokio::spawn(async move { rotation.tick().await });
	tokio::task::yield_now().await;

	let service = LinkingService::new(harness.link_context());
	service.begin_link(7, "77009998877").await.unwrap();
	service.request_link_prompt(7).await.unwrap();
	service.abort(7, false).await.unwrap();

	assert_eq!(tick.await.unwrap(), TickOutcome::Refreshed { phone: A.into() });
	assert_eq!(harness.factory.peak(), 1);
	assert_eq!(harness.slot.stats().peak_concurrent, 1);
	assert_eq!(harness.slot.stats().acquisitions, 2);
	assert!(harness.slot.is_free());
}

#[tokio::test]
async fn cancelled_scheduler_stops() {
	let harness = Harness::new();
	let cancel = CancellationToken::new();
	let handle = scheduler(&harness, RetryPolicy::default()).spawn(cancel.clone());

	cancel.cancel();
	tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
	assert!(harness.slot.is_free());
}
