use std::fmt;
use std::str::FromStr;

use rusqlite::{OptionalExtension, Row, params};
use serde::Serialize;
use tracing::debug;

use super::{Database, OperatorId};
use crate::error::Result;

/// Lifecycle state of an account row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
	/// Linking was attempted but never confirmed.
	Pending,
	/// Linked and eligible for rotation.
	Active,
}

impl AccountStatus {
	pub fn as_str(self) -> &'static str {
		match self {
			AccountStatus::Pending => "pending",
			AccountStatus::Active => "active",
		}
	}
}

impl fmt::Display for AccountStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for AccountStatus {
	type Err = String;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		match s {
			"pending" => Ok(AccountStatus::Pending),
			"active" => Ok(AccountStatus::Active),
			other => Err(format!("unknown account status: {other}")),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
	pub phone: String,
	pub owner: OperatorId,
	pub status: AccountStatus,
	/// Unix seconds of the last successful session; `0` when never active.
	pub last_active: i64,
	pub activity_counter: i64,
	pub profile_tag: String,
}

impl Account {
	pub fn is_active(&self) -> bool {
		self.status == AccountStatus::Active
	}

	fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
		let status: String = row.get(2)?;
		let status = status
			.parse()
			.map_err(|e: String| rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, e.into()))?;
		Ok(Self {
			phone: row.get(0)?,
			owner: row.get(1)?,
			status,
			last_active: row.get(3)?,
			activity_counter: row.get(4)?,
			profile_tag: row.get(5)?,
		})
	}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccountCounts {
	pub active: u64,
	pub pending: u64,
}

const COLUMNS: &str = "phone, owner, status, last_active, activity_counter, profile_tag";

/// Account persistence: upsert-by-phone, stalest-active lookup, heartbeat.
#[derive(Clone)]
pub struct AccountStore {
	db: Database,
}

impl AccountStore {
	pub(super) fn new(db: Database) -> Self {
		Self { db }
	}

	/// Marks `phone` as linked.
	///
	/// Inserts an active row or promotes an existing one. `last_active` only
	/// ever moves forward and `profile_tag` keeps the value from first insert.
	pub async fn confirm_active(&self, phone: &str, owner: OperatorId, profile_tag: &str, now: i64) -> Result<Account> {
		let (phone, profile_tag) = (phone.to_string(), profile_tag.to_string());
		let account = self
			.db
			.call(move |conn| {
				conn.query_row(
					&format!(
						"INSERT INTO accounts ({COLUMNS}) VALUES (?1, ?2, 'active', ?3, 1, ?4)
						ON CONFLICT(phone) DO UPDATE SET
							status = 'active',
							owner = excluded.owner,
							last_active = MAX(accounts.last_active, excluded.last_active),
							activity_counter = accounts.activity_counter + 1
						RETURNING {COLUMNS}"
					),
					params![phone, owner, now, profile_tag],
					Account::from_row,
				)
			})
			.await?;
		debug!(target = "linkfarm.store", phone = %account.phone, last_active = account.last_active, "account confirmed active");
		Ok(account)
	}

	/// Records an unconfirmed linking attempt. Existing rows are untouched.
	pub async fn record_pending(&self, phone: &str, owner: OperatorId, profile_tag: &str) -> Result<bool> {
		let (phone, profile_tag) = (phone.to_string(), profile_tag.to_string());
		let inserted = self
			.db
			.call(move |conn| {
				conn.execute(
					"INSERT INTO accounts (phone, owner, status, last_active, activity_counter, profile_tag)
					VALUES (?1, ?2, 'pending', 0, 0, ?3)
					ON CONFLICT(phone) DO NOTHING",
					params![phone, owner, profile_tag],
				)
			})
			.await?;
		Ok(inserted > 0)
	}

	/// The active account with the oldest `last_active`, ties broken by phone.
	pub async fn oldest_active(&self) -> Result<Option<Account>> {
		self.db
			.call(|conn| {
				conn.query_row(
					&format!("SELECT {COLUMNS} FROM accounts WHERE status = 'active' ORDER BY last_active ASC, phone ASC LIMIT 1"),
					[],
					Account::from_row,
				)
				.optional()
			})
			.await
	}

	/// All active accounts, stalest first.
	pub async fn list_active_by_staleness(&self) -> Result<Vec<Account>> {
		self.db
			.call(|conn| {
				let mut stmt = conn.prepare(&format!(
					"SELECT {COLUMNS} FROM accounts WHERE status = 'active' ORDER BY last_active ASC, phone ASC"
				))?;
				let rows = stmt.query_map([], Account::from_row)?;
				rows.collect()
			})
			.await
	}

	/// Refreshes the heartbeat of an active account.
	///
	/// Returns `false` when no active row exists for `phone`.
	pub async fn touch(&self, phone: &str, now: i64) -> Result<bool> {
		let phone = phone.to_string();
		let updated = self
			.db
			.call(move |conn| {
				conn.execute(
					"UPDATE accounts
					SET last_active = MAX(last_active, ?2), activity_counter = activity_counter + 1
					WHERE phone = ?1 AND status = 'active'",
					params![phone, now],
				)
			})
			.await?;
		Ok(updated > 0)
	}

	pub async fn get(&self, phone: &str) -> Result<Option<Account>> {
		let phone = phone.to_string();
		self.db
			.call(move |conn| {
				conn.query_row(&format!("SELECT {COLUMNS} FROM accounts WHERE phone = ?1"), params![phone], Account::from_row)
					.optional()
			})
			.await
	}

	/// Every account, active first, then by phone.
	pub async fn list(&self) -> Result<Vec<Account>> {
		self.db
			.call(|conn| {
				let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM accounts ORDER BY status ASC, phone ASC"))?;
				let rows = stmt.query_map([], Account::from_row)?;
				rows.collect()
			})
			.await
	}

	pub async fn counts(&self) -> Result<AccountCounts> {
		self.db
			.call(|conn| {
				conn.query_row(
					"SELECT
						COALESCE(SUM(CASE WHEN status = 'active' THEN 1 ELSE 0 END), 0),
						COALESCE(SUM(CASE WHEN status = 'pending' THEN 1 ELSE 0 END), 0)
					FROM accounts",
					[],
					|row| {
						Ok(AccountCounts {
							active: row.get::<_, i64>(0)? as u64,
							pending: row.get::<_, i64>(1)? as u64,
						})
					},
				)
			})
			.await
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn store() -> AccountStore {
		Database::open_in_memory().unwrap().accounts()
	}

	#[tokio::test]
	async fn confirm_inserts_active_row() {
		let store = store();
		let account = store.confirm_active("77001234567", 10, "main_77001234567", 1_000).await.unwrap();

		assert_eq!(account.status, AccountStatus::Active);
		assert_eq!(account.last_active, 1_000);
		assert_eq!(account.activity_counter, 1);
		assert_eq!(store.get("77001234567").await.unwrap(), Some(account));
	}

	#[tokio::test]
	async fn pending_row_is_promoted_once_and_keeps_profile() {
		let store = store();
		assert!(store.record_pending("77001234567", 10, "main_77001234567").await.unwrap());
		assert!(!store.record_pending("77001234567", 11, "other_tag").await.unwrap());
		assert_eq!(store.get("77001234567").await.unwrap().unwrap().status, AccountStatus::Pending);

		let account = store.confirm_active("77001234567", 10, "ignored", 500).await.unwrap();
		assert!(account.is_active());
		assert_eq!(account.profile_tag, "main_77001234567");

		// A later pending record never reverts an active row.
		store.record_pending("77001234567", 10, "main_77001234567").await.unwrap();
		assert!(store.get("77001234567").await.unwrap().unwrap().is_active());
	}

	#[tokio::test]
	async fn last_active_never_moves_backward() {
		let store = store();
		store.confirm_active("77001234567", 1, "t", 2_000).await.unwrap();

		assert!(store.touch("77001234567", 1_500).await.unwrap());
		assert_eq!(store.get("77001234567").await.unwrap().unwrap().last_active, 2_000);

		let again = store.confirm_active("77001234567", 1, "t", 1_000).await.unwrap();
		assert_eq!(again.last_active, 2_000);
		assert_eq!(again.activity_counter, 3);
	}

	#[tokio::test]
	async fn oldest_active_orders_by_heartbeat_then_phone() {
		let store = store();
		assert_eq!(store.oldest_active().await.unwrap(), None);

		store.confirm_active("70000000002", 1, "b", 900).await.unwrap();
		store.confirm_active("70000000003", 1, "c", 100).await.unwrap();
		store.confirm_active("70000000001", 1, "a", 100).await.unwrap();
		store.record_pending("70000000000", 1, "p").await.unwrap();

		assert_eq!(store.oldest_active().await.unwrap().unwrap().phone, "70000000001");
		let order: Vec<String> = store.list_active_by_staleness().await.unwrap().into_iter().map(|a| a.phone).collect();
		assert_eq!(order, ["70000000001", "70000000003", "70000000002"]);
	}

	#[tokio::test]
	async fn touch_ignores_pending_and_unknown_rows() {
		let store = store();
		store.record_pending("77001234567", 1, "t").await.unwrap();
		assert!(!store.touch("77001234567", 10).await.unwrap());
		assert!(!store.touch("79990000000", 10).await.unwrap());
		assert_eq!(store.get("77001234567").await.unwrap().unwrap().last_active, 0);
	}

	#[tokio::test]
	async fn counts_split_by_status() {
		let store = store();
		assert_eq!(store.counts().await.unwrap(), AccountCounts::default());

		store.confirm_active("70000000001", 1, "a", 1).await.unwrap();
		store.record_pending("70000000002", 1, "b").await.unwrap();
		store.record_pending("70000000003", 1, "c").await.unwrap();

		assert_eq!(store.counts().await.unwrap(), AccountCounts { active: 1, pending: 2 });
		assert_eq!(store.list().await.unwrap()[0].status, AccountStatus::Active);
	}
}
