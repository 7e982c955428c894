use rusqlite::{OptionalExtension, params};

use super::{Database, OperatorId};
use crate::error::Result;

/// One operator's request to use the control surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRequest {
	pub owner: OperatorId,
	pub display_name: String,
	pub approved: bool,
}

/// Operator whitelist gating who may start linking flows.
#[derive(Clone)]
pub struct AccessStore {
	db: Database,
}

impl AccessStore {
	pub(super) fn new(db: Database) -> Self {
		Self { db }
	}

	/// Files a request for `owner`, keeping any existing decision.
	///
	/// The display name is refreshed so admin listings stay readable.
	pub async fn request(&self, owner: OperatorId, display_name: &str) -> Result<AccessRequest> {
		let display_name = display_name.to_string();
		self.db
			.call(move |conn| {
				conn.query_row(
					"INSERT INTO access_requests (owner, display_name, approved) VALUES (?1, ?2, 0)
					ON CONFLICT(owner) DO UPDATE SET display_name = excluded.display_name
					RETURNING owner, display_name, approved",
					params![owner, display_name],
					|row| {
						Ok(AccessRequest {
							owner: row.get(0)?,
							display_name: row.get(1)?,
							approved: row.get(2)?,
						})
					},
				)
			})
			.await
	}

	/// Approves `owner`; returns `false` when no request exists.
	pub async fn approve(&self, owner: OperatorId) -> Result<bool> {
		self.set_approved(owner, true).await
	}

	pub async fn revoke(&self, owner: OperatorId) -> Result<bool> {
		self.set_approved(owner, false).await
	}

	async fn set_approved(&self, owner: OperatorId, approved: bool) -> Result<bool> {
		let updated = self
			.db
			.call(move |conn| conn.execute("UPDATE access_requests SET approved = ?2 WHERE owner = ?1", params![owner, approved]))
			.await?;
		Ok(updated > 0)
	}

	pub async fn is_approved(&self, owner: OperatorId) -> Result<bool> {
		let approved = self
			.db
			.call(move |conn| {
				conn.query_row("SELECT approved FROM access_requests WHERE owner = ?1", params![owner], |row| row.get::<_, bool>(0))
					.optional()
			})
			.await?;
		Ok(approved.unwrap_or(false))
	}

	/// Requests still awaiting a decision, oldest operator id first.
	pub async fn pending(&self) -> Result<Vec<AccessRequest>> {
		self.db
			.call(|conn| {
				let mut stmt = conn.prepare("SELECT owner, display_name, approved FROM access_requests WHERE approved = 0 ORDER BY owner")?;
				let rows = stmt.query_map([], |row| {
					Ok(AccessRequest {
						owner: row.get(0)?,
						display_name: row.get(1)?,
						approved: row.get(2)?,
					})
				})?;
				rows.collect()
			})
			.await
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn request_then_approve_and_revoke() {
		let access = Database::open_in_memory().unwrap().access();
		assert!(!access.is_approved(42).await.unwrap());

		let request = access.request(42, "Aru").await.unwrap();
		assert!(!request.approved);
		assert_eq!(access.pending().await.unwrap(), vec![request]);

		assert!(access.approve(42).await.unwrap());
		assert!(access.is_approved(42).await.unwrap());
		assert!(access.pending().await.unwrap().is_empty());

		// Re-requesting keeps the decision and refreshes the name.
		let again = access.request(42, "Aru B").await.unwrap();
		assert!(again.approved);
		assert_eq!(again.display_name, "Aru B");

		assert!(access.revoke(42).await.unwrap());
		assert!(!access.is_approved(42).await.unwrap());
	}

	#[tokio::test]
	async fn approving_unknown_operator_is_noop() {
		let access = Database::open_in_memory().unwrap().access();
		assert!(!access.approve(7).await.unwrap());
		assert!(!access.is_approved(7).await.unwrap());
	}
}
