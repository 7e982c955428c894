//! SQLite persistence for accounts and operator access.
//!
//! One connection is shared behind a mutex. Every operation is a single
//! statement executed on the blocking pool, so no transaction ever spans an
//! await point.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::{Error, Result};

mod access;
mod accounts;

pub use access::{AccessRequest, AccessStore};
pub use accounts::{Account, AccountCounts, AccountStatus, AccountStore};

/// Operator identity as issued by the control surface.
pub type OperatorId = i64;

const SCHEMA_VERSION: i32 = 1;

/// Current time as unix seconds, the unit of every stored timestamp.
pub fn now_ts() -> i64 {
	chrono::Utc::now().timestamp()
}

const SCHEMA_V1: &str = "
CREATE TABLE IF NOT EXISTS accounts (
	phone            TEXT    NOT NULL PRIMARY KEY,
	owner            INTEGER NOT NULL,
	status           TEXT    NOT NULL CHECK (status IN ('pending', 'active')),
	last_active      INTEGER NOT NULL DEFAULT 0,
	activity_counter INTEGER NOT NULL DEFAULT 0,
	profile_tag      TEXT    NOT NULL
);
CREATE INDEX IF NOT EXISTS accounts_rotation ON accounts (status, last_active, phone);
CREATE TABLE IF NOT EXISTS access_requests (
	owner        INTEGER NOT NULL PRIMARY KEY,
	display_name TEXT    NOT NULL,
	approved     INTEGER NOT NULL DEFAULT 0
);
";

/// Shared handle to the backing database.
#[derive(Clone)]
pub struct Database {
	conn: Arc<Mutex<Connection>>,
}

impl Database {
	/// Opens (creating if needed) a file-backed database and applies the schema.
	pub fn open(path: &Path) -> Result<Self> {
		if let Some(parent) = path.parent() {
			if !parent.as_os_str().is_empty() {
				std::fs::create_dir_all(parent).map_err(|e| Error::Persistence(format!("cannot create {}: {e}", parent.display())))?;
			}
		}

		let conn = Connection::open(path)?;
		let mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
		conn.busy_timeout(std::time::Duration::from_secs(5))?;
		debug!(target = "linkfarm.store", path = %path.display(), journal_mode = %mode, "database opened");

		Self::with_connection(conn)
	}

	pub fn open_in_memory() -> Result<Self> {
		Self::with_connection(Connection::open_in_memory()?)
	}

	fn with_connection(conn: Connection) -> Result<Self> {
		migrate(&conn)?;
		Ok(Self {
			conn: Arc::new(Mutex::new(conn)),
		})
	}

	pub fn accounts(&self) -> AccountStore {
		AccountStore::new(self.clone())
	}

	pub fn access(&self) -> AccessStore {
		AccessStore::new(self.clone())
	}

	/// Runs `f` against the connection on the blocking pool.
	pub(crate) async fn call<F, T>(&self, f: F) -> Result<T>
	where
		F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
		T: Send + 'static,
	{
		let conn = Arc::clone(&self.conn);
		let value = tokio::task::spawn_blocking(move || {
			let conn = conn.lock();
			f(&conn)
		})
		.await??;
		Ok(value)
	}
}

fn migrate(conn: &Connection) -> Result<()> {
	let version: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
	if version > SCHEMA_VERSION {
		return Err(Error::Persistence(format!(
			"database schema version {version} is newer than supported version {SCHEMA_VERSION}"
		)));
	}
	if version < SCHEMA_VERSION {
		conn.execute_batch(SCHEMA_V1)?;
		conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
		info!(target = "linkfarm.store", from = version, to = SCHEMA_VERSION, "database schema migrated");
	}
	Ok(())
}
