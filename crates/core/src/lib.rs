//! Session orchestration for a farm of linked chat accounts.
//!
//! All browser work in the process runs through a single [`SessionSlot`].
//! Two flows compete for it: the operator-driven [`LinkingFlow`] that links a
//! new phone number, and the [`RotationScheduler`] that periodically reopens
//! the stalest active account. Accounts are persisted in an SQLite
//! [`Database`].

pub mod error;
pub mod linking;
pub mod locator;
pub mod phone;
pub mod rotation;
pub mod session;
pub mod slot;
pub mod store;

pub use error::{Error, Result};
pub use linking::{EntryOutcome, FlowStatus, LinkContext, LinkSettings, LinkState, LinkingFlow, LinkingService};
pub use phone::{normalize_phone, profile_tag};
pub use rotation::{RetryPolicy, RotationScheduler, RotationSettings, TickOutcome};
pub use session::Session;
pub use slot::{FlowKind, SessionSlot, SlotGuard, SlotHolder, SlotStats};
pub use store::{AccessRequest, AccessStore, Account, AccountCounts, AccountStatus, AccountStore, Database, OperatorId, now_ts};
