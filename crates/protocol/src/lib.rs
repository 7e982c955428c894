//! Wire types for the chat control surface.
//!
//! This crate contains the serde-serializable types exchanged with the bot
//! HTTP API. They are the shapes of data as they appear on the wire.
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! * Pure data: no behavior beyond serialization and small accessors
//! * Partial: only the fields linkfarm reads or writes are modelled
//! * Stable: changes only when the wire format changes
//!
//! Command parsing and dispatch live in the `linkfarm-cli` crate.

pub mod keyboard;
pub mod requests;
pub mod updates;

pub use keyboard::*;
pub use requests::*;
pub use updates::*;
