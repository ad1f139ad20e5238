//! SQLite-backed trial repository.
//!
//! The storage layer is where the engine's two hard guarantees actually
//! live:
//!
//! - a partial UNIQUE index on `(user_id, product_id) WHERE status =
//!   'active'` makes the one-active-trial invariant hold under concurrent
//!   creates, whatever the application-level checks concluded;
//! - every status mutation carries an `AND status = ...` clause, so a
//!   sweeper correction and a conversion racing on the same row resolve to
//!   exactly one winner and the loser's write touches nothing.
//!
//! Timestamps are stored as Unix-epoch seconds and always compared in UTC.
//! Reminder thresholds live in their own table; its UNIQUE constraint backs
//! the at-most-once-per-threshold guarantee.

mod store;

pub use store::SqliteTrialStore;
