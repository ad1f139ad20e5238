//! Shared domain types for the AlgoMart trial engine.
//!
//! This crate holds the vocabulary the rest of the workspace speaks:
//! identifier newtypes, the [`Trial`] record, its status enumeration, and
//! the read-only product summary the catalog exposes to the engine.
//!
//! Types here are plain data. All lifecycle rules (deriving an effective
//! status from timestamps, deciding legal transitions) live in
//! `algomart-trials` so there is exactly one place that interprets these
//! fields.

mod ids;
mod product;
mod trial;

pub use ids::{ProductId, TrialId, UserId};
pub use product::ProductInfo;
pub use trial::{Trial, TrialStatus};
