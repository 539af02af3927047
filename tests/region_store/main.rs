//! Integration tests for the region store.
//!
//! These exercise whole store lifecycles (create → record → close →
//! read back or reopen) through the public facade. Encoding, replay and
//! state-machine details are unit tested inside the crates.

#[path = "../common/mod.rs"]
mod common;

mod alternation;
mod concurrency;
mod persistence;
mod properties;
mod tabular;
