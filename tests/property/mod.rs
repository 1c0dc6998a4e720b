//! Property-based tests.
//!
//! Run with: cargo test --test property_tests

#[path = "../common/mod.rs"]
mod common;

pub mod client;
