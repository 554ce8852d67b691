//! Shared test utilities for vantage integration tests.
//!
//! This module provides:
//! - `MockProvider`, a scripted adapter implementing the provider contract
//! - `TestHarness` wiring store, config and adapters into a manager

pub mod harness;
pub mod mock;

pub use harness::{both_streams, TestHarness};
pub use mock::{FetchScript, MockProvider};
