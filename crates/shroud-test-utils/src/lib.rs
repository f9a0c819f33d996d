// SPDX-FileCopyrightText: 2026 Shroud Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for shroud integration tests.
//!
//! Provides a full in-process component graph over a temp SQLite database
//! and scripted mock connections, for fast, deterministic, CI-runnable
//! tests without external services.
//!
//! # Components
//!
//! - [`TestHarness`] - the complete delivery stack on a temp database
//! - [`TestConnection`] - a scripted live connection capturing outbound events

pub mod harness;
pub mod mock_connection;

pub use harness::TestHarness;
pub use mock_connection::{AckBehavior, CapturedEvent, TestConnection};
