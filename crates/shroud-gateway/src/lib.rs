// SPDX-FileCopyrightText: 2026 Shroud Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket gateway for the shroud delivery core.
//!
//! Exposes a public `/health` endpoint and the `/ws` upgrade that binds a
//! verified user identity to a live connection and bridges socket frames
//! to the delivery pipeline.

pub mod handlers;
pub mod server;
pub mod ws;

pub use server::{GatewayState, HealthState, ServerConfig, start_server};
