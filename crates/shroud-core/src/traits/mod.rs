// SPDX-FileCopyrightText: 2026 Shroud Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter traits implemented by the pluggable backends of the delivery core.

pub mod adapter;
pub mod cache;
pub mod profile;
pub mod storage;

pub use adapter::ServiceAdapter;
pub use cache::CacheStore;
pub use profile::ProfileProvider;
pub use storage::StorageAdapter;
