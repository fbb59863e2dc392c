// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Injected platform clients.
//!
//! Platform-specific adapters (REST/GraphQL issue trackers, boards) live
//! outside this crate; the engine only sees the [`SyncClient`] trait.

pub mod memory;
pub mod traits;

pub use memory::InMemoryClient;
pub use traits::SyncClient;
