// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Conflict detection and resolution.
//!
//! [`detector::diff`] is a pure comparison over mapped field values;
//! [`resolver::resolve`] applies the configured [`crate::ConflictStrategy`]
//! to produce a merged data map or declare the item unresolved.

mod detector;
mod resolver;

pub use detector::{diff, ConflictRecord};
pub use resolver::{resolve, Resolution};
