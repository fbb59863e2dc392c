// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Error taxonomy for the reconciliation engine.
//!
//! The only errors that abort a run are [`ConfigError`]s raised during
//! pre-run validation. Everything discovered mid-batch is scoped to a
//! single item: transform and resolver failures downgrade that item to
//! `Failed`, client errors are retried and then downgraded, audit write
//! failures are logged and swallowed, and a corrupt tracker state file is
//! treated as a cold start.

use thiserror::Error;

/// Fatal configuration error. Raised by [`crate::SyncConfiguration::validate`]
/// before any item is processed; never raised mid-batch.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("configuration '{name}' has no field mappings")]
    NoMappings { name: String },
    #[error("duplicate mapping for target field '{field}'")]
    DuplicateMapping { field: String },
    #[error("mapping has an empty {side} field name")]
    EmptyFieldName { side: &'static str },
    #[error("batch_size must be at least 1")]
    ZeroBatchSize,
    #[error("source and target platform are both '{platform}'")]
    SamePlatform { platform: String },
    #[error("{side} platform name is empty")]
    EmptyPlatform { side: &'static str },
}

/// Per-item failure inside the Field Transformer.
#[derive(Error, Debug)]
pub enum TransformError {
    #[error("cannot convert {src} value to {dst}: {detail}")]
    TypeConversion {
        src: &'static str,
        dst: &'static str,
        detail: String,
    },
    #[error("unknown custom transform '{0}'")]
    UnknownTransform(String),
    #[error("required field '{0}' is missing and has no default")]
    MissingRequiredField(String),
}

/// Failure reported by an injected [`crate::clients::SyncClient`].
/// Retried up to `max_retries` before the item is marked `Failed`.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("item '{0}' not found")]
    NotFound(String),
    #[error("client backend error: {0}")]
    Backend(String),
}

/// Non-fatal audit sink failure. The engine logs it and carries on.
#[derive(Error, Debug)]
#[error("audit write failed: {0}")]
pub struct AuditWriteError(pub String);

/// Tracker state file problems. Never fatal: a missing or corrupt file
/// means "no prior state" and forces a full resync.
#[derive(Error, Debug)]
pub enum StateError {
    #[error("state file corrupt: {0}")]
    Corruption(String),
    #[error("state file I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Any per-item failure, as attached to a `Failed` sync result.
#[derive(Error, Debug)]
pub enum ItemError {
    #[error(transparent)]
    Transform(#[from] TransformError),
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("custom resolver failed: {0}")]
    Resolver(String),
}
