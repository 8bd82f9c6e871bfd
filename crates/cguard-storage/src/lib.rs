//! Object storage for approved content.
//!
//! Uploads land under `<folder>/<uuid>.<ext>` and are addressed by a public
//! base URL, so callers only ever see the final URL.

pub mod client;
pub mod error;

pub use client::{object_key, public_url, ObjectStorage, R2Client, R2Config};
pub use error::{StorageError, StorageResult};
