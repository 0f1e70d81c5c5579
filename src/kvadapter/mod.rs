//! Key-value storage adapter (kvadapter)
//!
//! Submodules:
//! - `client`: trait surface consumed by the syscall layer (backend + handles)
//! - `memory`: in-memory backend for local development and unit tests
//! - `localfs`: local-directory backend, one file per key (mock adapter)
//!
//! Responsibilities summary:
//! - Expose an async API over a flat key space: open-by-key, delete, rename
//!   and prefix listing, plus per-handle positioned read/write, attributes
//!   and sync.
//! - Normalize backend failures into `StoreError` with an OS errno mapping.
//! - Keep implementations free of any path/namespace knowledge; keys are
//!   opaque strings produced one layer up.

pub mod client;
pub mod localfs;
pub mod memory;
