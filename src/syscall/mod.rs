//! Syscall layer (bridge + supporting pieces)
//!
//! Responsibilities:
//! - Map the hierarchical path namespace onto the backend's flat key space
//!   (`path`).
//! - Track open file descriptors with independent seek cursors (`fdtable`).
//! - Translate each POSIX file syscall into backend operations and deliver a
//!   signed result through a completion sink exactly once (`bridge`).
//! - Serialize metadata into the fixed-layout stat record callers expect
//!   (`statrec`).
//! - Special-case the random-byte device so a descriptor can be backed by
//!   any object with the file-handle capability surface (`device`).
//! - Aggregate per-operation latency, observationally only (`profile`).
//!
//! Submodules:
//! - `path`: path-to-key codec and fake-CWD resolution
//! - `fdtable`: descriptor table and open-file slots
//! - `bridge`: syscall entry points and completion sink
//! - `statrec`: fixed-layout stat record
//! - `device`: virtual random-byte device
//! - `profile`: per-operation latency aggregation
//! - `demo`: end-to-end demo against the local-directory backend

pub mod bridge;
pub mod demo;
pub mod device;
pub mod fdtable;
pub mod path;
pub mod profile;
pub mod statrec;
