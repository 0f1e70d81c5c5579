//! Storage backend trait surface consumed by the syscall layer.
//!
//! The backend is a flat key space with primitive per-key operations only:
//! open a key (creating the object when absent), delete, rename, and prefix
//! listing. Open keys hand back an [`ObjectFile`] capability carrying
//! positioned I/O, attributes and sync. Everything hierarchical lives above
//! these traits.
//!
//! Implementations may complete immediately or defer; callers only ever
//! await, so both synchronous and asynchronous backends fit behind the same
//! surface.

use async_trait::async_trait;
use thiserror::Error;

/// Failures surfaced by a storage backend.
///
/// `errno` yields the OS-style magnitude the syscall layer reports (negated)
/// through its completion sink; backend codes pass through untranslated.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no such key")]
    NotFound,
    #[error("operation not supported by this handle")]
    Unsupported,
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn errno(&self) -> i32 {
        match self {
            StoreError::NotFound => libc::ENOENT,
            StoreError::Unsupported => libc::ENOSYS,
            StoreError::Io(e) => e.raw_os_error().unwrap_or(libc::EIO),
            StoreError::Backend(_) => libc::EIO,
        }
    }
}

/// Attributes a backend tracks per object. Size is the only field objects
/// reliably have; the rest of a stat record is synthesized one layer up.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ObjectAttrs {
    pub size: u64,
}

/// Open-object capability.
///
/// Implemented by backend files and by virtual devices alike; the descriptor
/// table holds these behind `dyn`, so any object with this surface can back
/// a file descriptor.
#[async_trait]
pub trait ObjectFile: Send + Sync {
    /// Read into `buf` starting at `offset`; returns bytes read. Short reads
    /// are valid results, not errors.
    async fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize, StoreError>;

    /// Write `data` starting at `offset`; returns bytes written.
    async fn write_at(&self, data: &[u8], offset: u64) -> Result<usize, StoreError>;

    async fn get_attributes(&self) -> Result<ObjectAttrs, StoreError>;

    async fn set_attributes(&self, attrs: ObjectAttrs) -> Result<(), StoreError>;

    async fn sync(&self) -> Result<(), StoreError>;

    async fn close(&self) -> Result<(), StoreError>;
}

/// Flat key-addressed store.
#[async_trait]
pub trait ObjectBackend: Send + Sync {
    /// Open a key for I/O, creating the object when absent.
    async fn open_by_key(&self, key: &str) -> Result<Box<dyn ObjectFile>, StoreError>;

    /// Delete a key. `NotFound` when the key does not exist.
    async fn unlink(&self, key: &str) -> Result<(), StoreError>;

    /// Move the object at `old_key` to `new_key`, replacing any existing
    /// object there.
    async fn rename(&self, old_key: &str, new_key: &str) -> Result<(), StoreError>;

    /// All keys starting with `prefix`, in no particular order.
    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}
