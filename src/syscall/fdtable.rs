//! Descriptor table: small integer handles to open-file state.

use crate::kvadapter::client::ObjectFile;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

/// First descriptor handed out. Values below this are the standard streams,
/// recognized by the bridge but not backed by any handle.
pub const FD_BASE: i32 = 100;

/// One open file: a handle capability plus the seek cursor.
///
/// The cursor is deliberately not locked against concurrent syscalls on the
/// same descriptor: racing operations each read the pre-race value for their
/// I/O offset and advance it independently at completion, so the final value
/// depends on completion order. Relaxed atomics keep that inherited behavior
/// without undefined behavior.
pub struct FileSlot {
    pub handle: Box<dyn ObjectFile>,
    cursor: AtomicI64,
}

impl FileSlot {
    pub fn new(handle: Box<dyn ObjectFile>) -> Self {
        Self {
            handle,
            cursor: AtomicI64::new(0),
        }
    }

    pub fn cursor(&self) -> i64 {
        self.cursor.load(Ordering::Relaxed)
    }

    pub fn advance(&self, n: i64) {
        self.cursor.fetch_add(n, Ordering::Relaxed);
    }

    pub fn set_cursor(&self, position: i64) {
        self.cursor.store(position, Ordering::Relaxed);
    }
}

/// Process-local map from descriptor to open-file slot. Descriptor numbers
/// grow monotonically and are never reused within a process lifetime.
pub struct FdTable {
    next_fd: AtomicI32,
    slots: Mutex<HashMap<i32, Arc<FileSlot>>>,
}

impl FdTable {
    pub fn new() -> Self {
        Self {
            next_fd: AtomicI32::new(FD_BASE),
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Bind `handle` to the next free descriptor, cursor at 0. Allocation is
    /// atomic so concurrent opens never share a descriptor.
    pub fn allocate(&self, handle: Box<dyn ObjectFile>) -> i32 {
        let fd = self.next_fd.fetch_add(1, Ordering::SeqCst);
        self.slots
            .lock()
            .unwrap()
            .insert(fd, Arc::new(FileSlot::new(handle)));
        fd
    }

    pub fn lookup(&self, fd: i32) -> Option<Arc<FileSlot>> {
        self.slots.lock().unwrap().get(&fd).cloned()
    }

    /// Drop the descriptor binding, returning the slot so the caller can
    /// close the underlying handle.
    pub fn release(&self, fd: i32) -> Option<Arc<FileSlot>> {
        self.slots.lock().unwrap().remove(&fd)
    }
}

impl Default for FdTable {
    fn default() -> Self {
        Self::new()
    }
}
