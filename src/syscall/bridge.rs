//! Syscall bridge: one entry point per POSIX file syscall.
//!
//! Each entry resolves its target (path -> key through the codec, or fd ->
//! slot through the descriptor table), drives the backend, and delivers a
//! signed result to a [`Completion`] sink exactly once: 0 or a positive
//! payload (byte count, new offset) on success, a negative errno magnitude
//! on failure. Nothing is retried, and short transfers are valid results.
//!
//! The backend may complete immediately or defer; every path here is
//! uniformly `async`, so callers never block a thread waiting for a result.

use crate::kvadapter::client::{ObjectAttrs, ObjectBackend, ObjectFile, StoreError};
use crate::syscall::device::{RandomDevice, URANDOM_PATH};
use crate::syscall::fdtable::{FdTable, FileSlot};
use crate::syscall::path;
use crate::syscall::profile::Metrics;
use crate::syscall::statrec::{STAT_RECORD_LEN, StatRecord};
use log::{debug, warn};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use thiserror::Error;
use tokio::sync::oneshot;

/// Single-delivery destination for a syscall's signed result.
///
/// Completing consumes the sink, so a result can be delivered at most once;
/// every bridge entry point delivers exactly once.
pub struct Completion {
    sink: Box<dyn FnOnce(i64) + Send>,
}

impl Completion {
    pub fn new(sink: impl FnOnce(i64) + Send + 'static) -> Self {
        Self {
            sink: Box::new(sink),
        }
    }

    /// Sink/receiver pair for callers that want to await the result.
    pub fn channel() -> (Self, oneshot::Receiver<i64>) {
        let (tx, rx) = oneshot::channel();
        (
            Self::new(move |ret| {
                let _ = tx.send(ret);
            }),
            rx,
        )
    }

    pub fn complete(self, ret: i64) {
        (self.sink)(ret)
    }
}

/// Failures producible by the bridge itself, on top of backend errors.
#[derive(Debug, Error)]
enum SysError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("bad file descriptor")]
    BadDescriptor,
    #[error("operation not implemented")]
    Unsupported,
    #[error("no such path")]
    NotFound,
    #[error("stat buffer too small")]
    ShortStatBuffer,
}

impl SysError {
    fn errno(&self) -> i32 {
        match self {
            SysError::Store(e) => e.errno(),
            SysError::BadDescriptor => libc::EBADF,
            SysError::Unsupported => libc::ENOSYS,
            SysError::NotFound => libc::ENOENT,
            SysError::ShortStatBuffer => libc::EINVAL,
        }
    }
}

type SysResult = Result<i64, SysError>;

const ENOSYS_RET: i64 = -(libc::ENOSYS as i64);

fn to_ret(res: SysResult) -> i64 {
    match res {
        Ok(v) => v,
        Err(e) => -(e.errno() as i64),
    }
}

// Flags surfaced in debug logs on open; none of them change open semantics.
// O_RDONLY is absent because its value is zero.
const KNOWN_FLAGS: &[(&str, i32)] = &[
    ("O_CREAT", libc::O_CREAT),
    ("O_EXCL", libc::O_EXCL),
    ("O_DIRECTORY", libc::O_DIRECTORY),
    ("O_TRUNC", libc::O_TRUNC),
    ("O_SYNC", libc::O_SYNC),
    ("O_RDWR", libc::O_RDWR),
    ("O_WRONLY", libc::O_WRONLY),
    ("O_APPEND", libc::O_APPEND),
    ("O_NOFOLLOW", libc::O_NOFOLLOW),
];

/// Filesystem adapter instance: backend capability, descriptor table,
/// existence hints and metrics. Everything is owned here, so independent
/// instances can coexist in one process.
pub struct SyscallBridge<B: ObjectBackend> {
    backend: B,
    fds: FdTable,
    // Advisory existence hints. Absence proves nothing; the backend stays
    // authoritative and is probed on miss.
    known_paths: Mutex<HashSet<String>>,
    metrics: Metrics,
}

impl<B: ObjectBackend> SyscallBridge<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            fds: FdTable::new(),
            known_paths: Mutex::new(HashSet::new()),
            metrics: Metrics::new(),
        }
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Record latency, flag not-implemented calls, deliver the result.
    fn finish(&self, name: &'static str, started: Instant, ret: i64, done: Completion) {
        self.metrics.record(name, started.elapsed());
        if ret == ENOSYS_RET {
            warn!("{name}: called but not implemented");
        }
        done.complete(ret);
    }

    fn slot(&self, fd: i32) -> Result<Arc<FileSlot>, SysError> {
        self.fds.lookup(fd).ok_or(SysError::BadDescriptor)
    }

    async fn path_exists(&self, absolute: &str) -> Result<bool, SysError> {
        if self.known_paths.lock().unwrap().contains(absolute) {
            return Ok(true);
        }
        let keys = self.backend.list_by_prefix(&path::encode(absolute)).await?;
        Ok(!keys.is_empty())
    }

    /* syscalls */

    pub async fn open(&self, pathname: &str, flags: i32, _mode: u32, done: Completion) {
        let started = Instant::now();
        debug!("open({pathname:?}, flags={flags:#o})");
        let ret = to_ret(self.do_open(pathname, flags).await);
        self.finish("open", started, ret, done);
    }

    async fn do_open(&self, pathname: &str, flags: i32) -> SysResult {
        for (name, bit) in KNOWN_FLAGS {
            if flags & bit != 0 {
                debug!("open: flag {name} set");
            }
        }
        if flags & libc::O_APPEND != 0 {
            warn!("open: O_APPEND requested but append semantics are not implemented");
        }
        if flags & libc::O_TRUNC != 0 {
            warn!("open: O_TRUNC requested but truncate-on-open is not implemented");
        }

        let absolute = path::absolute(pathname);
        if absolute == URANDOM_PATH {
            return Ok(self.fds.allocate(Box::new(RandomDevice)) as i64);
        }
        let handle = self.backend.open_by_key(&path::encode(&absolute)).await?;
        let fd = self.fds.allocate(handle);
        self.known_paths.lock().unwrap().insert(absolute);
        Ok(fd as i64)
    }

    pub async fn close(&self, fd: i32, done: Completion) {
        let started = Instant::now();
        debug!("close({fd})");
        let ret = to_ret(self.do_close(fd).await);
        self.finish("close", started, ret, done);
    }

    async fn do_close(&self, fd: i32) -> SysResult {
        // Standard streams: recognized, not backed by a handle.
        if fd < 2 {
            return Ok(0);
        }
        let slot = self.fds.release(fd).ok_or(SysError::BadDescriptor)?;
        slot.handle.close().await?;
        Ok(0)
    }

    /// Read `count` bytes into `buf[offset..offset + count]` at the
    /// descriptor's cursor, advancing it by the bytes actually transferred.
    pub async fn read(
        &self,
        fd: i32,
        buf: &mut [u8],
        offset: usize,
        count: usize,
        done: Completion,
    ) {
        let started = Instant::now();
        debug!("read(fd={fd}, offset={offset}, count={count})");
        let ret = to_ret(self.do_read(fd, buf, offset, count).await);
        self.finish("read", started, ret, done);
    }

    async fn do_read(&self, fd: i32, buf: &mut [u8], offset: usize, count: usize) -> SysResult {
        let slot = self.slot(fd)?;
        let start = offset.min(buf.len());
        let end = offset.saturating_add(count).min(buf.len());
        let position = slot.cursor();
        let n = slot.handle.read_at(&mut buf[start..end], position as u64).await?;
        slot.advance(n as i64);
        Ok(n as i64)
    }

    /// Write `buf[offset..offset + count]` at the descriptor's cursor,
    /// advancing it by the bytes actually transferred.
    pub async fn write(
        &self,
        fd: i32,
        buf: &[u8],
        offset: usize,
        count: usize,
        done: Completion,
    ) {
        let started = Instant::now();
        debug!("write(fd={fd}, offset={offset}, count={count})");
        let ret = to_ret(self.do_write(fd, buf, offset, count).await);
        self.finish("write", started, ret, done);
    }

    async fn do_write(&self, fd: i32, buf: &[u8], offset: usize, count: usize) -> SysResult {
        let slot = self.slot(fd)?;
        let start = offset.min(buf.len());
        let end = offset.saturating_add(count).min(buf.len());
        let src = &buf[start..end];
        let position = slot.cursor();
        let n = slot.handle.write_at(src, position as u64).await?;
        if n < src.len() {
            warn!("write: short transfer ({n} of {} bytes)", src.len());
        }
        slot.advance(n as i64);
        Ok(n as i64)
    }

    /// Reposition the cursor. Unlike the linux llseek calling convention,
    /// the new absolute offset itself is the success payload, which is what
    /// WASI-shaped callers expect. Only SEEK_SET and SEEK_CUR are supported.
    pub async fn llseek(
        &self,
        fd: i32,
        offset_high: i32,
        offset_low: u32,
        whence: i32,
        done: Completion,
    ) {
        let started = Instant::now();
        debug!("llseek(fd={fd}, hi={offset_high}, lo={offset_low}, whence={whence})");
        let ret = to_ret(self.do_llseek(fd, offset_high, offset_low, whence).await);
        self.finish("llseek", started, ret, done);
    }

    async fn do_llseek(&self, fd: i32, offset_high: i32, offset_low: u32, whence: i32) -> SysResult {
        let slot = self.slot(fd)?;
        let offset = ((offset_high as i64) << 32) | offset_low as i64;
        let position = match whence {
            libc::SEEK_SET => offset,
            libc::SEEK_CUR => offset + slot.cursor(),
            // SEEK_END needs a size probe that is not implemented.
            _ => return Err(SysError::Unsupported),
        };
        slot.set_cursor(position);
        Ok(position)
    }

    pub async fn stat(&self, pathname: &str, buf: &mut [u8], done: Completion) {
        let started = Instant::now();
        debug!("stat({pathname:?})");
        let ret = to_ret(self.do_stat(pathname, buf).await);
        self.finish("stat", started, ret, done);
    }

    async fn do_stat(&self, pathname: &str, buf: &mut [u8]) -> SysResult {
        let absolute = path::absolute(pathname);
        if !self.path_exists(&absolute).await? {
            return Err(SysError::NotFound);
        }
        // Ephemeral handle: attributes are only reachable through an open key.
        let handle = self.backend.open_by_key(&path::encode(&absolute)).await?;
        let res = fill_stat(handle.as_ref(), buf).await;
        handle.close().await?;
        res
    }

    pub async fn fstat(&self, fd: i32, buf: &mut [u8], done: Completion) {
        let started = Instant::now();
        debug!("fstat({fd})");
        let ret = to_ret(self.do_fstat(fd, buf).await);
        self.finish("fstat", started, ret, done);
    }

    async fn do_fstat(&self, fd: i32, buf: &mut [u8]) -> SysResult {
        let slot = self.slot(fd)?;
        fill_stat(slot.handle.as_ref(), buf).await
    }

    pub async fn unlink(&self, pathname: &str, done: Completion) {
        let started = Instant::now();
        debug!("unlink({pathname:?})");
        let ret = to_ret(self.do_unlink(pathname).await);
        self.finish("unlink", started, ret, done);
    }

    async fn do_unlink(&self, pathname: &str) -> SysResult {
        let absolute = path::absolute(pathname);
        if !self.path_exists(&absolute).await? {
            return Err(SysError::NotFound);
        }
        self.backend.unlink(&path::encode(&absolute)).await?;
        self.known_paths.lock().unwrap().remove(&absolute);
        Ok(0)
    }

    /// File rename through the backend `rename` capability. Directories are
    /// not modeled, so this is file-only by construction.
    pub async fn rename(&self, oldpath: &str, newpath: &str, done: Completion) {
        let started = Instant::now();
        debug!("rename({oldpath:?} -> {newpath:?})");
        let ret = to_ret(self.do_rename(oldpath, newpath).await);
        self.finish("rename", started, ret, done);
    }

    async fn do_rename(&self, oldpath: &str, newpath: &str) -> SysResult {
        let old_abs = path::absolute(oldpath);
        let new_abs = path::absolute(newpath);
        if !self.path_exists(&old_abs).await? {
            return Err(SysError::NotFound);
        }
        self.backend
            .rename(&path::encode(&old_abs), &path::encode(&new_abs))
            .await?;
        let mut known = self.known_paths.lock().unwrap();
        known.remove(&old_abs);
        known.insert(new_abs);
        Ok(0)
    }

    /// Set the size attribute on the descriptor's handle.
    pub async fn truncate(&self, fd: i32, length: i64, done: Completion) {
        let started = Instant::now();
        debug!("truncate(fd={fd}, length={length})");
        let ret = to_ret(self.do_truncate(fd, length).await);
        self.finish("truncate", started, ret, done);
    }

    async fn do_truncate(&self, fd: i32, length: i64) -> SysResult {
        let slot = self.slot(fd)?;
        slot.handle
            .set_attributes(ObjectAttrs {
                size: length.max(0) as u64,
            })
            .await?;
        Ok(0)
    }

    pub async fn fsync(&self, fd: i32, done: Completion) {
        let started = Instant::now();
        debug!("fsync({fd})");
        let ret = to_ret(self.do_fsync(fd).await);
        self.finish("fsync", started, ret, done);
    }

    async fn do_fsync(&self, fd: i32) -> SysResult {
        let slot = self.slot(fd)?;
        slot.handle.sync().await?;
        Ok(0)
    }

    pub async fn fcntl(&self, fd: i32, cmd: i32, done: Completion) {
        let started = Instant::now();
        debug!("fcntl(fd={fd}, cmd={cmd})");
        let ret = to_ret(self.do_fcntl(fd, cmd).await);
        self.finish("fcntl", started, ret, done);
    }

    async fn do_fcntl(&self, _fd: i32, cmd: i32) -> SysResult {
        // Lock commands are acknowledged but never enforced.
        if cmd == libc::F_SETLK || cmd == libc::F_SETLKW {
            return Ok(0);
        }
        Err(SysError::Unsupported)
    }

    /// Ownership is not modeled; accepted unconditionally.
    pub async fn fchown(&self, fd: i32, _owner: u32, _group: u32, done: Completion) {
        let started = Instant::now();
        debug!("fchown({fd})");
        self.finish("fchown", started, 0, done);
    }

    /// Write every segment in order, each started only after the previous
    /// one completed, so offsets within one call never interleave. A failure
    /// mid-sequence is logged and the bytes already written are still
    /// reported; this is not an all-or-nothing batch.
    pub async fn writev(&self, fd: i32, iovs: &[&[u8]], done: Completion) {
        let started = Instant::now();
        debug!("writev(fd={fd}, segments={})", iovs.len());
        let ret = self.do_writev(fd, iovs).await;
        self.finish("writev", started, ret, done);
    }

    async fn do_writev(&self, fd: i32, iovs: &[&[u8]]) -> i64 {
        let Some(slot) = self.fds.lookup(fd) else {
            return -(libc::EBADF as i64);
        };
        let mut total: i64 = 0;
        for segment in iovs {
            let position = slot.cursor();
            match slot.handle.write_at(segment, position as u64).await {
                Ok(n) => {
                    slot.advance(n as i64);
                    total += n as i64;
                }
                Err(e) => {
                    warn!("writev: backend failure after {total} bytes: {e}");
                    break;
                }
            }
        }
        total
    }

    /* unconditionally unsupported surface */

    pub async fn readv(&self, fd: i32, _iovs: &mut [&mut [u8]], done: Completion) {
        let started = Instant::now();
        debug!("readv({fd})");
        self.finish("readv", started, ENOSYS_RET, done);
    }

    pub async fn mkdir(&self, pathname: &str, _mode: u32, done: Completion) {
        let started = Instant::now();
        debug!("mkdir({pathname:?})");
        self.finish("mkdir", started, ENOSYS_RET, done);
    }

    pub async fn rmdir(&self, pathname: &str, done: Completion) {
        let started = Instant::now();
        debug!("rmdir({pathname:?})");
        self.finish("rmdir", started, ENOSYS_RET, done);
    }

    pub async fn chmod(&self, pathname: &str, _mode: u32, done: Completion) {
        let started = Instant::now();
        debug!("chmod({pathname:?})");
        self.finish("chmod", started, ENOSYS_RET, done);
    }

    pub async fn fchmod(&self, fd: i32, _mode: u32, done: Completion) {
        let started = Instant::now();
        debug!("fchmod({fd})");
        self.finish("fchmod", started, ENOSYS_RET, done);
    }

    pub async fn chown(&self, pathname: &str, _owner: u32, _group: u32, done: Completion) {
        let started = Instant::now();
        debug!("chown({pathname:?})");
        self.finish("chown", started, ENOSYS_RET, done);
    }

    pub async fn access(&self, pathname: &str, _amode: i32, done: Completion) {
        let started = Instant::now();
        debug!("access({pathname:?})");
        self.finish("access", started, ENOSYS_RET, done);
    }

    pub async fn readlink(&self, pathname: &str, _buf: &mut [u8], done: Completion) {
        let started = Instant::now();
        debug!("readlink({pathname:?})");
        self.finish("readlink", started, ENOSYS_RET, done);
    }

    pub async fn ioctl(&self, fd: i32, _op: i32, done: Completion) {
        let started = Instant::now();
        debug!("ioctl({fd})");
        self.finish("ioctl", started, ENOSYS_RET, done);
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn mmap2(
        &self,
        _addr: usize,
        _len: usize,
        _prot: i32,
        _flags: i32,
        fd: i32,
        _off: usize,
        done: Completion,
    ) {
        let started = Instant::now();
        debug!("mmap2({fd})");
        self.finish("mmap2", started, ENOSYS_RET, done);
    }

    pub async fn munmap(&self, _addr: usize, _len: usize, done: Completion) {
        let started = Instant::now();
        debug!("munmap");
        self.finish("munmap", started, ENOSYS_RET, done);
    }

    /* listing helper */

    /// Immediate child names under `pathname`, by decoding every key below
    /// the directory prefix. Helper surface rather than a syscall: names
    /// cannot travel through the numeric completion sink.
    pub async fn readdir(&self, pathname: &str) -> Result<Vec<String>, StoreError> {
        let absolute = path::absolute(pathname);
        let dir = if absolute.ends_with('/') {
            absolute
        } else {
            format!("{absolute}/")
        };
        let keys = self.backend.list_by_prefix(&path::encode(&dir)).await?;
        let mut names: Vec<String> = Vec::new();
        for key in keys {
            let child = match path::decode(&key) {
                Ok(p) => p,
                Err(e) => {
                    warn!("readdir: skipping undecodable key {key:?}: {e}");
                    continue;
                }
            };
            let name = child[dir.len()..].split('/').next().unwrap_or_default();
            if !name.is_empty() && !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }
}

async fn fill_stat(handle: &dyn ObjectFile, buf: &mut [u8]) -> SysResult {
    let attrs = handle.get_attributes().await?;
    let Some(dst) = buf.first_chunk_mut::<STAT_RECORD_LEN>() else {
        return Err(SysError::ShortStatBuffer);
    };
    StatRecord::for_size(attrs.size).write_to(dst);
    Ok(0)
}
