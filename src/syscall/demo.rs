//! Minimal end-to-end example: drive the syscall surface against the
//! local-directory backend and verify the data round-trips.

use crate::kvadapter::localfs::LocalFsBackend;
use crate::syscall::bridge::{Completion, SyscallBridge};
use crate::syscall::statrec::STAT_RECORD_LEN;
use std::error::Error;
use std::path::Path;

async fn call<Fut, F>(op: F) -> Result<i64, Box<dyn Error>>
where
    Fut: std::future::Future<Output = ()>,
    F: FnOnce(Completion) -> Fut,
{
    let (done, rx) = Completion::channel();
    op(done).await;
    Ok(rx.await?)
}

/// Open, write, seek, read back, stat and unlink one file under `root`,
/// checking every result along the way.
pub async fn e2e_localfs_demo<P: AsRef<Path>>(root: P) -> Result<(), Box<dyn Error>> {
    let bridge = SyscallBridge::new(LocalFsBackend::new(root));

    // 1) open and write
    let fd = call(|done| bridge.open("/demo.txt", libc::O_RDWR | libc::O_CREAT, 0o644, done)).await?;
    if fd < 0 {
        return Err(format!("open failed: {fd}").into());
    }
    let payload = b"hello, flat key space";
    let written =
        call(|done| bridge.write(fd as i32, payload, 0, payload.len(), done)).await?;
    if written != payload.len() as i64 {
        return Err(format!("short write: {written}").into());
    }

    // 2) rewind and read back
    let pos = call(|done| bridge.llseek(fd as i32, 0, 0, libc::SEEK_SET, done)).await?;
    if pos != 0 {
        return Err(format!("seek returned {pos}").into());
    }
    let mut buf = vec![0u8; payload.len()];
    let read = {
        let buf = &mut buf;
        let count = payload.len();
        call(|done| bridge.read(fd as i32, buf, 0, count, done)).await?
    };
    if read != payload.len() as i64 || buf != payload {
        return Err("data mismatch".into());
    }

    // 3) metadata and cleanup
    let mut stat = [0u8; STAT_RECORD_LEN];
    let ret = {
        let stat = &mut stat;
        call(|done| bridge.stat("/demo.txt", stat, done)).await?
    };
    if ret != 0 {
        return Err(format!("stat failed: {ret}").into());
    }
    let size = i64::from_le_bytes(stat[40..48].try_into()?);
    if size != payload.len() as i64 {
        return Err(format!("stat size {size}").into());
    }

    call(|done| bridge.close(fd as i32, done)).await?;
    let ret = call(|done| bridge.unlink("/demo.txt", done)).await?;
    if ret != 0 {
        return Err(format!("unlink failed: {ret}").into());
    }

    for (name, stats) in bridge.metrics().snapshot() {
        println!("{name}: {} calls, {:?} total", stats.count, stats.total);
    }
    Ok(())
}
