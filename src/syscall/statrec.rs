//! Fixed-layout stat record.
//!
//! Callers consume metadata as a little-endian binary record with the field
//! layout below. Identity fields are placeholders: the backend has no stable
//! device/inode identity, and directories are not distinguished from files.
//! Size is the one field taken from the backend.
//!
//! Layout (byte offset, width, field):
//!
//! |  0 | u32 | dev               |
//! |  4 | u32 | dev padding (0)   |
//! |  8 | u32 | ino (truncated)   |
//! | 12 | u32 | mode              |
//! | 16 | u32 | nlink             |
//! | 20 | u32 | uid               |
//! | 24 | u32 | gid               |
//! | 28 | u32 | rdev              |
//! | 32 | u32 | rdev padding (0)  |
//! | 36 | u32 | hole (0)          |
//! | 40 | i64 | size              |
//! | 48 | u32 | blksize           |
//! | 52 | u32 | blocks (truncated)|
//! | 56 | i32 | atime sec         |
//! | 60 | i32 | atime nsec (0)    |
//! | 64 | i32 | mtime sec         |
//! | 68 | i32 | mtime nsec (0)    |
//! | 72 | i32 | ctime sec         |
//! | 76 | i32 | ctime nsec (0)    |
//! | 80 | u64 | ino (full)        |

use std::time::{SystemTime, UNIX_EPOCH};

pub const BLOCK_SIZE: u64 = 4096;
pub const STAT_RECORD_LEN: usize = 88;

#[derive(Clone, Copy, Debug)]
pub struct StatRecord {
    pub dev: u32,
    pub ino: u64,
    pub mode: u32,
    pub nlink: u32,
    pub uid: u32,
    pub gid: u32,
    pub rdev: u32,
    pub size: u64,
    pub blksize: u32,
    pub blocks: u64,
    pub atime_sec: i64,
    pub mtime_sec: i64,
    pub ctime_sec: i64,
}

impl StatRecord {
    /// Record for an object of `size` bytes, everything but size and the
    /// derived block count faked with constant placeholders and the three
    /// timestamps set to now.
    pub fn for_size(size: u64) -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        Self {
            dev: 1,
            ino: 1,
            mode: 1,
            nlink: 1,
            uid: 0,
            gid: 0,
            rdev: 1,
            size,
            blksize: BLOCK_SIZE as u32,
            blocks: size.div_ceil(BLOCK_SIZE),
            atime_sec: now,
            mtime_sec: now,
            ctime_sec: now,
        }
    }

    /// Serialize into the documented byte-exact layout.
    pub fn write_to(&self, buf: &mut [u8; STAT_RECORD_LEN]) {
        buf.fill(0);
        put_u32(buf, 0, self.dev);
        put_u32(buf, 8, self.ino as u32);
        put_u32(buf, 12, self.mode);
        put_u32(buf, 16, self.nlink);
        put_u32(buf, 20, self.uid);
        put_u32(buf, 24, self.gid);
        put_u32(buf, 28, self.rdev);
        put_i64(buf, 40, self.size as i64);
        put_u32(buf, 48, self.blksize);
        put_u32(buf, 52, self.blocks as u32);
        put_i32(buf, 56, self.atime_sec as i32);
        put_i32(buf, 64, self.mtime_sec as i32);
        put_i32(buf, 72, self.ctime_sec as i32);
        put_u64(buf, 80, self.ino);
    }
}

fn put_u32(buf: &mut [u8], offset: usize, v: u32) {
    buf[offset..offset + 4].copy_from_slice(&v.to_le_bytes());
}

fn put_i32(buf: &mut [u8], offset: usize, v: i32) {
    buf[offset..offset + 4].copy_from_slice(&v.to_le_bytes());
}

fn put_u64(buf: &mut [u8], offset: usize, v: u64) {
    buf[offset..offset + 8].copy_from_slice(&v.to_le_bytes());
}

fn put_i64(buf: &mut [u8], offset: usize, v: i64) {
    buf[offset..offset + 8].copy_from_slice(&v.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_u32(buf: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes(buf[offset..offset + 4].try_into().unwrap())
    }

    #[test]
    fn test_placeholders_and_size_fields() {
        let rec = StatRecord::for_size(5000);
        let mut buf = [0xffu8; STAT_RECORD_LEN];
        rec.write_to(&mut buf);

        assert_eq!(field_u32(&buf, 0), 1); // dev
        assert_eq!(field_u32(&buf, 4), 0); // padding cleared
        assert_eq!(field_u32(&buf, 12), 1); // mode
        assert_eq!(field_u32(&buf, 20), 0); // uid
        assert_eq!(field_u32(&buf, 24), 0); // gid
        assert_eq!(
            i64::from_le_bytes(buf[40..48].try_into().unwrap()),
            5000
        );
        assert_eq!(field_u32(&buf, 48), 4096);
        assert_eq!(field_u32(&buf, 52), 2); // ceil(5000/4096)
        assert_eq!(
            u64::from_le_bytes(buf[80..88].try_into().unwrap()),
            1
        );
    }

    #[test]
    fn test_block_count_rounds_up() {
        assert_eq!(StatRecord::for_size(0).blocks, 0);
        assert_eq!(StatRecord::for_size(1).blocks, 1);
        assert_eq!(StatRecord::for_size(4096).blocks, 1);
        assert_eq!(StatRecord::for_size(4097).blocks, 2);
    }

    #[test]
    fn test_timestamps_are_populated() {
        let rec = StatRecord::for_size(0);
        assert!(rec.atime_sec > 0);
        assert_eq!(rec.atime_sec, rec.mtime_sec);
        assert_eq!(rec.mtime_sec, rec.ctime_sec);
    }
}
