//! Virtual random-byte device.

use crate::kvadapter::client::{ObjectAttrs, ObjectFile, StoreError};
use async_trait::async_trait;
use rand::RngCore;

/// Path intercepted by `open` before any backend interaction.
pub const URANDOM_PATH: &str = "/dev/urandom";

/// Random-byte source with the same capability surface as a backend file,
/// demonstrating that a descriptor may be backed by any `ObjectFile`, not
/// only a backend-opened handle. Never persisted and takes no part in
/// path-existence bookkeeping.
pub struct RandomDevice;

#[async_trait]
impl ObjectFile for RandomDevice {
    async fn read_at(&self, buf: &mut [u8], _offset: u64) -> Result<usize, StoreError> {
        rand::rng().fill_bytes(buf);
        Ok(buf.len())
    }

    async fn write_at(&self, _data: &[u8], _offset: u64) -> Result<usize, StoreError> {
        Err(StoreError::Unsupported)
    }

    async fn get_attributes(&self) -> Result<ObjectAttrs, StoreError> {
        Err(StoreError::Unsupported)
    }

    async fn set_attributes(&self, _attrs: ObjectAttrs) -> Result<(), StoreError> {
        Err(StoreError::Unsupported)
    }

    async fn sync(&self) -> Result<(), StoreError> {
        Err(StoreError::Unsupported)
    }

    async fn close(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_fills_whole_buffer() {
        let dev = RandomDevice;
        let mut buf = [0u8; 32];
        assert_eq!(dev.read_at(&mut buf, 0).await.unwrap(), 32);
    }

    #[tokio::test]
    async fn test_successive_reads_differ() {
        let dev = RandomDevice;
        let mut a = [0u8; 16];
        let mut b = [0u8; 16];
        dev.read_at(&mut a, 0).await.unwrap();
        dev.read_at(&mut b, 0).await.unwrap();
        // 2^-128 false-failure probability.
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_write_and_attributes_unsupported() {
        let dev = RandomDevice;
        assert!(matches!(
            dev.write_at(b"x", 0).await,
            Err(StoreError::Unsupported)
        ));
        assert!(matches!(
            dev.get_attributes().await,
            Err(StoreError::Unsupported)
        ));
        dev.close().await.unwrap();
    }
}
