//! In-memory backend for local development and unit tests.

use crate::kvadapter::client::{ObjectAttrs, ObjectBackend, ObjectFile, StoreError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

type Object = Arc<RwLock<Vec<u8>>>;

/// Backend keeping every object in a process-local map. Handles share the
/// object's buffer, so an unlinked key stays readable through handles that
/// were open at the time, POSIX-style.
#[derive(Default)]
pub struct MemoryBackend {
    objects: Mutex<HashMap<String, Object>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ObjectBackend for MemoryBackend {
    async fn open_by_key(&self, key: &str) -> Result<Box<dyn ObjectFile>, StoreError> {
        let data = {
            let mut objects = self.objects.lock().unwrap();
            objects.entry(key.to_string()).or_default().clone()
        };
        Ok(Box::new(MemoryFile { data }))
    }

    async fn unlink(&self, key: &str) -> Result<(), StoreError> {
        self.objects
            .lock()
            .unwrap()
            .remove(key)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    async fn rename(&self, old_key: &str, new_key: &str) -> Result<(), StoreError> {
        let mut objects = self.objects.lock().unwrap();
        let object = objects.remove(old_key).ok_or(StoreError::NotFound)?;
        objects.insert(new_key.to_string(), object);
        Ok(())
    }

    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let objects = self.objects.lock().unwrap();
        Ok(objects
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

struct MemoryFile {
    data: Object,
}

#[async_trait]
impl ObjectFile for MemoryFile {
    async fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize, StoreError> {
        let data = self.data.read().unwrap();
        let start = (offset as usize).min(data.len());
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        Ok(n)
    }

    async fn write_at(&self, src: &[u8], offset: u64) -> Result<usize, StoreError> {
        let mut data = self.data.write().unwrap();
        let start = offset as usize;
        let end = start + src.len();
        if data.len() < end {
            data.resize(end, 0);
        }
        data[start..end].copy_from_slice(src);
        Ok(src.len())
    }

    async fn get_attributes(&self) -> Result<ObjectAttrs, StoreError> {
        Ok(ObjectAttrs {
            size: self.data.read().unwrap().len() as u64,
        })
    }

    async fn set_attributes(&self, attrs: ObjectAttrs) -> Result<(), StoreError> {
        self.data.write().unwrap().resize(attrs.size as usize, 0);
        Ok(())
    }

    async fn sync(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_write_read_at_offset() {
        let backend = MemoryBackend::new();
        let file = backend.open_by_key("6b").await.unwrap();
        file.write_at(b"abcdef", 3).await.unwrap();

        let mut out = vec![0u8; 6];
        let n = file.read_at(&mut out, 3).await.unwrap();
        assert_eq!(n, 6);
        assert_eq!(&out, b"abcdef");

        // The hole before the write reads back as zeros.
        let mut head = vec![1u8; 3];
        let n = file.read_at(&mut head, 0).await.unwrap();
        assert_eq!(n, 3);
        assert_eq!(head, vec![0u8; 3]);

        let attrs = file.get_attributes().await.unwrap();
        assert_eq!(attrs.size, 9);
    }

    #[tokio::test]
    async fn test_memory_unlink_rename_list() {
        let backend = MemoryBackend::new();
        backend.open_by_key("aa01").await.unwrap();
        backend.open_by_key("aa02").await.unwrap();
        backend.open_by_key("bb").await.unwrap();

        let mut keys = backend.list_by_prefix("aa").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["aa01", "aa02"]);

        backend.rename("aa01", "cc").await.unwrap();
        assert!(backend.list_by_prefix("cc").await.unwrap().len() == 1);

        backend.unlink("aa02").await.unwrap();
        assert!(matches!(
            backend.unlink("aa02").await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_memory_truncate_via_attributes() {
        let backend = MemoryBackend::new();
        let file = backend.open_by_key("00").await.unwrap();
        file.write_at(b"0123456789", 0).await.unwrap();
        file.set_attributes(ObjectAttrs { size: 4 }).await.unwrap();

        let mut out = vec![0u8; 10];
        let n = file.read_at(&mut out, 0).await.unwrap();
        assert_eq!(n, 4);
        assert_eq!(&out[..4], b"0123");
    }
}
