//! Local-directory backend: one file per key under a root directory
//! (mock storage adapter, implements `ObjectBackend`).

use crate::kvadapter::client::{ObjectAttrs, ObjectBackend, ObjectFile, StoreError};
use async_trait::async_trait;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;

pub struct LocalFsBackend {
    root: PathBuf,
}

impl LocalFsBackend {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

#[async_trait]
impl ObjectBackend for LocalFsBackend {
    async fn open_by_key(&self, key: &str) -> Result<Box<dyn ObjectFile>, StoreError> {
        fs::create_dir_all(&self.root).await?;
        let file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.path_for(key))
            .await?;
        Ok(Box::new(LocalFile {
            file: Mutex::new(file),
        }))
    }

    async fn unlink(&self, key: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StoreError::NotFound),
            Err(e) => Err(e.into()),
        }
    }

    async fn rename(&self, old_key: &str, new_key: &str) -> Result<(), StoreError> {
        match fs::rename(self.path_for(old_key), self.path_for(new_key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StoreError::NotFound),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut out = Vec::new();
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with(prefix) {
                out.push(name);
            }
        }
        Ok(out)
    }
}

/// Positioned I/O over one `tokio::fs::File`. The seek-then-read pair must
/// not interleave with another call on the same handle, hence the mutex.
struct LocalFile {
    file: Mutex<fs::File>,
}

#[async_trait]
impl ObjectFile for LocalFile {
    async fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize, StoreError> {
        let mut file = self.file.lock().await;
        file.seek(SeekFrom::Start(offset)).await?;
        let mut read = 0;
        while read < buf.len() {
            let n = file.read(&mut buf[read..]).await?;
            if n == 0 {
                break;
            }
            read += n;
        }
        Ok(read)
    }

    async fn write_at(&self, data: &[u8], offset: u64) -> Result<usize, StoreError> {
        let mut file = self.file.lock().await;
        file.seek(SeekFrom::Start(offset)).await?;
        file.write_all(data).await?;
        Ok(data.len())
    }

    async fn get_attributes(&self) -> Result<ObjectAttrs, StoreError> {
        let file = self.file.lock().await;
        Ok(ObjectAttrs {
            size: file.metadata().await?.len(),
        })
    }

    async fn set_attributes(&self, attrs: ObjectAttrs) -> Result<(), StoreError> {
        let file = self.file.lock().await;
        file.set_len(attrs.size).await?;
        Ok(())
    }

    async fn sync(&self) -> Result<(), StoreError> {
        let file = self.file.lock().await;
        file.sync_all().await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), StoreError> {
        // Dropping the handle closes the fd; nothing to flush beyond sync().
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_localfs_open_write_read() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = LocalFsBackend::new(tmp.path());

        let file = backend.open_by_key("2f612e747874").await.unwrap();
        assert_eq!(file.write_at(b"hello", 0).await.unwrap(), 5);

        let mut out = vec![0u8; 5];
        let n = file.read_at(&mut out, 0).await.unwrap();
        assert_eq!(n, 5);
        assert_eq!(&out, b"hello");

        assert_eq!(file.get_attributes().await.unwrap().size, 5);
        file.sync().await.unwrap();
        file.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_localfs_list_unlink() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = LocalFsBackend::new(tmp.path());

        backend.open_by_key("2f61").await.unwrap();
        backend.open_by_key("2f62").await.unwrap();
        let keys = backend.list_by_prefix("2f").await.unwrap();
        assert_eq!(keys.len(), 2);

        backend.unlink("2f61").await.unwrap();
        assert!(matches!(
            backend.unlink("2f61").await,
            Err(StoreError::NotFound)
        ));
        assert_eq!(backend.list_by_prefix("2f").await.unwrap(), vec!["2f62"]);
    }

    #[tokio::test]
    async fn test_localfs_set_attributes_truncates() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = LocalFsBackend::new(tmp.path());

        let file = backend.open_by_key("00").await.unwrap();
        file.write_at(b"0123456789", 0).await.unwrap();
        file.set_attributes(ObjectAttrs { size: 3 }).await.unwrap();
        assert_eq!(file.get_attributes().await.unwrap().size, 3);
    }
}
