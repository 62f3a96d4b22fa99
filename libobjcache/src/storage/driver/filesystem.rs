use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use tokio::fs::{create_dir_all, read, remove_file, rename, write};
use tokio::io;

use crate::error::StorageError;
use crate::storage::{ObjectBackend, ResponseMetadata, StoredObject};

/// Stores each object as a plain file at `<root>/<bucket>/<key>`.
pub struct FilesystemBackend {
    root: PathBuf,
}

impl FilesystemBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FilesystemBackend { root: root.into() }
    }

    /// Resolves an object path, refusing anything that would escape the
    /// bucket directory.
    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, StorageError> {
        let mut path = self.root.clone();
        for part in [bucket, key] {
            let relative = Path::new(part);
            // A trailing slash would name the parent directory, not a file.
            let valid = !part.is_empty()
                && !part.ends_with('/')
                && relative
                    .components()
                    .all(|component| matches!(component, Component::Normal(_)));
            if !valid {
                return Err(StorageError::InvalidKey(format!("{bucket}/{key}")));
            }
            path.push(relative);
        }
        Ok(path)
    }

    async fn ensure_parent(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ObjectBackend for FilesystemBackend {
    fn name(&self) -> &'static str {
        "filesystem"
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
    ) -> Result<ResponseMetadata, StorageError> {
        let path = self.object_path(bucket, key)?;
        self.ensure_parent(&path).await?;

        // Write next to the target and rename so readers never see a partial object.
        let mut tmp = path.clone().into_os_string();
        tmp.push(format!(".{}.tmp", uuid::Uuid::new_v4()));
        let tmp = PathBuf::from(tmp);
        write(&tmp, &data).await?;
        if let Err(e) = rename(&tmp, &path).await {
            let _ = remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(ResponseMetadata::new(200))
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<StoredObject, StorageError> {
        let path = self.object_path(bucket, key)?;
        match read(&path).await {
            Ok(data) => Ok(StoredObject {
                data: Bytes::from(data),
                metadata: ResponseMetadata::new(200),
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(StorageError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<ResponseMetadata, StorageError> {
        let path = self.object_path(bucket, key)?;
        match remove_file(&path).await {
            Ok(()) => Ok(ResponseMetadata::new(204)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(ResponseMetadata::new(204)),
            Err(e) => Err(e.into()),
        }
    }
}
