//! 临时写入与不覆盖发布（exclusive publish）的辅助方法。

use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::debug;
use uuid::Uuid;

use crate::config::TEMP_FILE_PREFIX;
use crate::storage::StorageError;

/// 目录内的暂存文件：边接收边写入，之后以不覆盖的方式发布到目标名。
///
/// 发布冲突时暂存内容保留，可换名重试；未发布即丢弃时临时文件会被删除。
pub struct ExclusiveFile {
    temp_path: PathBuf,
    file: Option<File>,
    size: u64,
    removed: bool,
}

impl ExclusiveFile {
    /// 在 `dir` 下创建临时文件。
    pub async fn new(dir: &Path) -> Result<Self, StorageError> {
        let temp_path = dir.join(format!("{TEMP_FILE_PREFIX}{}.tmp", Uuid::new_v4()));
        let file = File::create(&temp_path).await?;
        Ok(Self {
            temp_path,
            file: Some(file),
            size: 0,
            removed: false,
        })
    }

    /// 追加一段内容。
    pub async fn write_all(&mut self, data: &[u8]) -> Result<(), StorageError> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| io::Error::other("staged file already sealed"))?;
        file.write_all(data).await?;
        self.size += data.len() as u64;
        Ok(())
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// 发布到 `target`；目标已存在时返回 `AlreadyExists`，不会覆盖，暂存内容保留。
    pub async fn publish(&mut self, target: &Path) -> Result<(), StorageError> {
        if let Some(file) = self.file.take() {
            file.sync_all().await?;
        }

        match fs::hard_link(&self.temp_path, target).await {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                return Err(StorageError::AlreadyExists);
            }
            // 部分文件系统（FAT、部分 FUSE/SMB 挂载）不支持硬链接
            Err(err)
                if matches!(
                    err.kind(),
                    ErrorKind::Unsupported | ErrorKind::PermissionDenied
                ) =>
            {
                debug!(error = %err, "hard link unavailable, copying into new file");
                copy_exclusive(&self.temp_path, target).await?;
            }
            Err(err) => return Err(err.into()),
        }

        let _ = fs::remove_file(&self.temp_path).await;
        self.removed = true;
        if let Some(parent) = target.parent() {
            let _ = sync_dir(parent).await;
        }
        Ok(())
    }
}

impl Drop for ExclusiveFile {
    fn drop(&mut self) {
        if !self.removed {
            let _ = std::fs::remove_file(&self.temp_path);
        }
    }
}

/// 以 `create_new` 打开目标并复制内容；目标已存在返回 `AlreadyExists`。
async fn copy_exclusive(source: &Path, target: &Path) -> Result<(), StorageError> {
    let mut output = match OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(target)
        .await
    {
        Ok(file) => file,
        Err(err) if err.kind() == ErrorKind::AlreadyExists => {
            return Err(StorageError::AlreadyExists);
        }
        Err(err) => return Err(err.into()),
    };

    let copied = async {
        let mut input = File::open(source).await?;
        tokio::io::copy(&mut input, &mut output).await?;
        output.sync_all().await
    }
    .await;
    if let Err(err) = copied {
        drop(output);
        let _ = fs::remove_file(target).await;
        return Err(err.into());
    }
    Ok(())
}

#[cfg(unix)]
async fn sync_dir(path: &Path) -> io::Result<()> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let dir = std::fs::File::open(path)?;
        dir.sync_all()
    })
    .await
    .map_err(|err| io::Error::other(err.to_string()))?
}

#[cfg(not(unix))]
async fn sync_dir(_path: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn temp_entries(dir: &Path) -> usize {
        let mut count = 0;
        let mut entries = fs::read_dir(dir).await.expect("read dir");
        while let Some(entry) = entries.next_entry().await.expect("next entry") {
            if entry.file_name().to_string_lossy().starts_with(TEMP_FILE_PREFIX) {
                count += 1;
            }
        }
        count
    }

    #[tokio::test]
    async fn publish_refuses_to_overwrite_and_keeps_staged_content() {
        let temp = tempdir().expect("tempdir");
        let target = temp.path().join("a.txt");
        std::fs::write(&target, b"first").expect("seed file");

        let mut file = ExclusiveFile::new(temp.path()).await.expect("create temp");
        file.write_all(b"second").await.expect("write");
        let result = file.publish(&target).await;

        assert!(matches!(result, Err(StorageError::AlreadyExists)));
        assert_eq!(std::fs::read(&target).expect("read"), b"first");
        assert_eq!(temp_entries(temp.path()).await, 1);

        let other = temp.path().join("a_1.txt");
        file.publish(&other).await.expect("publish under new name");
        assert_eq!(std::fs::read(&other).expect("read"), b"second");
        assert_eq!(temp_entries(temp.path()).await, 0);
    }

    #[tokio::test]
    async fn publish_writes_new_file_and_removes_temp() {
        let temp = tempdir().expect("tempdir");
        let target = temp.path().join("b.txt");

        let mut file = ExclusiveFile::new(temp.path()).await.expect("create temp");
        file.write_all(b"hel").await.expect("write");
        file.write_all(b"lo").await.expect("write");
        assert_eq!(file.size(), 5);
        file.publish(&target).await.expect("publish");

        assert_eq!(std::fs::read(&target).expect("read"), b"hello");
        assert_eq!(temp_entries(temp.path()).await, 0);
    }

    #[tokio::test]
    async fn dropped_staged_file_is_removed() {
        let temp = tempdir().expect("tempdir");
        let mut file = ExclusiveFile::new(temp.path()).await.expect("create temp");
        file.write_all(b"partial").await.expect("write");
        assert_eq!(temp_entries(temp.path()).await, 1);

        drop(file);
        assert_eq!(temp_entries(temp.path()).await, 0);
    }

    #[tokio::test]
    async fn copy_fallback_never_overwrites() {
        let temp = tempdir().expect("tempdir");
        let source = temp.path().join("source.bin");
        let target = temp.path().join("c.txt");
        std::fs::write(&source, b"copied").expect("write source");

        copy_exclusive(&source, &target).await.expect("copy");
        assert_eq!(std::fs::read(&target).expect("read"), b"copied");

        std::fs::write(&source, b"again").expect("rewrite source");
        let result = copy_exclusive(&source, &target).await;
        assert!(matches!(result, Err(StorageError::AlreadyExists)));
        assert_eq!(std::fs::read(&target).expect("read"), b"copied");
    }
}
