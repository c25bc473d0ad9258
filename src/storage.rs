//! 存储根目录抽象：列举、存在性检查、暂存发布与读取。

use async_trait::async_trait;
use serde::Deserialize;
use std::ffi::OsStr;
use std::io::{self, ErrorKind};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use thiserror::Error;
use tokio::fs::{self, File};
use tokio::io::AsyncRead;
use tracing::warn;

use crate::atomic::ExclusiveFile;
use crate::config::TEMP_FILE_PREFIX;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid file name")]
    InvalidName,
    #[error("file not found")]
    NotFound,
    #[error("file already exists")]
    AlreadyExists,
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// 目录中的一个普通文件。
#[derive(Clone, Debug)]
pub struct StoredEntry {
    pub name: String,
    pub size: u64,
    pub modified: Option<SystemTime>,
}

/// 打开后的文件读取句柄。
pub struct FileReader {
    pub size: u64,
    pub modified: Option<SystemTime>,
    pub reader: Box<dyn AsyncRead + Send + Unpin>,
}

/// 单个存储根目录上的文件操作。
#[async_trait]
pub trait FileStore: Send + Sync {
    /// 按底层枚举顺序列出普通文件。
    async fn list(&self) -> Result<Vec<StoredEntry>, StorageError>;

    async fn exists(&self, name: &str) -> Result<bool, StorageError>;

    /// 开始一次不可见的暂存写入，内容写完后再以某个名称发布。
    async fn stage(&self) -> Result<Box<dyn StagedFile + '_>, StorageError>;

    async fn open(&self, name: &str) -> Result<FileReader, StorageError>;
}

/// 暂存中的上传内容。丢弃未发布的暂存不会留下任何可见文件。
#[async_trait]
pub trait StagedFile: Send {
    async fn write(&mut self, chunk: &[u8]) -> Result<(), StorageError>;

    fn size(&self) -> u64;

    /// 仅当 `name` 不存在时发布；已存在返回 `StorageError::AlreadyExists`，
    /// 暂存内容保留以便换名重试。
    async fn publish(&mut self, name: &str) -> Result<(), StorageError>;
}

/// 门户的两个固定根目录。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Root {
    Uploads,
    Downloads,
}

impl Root {
    /// URL 前缀（同时也是默认目录名）。
    pub fn url_prefix(self) -> &'static str {
        match self {
            Root::Uploads => "uploads",
            Root::Downloads => "downloads",
        }
    }
}

#[derive(Clone)]
pub struct Roots {
    uploads: Arc<dyn FileStore>,
    downloads: Arc<dyn FileStore>,
}

impl Roots {
    pub fn new(uploads: Arc<dyn FileStore>, downloads: Arc<dyn FileStore>) -> Self {
        Self { uploads, downloads }
    }

    pub fn store(&self, root: Root) -> &dyn FileStore {
        match root {
            Root::Uploads => self.uploads.as_ref(),
            Root::Downloads => self.downloads.as_ref(),
        }
    }
}

/// 校验名称只包含一个普通路径分量。
pub fn single_component(name: &str) -> Result<&str, StorageError> {
    if name.is_empty() || name.contains(['/', '\\', '\0']) {
        return Err(StorageError::InvalidName);
    }
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(segment)), None) if segment == OsStr::new(name) => Ok(name),
        _ => Err(StorageError::InvalidName),
    }
}

/// 本地目录实现。
#[derive(Clone, Debug)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub async fn ensure_root(&self) -> io::Result<()> {
        fs::create_dir_all(&self.root).await
    }

    pub fn root_path(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, name: &str) -> Result<PathBuf, StorageError> {
        Ok(self.root.join(single_component(name)?))
    }

    /// 读取叶子节点元数据；符号链接与非普通文件一律拒绝。
    async fn regular_file_metadata(&self, path: &Path) -> Result<std::fs::Metadata, StorageError> {
        match fs::symlink_metadata(path).await {
            Ok(metadata) if metadata.file_type().is_symlink() => Err(StorageError::InvalidName),
            Ok(metadata) if !metadata.is_file() => Err(StorageError::NotFound),
            Ok(metadata) => Ok(metadata),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(StorageError::NotFound),
            Err(err) => Err(StorageError::Io(err)),
        }
    }
}

#[async_trait]
impl FileStore for LocalStore {
    async fn list(&self) -> Result<Vec<StoredEntry>, StorageError> {
        let mut dir = fs::read_dir(&self.root).await?;
        let mut entries = Vec::new();

        while let Some(entry) = dir.next_entry().await? {
            // 非 UTF-8 名称无法通过 URL 取回，不列出
            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(raw) => {
                    warn!(name = ?raw, root = %self.root.display(), "skipping non utf-8 file name");
                    continue;
                }
            };
            if name.starts_with(TEMP_FILE_PREFIX) {
                continue;
            }
            // 枚举与读取元数据之间文件可能已被删除
            let metadata = match entry.metadata().await {
                Ok(metadata) => metadata,
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(err) => return Err(err.into()),
            };
            if !metadata.is_file() {
                continue;
            }
            entries.push(StoredEntry {
                name,
                size: metadata.len(),
                modified: metadata.modified().ok(),
            });
        }

        Ok(entries)
    }

    async fn exists(&self, name: &str) -> Result<bool, StorageError> {
        let target = self.resolve(name)?;
        Ok(fs::try_exists(target).await?)
    }

    async fn stage(&self) -> Result<Box<dyn StagedFile + '_>, StorageError> {
        let file = ExclusiveFile::new(&self.root).await?;
        Ok(Box::new(LocalStaged { store: self, file }))
    }

    async fn open(&self, name: &str) -> Result<FileReader, StorageError> {
        let target = self.resolve(name)?;
        let metadata = self.regular_file_metadata(&target).await?;
        let file = File::open(&target).await?;
        Ok(FileReader {
            size: metadata.len(),
            modified: metadata.modified().ok(),
            reader: Box::new(file),
        })
    }
}

struct LocalStaged<'a> {
    store: &'a LocalStore,
    file: ExclusiveFile,
}

#[async_trait]
impl StagedFile for LocalStaged<'_> {
    async fn write(&mut self, chunk: &[u8]) -> Result<(), StorageError> {
        self.file.write_all(chunk).await
    }

    fn size(&self) -> u64 {
        self.file.size()
    }

    async fn publish(&mut self, name: &str) -> Result<(), StorageError> {
        let target = self.store.resolve(name)?;
        self.file.publish(&target).await
    }
}


/// 测试辅助：暂存 `content` 并以 `name` 发布。
#[cfg(test)]
pub(crate) async fn put(
    store: &dyn FileStore,
    name: &str,
    content: &[u8],
) -> Result<(), StorageError> {
    let mut staged = store.stage().await?;
    staged.write(content).await?;
    staged.publish(name).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tokio::io::AsyncReadExt;

    fn make_store() -> (tempfile::TempDir, LocalStore) {
        let temp = tempdir().expect("tempdir");
        let root = temp.path().join("uploads");
        std::fs::create_dir_all(&root).expect("create root");
        (temp, LocalStore::new(root))
    }

    #[test]
    fn single_component_rejects_traversal() {
        for name in ["", ".", "..", "../../etc/passwd", "a/b", "a\\b", "/abs", "a\0b"] {
            assert!(
                matches!(single_component(name), Err(StorageError::InvalidName)),
                "{name:?} should be rejected"
            );
        }
        assert_eq!(single_component("a.txt").ok(), Some("a.txt"));
        assert_eq!(single_component("..hidden").ok(), Some("..hidden"));
    }

    #[tokio::test]
    async fn staged_publish_then_open_round_trips() {
        let (_temp, store) = make_store();
        put(&store, "a.txt", b"abc").await.expect("create");

        let mut reader = store.open("a.txt").await.expect("open");
        assert_eq!(reader.size, 3);
        let mut buf = Vec::new();
        reader.reader.read_to_end(&mut buf).await.expect("read");
        assert_eq!(buf, b"abc");
        assert!(store.exists("a.txt").await.expect("exists"));
        assert!(!store.exists("b.txt").await.expect("exists"));
    }

    #[tokio::test]
    async fn publish_conflicts_on_existing_name() {
        let (_temp, store) = make_store();
        put(&store, "a.txt", b"one").await.expect("create");
        let result = put(&store, "a.txt", b"two").await;
        assert!(matches!(result, Err(StorageError::AlreadyExists)));
        let content = std::fs::read(store.root_path().join("a.txt")).expect("read");
        assert_eq!(content, b"one");
    }

    #[tokio::test]
    async fn list_skips_directories_and_temp_files() {
        let (_temp, store) = make_store();
        let root = store.root_path();
        std::fs::write(root.join("keep.pdf"), vec![0u8; 10]).expect("write");
        std::fs::create_dir(root.join("nested")).expect("mkdir");
        std::fs::write(root.join(format!("{TEMP_FILE_PREFIX}x.tmp")), b"tmp").expect("write");

        let entries = store.list().await.expect("list");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "keep.pdf");
        assert_eq!(entries[0].size, 10);
    }

    #[tokio::test]
    async fn staged_content_is_invisible_until_published() {
        let (_temp, store) = make_store();
        let mut staged = store.stage().await.expect("stage");
        staged.write(b"pending").await.expect("write");
        assert!(store.list().await.expect("list").is_empty());

        assert!(matches!(
            staged.publish("../escape.txt").await,
            Err(StorageError::InvalidName)
        ));
        drop(staged);
        assert_eq!(std::fs::read_dir(store.root_path()).expect("read dir").count(), 0);
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn list_skips_non_utf8_names() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let (_temp, store) = make_store();
        let root = store.root_path();
        std::fs::write(root.join(OsStr::from_bytes(b"bad\xff.txt")), b"x").expect("write");
        std::fs::write(root.join("good.txt"), b"y").expect("write");

        let names: Vec<String> = store
            .list()
            .await
            .expect("list")
            .into_iter()
            .map(|entry| entry.name)
            .collect();
        assert_eq!(names, vec!["good.txt"]);
    }

    #[tokio::test]
    async fn open_rejects_missing_and_traversal() {
        let (temp, store) = make_store();
        std::fs::write(temp.path().join("secret.txt"), b"secret").expect("write");

        assert!(matches!(
            store.open("../secret.txt").await,
            Err(StorageError::InvalidName)
        ));
        assert!(matches!(
            store.open("missing.txt").await,
            Err(StorageError::NotFound)
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn open_rejects_symlink() {
        use std::os::unix::fs::symlink;

        let (temp, store) = make_store();
        let outside = temp.path().join("outside.txt");
        std::fs::write(&outside, b"secret").expect("write outside file");
        symlink(&outside, store.root_path().join("link.txt")).expect("symlink");

        assert!(matches!(
            store.open("link.txt").await,
            Err(StorageError::InvalidName)
        ));
    }
}
