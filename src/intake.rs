//! 上传入库流程：逐个校验文件名、流式暂存、重名探测与不覆盖发布。
//!
//! 文件名在内容到达之前校验，任一文件不合规时整批拒绝，已暂存的内容随批次
//! 丢弃，不会出现在目录中；全部接收完毕后按顺序发布，发布失败时保留已发布
//! 文件并在错误中报告。

use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::naming::{is_allowed, resolve, sanitize};
use crate::storage::{FileStore, StagedFile, StorageError};

#[derive(Clone, Copy, Debug)]
pub struct UploadConfig {
    pub max_name_attempts: u32,
}

/// 成功入库的文件名（与批次顺序一致）。
#[derive(Debug, Default)]
pub struct IntakeReport {
    pub stored: Vec<String>,
}

#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("No file part")]
    NoFilePart,
    #[error("No selected file")]
    NoFileSubmitted,
    #[error("File type not allowed: {0}")]
    DisallowedExtension(String),
    #[error("File name not allowed: {0}")]
    NameUnsafe(String),
    #[error("Failed to store {name}: {source}")]
    StorageFailure {
        name: String,
        #[source]
        source: StorageError,
        stored: Vec<String>,
    },
}

struct PendingFile<'a> {
    raw_name: String,
    safe_name: String,
    staged: Box<dyn StagedFile + 'a>,
}

/// 一次请求提交的全部文件，内容暂存在目标存储中，尚未发布。
pub struct UploadBatch<'a> {
    store: &'a dyn FileStore,
    pending: Vec<PendingFile<'a>>,
}

impl<'a> UploadBatch<'a> {
    pub fn new(store: &'a dyn FileStore) -> Self {
        Self {
            store,
            pending: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// 校验文件名并为其开始暂存，返回用于写入内容的句柄。
    ///
    /// 空文件名（表单中未选择文件）返回 `None`。
    pub async fn admit(
        &mut self,
        raw_name: &str,
    ) -> Result<Option<&mut (dyn StagedFile + 'a)>, IntakeError> {
        let Some(safe_name) = check_name(raw_name)? else {
            return Ok(None);
        };
        let store = self.store;
        let staged = store
            .stage()
            .await
            .map_err(|source| IntakeError::StorageFailure {
                name: raw_name.to_string(),
                source,
                stored: Vec::new(),
            })?;
        self.pending.push(PendingFile {
            raw_name: raw_name.to_string(),
            safe_name,
            staged,
        });
        Ok(self.pending.last_mut().map(|pending| pending.staged.as_mut()))
    }
}

/// 校验单个客户端文件名，返回安全化后的名称。
fn check_name(raw_name: &str) -> Result<Option<String>, IntakeError> {
    if raw_name.is_empty() {
        return Ok(None);
    }
    if !is_allowed(raw_name) {
        return Err(IntakeError::DisallowedExtension(raw_name.to_string()));
    }
    sanitize(raw_name)
        .filter(|name| is_allowed(name))
        .map(Some)
        .ok_or_else(|| IntakeError::NameUnsafe(raw_name.to_string()))
}

/// 按批次顺序发布暂存内容，返回每个文件最终使用的名称。
pub async fn ingest(
    batch: UploadBatch<'_>,
    config: &UploadConfig,
) -> Result<IntakeReport, IntakeError> {
    if batch.is_empty() {
        return Err(IntakeError::NoFileSubmitted);
    }

    let store = batch.store;
    let mut report = IntakeReport::default();
    for mut item in batch.pending {
        let size = item.staged.size();
        match store_one(
            store,
            &item.safe_name,
            item.staged.as_mut(),
            config.max_name_attempts,
        )
        .await
        {
            Ok(name) => {
                info!(raw_name = item.raw_name, name, size, "file stored");
                report.stored.push(name);
            }
            Err(source) => {
                warn!(
                    raw_name = item.raw_name,
                    error = %source,
                    stored = report.stored.len(),
                    "intake aborted"
                );
                return Err(IntakeError::StorageFailure {
                    name: item.raw_name,
                    source,
                    stored: report.stored,
                });
            }
        }
    }

    Ok(report)
}

async fn taken_names(store: &dyn FileStore) -> Result<HashSet<String>, StorageError> {
    Ok(store.list().await?.into_iter().map(|entry| entry.name).collect())
}

/// 以 `safe_name` 或其第一个空闲的后缀变体发布；冲突时重新读取目录后再尝试。
async fn store_one(
    store: &dyn FileStore,
    safe_name: &str,
    staged: &mut (dyn StagedFile + '_),
    max_attempts: u32,
) -> Result<String, StorageError> {
    let mut taken = if store.exists(safe_name).await? {
        taken_names(store).await?
    } else {
        HashSet::new()
    };

    for attempt in 1..=max_attempts.max(1) {
        let candidate = resolve(safe_name, &taken);
        match staged.publish(&candidate).await {
            Ok(()) => return Ok(candidate),
            Err(StorageError::AlreadyExists) => {
                debug!(candidate, attempt, "name taken, trying next suffix");
                taken = taken_names(store).await?;
                taken.insert(candidate);
            }
            Err(err) => return Err(err),
        }
    }

    Err(StorageError::AlreadyExists)
}
