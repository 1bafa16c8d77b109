//! Flat-file backend: one JSON line per attempt in `attempts.jsonl`.
use async_trait::async_trait;
use login_attempts_common::Attempt;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::{
    fs as tokio_fs,
    io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt},
    sync::Mutex,
};

use super::{AttemptBackend, AttemptFilter};
use crate::error::StoreError;

const FILE_NAME: &str = "attempts.jsonl";

/// Durable backend over a JSON-lines file.
///
/// Statements are serialized by a lock, so every insert, count and
/// delete sees a consistent file within this process. Deletes rewrite
/// the file through a temporary file and a rename.
///
/// An append that fails is rolled back to the previous length. A record
/// left unterminated by a crash is ignored when reading and cut off by
/// the next insert.
#[derive(Debug)]
pub struct FlatFileBackend {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FlatFileBackend {
    /// Open the backend in `root`, creating the directory if needed.
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self, StoreError> {
        let root = root.as_ref();
        std::fs::create_dir_all(root)?;
        Ok(Self {
            path: root.join(FILE_NAME),
            lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<Vec<Attempt>, StoreError> {
        let content = match tokio_fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let torn_tail = !content.is_empty() && !content.ends_with('\n');
        let last = content.lines().count();

        let mut attempts = Vec::new();
        for (idx, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Attempt>(line) {
                Ok(attempt) => attempts.push(attempt),
                Err(e) if torn_tail && idx + 1 == last => {
                    tracing::warn!(path = %self.path.display(), error = %e, "ignoring incomplete attempt record");
                },
                Err(e) => {
                    return Err(StoreError::Corrupt(format!(
                        "{}:{}: {e}",
                        self.path.display(),
                        idx + 1
                    )));
                },
            }
        }
        Ok(attempts)
    }

    /// Length of `file` up to its last complete line, truncating any
    /// unterminated record after it.
    async fn complete_len(&self, file: &mut tokio_fs::File) -> Result<u64, StoreError> {
        let len = file.metadata().await?.len();
        if len == 0 {
            return Ok(0);
        }

        file.seek(SeekFrom::Start(len - 1)).await?;
        let mut last = [0u8; 1];
        file.read_exact(&mut last).await?;
        if last[0] == b'\n' {
            return Ok(len);
        }

        file.seek(SeekFrom::Start(0)).await?;
        let mut content = Vec::with_capacity(len as usize);
        file.read_to_end(&mut content).await?;
        let keep = content
            .iter()
            .rposition(|b| *b == b'\n')
            .map_or(0, |idx| idx as u64 + 1);

        file.set_len(keep).await?;
        tracing::warn!(path = %self.path.display(), dropped = len - keep, "truncated incomplete attempt record");
        Ok(keep)
    }

    async fn write_all(&self, attempts: &[Attempt]) -> Result<(), StoreError> {
        let mut content = String::new();
        for attempt in attempts {
            content.push_str(&serde_json::to_string(attempt)?);
            content.push('\n');
        }

        let tmp = self.path.with_extension("jsonl.tmp");
        let mut file = tokio_fs::File::create(&tmp).await?;
        file.write_all(content.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);

        tokio_fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

async fn append(file: &mut tokio_fs::File, bytes: &[u8]) -> std::io::Result<()> {
    file.write_all(bytes).await?;
    file.flush().await
}

#[async_trait]
impl AttemptBackend for FlatFileBackend {
    fn name(&self) -> &'static str {
        "flat_file"
    }

    async fn insert(&self, attempt: &Attempt) -> Result<(), StoreError> {
        let mut line = serde_json::to_string(attempt)?;
        line.push('\n');

        let _guard = self.lock.lock().await;
        let mut file = tokio_fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&self.path)
            .await?;

        let len = self.complete_len(&mut file).await?;
        file.seek(SeekFrom::Start(len)).await?;
        if let Err(e) = append(&mut file, line.as_bytes()).await {
            if let Err(rollback) = file.set_len(len).await {
                tracing::error!(path = %self.path.display(), error = %rollback, "failed to roll back partial append");
            }
            return Err(e.into());
        }
        Ok(())
    }

    async fn count(&self, filter: &AttemptFilter) -> Result<u64, StoreError> {
        let _guard = self.lock.lock().await;
        let attempts = self.read_all().await?;
        Ok(attempts.iter().filter(|a| filter.matches(a)).count() as u64)
    }

    async fn delete(&self, filter: &AttemptFilter) -> Result<u64, StoreError> {
        let _guard = self.lock.lock().await;
        let attempts = self.read_all().await?;
        let before = attempts.len();

        let kept: Vec<Attempt> = attempts.into_iter().filter(|a| !filter.matches(a)).collect();
        let removed = before - kept.len();
        if removed > 0 {
            self.write_all(&kept).await?;
        }

        Ok(removed as u64)
    }
}
