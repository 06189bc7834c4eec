//! 수집 상태: 바이트 오프셋 체크포인트
//!
//! 체크포인트 파일은 10진수 바이트 오프셋 하나만 담습니다.
//! 배치가 저장소에 커밋된 뒤에만 기록되므로, 크래시 후에는 마지막으로
//! 커밋된 배치 이후부터 다시 읽습니다 (at-least-once).
//!
//! 기록은 임시 파일에 쓴 뒤 rename하는 방식이라 중간 상태가 남지 않습니다.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::LogPipelineError;

/// 체크포인트 파일 저장소
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    /// 새 체크포인트 저장소를 생성합니다.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// 체크포인트 파일 경로
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 저장된 오프셋을 읽습니다.
    ///
    /// 파일이 없거나 비어 있거나 숫자가 아니면 `None`을 반환합니다.
    /// 그 외의 I/O 실패(권한 등)는 에러입니다.
    pub async fn load(&self) -> Result<Option<u64>, LogPipelineError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.error(e)),
        };

        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }

        match trimmed.parse::<u64>() {
            Ok(offset) => Ok(Some(offset)),
            Err(_) => {
                warn!(
                    path = %self.path.display(),
                    content = %trimmed.chars().take(32).collect::<String>(),
                    "corrupt checkpoint, starting from offset 0"
                );
                Ok(None)
            }
        }
    }

    /// 오프셋을 원자적으로 기록합니다.
    pub async fn save(&self, offset: u64) -> Result<(), LogPipelineError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.error(e))?;
        }

        let tmp_path = self.tmp_path();
        let mut file = tokio::fs::File::create(&tmp_path)
            .await
            .map_err(|e| self.error(e))?;
        file.write_all(offset.to_string().as_bytes())
            .await
            .map_err(|e| self.error(e))?;
        file.sync_all().await.map_err(|e| self.error(e))?;
        drop(file);

        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| self.error(e))?;

        debug!(path = %self.path.display(), offset, "checkpoint saved");
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn error(&self, e: std::io::Error) -> LogPipelineError {
        LogPipelineError::Checkpoint {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("state"));
        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("state"));
        store.save(12_345).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(12_345));

        store.save(99).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(99));
    }

    #[tokio::test]
    async fn save_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("nested/data/state"));
        store.save(7).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(7));
    }

    #[tokio::test]
    async fn save_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("state"));
        store.save(1).await.unwrap();
        assert!(!dir.path().join("state.tmp").exists());
    }

    #[tokio::test]
    async fn empty_or_corrupt_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state");
        let store = CheckpointStore::new(&path);

        std::fs::write(&path, "").unwrap();
        assert_eq!(store.load().await.unwrap(), None);

        std::fs::write(&path, "not-a-number").unwrap();
        assert_eq!(store.load().await.unwrap(), None);

        std::fs::write(&path, " 42\n").unwrap();
        assert_eq!(store.load().await.unwrap(), Some(42));
    }
}
