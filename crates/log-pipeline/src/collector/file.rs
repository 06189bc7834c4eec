//! 파일 기반 로그 tailer
//!
//! 체크포인트 오프셋부터 파일 끝까지의 미처리 구간을 읽어 완전한 라인 단위로
//! 돌려줍니다. `tail -f`와 유사하지만 상태(오프셋)는 호출자가 소유합니다.
//!
//! # 로테이션 감지
//! - 파일 크기 축소 감지 (truncation)
//! - 파일 식별자(dev, inode) 변경 감지 (logrotate 등, Unix 전용)
//!
//! # 부분 라인
//! 기록 중이라 개행이 아직 없는 마지막 라인은 소비하지 않습니다.
//! 길이 초과 라인도 개행까지 기록된 뒤에 한 번에 건너뜁니다.
//! 따라서 체크포인트는 항상 라인 경계에 위치하고, tailer는 폴링 사이에
//! 라인 상태를 들고 있지 않습니다.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, warn};

use super::RawLine;
use crate::error::LogPipelineError;

/// 파일 식별자 (같은 경로에 새 파일이 생겼는지 판별)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileIdentity {
    dev: u64,
    ino: u64,
}

impl FileIdentity {
    #[cfg(unix)]
    fn of(meta: &std::fs::Metadata) -> Option<Self> {
        use std::os::unix::fs::MetadataExt;
        Some(Self {
            dev: meta.dev(),
            ino: meta.ino(),
        })
    }

    #[cfg(not(unix))]
    fn of(_meta: &std::fs::Metadata) -> Option<Self> {
        None
    }
}

/// 로테이션 사유
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationReason {
    /// 파일 크기가 마지막 오프셋보다 작아짐
    Truncated,
    /// 같은 경로의 파일이 교체됨
    Replaced,
}

/// 한 번의 폴링 결과
#[derive(Debug)]
pub enum TailPoll {
    /// 파일이 없음 (이번 주기 건너뜀)
    Missing,
    /// 로테이션/절단 감지: 호출자는 오프셋을 0으로 되돌려야 함
    Rotated {
        previous_offset: u64,
        file_len: u64,
        reason: RotationReason,
    },
    /// 새 데이터 없음
    Unchanged { file_len: u64 },
    /// 새 데이터 읽음
    Data(TailRead),
}

/// 미처리 구간 읽기 결과
#[derive(Debug)]
pub struct TailRead {
    /// 완전한 라인 목록 (파일 순서)
    pub lines: Vec<RawLine>,
    /// 읽기 시작 오프셋
    pub start_offset: u64,
    /// 소비한 마지막 바이트 다음 오프셋 (버린 긴 라인 포함, 항상 라인 경계)
    pub end_offset: u64,
    /// 읽기 시점의 파일 크기
    pub file_len: u64,
    /// 길이 초과로 버린 라인 수
    pub oversized: usize,
}

impl TailRead {
    /// 읽기 시작 시점의 미처리 바이트 수
    pub fn pending_bytes(&self) -> u64 {
        self.file_len.saturating_sub(self.start_offset)
    }

    /// 진전이 있었고 아직 읽을 데이터가 남았는지 확인합니다.
    ///
    /// 부분 라인만 남은 경우는 `false`입니다 (다음 폴링까지 대기).
    pub fn has_more(&self) -> bool {
        self.end_offset > self.start_offset && self.end_offset < self.file_len
    }
}

/// 폴링 기반 파일 tailer
pub struct FileTailer {
    path: PathBuf,
    max_read_bytes: usize,
    max_line_length: usize,
    identity: Option<FileIdentity>,
}

impl FileTailer {
    /// 새 tailer를 생성합니다.
    ///
    /// 한계 길이의 라인과 개행이 한 번에 들어오도록 `max_read_bytes`는
    /// 최소 `max_line_length + 1`로 맞춥니다.
    pub fn new(path: impl Into<PathBuf>, max_read_bytes: usize, max_line_length: usize) -> Self {
        let max_line_length = max_line_length.max(1);
        Self {
            path: path.into(),
            max_read_bytes: max_read_bytes.max(max_line_length + 1),
            max_line_length,
            identity: None,
        }
    }

    /// 감시 중인 파일 경로
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `offset` 이후의 미처리 구간을 읽습니다.
    pub async fn poll(&mut self, offset: u64) -> Result<TailPoll, LogPipelineError> {
        let mut file = match tokio::fs::File::open(&self.path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "log file not present, skipping cycle");
                return Ok(TailPoll::Missing);
            }
            Err(e) => return Err(self.error(e)),
        };

        let meta = file.metadata().await.map_err(|e| self.error(e))?;
        let file_len = meta.len();
        let identity = FileIdentity::of(&meta);

        let replaced = matches!(
            (self.identity, identity),
            (Some(old), Some(new)) if old != new
        );
        self.identity = identity;

        if replaced && offset > 0 {
            return Ok(self.rotated(offset, file_len, RotationReason::Replaced));
        }
        if file_len < offset {
            return Ok(self.rotated(offset, file_len, RotationReason::Truncated));
        }
        if file_len == offset {
            return Ok(TailPoll::Unchanged { file_len });
        }

        let want = (file_len - offset).min(self.max_read_bytes as u64);
        file.seek(SeekFrom::Start(offset))
            .await
            .map_err(|e| self.error(e))?;
        let mut buf = Vec::with_capacity(usize::try_from(want).unwrap_or(self.max_read_bytes));
        (&mut file)
            .take(want)
            .read_to_end(&mut buf)
            .await
            .map_err(|e| self.error(e))?;
        let buf_end = offset + buf.len() as u64;
        let buf_len = buf.len();

        let mut read = self.split_lines(Bytes::from(buf), offset, file_len);

        // 첫 라인이 길이 초과이고 개행이 버퍼 밖에 있음
        if read.end_offset == offset && buf_len > self.max_line_length {
            match self.find_newline(&mut file, buf_end, file_len).await? {
                Some(newline) => {
                    read.end_offset = newline + 1;
                    read.oversized += 1;
                    warn!(
                        path = %self.path.display(),
                        end_offset = read.end_offset,
                        length = newline - offset,
                        max = self.max_line_length,
                        "dropping line exceeding max_line_length"
                    );
                }
                None => debug!(
                    path = %self.path.display(),
                    offset,
                    pending = file_len - offset,
                    "oversized line not terminated yet, waiting"
                ),
            }
        }

        Ok(TailPoll::Data(read))
    }

    /// `from`부터 `file_len` 전까지 첫 개행의 파일 오프셋을 찾습니다.
    async fn find_newline(
        &self,
        file: &mut tokio::fs::File,
        from: u64,
        file_len: u64,
    ) -> Result<Option<u64>, LogPipelineError> {
        let mut chunk = vec![0u8; self.max_read_bytes];
        let mut pos = from;
        while pos < file_len {
            let want = usize::try_from(file_len - pos)
                .unwrap_or(chunk.len())
                .min(chunk.len());
            let n = file
                .read(&mut chunk[..want])
                .await
                .map_err(|e| self.error(e))?;
            if n == 0 {
                break;
            }
            if let Some(rel) = chunk[..n].iter().position(|&b| b == b'\n') {
                return Ok(Some(pos + rel as u64));
            }
            pos += n as u64;
        }
        Ok(None)
    }

    fn rotated(&self, previous_offset: u64, file_len: u64, reason: RotationReason) -> TailPoll {
        warn!(
            path = %self.path.display(),
            previous_offset,
            file_len,
            ?reason,
            "log file rotated or truncated, resetting offset to 0"
        );
        TailPoll::Rotated {
            previous_offset,
            file_len,
            reason,
        }
    }

    /// 버퍼를 완전한 라인으로 나눕니다. 개행 없는 꼬리는 소비하지 않습니다.
    fn split_lines(&self, buf: Bytes, start_offset: u64, file_len: u64) -> TailRead {
        let mut lines = Vec::new();
        let mut oversized = 0usize;
        let mut start = 0usize;

        while let Some(rel) = buf[start..].iter().position(|&b| b == b'\n') {
            let newline = start + rel;
            let end_offset = start_offset + newline as u64 + 1;

            if newline - start > self.max_line_length {
                oversized += 1;
                warn!(
                    path = %self.path.display(),
                    end_offset,
                    length = newline - start,
                    max = self.max_line_length,
                    "dropping line exceeding max_line_length"
                );
            } else {
                let mut end = newline;
                if end > start && buf[end - 1] == b'\r' {
                    end -= 1;
                }
                lines.push(RawLine::new(buf.slice(start..end), end_offset));
            }
            start = newline + 1;
        }

        TailRead {
            lines,
            start_offset,
            end_offset: start_offset + start as u64,
            file_len,
            oversized,
        }
    }

    fn error(&self, e: std::io::Error) -> LogPipelineError {
        LogPipelineError::Tail {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        }
    }
}
