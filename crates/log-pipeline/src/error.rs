//! 로그 파이프라인 에러 타입
//!
//! [`LogPipelineError`]는 수집 파이프라인 내부에서 발생하는 모든 에러를 표현합니다.
//! `From<LogPipelineError> for AuditflowError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.
//!
//! # 격리 범위
//! - `Parse`, `Validation`: 라인 단위 (해당 라인만 버림)
//! - `Storage`: 배치 단위 (롤백 후 다음 폴링에서 재시도)
//! - `Notify`: 항상 무시 (로그만 남김)

use auditflow_core::error::{
    AuditflowError, ConfigError, ParseError, PipelineError, StorageError,
};

/// 로그 파이프라인 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum LogPipelineError {
    /// 복구 후에도 JSON 디코딩 실패
    #[error("parse error at offset {offset}: {reason}")]
    Parse {
        /// 라인 끝 바이트 오프셋
        offset: u64,
        /// 실패 사유
        reason: String,
    },

    /// 필수 필드 누락 등 트랜잭션 검증 실패
    #[error("validation error: {field}: {reason}")]
    Validation {
        /// 문제가 된 필드
        field: String,
        /// 검증 실패 사유
        reason: String,
    },

    /// 로그 파일 읽기 실패
    #[error("tail error: {path}: {reason}")]
    Tail {
        /// 로그 파일 경로
        path: String,
        /// 에러 사유
        reason: String,
    },

    /// 체크포인트 읽기/쓰기 실패
    #[error("checkpoint error: {path}: {reason}")]
    Checkpoint {
        /// 체크포인트 파일 경로
        path: String,
        /// 에러 사유
        reason: String,
    },

    /// 저장소 에러
    #[error("storage error (retryable={retryable}): {reason}")]
    Storage {
        /// 연결 계열의 일시적 장애인지 여부
        retryable: bool,
        /// 에러 사유
        reason: String,
    },

    /// 변경 알림 실패
    #[error("notify error: {0}")]
    Notify(String),

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 정규식 컴파일 에러
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl LogPipelineError {
    /// 다음 폴링 주기에서 재시도할 가치가 있는 에러인지 확인합니다.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Storage { retryable, .. } => *retryable,
            Self::Tail { .. } | Self::Io(_) => true,
            _ => false,
        }
    }
}

impl From<sqlx::Error> for LogPipelineError {
    fn from(err: sqlx::Error) -> Self {
        let retryable = matches!(
            err,
            sqlx::Error::Io(_)
                | sqlx::Error::Tls(_)
                | sqlx::Error::PoolTimedOut
                | sqlx::Error::PoolClosed
                | sqlx::Error::WorkerCrashed
        );
        Self::Storage {
            retryable,
            reason: err.to_string(),
        }
    }
}

impl From<LogPipelineError> for AuditflowError {
    fn from(err: LogPipelineError) -> Self {
        match err {
            LogPipelineError::Parse { offset, reason } => ParseError::Failed {
                offset: usize::try_from(offset).unwrap_or(usize::MAX),
                reason,
            }
            .into(),
            LogPipelineError::Validation { field, .. } => ParseError::MissingField(field).into(),
            LogPipelineError::Storage { retryable, reason } => {
                if retryable {
                    StorageError::Connection(reason).into()
                } else {
                    StorageError::Query(reason).into()
                }
            }
            LogPipelineError::Config { field, reason } => {
                ConfigError::InvalidValue { field, reason }.into()
            }
            LogPipelineError::Checkpoint { path, reason } => {
                PipelineError::Checkpoint(format!("{path}: {reason}")).into()
            }
            LogPipelineError::Tail { path, reason } => {
                PipelineError::Tail(format!("{path}: {reason}")).into()
            }
            LogPipelineError::Io(e) => AuditflowError::Io(e),
            other => PipelineError::InitFailed(other.to_string()).into(),
        }
    }
}
