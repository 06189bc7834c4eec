//! 로그 파이프라인 설정
//!
//! [`PipelineConfig`]는 core의 `[ingest]`, `[detection]` 섹션을 기반으로
//! 수집 루프가 사용하는 설정을 한곳에 모읍니다.
//!
//! # 사용 예시
//! ```ignore
//! use auditflow_core::config::AuditflowConfig;
//! use auditflow_log_pipeline::config::PipelineConfig;
//!
//! let core_config = AuditflowConfig::default();
//! let config = PipelineConfig::from_core(&core_config);
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use auditflow_core::config::{AuditflowConfig, MAX_BATCH_SIZE};

use crate::error::LogPipelineError;

/// 배치 처리 모드
///
/// 미처리 바이트 양에 따라 매 폴링마다 결정됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IngestMode {
    /// 평상시: 작은 배치, 행 단위 INSERT
    Steady,
    /// 백로그 따라잡기: 큰 배치, 병렬 분류, 일괄 INSERT
    Backlog,
}

impl IngestMode {
    /// 메트릭 레이블 값
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Steady => "steady",
            Self::Backlog => "backlog",
        }
    }
}

/// 로그 파이프라인 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// 감시할 감사 로그 경로
    pub log_path: PathBuf,
    /// 체크포인트 파일 경로
    pub state_path: PathBuf,
    /// 폴링 주기 (밀리초)
    pub poll_interval_ms: u64,
    /// 평상시 배치 크기
    pub steady_batch_size: usize,
    /// 백로그 배치 크기
    pub backlog_batch_size: usize,
    /// 백로그 모드 진입 기준 (미처리 바이트)
    pub backlog_threshold_bytes: u64,
    /// 폴링 1회당 최대 읽기 바이트
    pub max_read_bytes: usize,
    /// 최대 라인 길이
    pub max_line_length: usize,
    /// 일괄 INSERT 전환 기준 (배치 내 이벤트 수)
    pub bulk_insert_threshold: usize,
    /// 복구 시 사용할 components 값
    pub canonical_component: String,
    /// 차단 판정 이상 점수 임계값
    pub blocking_threshold: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_core(&AuditflowConfig::default())
    }
}

impl PipelineConfig {
    /// core 설정에서 파이프라인 설정을 생성합니다.
    pub fn from_core(core: &AuditflowConfig) -> Self {
        let ingest = &core.ingest;
        Self {
            log_path: PathBuf::from(&ingest.log_path),
            state_path: PathBuf::from(&ingest.state_path),
            poll_interval_ms: ingest.poll_interval_ms,
            steady_batch_size: ingest.steady_batch_size,
            backlog_batch_size: ingest.backlog_batch_size,
            backlog_threshold_bytes: ingest.backlog_threshold_bytes,
            max_read_bytes: ingest.max_read_bytes,
            max_line_length: ingest.max_line_length,
            bulk_insert_threshold: ingest.bulk_insert_threshold,
            canonical_component: ingest.canonical_component.clone(),
            blocking_threshold: core.detection.blocking_threshold,
        }
    }

    /// 폴링 주기
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// 미처리 바이트 양으로 처리 모드를 결정합니다.
    pub fn mode_for_pending(&self, pending_bytes: u64) -> IngestMode {
        if pending_bytes >= self.backlog_threshold_bytes {
            IngestMode::Backlog
        } else {
            IngestMode::Steady
        }
    }

    /// 모드별 배치 크기
    pub fn batch_size(&self, mode: IngestMode) -> usize {
        match mode {
            IngestMode::Steady => self.steady_batch_size,
            IngestMode::Backlog => self.backlog_batch_size,
        }
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LogPipelineError> {
        if self.log_path.as_os_str().is_empty() {
            return Err(config_err("log_path", "must not be empty"));
        }
        if self.state_path.as_os_str().is_empty() {
            return Err(config_err("state_path", "must not be empty"));
        }
        if self.poll_interval_ms == 0 {
            return Err(config_err("poll_interval_ms", "must be greater than 0"));
        }
        if self.steady_batch_size == 0 || self.steady_batch_size > MAX_BATCH_SIZE {
            return Err(config_err(
                "steady_batch_size",
                &format!("must be 1-{MAX_BATCH_SIZE}"),
            ));
        }
        if self.backlog_batch_size < self.steady_batch_size
            || self.backlog_batch_size > MAX_BATCH_SIZE
        {
            return Err(config_err(
                "backlog_batch_size",
                &format!("must be steady_batch_size-{MAX_BATCH_SIZE}"),
            ));
        }
        if self.max_line_length == 0 {
            return Err(config_err("max_line_length", "must be greater than 0"));
        }
        if self.max_read_bytes <= self.max_line_length {
            return Err(config_err(
                "max_read_bytes",
                "must be greater than max_line_length",
            ));
        }
        if self.canonical_component.is_empty() || self.canonical_component.contains('"') {
            return Err(config_err(
                "canonical_component",
                "must be non-empty and must not contain quotes",
            ));
        }
        if self.blocking_threshold == 0 {
            return Err(config_err("blocking_threshold", "must be greater than 0"));
        }
        Ok(())
    }
}

fn config_err(field: &str, reason: &str) -> LogPipelineError {
    LogPipelineError::Config {
        field: field.to_owned(),
        reason: reason.to_owned(),
    }
}

/// 파이프라인 설정 빌더
#[derive(Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 감사 로그 경로를 설정합니다.
    pub fn log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.log_path = path.into();
        self
    }

    /// 체크포인트 파일 경로를 설정합니다.
    pub fn state_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.state_path = path.into();
        self
    }

    /// 폴링 주기(밀리초)를 설정합니다.
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    /// 평상시/백로그 배치 크기를 설정합니다.
    pub fn batch_sizes(mut self, steady: usize, backlog: usize) -> Self {
        self.config.steady_batch_size = steady;
        self.config.backlog_batch_size = backlog;
        self
    }

    /// 백로그 모드 진입 기준을 설정합니다.
    pub fn backlog_threshold_bytes(mut self, bytes: u64) -> Self {
        self.config.backlog_threshold_bytes = bytes;
        self
    }

    /// 폴링 1회당 최대 읽기 바이트를 설정합니다.
    pub fn max_read_bytes(mut self, bytes: usize) -> Self {
        self.config.max_read_bytes = bytes;
        self
    }

    /// 최대 라인 길이를 설정합니다.
    pub fn max_line_length(mut self, bytes: usize) -> Self {
        self.config.max_line_length = bytes;
        self
    }

    /// 일괄 INSERT 전환 기준을 설정합니다.
    pub fn bulk_insert_threshold(mut self, events: usize) -> Self {
        self.config.bulk_insert_threshold = events;
        self
    }

    /// 차단 판정 임계값을 설정합니다.
    pub fn blocking_threshold(mut self, threshold: u32) -> Self {
        self.config.blocking_threshold = threshold;
        self
    }

    /// 설정을 검증하고 `PipelineConfig`를 생성합니다.
    pub fn build(self) -> Result<PipelineConfig, LogPipelineError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
