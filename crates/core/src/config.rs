//! 설정 관리: auditflow.toml 파싱 및 런타임 설정
//!
//! [`AuditflowConfig`]는 모든 구성 요소의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`AUDITFLOW_INGEST_LOG_PATH=/var/log/audit.log` 형식)
//! 3. 설정 파일 (`auditflow.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), auditflow_core::error::AuditflowError> {
//! use auditflow_core::config::AuditflowConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = AuditflowConfig::load("auditflow.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = AuditflowConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{AuditflowError, ConfigError};

/// 배치 크기 상한
pub const MAX_BATCH_SIZE: usize = 100_000;

/// 알림 타임아웃 상한 (밀리초)
pub const MAX_NOTIFY_TIMEOUT_MS: u64 = 5_000;

/// auditflow 통합 설정
///
/// `auditflow.toml` 파일의 최상위 구조를 나타냅니다.
/// 각 구성 요소는 자기 섹션만 읽어 사용합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditflowConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 로그 수집 설정
    #[serde(default)]
    pub ingest: IngestConfig,
    /// 공격 탐지 설정
    #[serde(default)]
    pub detection: DetectionConfig,
    /// 저장소 설정
    #[serde(default)]
    pub storage: StorageConfig,
    /// 변경 알림 설정
    #[serde(default)]
    pub notifier: NotifierConfig,
    /// 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl AuditflowConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    ///
    /// 설정 로딩 순서:
    /// 1. TOML 파일 파싱
    /// 2. 환경변수 오버라이드 적용
    /// 3. 유효성 검증
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, AuditflowError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    ///
    /// 검증은 오버라이드 이후에 수행되어야 하므로 여기서는 하지 않습니다.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, AuditflowError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AuditflowError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                AuditflowError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, AuditflowError> {
        toml::from_str(toml_str).map_err(|e| {
            AuditflowError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `AUDITFLOW_{SECTION}_{FIELD}`
    /// 예: `AUDITFLOW_STORAGE_DATABASE_URL=sqlite:///data/auditflow.db`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "AUDITFLOW_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "AUDITFLOW_GENERAL_LOG_FORMAT");
        override_string(&mut self.general.data_dir, "AUDITFLOW_GENERAL_DATA_DIR");
        override_string(&mut self.general.pid_file, "AUDITFLOW_GENERAL_PID_FILE");

        // Ingest
        override_string(&mut self.ingest.log_path, "AUDITFLOW_INGEST_LOG_PATH");
        override_string(&mut self.ingest.state_path, "AUDITFLOW_INGEST_STATE_PATH");
        override_u64(
            &mut self.ingest.poll_interval_ms,
            "AUDITFLOW_INGEST_POLL_INTERVAL_MS",
        );
        override_usize(
            &mut self.ingest.steady_batch_size,
            "AUDITFLOW_INGEST_STEADY_BATCH_SIZE",
        );
        override_usize(
            &mut self.ingest.backlog_batch_size,
            "AUDITFLOW_INGEST_BACKLOG_BATCH_SIZE",
        );
        override_u64(
            &mut self.ingest.backlog_threshold_bytes,
            "AUDITFLOW_INGEST_BACKLOG_THRESHOLD_BYTES",
        );
        override_usize(
            &mut self.ingest.max_read_bytes,
            "AUDITFLOW_INGEST_MAX_READ_BYTES",
        );
        override_usize(
            &mut self.ingest.max_line_length,
            "AUDITFLOW_INGEST_MAX_LINE_LENGTH",
        );
        override_usize(
            &mut self.ingest.bulk_insert_threshold,
            "AUDITFLOW_INGEST_BULK_INSERT_THRESHOLD",
        );
        override_string(
            &mut self.ingest.canonical_component,
            "AUDITFLOW_INGEST_CANONICAL_COMPONENT",
        );

        // Detection
        override_u32(
            &mut self.detection.blocking_threshold,
            "AUDITFLOW_DETECTION_BLOCKING_THRESHOLD",
        );

        // Storage
        override_string(
            &mut self.storage.database_url,
            "AUDITFLOW_STORAGE_DATABASE_URL",
        );
        override_u32(
            &mut self.storage.max_connections,
            "AUDITFLOW_STORAGE_MAX_CONNECTIONS",
        );
        override_u32(
            &mut self.storage.connect_max_attempts,
            "AUDITFLOW_STORAGE_CONNECT_MAX_ATTEMPTS",
        );
        override_u64(
            &mut self.storage.connect_initial_backoff_ms,
            "AUDITFLOW_STORAGE_CONNECT_INITIAL_BACKOFF_MS",
        );
        override_u64(
            &mut self.storage.connect_max_backoff_ms,
            "AUDITFLOW_STORAGE_CONNECT_MAX_BACKOFF_MS",
        );

        // Notifier
        override_bool(&mut self.notifier.enabled, "AUDITFLOW_NOTIFIER_ENABLED");
        override_string(&mut self.notifier.endpoint, "AUDITFLOW_NOTIFIER_ENDPOINT");
        override_u64(
            &mut self.notifier.timeout_ms,
            "AUDITFLOW_NOTIFIER_TIMEOUT_MS",
        );
        override_string(
            &mut self.notifier.min_severity,
            "AUDITFLOW_NOTIFIER_MIN_SEVERITY",
        );
        override_usize(
            &mut self.notifier.max_in_flight,
            "AUDITFLOW_NOTIFIER_MAX_IN_FLIGHT",
        );

        // Metrics
        override_bool(&mut self.metrics.enabled, "AUDITFLOW_METRICS_ENABLED");
        override_string(
            &mut self.metrics.listen_addr,
            "AUDITFLOW_METRICS_LISTEN_ADDR",
        );
        override_u16(&mut self.metrics.port, "AUDITFLOW_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), AuditflowError> {
        // log_level 검증
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        // log_format 검증
        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        self.ingest.validate()?;

        if self.detection.blocking_threshold == 0 {
            return Err(invalid(
                "detection.blocking_threshold",
                "must be greater than 0".to_owned(),
            ));
        }

        self.storage.validate()?;

        if self.notifier.enabled {
            if self.notifier.endpoint.is_empty() {
                return Err(invalid(
                    "notifier.endpoint",
                    "must not be empty when notifier is enabled".to_owned(),
                ));
            }
            if self.notifier.timeout_ms == 0 || self.notifier.timeout_ms > MAX_NOTIFY_TIMEOUT_MS {
                return Err(invalid(
                    "notifier.timeout_ms",
                    format!("must be between 1 and {MAX_NOTIFY_TIMEOUT_MS}"),
                ));
            }
            if self.notifier.max_in_flight == 0 {
                return Err(invalid(
                    "notifier.max_in_flight",
                    "must be greater than 0".to_owned(),
                ));
            }
        }

        let valid_severities = ["low", "medium", "high", "critical"];
        if !valid_severities.contains(&self.notifier.min_severity.as_str()) {
            return Err(invalid(
                "notifier.min_severity",
                format!("must be one of: {}", valid_severities.join(", ")),
            ));
        }

        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(invalid(
                "metrics.port",
                "must be non-zero when metrics are enabled".to_owned(),
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: String) -> AuditflowError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason,
    }
    .into()
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// 데이터 디렉토리
    pub data_dir: String,
    /// PID 파일 경로 (빈 문자열이면 생성하지 않음)
    pub pid_file: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
            data_dir: "/app/data".to_owned(),
            pid_file: String::new(),
        }
    }
}

/// 로그 수집 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// 감시할 감사 로그 경로
    pub log_path: String,
    /// 바이트 오프셋 체크포인트 파일 경로
    pub state_path: String,
    /// 파일 폴링 주기 (밀리초)
    pub poll_interval_ms: u64,
    /// 평상시 배치 크기
    pub steady_batch_size: usize,
    /// 백로그 처리 시 배치 크기
    pub backlog_batch_size: usize,
    /// 미처리 바이트가 이 값 이상이면 백로그 모드
    pub backlog_threshold_bytes: u64,
    /// 폴링 1회당 최대 읽기 바이트
    pub max_read_bytes: usize,
    /// 최대 라인 길이 (바이트), 초과 라인은 버림
    pub max_line_length: usize,
    /// 배치 내 이벤트 수가 이 값 이상이면 일괄 INSERT 사용
    pub bulk_insert_threshold: usize,
    /// 복구 시 사용할 components 배열 값
    pub canonical_component: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            log_path: "/var/log/modsecurity/audit.log".to_owned(),
            state_path: "/app/data/log_processor.state".to_owned(),
            poll_interval_ms: 500,
            steady_batch_size: 100,
            backlog_batch_size: 5_000,
            backlog_threshold_bytes: 4 * 1024 * 1024,
            max_read_bytes: 16 * 1024 * 1024,
            max_line_length: 1024 * 1024,
            bulk_insert_threshold: 500,
            canonical_component: "OWASP_CRS/4.17.1".to_owned(),
        }
    }
}

impl IngestConfig {
    fn validate(&self) -> Result<(), AuditflowError> {
        if self.log_path.is_empty() {
            return Err(invalid("ingest.log_path", "must not be empty".to_owned()));
        }
        if self.state_path.is_empty() {
            return Err(invalid("ingest.state_path", "must not be empty".to_owned()));
        }
        if self.poll_interval_ms == 0 {
            return Err(invalid(
                "ingest.poll_interval_ms",
                "must be greater than 0".to_owned(),
            ));
        }
        for (field, size) in [
            ("ingest.steady_batch_size", self.steady_batch_size),
            ("ingest.backlog_batch_size", self.backlog_batch_size),
        ] {
            if size == 0 || size > MAX_BATCH_SIZE {
                return Err(invalid(field, format!("must be between 1 and {MAX_BATCH_SIZE}")));
            }
        }
        if self.steady_batch_size > self.backlog_batch_size {
            return Err(invalid(
                "ingest.steady_batch_size",
                "must not exceed ingest.backlog_batch_size".to_owned(),
            ));
        }
        if self.max_line_length == 0 {
            return Err(invalid(
                "ingest.max_line_length",
                "must be greater than 0".to_owned(),
            ));
        }
        if self.max_read_bytes <= self.max_line_length {
            return Err(invalid(
                "ingest.max_read_bytes",
                "must be greater than ingest.max_line_length".to_owned(),
            ));
        }
        Ok(())
    }
}

/// 공격 탐지 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// 차단 판정 이상 점수 임계값
    pub blocking_threshold: u32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            blocking_threshold: 5,
        }
    }
}

/// 저장소 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// 데이터베이스 연결 URL
    pub database_url: String,
    /// 커넥션 풀 최대 크기
    pub max_connections: u32,
    /// 시작 시 연결 최대 시도 횟수
    pub connect_max_attempts: u32,
    /// 연결 재시도 초기 대기 시간 (밀리초)
    pub connect_initial_backoff_ms: u64,
    /// 연결 재시도 최대 대기 시간 (밀리초)
    pub connect_max_backoff_ms: u64,
    /// 재시도 대기 시간 배수
    pub backoff_multiplier: f64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite:///app/data/auditflow.db?mode=rwc".to_owned(),
            max_connections: 5,
            connect_max_attempts: 10,
            connect_initial_backoff_ms: 5_000,
            connect_max_backoff_ms: 30_000,
            backoff_multiplier: 1.5,
        }
    }
}

impl StorageConfig {
    fn validate(&self) -> Result<(), AuditflowError> {
        if self.database_url.is_empty() {
            return Err(invalid(
                "storage.database_url",
                "must not be empty".to_owned(),
            ));
        }
        if self.max_connections == 0 {
            return Err(invalid(
                "storage.max_connections",
                "must be greater than 0".to_owned(),
            ));
        }
        if self.connect_max_attempts == 0 {
            return Err(invalid(
                "storage.connect_max_attempts",
                "must be greater than 0".to_owned(),
            ));
        }
        if self.connect_max_backoff_ms < self.connect_initial_backoff_ms {
            return Err(invalid(
                "storage.connect_max_backoff_ms",
                "must not be less than storage.connect_initial_backoff_ms".to_owned(),
            ));
        }
        if self.backoff_multiplier.is_nan() || self.backoff_multiplier < 1.0 {
            return Err(invalid(
                "storage.backoff_multiplier",
                "must be at least 1.0".to_owned(),
            ));
        }
        Ok(())
    }
}

/// 변경 알림 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 알림 수신 HTTP 엔드포인트
    pub endpoint: String,
    /// 요청 타임아웃 (밀리초)
    pub timeout_ms: u64,
    /// 알림 최소 심각도 (low, medium, high, critical)
    pub min_severity: String,
    /// 동시에 진행 중인 최대 요청 수 (초과분은 버림)
    pub max_in_flight: usize,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "http://backend:8000/api/security-events/broadcast".to_owned(),
            timeout_ms: 500,
            min_severity: "low".to_owned(),
            max_in_flight: 16,
        }
    }
}

/// 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 바인드 주소
    pub listen_addr: String,
    /// 바인드 포트
    pub port: u16,
    /// 스크레이프 경로
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9100,
            endpoint: "/metrics".to_owned(),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u16(target: &mut u16, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u16>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u16 from env var, ignoring"
            ),
        }
    }
}

fn override_u32(target: &mut u32, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u32>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u32 from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn default_config_has_sane_values() {
        let config = AuditflowConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.log_format, "json");
        assert_eq!(config.ingest.poll_interval_ms, 500);
        assert_eq!(config.ingest.steady_batch_size, 100);
        assert_eq!(config.detection.blocking_threshold, 5);
        assert_eq!(config.storage.connect_max_attempts, 10);
        assert_eq!(config.storage.connect_initial_backoff_ms, 5_000);
        assert_eq!(config.storage.connect_max_backoff_ms, 30_000);
        assert_eq!(config.notifier.timeout_ms, 500);
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn default_config_passes_validation() {
        let config = AuditflowConfig::default();
        config.validate().unwrap();
    }

    #[test]
    fn from_str_empty_toml_uses_defaults() {
        let config = AuditflowConfig::parse("").unwrap();
        config.validate().unwrap();
        assert_eq!(config.ingest.canonical_component, "OWASP_CRS/4.17.1");
    }

    #[test]
    fn from_str_partial_toml_merges_with_defaults() {
        let config = AuditflowConfig::parse(
            r#"
[ingest]
log_path = "/tmp/audit.log"
steady_batch_size = 50
"#,
        )
        .unwrap();
        assert_eq!(config.ingest.log_path, "/tmp/audit.log");
        assert_eq!(config.ingest.steady_batch_size, 50);
        assert_eq!(config.ingest.backlog_batch_size, 5_000);
        assert_eq!(config.general.log_level, "info");
    }

    #[test]
    fn from_str_invalid_toml_returns_error() {
        let err = AuditflowConfig::parse("[ingest\nlog_path = ").unwrap_err();
        assert!(matches!(
            err,
            AuditflowError::Config(ConfigError::ParseFailed { .. })
        ));
    }

    #[test]
    fn validate_rejects_invalid_log_level() {
        let mut config = AuditflowConfig::default();
        config.general.log_level = "verbose".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("general.log_level"));
    }

    #[test]
    fn validate_rejects_invalid_log_format() {
        let mut config = AuditflowConfig::default();
        config.general.log_format = "xml".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("general.log_format"));
    }

    #[test]
    fn validate_rejects_zero_poll_interval() {
        let mut config = AuditflowConfig::default();
        config.ingest.poll_interval_ms = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("poll_interval_ms"));
    }

    #[test]
    fn validate_rejects_steady_batch_larger_than_backlog() {
        let mut config = AuditflowConfig::default();
        config.ingest.steady_batch_size = 10_000;
        config.ingest.backlog_batch_size = 100;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("steady_batch_size"));
    }

    #[test]
    fn validate_rejects_oversized_batch() {
        let mut config = AuditflowConfig::default();
        config.ingest.backlog_batch_size = MAX_BATCH_SIZE + 1;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("backlog_batch_size"));
    }

    #[test]
    fn validate_rejects_read_cap_not_above_line_length() {
        let mut config = AuditflowConfig::default();
        config.ingest.max_line_length = 4096;
        config.ingest.max_read_bytes = 4096;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_read_bytes"));

        config.ingest.max_read_bytes = 4097;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_notifier_in_flight() {
        let mut config = AuditflowConfig::default();
        config.notifier.max_in_flight = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_in_flight"));

        config.notifier.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_paths() {
        let mut config = AuditflowConfig::default();
        config.ingest.state_path = String::new();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("state_path"));
    }

    #[test]
    fn validate_rejects_backoff_max_below_initial() {
        let mut config = AuditflowConfig::default();
        config.storage.connect_max_backoff_ms = 1_000;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("connect_max_backoff_ms"));
    }

    #[test]
    fn validate_rejects_zero_connect_attempts() {
        let mut config = AuditflowConfig::default();
        config.storage.connect_max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_notifier_timeout_out_of_range() {
        let mut config = AuditflowConfig::default();
        config.notifier.timeout_ms = 0;
        assert!(config.validate().is_err());
        config.notifier.timeout_ms = MAX_NOTIFY_TIMEOUT_MS + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_ignores_notifier_timeout_when_disabled() {
        let mut config = AuditflowConfig::default();
        config.notifier.enabled = false;
        config.notifier.timeout_ms = 0;
        config.validate().unwrap();
    }

    #[test]
    fn validate_rejects_unknown_min_severity() {
        let mut config = AuditflowConfig::default();
        config.notifier.min_severity = "info".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("min_severity"));
    }

    #[test]
    #[serial]
    fn env_override_applies_to_sections() {
        let mut config = AuditflowConfig::default();
        // SAFETY: serial 테스트이므로 환경변수 조작이 안전합니다.
        unsafe {
            std::env::set_var("AUDITFLOW_INGEST_LOG_PATH", "/tmp/other.log");
            std::env::set_var("AUDITFLOW_DETECTION_BLOCKING_THRESHOLD", "7");
            std::env::set_var("AUDITFLOW_NOTIFIER_ENABLED", "false");
        }
        config.apply_env_overrides();
        unsafe {
            std::env::remove_var("AUDITFLOW_INGEST_LOG_PATH");
            std::env::remove_var("AUDITFLOW_DETECTION_BLOCKING_THRESHOLD");
            std::env::remove_var("AUDITFLOW_NOTIFIER_ENABLED");
        }
        assert_eq!(config.ingest.log_path, "/tmp/other.log");
        assert_eq!(config.detection.blocking_threshold, 7);
        assert!(!config.notifier.enabled);
    }

    #[test]
    #[serial]
    fn env_override_invalid_number_keeps_original() {
        let mut val = 100usize;
        // SAFETY: serial 테스트이므로 환경변수 조작이 안전합니다.
        unsafe { std::env::set_var("TEST_AUDITFLOW_USIZE_BAD", "lots") };
        override_usize(&mut val, "TEST_AUDITFLOW_USIZE_BAD");
        assert_eq!(val, 100); // 원래 값 유지
        unsafe { std::env::remove_var("TEST_AUDITFLOW_USIZE_BAD") };
    }

    #[test]
    #[serial]
    fn env_override_bool_invalid_keeps_original() {
        let mut val = true;
        // SAFETY: serial 테스트이므로 환경변수 조작이 안전합니다.
        unsafe { std::env::set_var("TEST_AUDITFLOW_BOOL_BAD", "yes please") };
        override_bool(&mut val, "TEST_AUDITFLOW_BOOL_BAD");
        assert!(val);
        unsafe { std::env::remove_var("TEST_AUDITFLOW_BOOL_BAD") };
    }

    #[test]
    fn env_override_missing_var_keeps_original() {
        let mut val = "original".to_owned();
        override_string(&mut val, "TEST_AUDITFLOW_NONEXISTENT_12345");
        assert_eq!(val, "original");
    }

    #[test]
    fn config_serialize_roundtrip() {
        let config = AuditflowConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed = AuditflowConfig::parse(&toml_str).unwrap();
        assert_eq!(config.ingest.log_path, parsed.ingest.log_path);
        assert_eq!(config.storage.database_url, parsed.storage.database_url);
        assert_eq!(config.notifier.endpoint, parsed.notifier.endpoint);
    }

    #[tokio::test]
    async fn from_file_not_found() {
        let result = AuditflowConfig::from_file("/nonexistent/path/auditflow.toml").await;
        let err = result.unwrap_err();
        assert!(matches!(
            err,
            AuditflowError::Config(ConfigError::FileNotFound { .. })
        ));
    }
}
