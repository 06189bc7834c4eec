//! 에러 타입: 도메인별 에러 정의

/// auditflow 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum AuditflowError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 파이프라인 처리 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// 파싱 에러
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// 스토리지 에러
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 파이프라인 처리 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 파이프라인 초기화 실패
    #[error("pipeline init failed: {0}")]
    InitFailed(String),

    /// 이미 실행 중
    #[error("pipeline already running")]
    AlreadyRunning,

    /// 실행 중이 아님
    #[error("pipeline not running")]
    NotRunning,

    /// 체크포인트 처리 실패
    #[error("checkpoint error: {0}")]
    Checkpoint(String),

    /// 로그 파일 tail 실패
    #[error("tail error: {0}")]
    Tail(String),
}

/// 파싱 에러
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// 파싱 실패
    #[error("parse failed at offset {offset}: {reason}")]
    Failed { offset: usize, reason: String },

    /// 입력 데이터 초과
    #[error("input too large: {size} bytes (max: {max})")]
    TooLarge { size: usize, max: usize },

    /// 필수 필드 누락
    #[error("missing required field: {0}")]
    MissingField(String),
}

/// 스토리지 에러
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// 연결 실패 (재시도 대상)
    #[error("connection failed: {0}")]
    Connection(String),

    /// 쿼리 실패
    #[error("query failed: {0}")]
    Query(String),
}
