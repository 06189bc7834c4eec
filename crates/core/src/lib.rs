#![doc = include_str!("../README.md")]

pub mod config;
pub mod error;
pub mod event;
pub mod metrics;
pub mod pipeline;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::{AuditflowError, ConfigError, ParseError, PipelineError, StorageError};

// 설정
pub use config::AuditflowConfig;

// 이벤트
pub use event::{BuiltEvent, EventNotification, LegacyShadowRecord, SecurityEvent};

// 파이프라인 trait
pub use pipeline::{HealthStatus, Pipeline};

// 도메인 타입
pub use types::Severity;
