#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`collector`]: 체크포인트 이후의 완전한 라인을 읽는 폴링 tailer
//! - [`checkpoint`]: 바이트 오프셋 체크포인트 (원자적 기록)
//! - [`parser`]: 깨진 JSON 복구와 트랜잭션 디코딩/검증
//! - [`detection`]: 규칙 매칭 결과 기반 공격 분류 엔진
//! - [`builder`]: 분류 결과를 저장 레코드 쌍으로 변환
//! - [`buffer`]: 커밋 단위 배치 버퍼
//! - [`storage`]: 멱등 배치 저장소 (SQLite)
//! - [`notifier`]: best-effort 변경 알림
//! - [`pipeline`]: 수집 루프와 `Pipeline` trait 구현
//! - [`config`]: 파이프라인 설정 (core 설정 확장)
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! FileTailer -> LineDecoder -> AttackDetectionEngine -> EventBuilder
//!     -> BatchBuffer -> EventStore -> CheckpointStore -> ChangeNotifier
//! ```

pub mod buffer;
pub mod builder;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod notifier;
pub mod pipeline;

pub mod collector;
pub mod detection;
pub mod parser;
pub mod storage;

// --- 주요 타입 re-export ---

// 파이프라인
pub use pipeline::{
    CycleOutcome, IngestWorker, LogPipeline, LogPipelineBuilder, StatsSnapshot, WorkerStats,
};

// 설정
pub use config::{IngestMode, PipelineConfig, PipelineConfigBuilder};

// 에러
pub use error::LogPipelineError;

// 수집
pub use checkpoint::CheckpointStore;
pub use collector::{FileTailer, RawLine, TailPoll};

// 파서
pub use parser::{DecodedLine, LineDecoder, LineRepairer, RepairLevel, Transaction};

// 분류
pub use builder::EventBuilder;
pub use detection::{AttackDetectionEngine, ClassificationResult};

// 저장
pub use buffer::BatchBuffer;
pub use storage::{EventStore, PersistOutcome, SqlEventStore, WriteStrategy, connect_with_retry};

// 알림
pub use notifier::{ChangeNotifier, HttpNotifier, NoopNotifier};
