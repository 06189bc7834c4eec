//! 배치 저장소 -- 멱등, 원자적 배치 저장
//!
//! [`EventStore`]는 빌드된 이벤트 배치를 한 트랜잭션으로 저장합니다.
//! 자연 키(`log_unique_id`)가 이미 있는 이벤트는 에러 없이 건너뛰며,
//! 실패한 배치는 전체가 롤백되어 다음 폴링에서 다시 처리됩니다.
//!
//! # 구현
//! - [`SqlEventStore`]: SQLite (`sqlx`) 기반 구현
//!
//! # 쓰기 전략
//! 배치 크기에 따라 [`WriteStrategy`]를 고릅니다. 두 전략은 같은 결과를 냅니다.

pub mod retry;
pub mod schema;
pub mod sql;

pub use retry::{Backoff, BackoffPolicy, connect_with_retry};
pub use sql::{SqlEventStore, StoreCounts};

use std::future::Future;

use auditflow_core::event::{BuiltEvent, SecurityEvent};

use crate::error::LogPipelineError;

/// 배치 쓰기 전략
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStrategy {
    /// 트랜잭션 안에서 행 단위 INSERT
    Row,
    /// 다중 행 INSERT (충돌 무시)
    Bulk,
}

impl WriteStrategy {
    /// 배치 이벤트 수로 전략을 고릅니다.
    pub fn for_batch(events: usize, bulk_threshold: usize) -> Self {
        if events >= bulk_threshold {
            Self::Bulk
        } else {
            Self::Row
        }
    }

    /// 메트릭/로그 레이블
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Row => "row",
            Self::Bulk => "bulk",
        }
    }
}

/// 배치 저장 결과
#[derive(Debug, Default)]
pub struct PersistOutcome {
    /// 새로 저장된 이벤트 (알림 대상)
    pub stored: Vec<SecurityEvent>,
    /// 자연 키 충돌로 건너뛴 수
    pub duplicates: usize,
}

/// 이벤트 저장소 trait
///
/// 하나의 배치는 하나의 트랜잭션입니다. 에러를 반환하면 아무것도
/// 저장되지 않은 상태여야 합니다.
pub trait EventStore: Send + Sync {
    /// 배치를 저장합니다.
    fn persist(
        &self,
        batch: Vec<BuiltEvent>,
        strategy: WriteStrategy,
    ) -> impl Future<Output = Result<PersistOutcome, LogPipelineError>> + Send;
}
