//! 시작 시 저장소 연결 재시도
//!
//! 지수 백오프(초기값, 배수, 상한)로 제한된 횟수만큼 재시도하고,
//! 모두 실패하면 치명적 에러를 반환합니다. 연결 이후의 쓰기 실패는 여기서
//! 재시도하지 않고 다음 폴링 주기로 넘깁니다.

use std::future::Future;
use std::time::Duration;

use tracing::{error, info, warn};

use auditflow_core::config::StorageConfig;

use super::sql::SqlEventStore;
use crate::error::LogPipelineError;

/// 재시도 정책
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    /// 최대 시도 횟수 (첫 시도 포함)
    pub max_attempts: u32,
    pub initial: Duration,
    pub max: Duration,
    pub multiplier: f64,
}

impl BackoffPolicy {
    /// `[storage]` 설정에서 정책을 만듭니다.
    pub fn from_config(config: &StorageConfig) -> Self {
        Self {
            max_attempts: config.connect_max_attempts.max(1),
            initial: Duration::from_millis(config.connect_initial_backoff_ms),
            max: Duration::from_millis(config.connect_max_backoff_ms),
            multiplier: config.backoff_multiplier,
        }
    }

    /// 대기 시간 시퀀스를 만듭니다.
    pub fn backoff(&self) -> Backoff {
        Backoff {
            next_ms: self.initial.as_millis() as f64,
            max_ms: self.max.as_millis() as f64,
            multiplier: self.multiplier.max(1.0),
        }
    }
}

/// 상한이 있는 지수 증가 대기 시간
#[derive(Debug, Clone)]
pub struct Backoff {
    next_ms: f64,
    max_ms: f64,
    multiplier: f64,
}

impl Backoff {
    /// 다음 대기 시간을 반환하고 내부 값을 증가시킵니다.
    pub fn next_delay(&mut self) -> Duration {
        let current = self.next_ms.min(self.max_ms);
        self.next_ms = (self.next_ms * self.multiplier).min(self.max_ms);
        Duration::from_millis(current as u64)
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        Some(self.next_delay())
    }
}

/// 작업을 정책에 따라 재시도합니다.
///
/// `op`에는 1부터 시작하는 시도 번호가 전달됩니다.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: &BackoffPolicy,
    what: &str,
    mut op: F,
) -> Result<T, LogPipelineError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, LogPipelineError>>,
{
    let mut backoff = policy.backoff();
    let mut attempt = 1u32;

    loop {
        match op(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    info!(what, attempt, "succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if attempt >= policy.max_attempts => {
                error!(what, attempt, error = %e, "giving up");
                return Err(LogPipelineError::Storage {
                    retryable: false,
                    reason: format!("{what}: giving up after {attempt} attempts: {e}"),
                });
            }
            Err(e) => {
                let delay = backoff.next_delay();
                warn!(
                    what,
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// 저장소에 연결합니다. 설정된 횟수만큼 실패하면 에러를 반환합니다.
pub async fn connect_with_retry(config: &StorageConfig) -> Result<SqlEventStore, LogPipelineError> {
    let policy = BackoffPolicy::from_config(config);
    retry_with_backoff(&policy, "event store connect", |_| {
        SqlEventStore::connect(config)
    })
    .await
}
