//! 파이프라인 trait: 장기 실행 구성 요소의 생명주기 정의

use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::AuditflowError;

/// 구성 요소 건강 상태
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    /// 정상 동작
    Healthy,
    /// 동작 중이나 일부 기능 저하 (사유 포함)
    Degraded(String),
    /// 동작 불가 (사유 포함)
    Unhealthy(String),
}

impl HealthStatus {
    /// 정상 상태인지 확인합니다.
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// 동작 불가 상태인지 확인합니다.
    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy(_))
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded(reason) => write!(f, "degraded: {reason}"),
            Self::Unhealthy(reason) => write!(f, "unhealthy: {reason}"),
        }
    }
}

/// 시작/정지/상태 확인이 가능한 파이프라인
///
/// # 생명주기
/// ```text
/// Initialized → start() → Running → stop() → Stopped
/// ```
///
/// `stop()`은 진행 중인 배치가 커밋과 체크포인트 기록을 마칠 때까지 기다립니다.
pub trait Pipeline: Send {
    /// 파이프라인을 시작합니다. 이미 실행 중이면 에러를 반환합니다.
    fn start(&mut self) -> impl Future<Output = Result<(), AuditflowError>> + Send;

    /// 파이프라인을 정지합니다. 실행 중이 아니면 에러를 반환합니다.
    fn stop(&mut self) -> impl Future<Output = Result<(), AuditflowError>> + Send;

    /// 현재 건강 상태를 반환합니다.
    fn health_check(&self) -> impl Future<Output = HealthStatus> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_status_predicates() {
        assert!(HealthStatus::Healthy.is_healthy());
        assert!(!HealthStatus::Degraded("slow".to_owned()).is_healthy());
        assert!(!HealthStatus::Degraded("slow".to_owned()).is_unhealthy());
        assert!(HealthStatus::Unhealthy("stopped".to_owned()).is_unhealthy());
    }

    #[test]
    fn health_status_display() {
        assert_eq!(HealthStatus::Healthy.to_string(), "healthy");
        assert_eq!(
            HealthStatus::Degraded("3 consecutive batch failures".to_owned()).to_string(),
            "degraded: 3 consecutive batch failures"
        );
    }
}
