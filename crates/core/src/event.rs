//! 이벤트 레코드: 저장 가능한 보안 이벤트와 레거시 미러 레코드
//!
//! 하나의 트랜잭션은 정확히 하나의 [`SecurityEvent`]와 하나의
//! [`LegacyShadowRecord`]로 변환되며, 두 레코드는 함께 저장되거나
//! 둘 다 저장되지 않습니다.
//!
//! [`SecurityEvent::event_id`]는 로그 내용과 무관한 새 UUID이고,
//! 중복 제거 키는 트랜잭션 자체의 `unique_id`
//! ([`LegacyShadowRecord::log_unique_id`])입니다.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::types::Severity;

/// ISO-8601 타임스탬프 형식 (알림 페이로드용)
pub const ISO_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// 정규화된 보안 이벤트: `security_events` 테이블의 한 행
///
/// 생성 후 변경되지 않습니다. `geo_location`은 외부 보강 서비스가
/// 나중에 채우므로 항상 `None`으로 생성됩니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityEvent {
    /// 이벤트 고유 ID (UUID v4)
    pub event_id: String,
    /// 원본 트랜잭션 ID (중복 제거 키)
    pub log_unique_id: String,
    /// 트랜잭션 발생 시각
    pub timestamp: NaiveDateTime,
    /// 출발지 IP
    pub source_ip: String,
    /// 출발지 포트
    pub source_port: Option<u16>,
    /// 목적지 IP
    pub destination_ip: Option<String>,
    /// 목적지 포트
    pub destination_port: Option<u16>,
    /// 대상 호스트 (Host 헤더)
    pub target_website: Option<String>,
    /// 요청 URI
    pub uri: String,
    /// HTTP 메서드
    pub method: String,
    /// 응답 상태 코드
    pub status_code: Option<u16>,
    /// User-Agent 헤더
    pub user_agent: String,
    /// 대표 공격 유형
    pub attack_type: Option<String>,
    /// 심각도 버킷
    pub severity: Severity,
    /// 공격 여부
    pub is_attack: bool,
    /// 차단 여부
    pub is_blocked: bool,
    /// 위험 점수 (0-100)
    pub risk_score: f64,
    /// 이상 점수
    pub anomaly_score: u32,
    /// 매칭된 규칙 ID 목록
    pub rules_matched: Vec<String>,
    /// 매칭된 규칙 파일 목록
    pub rule_files: Vec<String>,
    /// 요청 헤더 스냅샷
    pub request_headers: serde_json::Value,
    /// 요청 본문
    pub request_body: String,
    /// 응답 헤더 스냅샷
    pub response_headers: serde_json::Value,
    /// 응답 본문
    pub response_body: String,
    /// 지리 정보 (외부에서 보강)
    pub geo_location: Option<serde_json::Value>,
}

impl SecurityEvent {
    /// 실시간 알림 대상 여부 (높은 심각도 이상이거나 차단됨)
    pub fn is_critical(&self) -> bool {
        self.severity >= Severity::High || self.is_blocked
    }
}

impl fmt::Display for SecurityEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {} {} type={} blocked={}",
            self.severity,
            self.source_ip,
            self.method,
            self.uri,
            self.attack_type.as_deref().unwrap_or("none"),
            self.is_blocked,
        )
    }
}

/// 레거시 호환 레코드: `waf_logs` 테이블의 한 행
///
/// 분류 결과를 원본에 가깝게 보존하며, 원본 JSON 문서 전체를 함께 저장합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyShadowRecord {
    /// 트랜잭션 고유 ID (UNIQUE)
    pub log_unique_id: String,
    /// 트랜잭션 발생 시각
    pub timestamp: NaiveDateTime,
    pub source_ip: String,
    pub source_port: Option<u16>,
    pub dest_ip: Option<String>,
    pub dest_port: Option<u16>,
    pub target_website: Option<String>,
    pub method: String,
    pub uri: String,
    pub status_code: Option<u16>,
    pub is_blocked: bool,
    pub is_attack: bool,
    /// 분류된 공격 유형 (순서 유지, 중복 없음)
    pub attack_types: Vec<String>,
    pub rule_ids: Vec<String>,
    pub rule_files: Vec<String>,
    /// 선언된 규칙 심각도 합계
    pub severity_score: u32,
    pub anomaly_score: u32,
    /// 원본 로그 JSON
    pub raw_log: serde_json::Value,
}

/// 저장 단위: 함께 커밋되어야 하는 레코드 쌍
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltEvent {
    pub event: SecurityEvent,
    pub legacy: LegacyShadowRecord,
}

impl BuiltEvent {
    /// 중복 제거 키
    pub fn natural_key(&self) -> &str {
        &self.legacy.log_unique_id
    }
}

/// 변경 알림 페이로드
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventNotification {
    pub id: String,
    /// ISO-8601 시각
    pub timestamp: String,
    pub source_ip: String,
    pub attack_type: Option<String>,
    pub severity: Severity,
    pub is_blocked: bool,
}

impl From<&SecurityEvent> for EventNotification {
    fn from(event: &SecurityEvent) -> Self {
        Self {
            id: event.event_id.clone(),
            timestamp: event.timestamp.format(ISO_TIMESTAMP_FORMAT).to_string(),
            source_ip: event.source_ip.clone(),
            attack_type: event.attack_type.clone(),
            severity: event.severity,
            is_blocked: event.is_blocked,
        }
    }
}
