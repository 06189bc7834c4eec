//! 이벤트 빌더 -- 분류 결과를 저장 가능한 레코드 쌍으로 변환
//!
//! 트랜잭션 하나는 항상 [`SecurityEvent`] 하나와 [`LegacyShadowRecord`] 하나가 됩니다.
//! `event_id`는 매번 새로 생성하는 UUID v4이며, 중복 제거에는 트랜잭션의
//! `unique_id`를 사용합니다.

use chrono::NaiveDateTime;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use auditflow_core::event::{BuiltEvent, LegacyShadowRecord, SecurityEvent};
use auditflow_core::types::Severity;

use crate::detection::ClassificationResult;
use crate::parser::Transaction;

/// 이상 점수가 이 값 이상이면 `HIGH_RISK`
pub const HIGH_RISK_SCORE: u32 = 10;
/// 이상 점수가 이 값 이상이면 `SUSPICIOUS`
pub const SUSPICIOUS_SCORE: u32 = 5;

/// 대표 공격 유형을 고릅니다.
///
/// 분류된 유형이 없지만 공격으로 판정되었으면 이상 점수에 따른 일반 레이블을 씁니다.
pub fn primary_attack_type(result: &ClassificationResult) -> Option<String> {
    if let Some(first) = result.attack_types.first() {
        return Some(first.clone());
    }
    if !result.is_attack {
        return None;
    }
    let label = if result.anomaly_score >= HIGH_RISK_SCORE {
        "HIGH_RISK"
    } else if result.anomaly_score >= SUSPICIOUS_SCORE {
        "SUSPICIOUS"
    } else {
        "ANOMALY"
    };
    Some(label.to_owned())
}

/// 심각도 버킷을 결정합니다.
pub fn severity_bucket(anomaly_score: u32, is_blocked: bool, distinct_types: usize) -> Severity {
    if anomaly_score >= 100 || (is_blocked && distinct_types > 2) {
        Severity::Critical
    } else if anomaly_score >= 50 || (is_blocked && distinct_types > 0) {
        Severity::High
    } else if anomaly_score >= 20 || distinct_types > 0 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// 위험 점수(0-100)를 계산합니다.
///
/// 차단된 요청은 합계에 0.7을 곱합니다.
pub fn risk_score(
    anomaly_score: u32,
    distinct_types: usize,
    severity_score: u32,
    is_blocked: bool,
) -> f64 {
    let mut score = (f64::from(anomaly_score) * 2.0).min(50.0);
    score += distinct_types as f64 * 15.0;
    score += f64::from(severity_score) * 5.0;
    if is_blocked {
        score *= 0.7;
    }
    score.clamp(0.0, 100.0)
}

/// 이벤트 빌더
#[derive(Debug, Clone, Copy, Default)]
pub struct EventBuilder;

impl EventBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self
    }

    /// 분류 결과와 트랜잭션으로 레코드 쌍을 만듭니다.
    ///
    /// 타임스탬프를 파싱하지 못했으면 `ingested_at`을 사용합니다.
    pub fn build(
        &self,
        tx: &Transaction,
        result: ClassificationResult,
        raw: Value,
        ingested_at: NaiveDateTime,
    ) -> BuiltEvent {
        let timestamp = result.timestamp.unwrap_or_else(|| {
            warn!(
                unique_id = %result.log_unique_id,
                time_stamp = tx.time_stamp.as_deref().unwrap_or_default(),
                "unparsable transaction timestamp, using ingestion time"
            );
            ingested_at
        });

        let distinct_types = result.attack_types.len();
        let attack_type = primary_attack_type(&result);
        let severity = severity_bucket(result.anomaly_score, result.is_blocked, distinct_types);
        let risk = risk_score(
            result.anomaly_score,
            distinct_types,
            result.severity_score,
            result.is_blocked,
        );

        if let Some(attack_type) = &attack_type {
            debug!(
                unique_id = %result.log_unique_id,
                attack_type = %attack_type,
                source_ip = %result.source_ip,
                anomaly_score = result.anomaly_score,
                "attack event built"
            );
        }

        let event = SecurityEvent {
            event_id: Uuid::new_v4().to_string(),
            log_unique_id: result.log_unique_id.clone(),
            timestamp,
            source_ip: result.source_ip.clone(),
            source_port: result.source_port,
            destination_ip: result.dest_ip.clone(),
            destination_port: result.dest_port,
            target_website: result.target_website.clone(),
            uri: result.uri.clone(),
            method: result.method.clone(),
            status_code: result.status_code,
            user_agent: result.user_agent.clone(),
            attack_type,
            severity,
            is_attack: result.is_attack,
            is_blocked: result.is_blocked,
            risk_score: risk,
            anomaly_score: result.anomaly_score,
            rules_matched: result.rule_ids.clone(),
            rule_files: result.rule_files.clone(),
            request_headers: Value::Object(tx.request.headers.clone()),
            request_body: tx.request.body.clone(),
            response_headers: Value::Object(tx.response.headers.clone()),
            response_body: tx.response.body.clone(),
            geo_location: None,
        };

        let legacy = LegacyShadowRecord {
            log_unique_id: result.log_unique_id,
            timestamp,
            source_ip: result.source_ip,
            source_port: result.source_port,
            dest_ip: result.dest_ip,
            dest_port: result.dest_port,
            target_website: result.target_website,
            method: result.method,
            uri: result.uri,
            status_code: result.status_code,
            is_blocked: result.is_blocked,
            is_attack: result.is_attack,
            attack_types: result.attack_types,
            rule_ids: result.rule_ids,
            rule_files: result.rule_files,
            severity_score: result.severity_score,
            anomaly_score: result.anomaly_score,
            raw_log: raw,
        };

        BuiltEvent { event, legacy }
    }
}
