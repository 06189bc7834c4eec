//! 공격 탐지 엔진 -- 트랜잭션 하나를 분류 결과로 변환하는 순수 함수
//!
//! [`AttackDetectionEngine`]은 외부 상태 없이 매칭된 규칙 목록만으로
//! 공격 유형, 이상 점수, 공격/차단 여부를 도출합니다.
//! 같은 입력에는 항상 같은 결과를 돌려주므로 배치 내에서 병렬로 호출해도 안전합니다.
//!
//! # 분류 순서 (규칙 파일당 첫 일치)
//! 1. 이름 있는 테이블 ([`patterns::ATTACK_RULE_PATTERNS`])
//! 2. 번호 붙은 `REQUEST-*-ATTACK-*` 규칙군 (접미사 추출)
//! 3. `CUSTOM`/`LOCAL`/`SITE` 규칙군 (`CUSTOM_` 접두사)
//! 4. 파일명에 `ATTACK` 키워드만 있는 경우

pub mod patterns;

use chrono::NaiveDateTime;
use regex::Regex;
use tracing::debug;

use crate::error::LogPipelineError;
use crate::parser::Transaction;

use patterns::{
    ANOMALY_SCORE_MARKER, BARE_ATTACK, BLOCKING_RULE_ID, CUSTOM_ATTACK, CUSTOM_ATTACK_EXTRACT,
    CUSTOM_ATTACK_PATTERN, GENERIC_ATTACK_EXTRACT, GENERIC_ATTACK_PATTERN, UNKNOWN_ATTACK,
    VIOLATION_MARKERS,
};

/// 트랜잭션 타임스탬프 형식
pub const TIMESTAMP_FORMAT: &str = "%a %b %d %H:%M:%S %Y";

/// 출발지 IP가 없을 때의 값
pub const UNKNOWN_SOURCE_IP: &str = "unknown";

/// 기본 차단 임계값
pub const DEFAULT_BLOCKING_THRESHOLD: u32 = 5;

/// 분류 결과
///
/// 네트워크 튜플과 요청 요약, 규칙 분석 결과를 함께 담습니다.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationResult {
    pub log_unique_id: String,
    /// 파싱 실패 시 `None` (빌더가 수집 시각으로 대체)
    pub timestamp: Option<NaiveDateTime>,
    pub source_ip: String,
    pub source_port: Option<u16>,
    pub dest_ip: Option<String>,
    pub dest_port: Option<u16>,
    pub target_website: Option<String>,
    pub method: String,
    pub uri: String,
    pub status_code: Option<u16>,
    pub user_agent: String,
    /// 분류된 공격 유형 (발견 순서, 중복 없음)
    pub attack_types: Vec<String>,
    /// 매칭된 모든 규칙 ID (평가 규칙 포함)
    pub rule_ids: Vec<String>,
    /// 매칭된 규칙 파일 (발견 순서, 중복 없음)
    pub rule_files: Vec<String>,
    pub severity_score: u32,
    /// 매칭 전체에서의 최댓값
    pub anomaly_score: u32,
    /// 평가 규칙이 아닌 위반이 있었는지
    pub has_violation: bool,
    /// 차단 판정 규칙이 발동했는지
    pub has_blocking_rule: bool,
    pub is_attack: bool,
    pub is_blocked: bool,
}

/// 공격 탐지 엔진
#[derive(Debug, Clone)]
pub struct AttackDetectionEngine {
    blocking_threshold: u32,
    generic: Regex,
    generic_extract: Regex,
    custom: Regex,
    custom_extract: Regex,
}

impl AttackDetectionEngine {
    /// 차단 임계값으로 엔진을 생성합니다.
    pub fn new(blocking_threshold: u32) -> Result<Self, LogPipelineError> {
        Ok(Self {
            blocking_threshold,
            generic: Regex::new(GENERIC_ATTACK_PATTERN)?,
            generic_extract: Regex::new(GENERIC_ATTACK_EXTRACT)?,
            custom: Regex::new(CUSTOM_ATTACK_PATTERN)?,
            custom_extract: Regex::new(CUSTOM_ATTACK_EXTRACT)?,
        })
    }

    /// 차단 임계값
    pub fn blocking_threshold(&self) -> u32 {
        self.blocking_threshold
    }

    /// 트랜잭션을 분류합니다.
    pub fn classify(&self, tx: &Transaction) -> ClassificationResult {
        let mut attack_types: Vec<String> = Vec::new();
        let mut rule_ids = Vec::new();
        let mut rule_files: Vec<String> = Vec::new();
        let mut severity_score = 0u32;
        let mut anomaly_score = 0u32;
        let mut has_violation = false;
        let mut has_blocking_rule = false;

        for msg in &tx.messages {
            let details = &msg.details;

            if !details.rule_id.is_empty() {
                rule_ids.push(details.rule_id.clone());
                if details.rule_id == BLOCKING_RULE_ID {
                    has_blocking_rule = true;
                }
                if !patterns::is_evaluation_rule(&details.rule_id)
                    && is_violation_file(&details.file)
                {
                    has_violation = true;
                }
            }

            if !details.file.is_empty() {
                if !rule_files.contains(&details.file) {
                    rule_files.push(details.file.clone());
                }
                if let Some(attack_type) = self.classify_rule_file(&details.file) {
                    if !attack_types.contains(&attack_type) {
                        attack_types.push(attack_type);
                    }
                }
            }

            severity_score = severity_score.saturating_add(details.severity.unwrap_or(0));

            if let Some(score) = embedded_anomaly_score(&msg.message, &details.match_text, &details.data)
            {
                anomaly_score = anomaly_score.max(score);
            }
        }

        let status_code = tx.response.http_code;
        let is_attack = !attack_types.is_empty() || has_violation;
        let is_blocked = (has_blocking_rule && anomaly_score >= self.blocking_threshold)
            || (has_violation && status_code == Some(403));

        if !tx.messages.is_empty() {
            debug!(
                unique_id = tx.unique_id.as_deref().unwrap_or_default(),
                violation = has_violation,
                blocking_rule = has_blocking_rule,
                types = ?attack_types,
                anomaly_score,
                is_attack,
                is_blocked,
                "transaction classified"
            );
        }
        if has_violation && attack_types.is_empty() {
            debug!(
                rule_files = ?rule_files.iter().take(3).collect::<Vec<_>>(),
                "violation without identified attack type"
            );
        }

        ClassificationResult {
            log_unique_id: tx.unique_id.clone().unwrap_or_default(),
            timestamp: tx.time_stamp.as_deref().and_then(parse_timestamp),
            source_ip: tx
                .client_ip
                .clone()
                .unwrap_or_else(|| UNKNOWN_SOURCE_IP.to_owned()),
            source_port: tx.client_port,
            dest_ip: tx.host_ip.clone(),
            dest_port: tx.host_port,
            target_website: tx.request.header("Host").map(str::to_owned),
            method: tx.request.method.clone().unwrap_or_default(),
            uri: tx.request.uri.clone().unwrap_or_default(),
            status_code,
            user_agent: tx
                .request
                .header("User-Agent")
                .unwrap_or_default()
                .to_owned(),
            attack_types,
            rule_ids,
            rule_files,
            severity_score,
            anomaly_score,
            has_violation,
            has_blocking_rule,
            is_attack,
            is_blocked,
        }
    }

    /// 규칙 파일 경로를 공격 유형으로 분류합니다.
    ///
    /// 디렉터리를 제외한 파일명만 비교합니다.
    pub fn classify_rule_file(&self, rule_file: &str) -> Option<String> {
        let name = patterns::file_name(rule_file);

        if let Some(attack_type) = patterns::named_attack_type(name) {
            return Some(attack_type.to_owned());
        }

        if self.generic.is_match(name) {
            let extracted = self
                .generic_extract
                .captures(name)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().replace('-', "_"));
            return Some(extracted.unwrap_or_else(|| UNKNOWN_ATTACK.to_owned()));
        }

        if self.custom.is_match(name) {
            let extracted = self
                .custom_extract
                .captures(name)
                .and_then(|caps| caps.get(2))
                .map(|m| format!("CUSTOM_{}", m.as_str()).replace('-', "_"));
            return Some(extracted.unwrap_or_else(|| CUSTOM_ATTACK.to_owned()));
        }

        if name.to_uppercase().contains(BARE_ATTACK) {
            return Some(BARE_ATTACK.to_owned());
        }

        None
    }
}

/// 평가 규칙이 아닌 규칙의 파일이 실제 위반을 나타내는지 확인합니다.
fn is_violation_file(rule_file: &str) -> bool {
    if rule_file.is_empty() {
        return false;
    }
    let upper = rule_file.to_uppercase();
    VIOLATION_MARKERS.iter().any(|marker| upper.contains(marker))
}

/// 메시지에 포함된 이상 점수를 추출합니다.
///
/// 점수 메시지의 `match` 텍스트(`Value: `10'`)를 먼저 보고,
/// `data` 텍스트(`... Score 10 ...`)도 함께 확인해 큰 값을 사용합니다.
pub fn embedded_anomaly_score(message: &str, match_text: &str, data: &str) -> Option<u32> {
    let from_match = message
        .contains(ANOMALY_SCORE_MARKER)
        .then(|| between(match_text, "Value: `", '\''))
        .flatten();

    let from_data = data
        .contains(ANOMALY_SCORE_MARKER)
        .then(|| between(data, "Score ", ' '))
        .flatten();

    match (from_match, from_data) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

fn between(text: &str, start: &str, end: char) -> Option<u32> {
    let (_, rest) = text.split_once(start)?;
    let value = rest.split(end).next().unwrap_or(rest);
    value.trim().parse().ok()
}

/// `"Mon Aug 11 09:19:10 2025"` 형식의 타임스탬프를 파싱합니다.
///
/// 연속 공백(한 자리 날짜 패딩)을 허용하고, 요일 표기는 검증하지 않습니다.
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.len() == 5 {
        let without_weekday = tokens[1..].join(" ");
        if let Ok(ts) = NaiveDateTime::parse_from_str(&without_weekday, "%b %d %H:%M:%S %Y") {
            return Some(ts);
        }
    }
    NaiveDateTime::parse_from_str(&tokens.join(" "), TIMESTAMP_FORMAT).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{AuditLine, Transaction};
    use chrono::NaiveDate;
    use serde_json::{Value, json};

    fn engine() -> AttackDetectionEngine {
        AttackDetectionEngine::new(DEFAULT_BLOCKING_THRESHOLD).unwrap()
    }

    fn tx(status: u16, messages: Value) -> Transaction {
        serde_json::from_value::<AuditLine>(json!({"transaction": {
            "unique_id": "tx-1",
            "time_stamp": "Mon Aug 11 09:19:10 2025",
            "client_ip": "203.0.113.7",
            "client_port": 40000,
            "host_ip": "10.0.0.2",
            "host_port": 443,
            "request": {
                "method": "GET",
                "uri": "/?q=1",
                "headers": {"host": "shop.example", "user-agent": "sqlmap/1.7"}
            },
            "response": {"http_code": status},
            "messages": messages
        }}))
        .unwrap()
        .transaction
        .unwrap()
    }

    fn rule(id: &str, file: &str, severity: &str) -> Value {
        json!({"message": "rule", "details": {"ruleId": id, "file": file, "severity": severity}})
    }

    fn blocking(score: u32) -> Value {
        json!({
            "message": "Inbound Anomaly Score Exceeded (Total Score: 10)",
            "details": {
                "ruleId": "949110",
                "file": "/etc/crs/rules/REQUEST-949-BLOCKING-EVALUATION.conf",
                "severity": "0",
                "match": format!("Matched \"Operator `Ge' with parameter `5' against variable `TX:BLOCKING_INBOUND_ANOMALY_SCORE' (Value: `{score}' )")
            }
        })
    }

    const XSS: &str = "/etc/crs/rules/REQUEST-941-APPLICATION-ATTACK-XSS.conf";
    const SQLI: &str = "/etc/crs/rules/REQUEST-942-APPLICATION-ATTACK-SQLI.conf";

    #[test]
    fn no_matches_is_benign() {
        let result = engine().classify(&tx(200, json!([])));
        assert!(!result.is_attack);
        assert!(!result.is_blocked);
        assert!(result.attack_types.is_empty());
        assert_eq!(result.anomaly_score, 0);
        assert_eq!(result.severity_score, 0);
    }

    #[test]
    fn blocking_rule_alone_with_score_ten_is_blocked() {
        let result = engine().classify(&tx(200, json!([blocking(10)])));
        assert!(result.is_blocked);
        assert_eq!(result.anomaly_score, 10);
        // 평가 규칙만으로는 공격 유형이 생기지 않음
        assert!(!result.has_violation);
        assert!(result.attack_types.is_empty());
        assert!(!result.is_attack);
        assert_eq!(result.rule_ids, vec!["949110"]);
    }

    #[test]
    fn blocking_rule_below_threshold_is_not_blocked() {
        let result = engine().classify(&tx(200, json!([blocking(3)])));
        assert!(!result.is_blocked);
        assert_eq!(result.anomaly_score, 3);
    }

    #[test]
    fn xss_and_sqli_with_403_are_blocked_attack() {
        let result = engine().classify(&tx(
            403,
            json!([rule("941100", XSS, "2"), rule("942100", SQLI, "2")]),
        ));
        assert!(result.is_attack);
        assert!(result.is_blocked);
        assert_eq!(result.attack_types, vec!["XSS", "SQLI"]);
        assert_eq!(result.severity_score, 4);
    }

    #[test]
    fn bare_403_without_violation_is_not_blocked() {
        let result = engine().classify(&tx(
            403,
            json!([rule("980170", "/rules/RESPONSE-980-CORRELATION.conf", "0")]),
        ));
        assert!(!result.is_blocked);
        assert!(!result.is_attack);
    }

    #[test]
    fn violation_without_type_is_still_attack() {
        // PROTOCOL 키워드만 있는 규칙 파일: 테이블에 없지만 위반
        let result = engine().classify(&tx(
            200,
            json!([rule("920999", "/rules/LOCAL-PROTOCOL-CHECKS.conf", "0")]),
        ));
        assert!(result.has_violation);
        assert!(result.attack_types.is_empty());
        assert!(result.is_attack);
        assert!(!result.is_blocked);
    }

    #[test]
    fn multipart_file_counts_as_violation() {
        let result = engine().classify(&tx(
            403,
            json!([rule("922110", "/rules/REQUEST-922-MULTIPART-ATTACK.conf", "0")]),
        ));
        assert!(result.has_violation);
        assert!(result.is_blocked);
        assert_eq!(result.attack_types, vec!["MULTIPART"]);
    }

    #[test]
    fn rule_without_id_classifies_type_but_not_violation() {
        let result = engine().classify(&tx(403, json!([rule("", XSS, "2")])));
        assert_eq!(result.attack_types, vec!["XSS"]);
        assert!(result.rule_ids.is_empty());
        assert!(!result.has_violation);
        assert!(result.is_attack);
        assert!(!result.is_blocked);
    }

    #[test]
    fn duplicate_files_and_types_are_collapsed() {
        let result = engine().classify(&tx(
            200,
            json!([rule("942100", SQLI, "2"), rule("942110", SQLI, "3"), rule("942100", SQLI, "x")]),
        ));
        assert_eq!(result.attack_types, vec!["SQLI"]);
        assert_eq!(result.rule_files, vec![SQLI]);
        assert_eq!(result.rule_ids, vec!["942100", "942110", "942100"]);
        assert_eq!(result.severity_score, 5);
    }

    #[test]
    fn anomaly_score_keeps_maximum() {
        let result = engine().classify(&tx(
            200,
            json!([
                blocking(7),
                blocking(15),
                {"message": "x", "details": {"ruleId": "980130", "data": "Inbound Anomaly Score 12 exceeded"}}
            ]),
        ));
        assert_eq!(result.anomaly_score, 15);
        assert!(result.is_blocked);
    }

    #[test]
    fn classification_is_deterministic() {
        let input = tx(
            403,
            json!([rule("941100", XSS, "2"), rule("942100", SQLI, "5"), blocking(25)]),
        );
        let engine = engine();
        let first = engine.classify(&input);
        for _ in 0..10 {
            assert_eq!(engine.classify(&input), first);
        }
    }

    #[test]
    fn network_tuple_and_headers_are_extracted() {
        let result = engine().classify(&tx(200, json!([])));
        assert_eq!(result.log_unique_id, "tx-1");
        assert_eq!(result.source_ip, "203.0.113.7");
        assert_eq!(result.source_port, Some(40000));
        assert_eq!(result.dest_ip.as_deref(), Some("10.0.0.2"));
        assert_eq!(result.dest_port, Some(443));
        assert_eq!(result.target_website.as_deref(), Some("shop.example"));
        assert_eq!(result.user_agent, "sqlmap/1.7");
        assert_eq!(result.status_code, Some(200));
        assert_eq!(
            result.timestamp,
            NaiveDate::from_ymd_opt(2025, 8, 11).unwrap().and_hms_opt(9, 19, 10)
        );
    }

    #[test]
    fn classify_rule_file_fallbacks() {
        let engine = engine();
        assert_eq!(
            engine.classify_rule_file("REQUEST-950-APPLICATION-ATTACK-GRAPHQL.conf"),
            Some("GRAPHQL".to_owned())
        );
        assert_eq!(
            engine.classify_rule_file("REQUEST-950-APPLICATION-ATTACK-BAD-BOTS.conf"),
            Some("BAD_BOTS".to_owned())
        );
        assert_eq!(
            engine.classify_rule_file("REQUEST-951-ATTACK-123.conf"),
            Some(UNKNOWN_ATTACK.to_owned())
        );
        assert_eq!(
            engine.classify_rule_file("/opt/rules/LOCAL-100-SHOP-ATTACK-CART-ABUSE.conf"),
            Some("CUSTOM_CART_ABUSE".to_owned())
        );
        assert_eq!(
            engine.classify_rule_file("SITE-7-ATTACK-9.conf"),
            Some(CUSTOM_ATTACK.to_owned())
        );
        assert_eq!(
            engine.classify_rule_file("my-attack-rules.conf"),
            Some(BARE_ATTACK.to_owned())
        );
        assert_eq!(engine.classify_rule_file("RESPONSE-950-DATA-LEAKAGES.conf"), None);
    }

    #[test]
    fn classify_uses_file_name_only() {
        // 디렉터리 이름의 ATTACK은 무시
        assert_eq!(engine().classify_rule_file("/ATTACK/rules/plain.conf"), None);
    }

    #[test]
    fn embedded_score_sources() {
        assert_eq!(
            embedded_anomaly_score("Inbound Anomaly Score Exceeded", "(Value: `42' )", ""),
            Some(42)
        );
        assert_eq!(
            embedded_anomaly_score("other", "(Value: `42' )", ""),
            None
        );
        assert_eq!(
            embedded_anomaly_score("other", "", "Inbound Anomaly Score 9 reached"),
            Some(9)
        );
        assert_eq!(
            embedded_anomaly_score("Inbound Anomaly Score", "Value: `abc'", ""),
            None
        );
    }

    #[test]
    fn timestamp_parsing() {
        let expected = NaiveDate::from_ymd_opt(2025, 8, 1)
            .unwrap()
            .and_hms_opt(9, 19, 10);
        assert_eq!(parse_timestamp("Fri Aug  1 09:19:10 2025"), expected);
        // 요일 불일치도 허용
        assert_eq!(parse_timestamp("Mon Aug 01 09:19:10 2025"), expected);
        assert_eq!(parse_timestamp("2025-08-01T09:19:10Z"), None);
        assert_eq!(parse_timestamp(""), None);
    }
}
