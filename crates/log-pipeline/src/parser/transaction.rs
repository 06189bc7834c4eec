//! 감사 로그 트랜잭션 모델
//!
//! 한 라인은 `{"transaction": {...}}` 형태의 독립 JSON 문서입니다.
//! 필드 타입이 엔진 버전마다 조금씩 달라서 (포트가 문자열, 헤더가 null 등)
//! 모든 필드를 관대하게 역직렬화하고, 필수 필드 검증은 디코더가 담당합니다.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

/// 최상위 라인 문서
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditLine {
    #[serde(default)]
    pub transaction: Option<Transaction>,
}

/// 하나의 HTTP 요청/응답 검사 기록
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Transaction {
    #[serde(default, deserialize_with = "lenient_string")]
    pub unique_id: Option<String>,
    /// `"Mon Aug 11 09:19:10 2025"` 형식
    #[serde(default, deserialize_with = "lenient_string")]
    pub time_stamp: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub client_ip: Option<String>,
    #[serde(default, deserialize_with = "lenient_u16")]
    pub client_port: Option<u16>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub host_ip: Option<String>,
    #[serde(default, deserialize_with = "lenient_u16")]
    pub host_port: Option<u16>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub request: Request,
    #[serde(default, deserialize_with = "null_as_default")]
    pub response: Response,
    #[serde(default, deserialize_with = "lenient_list")]
    pub messages: Vec<RuleMessage>,
}

/// 요청 요약
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Request {
    #[serde(default, deserialize_with = "lenient_string")]
    pub method: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub uri: Option<String>,
    #[serde(default, deserialize_with = "lenient_object")]
    pub headers: Map<String, Value>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub body: String,
}

impl Request {
    /// 헤더 값을 대소문자 구분 없이 찾습니다.
    pub fn header(&self, name: &str) -> Option<&str> {
        header(&self.headers, name)
    }
}

/// 응답 요약
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Response {
    #[serde(default, deserialize_with = "lenient_u16")]
    pub http_code: Option<u16>,
    #[serde(default, deserialize_with = "lenient_object")]
    pub headers: Map<String, Value>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub body: String,
}

/// 규칙 매칭 메시지
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RuleMessage {
    #[serde(default, deserialize_with = "lenient_text")]
    pub message: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub details: RuleDetails,
}

/// 매칭된 규칙 상세
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RuleDetails {
    #[serde(rename = "ruleId", default, deserialize_with = "lenient_text")]
    pub rule_id: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub file: String,
    /// 선언된 심각도 (숫자가 아니면 `None`)
    #[serde(default, deserialize_with = "lenient_severity")]
    pub severity: Option<u32>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub data: String,
    #[serde(rename = "match", default, deserialize_with = "lenient_text")]
    pub match_text: String,
}

/// 헤더 맵에서 대소문자 구분 없이 문자열 값을 찾습니다.
pub fn header<'a>(headers: &'a Map<String, Value>, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .and_then(|(_, value)| value.as_str())
}

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

fn lenient_text<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    lenient_string(d).map(Option::unwrap_or_default)
}

fn lenient_u16<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u16>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Number(n) => n.as_u64().and_then(|v| u16::try_from(v).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_severity<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Value::String(s) if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => {
            s.parse().ok()
        }
        _ => None,
    })
}

fn lenient_object<'de, D: Deserializer<'de>>(d: D) -> Result<Map<String, Value>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Object(map) => map,
        _ => Map::new(),
    })
}

fn null_as_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}

/// 배열이 아니면 빈 목록, 형식이 잘못된 원소는 건너뜁니다.
fn lenient_list<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(match Value::deserialize(d)? {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}
