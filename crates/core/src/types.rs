//! 도메인 타입: 시스템 전역에서 사용되는 공통 타입

use std::fmt;

use serde::{Deserialize, Serialize};

/// 보안 이벤트 심각도 버킷
///
/// `Ord` 구현으로 심각도 비교가 가능합니다 (`Low < Medium < High < Critical`).
/// 저장 시에는 소문자 문자열(`"low"`, `"critical"` 등)로 직렬화됩니다.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// 낮은 심각도
    #[default]
    Low,
    /// 중간 심각도
    Medium,
    /// 높은 심각도
    High,
    /// 치명적: 즉시 대응 필요
    Critical,
}

impl Severity {
    /// 문자열에서 심각도를 파싱합니다.
    ///
    /// 대소문자를 구분하지 않습니다.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" | "med" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" | "crit" => Some(Self::Critical),
            _ => None,
        }
    }

    /// 저장소 컬럼 값으로 사용하는 소문자 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordering() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn severity_default_is_low() {
        assert_eq!(Severity::default(), Severity::Low);
    }

    #[test]
    fn severity_display_is_lowercase() {
        assert_eq!(Severity::Low.to_string(), "low");
        assert_eq!(Severity::Critical.to_string(), "critical");
    }

    #[test]
    fn severity_from_str_loose() {
        assert_eq!(Severity::from_str_loose("LOW"), Some(Severity::Low));
        assert_eq!(Severity::from_str_loose("Med"), Some(Severity::Medium));
        assert_eq!(Severity::from_str_loose("crit"), Some(Severity::Critical));
        assert_eq!(Severity::from_str_loose("info"), None);
    }

    #[test]
    fn severity_serializes_lowercase() {
        let json = serde_json::to_string(&Severity::High).unwrap();
        assert_eq!(json, "\"high\"");
        let parsed: Severity = serde_json::from_str("\"medium\"").unwrap();
        assert_eq!(parsed, Severity::Medium);
    }
}
