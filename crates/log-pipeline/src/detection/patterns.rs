//! 규칙 파일 분류 테이블
//!
//! 공격 유형 분류는 데이터 기반입니다. 테이블 순서가 곧 우선순위이며,
//! 규칙 파일 하나당 처음 일치한 항목만 사용합니다.

/// 규칙 파일명 마커와 공격 유형의 대응
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttackPattern {
    /// 분류 결과 공격 유형
    pub attack_type: &'static str,
    /// 파일명에 포함되어야 하는 문자열 (대소문자 구분)
    pub marker: &'static str,
}

const fn pattern(attack_type: &'static str, marker: &'static str) -> AttackPattern {
    AttackPattern {
        attack_type,
        marker,
    }
}

/// 이름 있는 공격 유형 테이블 (우선순위 순)
pub const ATTACK_RULE_PATTERNS: &[AttackPattern] = &[
    pattern("XSS", "REQUEST-941-APPLICATION-ATTACK-XSS"),
    pattern("SQLI", "REQUEST-942-APPLICATION-ATTACK-SQLI"),
    pattern("LFI", "REQUEST-930-APPLICATION-ATTACK-LFI"),
    pattern("RFI", "REQUEST-931-APPLICATION-ATTACK-RFI"),
    pattern("RCE", "REQUEST-932-APPLICATION-ATTACK-RCE"),
    pattern("PHP", "REQUEST-933-APPLICATION-ATTACK-PHP"),
    pattern("NODEJS", "REQUEST-934-APPLICATION-ATTACK-NODEJS"),
    pattern("JAVA", "REQUEST-944-APPLICATION-ATTACK-JAVA"),
    pattern("SCANNER", "REQUEST-913-SCANNER-DETECTION"),
    pattern("SESSION", "REQUEST-943-APPLICATION-ATTACK-SESSION"),
    pattern("PROTOCOL", "REQUEST-920-PROTOCOL-ENFORCEMENT"),
    pattern("MULTIPART", "REQUEST-922-MULTIPART-ATTACK"),
    pattern("XML", "REQUEST-923-REQUEST-DATA"),
    pattern("XXE", "REQUEST-912-DOS-PROTECTION"),
];

/// 번호 붙은 REQUEST 규칙군 중 ATTACK 마커가 있는 파일
pub const GENERIC_ATTACK_PATTERN: &str = r"REQUEST-\d+.*-ATTACK-";
/// 일반 규칙군에서 유형 접미사 추출
pub const GENERIC_ATTACK_EXTRACT: &str = r"REQUEST-\d+.*-ATTACK-([A-Z-]+)";
/// 사용자 정의 규칙군
pub const CUSTOM_ATTACK_PATTERN: &str = r"(CUSTOM|LOCAL|SITE)-\d+.*-ATTACK-";
/// 사용자 정의 규칙군에서 유형 접미사 추출
pub const CUSTOM_ATTACK_EXTRACT: &str = r"(CUSTOM|LOCAL|SITE)-\d+.*-ATTACK-([A-Z-]+)";

/// 일반 규칙군이지만 접미사를 추출하지 못한 경우
pub const UNKNOWN_ATTACK: &str = "UNKNOWN_ATTACK";
/// 사용자 정의 규칙군이지만 접미사를 추출하지 못한 경우
pub const CUSTOM_ATTACK: &str = "CUSTOM_ATTACK";
/// 파일명에 ATTACK 키워드만 있는 경우
pub const BARE_ATTACK: &str = "ATTACK";

/// 차단 판정(이상 점수 초과) 규칙 ID
pub const BLOCKING_RULE_ID: &str = "949110";

/// 공격 시그니처가 아닌 점수/임계값 평가 규칙
pub const EVALUATION_RULE_IDS: &[&str] = &["949110", "949111", "980130", "980140", "980170"];

/// 실제 위반으로 간주하는 규칙 파일 키워드 (대문자 비교)
pub const VIOLATION_MARKERS: &[&str] = &["ATTACK", "SCANNER", "PROTOCOL", "MULTIPART"];

/// 이상 점수가 들어 있는 메시지 표식
pub const ANOMALY_SCORE_MARKER: &str = "Inbound Anomaly Score";

/// 평가 규칙인지 확인합니다.
pub fn is_evaluation_rule(rule_id: &str) -> bool {
    EVALUATION_RULE_IDS.contains(&rule_id)
}

/// 이름 있는 테이블에서 첫 번째로 일치하는 공격 유형을 찾습니다.
pub fn named_attack_type(file_name: &str) -> Option<&'static str> {
    ATTACK_RULE_PATTERNS
        .iter()
        .find(|p| file_name.contains(p.marker))
        .map(|p| p.attack_type)
}

/// 규칙 파일 경로에서 파일명만 남깁니다.
pub fn file_name(rule_file: &str) -> &str {
    rule_file.rsplit('/').next().unwrap_or(rule_file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_order_decides_precedence() {
        assert_eq!(
            named_attack_type("REQUEST-941-APPLICATION-ATTACK-XSS.conf"),
            Some("XSS")
        );
        assert_eq!(
            named_attack_type("REQUEST-912-DOS-PROTECTION.conf"),
            Some("XXE")
        );
        assert_eq!(named_attack_type("RESPONSE-950-DATA-LEAKAGES.conf"), None);
    }

    #[test]
    fn markers_are_case_sensitive() {
        assert_eq!(
            named_attack_type("request-941-application-attack-xss.conf"),
            None
        );
    }

    #[test]
    fn evaluation_rules() {
        assert!(is_evaluation_rule(BLOCKING_RULE_ID));
        assert!(is_evaluation_rule("980170"));
        assert!(!is_evaluation_rule("942100"));
    }

    #[test]
    fn file_name_strips_directories() {
        assert_eq!(
            file_name("/etc/crs/rules/REQUEST-942-APPLICATION-ATTACK-SQLI.conf"),
            "REQUEST-942-APPLICATION-ATTACK-SQLI.conf"
        );
        assert_eq!(file_name("plain.conf"), "plain.conf");
    }
}
