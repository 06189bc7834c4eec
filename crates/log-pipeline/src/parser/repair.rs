//! 손상된 감사 로그 라인 복구
//!
//! WAF 엔진은 가끔 `components` 배열 안의 버전 문자열을 잘못 이스케이프해
//! 유효하지 않은 JSON을 기록합니다. 디코딩 전에 알려진 패턴을 순서대로 고치고,
//! 그래도 실패하면 `components` 배열 전체를 정규 값으로 바꾸고 중복된 따옴표를
//! 합치는 2차 복구를 시도합니다.

use std::borrow::Cow;

use regex::{NoExpand, Regex};
use serde_json::Value;

use crate::error::LogPipelineError;

/// 복구 단계
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairLevel {
    /// 수정 없이 디코딩됨
    Clean,
    /// 1차 패턴 치환 후 디코딩됨
    Patched,
    /// 2차(공격적) 복구 후 디코딩됨
    Rebuilt,
}

impl RepairLevel {
    /// 원본 라인이 수정되었는지 확인합니다.
    pub fn is_repaired(&self) -> bool {
        !matches!(self, Self::Clean)
    }
}

/// 라인 복구기
///
/// 정규식은 생성 시 한 번만 컴파일합니다.
#[derive(Debug, Clone)]
pub struct LineRepairer {
    canonical: String,
    canonical_array: String,
    escaped_quote_artifact: String,
    doubled_quote_artifact: String,
    repaired_version: String,
    broken_version: Regex,
    components_array: Regex,
}

impl LineRepairer {
    /// 정규 components 값(예: `OWASP_CRS/4.17.1`)으로 복구기를 생성합니다.
    pub fn new(canonical: &str) -> Result<Self, LogPipelineError> {
        let product = canonical.split('/').next().unwrap_or(canonical);
        let broken_version = Regex::new(&format!(
            r#""components":\["{}/[^"]*\\+"*\]"#,
            regex::escape(product)
        ))?;
        let components_array = Regex::new(r#""components":\[[^\]]*\]"#)?;

        Ok(Self {
            canonical: canonical.to_owned(),
            canonical_array: format!(r#""components":["{canonical}"]"#),
            escaped_quote_artifact: format!(r#"{canonical}\"""#),
            doubled_quote_artifact: format!(r#"{canonical}"""#),
            repaired_version: format!(r#"{canonical}""#),
            broken_version,
            components_array,
        })
    }

    /// 정규 components 값
    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    /// 1차 복구: 알려진 버전 문자열 이스케이프 오류를 고칩니다.
    pub fn patch<'a>(&self, line: &'a str) -> Cow<'a, str> {
        let mut out = Cow::Borrowed(line);

        if out.contains(&self.escaped_quote_artifact) {
            out = Cow::Owned(out.replace(&self.escaped_quote_artifact, &self.repaired_version));
        }
        if out.contains(&self.doubled_quote_artifact) {
            out = Cow::Owned(out.replace(&self.doubled_quote_artifact, &self.repaired_version));
        }
        if self.broken_version.is_match(&out) {
            let replaced = self
                .broken_version
                .replace_all(&out, NoExpand(&self.canonical_array))
                .into_owned();
            out = Cow::Owned(replaced);
        }
        out
    }

    /// 2차 복구: components 배열을 통째로 교체하고 중복 따옴표를 합칩니다.
    pub fn rebuild(&self, line: &str) -> String {
        let replaced = self
            .components_array
            .replace_all(line, NoExpand(&self.canonical_array));
        collapse_doubled_quotes(&replaced)
    }

    /// 복구를 적용하며 JSON으로 디코딩합니다.
    ///
    /// 두 단계 모두 실패하면 마지막 디코딩 에러를 반환합니다.
    pub fn decode(&self, line: &str) -> Result<(Value, RepairLevel), serde_json::Error> {
        let patched = self.patch(line);
        let level = match &patched {
            Cow::Borrowed(_) => RepairLevel::Clean,
            Cow::Owned(_) => RepairLevel::Patched,
        };

        match serde_json::from_str(&patched) {
            Ok(value) => Ok((value, level)),
            Err(_) => {
                let rebuilt = self.rebuild(&patched);
                serde_json::from_str(&rebuilt).map(|value| (value, RepairLevel::Rebuilt))
            }
        }
    }
}

/// 뒤에 세 번째 따옴표가 오지 않는 `""`를 `"`로 합칩니다.
///
/// `"""`는 앞의 두 개가 아닌 뒤의 두 개가 합쳐져 `""`가 됩니다.
pub fn collapse_doubled_quotes(line: &str) -> String {
    let bytes = line.as_bytes();
    let mut out = String::with_capacity(line.len());
    let mut segment_start = 0;
    let mut i = 0;

    while i + 1 < bytes.len() {
        let doubled = bytes[i] == b'"' && bytes[i + 1] == b'"';
        if doubled && bytes.get(i + 2) != Some(&b'"') {
            out.push_str(&line[segment_start..i]);
            out.push('"');
            i += 2;
            segment_start = i;
        } else {
            i += 1;
        }
    }
    out.push_str(&line[segment_start..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const CANONICAL: &str = "OWASP_CRS/4.17.1";

    fn repairer() -> LineRepairer {
        LineRepairer::new(CANONICAL).unwrap()
    }

    #[test]
    fn clean_line_is_untouched() {
        let line = r#"{"transaction":{"producer":{"components":["OWASP_CRS/4.17.1"]}}}"#;
        let (value, level) = repairer().decode(line).unwrap();
        assert_eq!(level, RepairLevel::Clean);
        assert_eq!(value["transaction"]["producer"]["components"][0], CANONICAL);
    }

    #[test]
    fn doubled_quote_after_version_is_patched() {
        let line = r#"{"components":["OWASP_CRS/4.17.1""],"a":1}"#;
        let (value, level) = repairer().decode(line).unwrap();
        assert_eq!(level, RepairLevel::Patched);
        assert_eq!(value["components"][0], CANONICAL);
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn escaped_quote_after_version_is_patched() {
        let line = r#"{"components":["OWASP_CRS/4.17.1\""],"a":1}"#;
        let (value, level) = repairer().decode(line).unwrap();
        assert_eq!(level, RepairLevel::Patched);
        assert_eq!(value["components"][0], CANONICAL);
    }

    #[test]
    fn other_version_with_trailing_backslashes_is_normalized() {
        let line = r#"{"components":["OWASP_CRS/4.9.0\\\"],"a":1}"#;
        let patched = repairer().patch(line);
        assert_eq!(patched, r#"{"components":["OWASP_CRS/4.17.1"],"a":1}"#);
    }

    #[test]
    fn aggressive_pass_replaces_components_array() {
        let line = r#"{"components":["ModSecurity v3" "broken"],"b":""x""}"#;
        let (value, level) = repairer().decode(line).unwrap();
        assert_eq!(level, RepairLevel::Rebuilt);
        assert_eq!(value["components"][0], CANONICAL);
        assert_eq!(value["b"], "x");
    }

    #[test]
    fn unrepairable_line_fails() {
        assert!(repairer().decode("{not json at all").is_err());
        assert!(repairer().decode(r#"{"a": [1, 2"#).is_err());
    }

    #[test]
    fn collapse_respects_triple_quotes() {
        assert_eq!(collapse_doubled_quotes(r#"a""b"#), r#"a"b"#);
        assert_eq!(collapse_doubled_quotes(r#"a"""b"#), r#"a""b"#);
        assert_eq!(collapse_doubled_quotes("\"\"\"\""), "\"\"\"");
        assert_eq!(collapse_doubled_quotes("no quotes"), "no quotes");
        assert_eq!(collapse_doubled_quotes(r#"é""ü"#), r#"é"ü"#);
    }

    #[test]
    fn custom_canonical_is_used() {
        let repairer = LineRepairer::new("CORERULESET/5.0.0").unwrap();
        let line = r#"{"components":["CORERULESET/5.0.0""]}"#;
        let (value, _) = repairer.decode(line).unwrap();
        assert_eq!(value["components"][0], "CORERULESET/5.0.0");
        assert_eq!(repairer.canonical(), "CORERULESET/5.0.0");
    }
}
