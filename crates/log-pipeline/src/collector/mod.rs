//! 로그 수집 모듈 -- 감사 로그 파일에서 아직 처리하지 않은 구간을 읽습니다.
//!
//! - [`FileTailer`]: 체크포인트 오프셋 이후의 완전한 라인만 읽는 폴링 기반 tailer
//!
//! 파일시스템 변경 알림에 의존하지 않고 고정 주기로 폴링하므로
//! 마운트된 볼륨에서도 동일하게 동작합니다.

pub mod file;

pub use file::{FileTailer, RotationReason, TailPoll, TailRead};

use bytes::Bytes;

/// 수집된 원시 라인
///
/// 개행 문자는 포함하지 않습니다. `end_offset`은 개행 다음 바이트의
/// 파일 오프셋으로, 이 라인까지 처리했을 때의 체크포인트 값입니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLine {
    /// 라인 바이트 (개행 제외)
    pub data: Bytes,
    /// 이 라인 직후의 파일 오프셋
    pub end_offset: u64,
}

impl RawLine {
    /// 새 RawLine을 생성합니다.
    pub fn new(data: Bytes, end_offset: u64) -> Self {
        Self { data, end_offset }
    }

    /// 공백만 있는 라인인지 확인합니다.
    pub fn is_blank(&self) -> bool {
        self.data.iter().all(u8::is_ascii_whitespace)
    }

    /// 로그용 미리보기 (최대 80자, 손실 UTF-8 변환)
    pub fn preview(&self) -> String {
        preview(&self.data)
    }
}

/// 로그 미리보기 최대 문자 수
pub const PREVIEW_CHARS: usize = 80;

/// 민감 정보 노출을 줄이기 위해 앞부분만 잘라낸 미리보기를 만듭니다.
pub fn preview(data: &[u8]) -> String {
    let text = String::from_utf8_lossy(data);
    let mut out: String = text.chars().take(PREVIEW_CHARS).collect();
    if text.chars().count() > PREVIEW_CHARS {
        out.push_str("...");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_line_detection() {
        assert!(RawLine::new(Bytes::from_static(b"  \t"), 3).is_blank());
        assert!(!RawLine::new(Bytes::from_static(b" {}"), 3).is_blank());
    }

    #[test]
    fn preview_is_capped() {
        let long = "x".repeat(500);
        let p = preview(long.as_bytes());
        assert_eq!(p.chars().count(), PREVIEW_CHARS + 3);
        assert!(p.ends_with("..."));

        assert_eq!(preview(b"short"), "short");
    }

    #[test]
    fn preview_handles_invalid_utf8() {
        let p = preview(&[0xff, 0xfe, b'a']);
        assert!(p.ends_with('a'));
    }
}
