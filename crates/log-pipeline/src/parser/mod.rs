//! 라인 디코딩 모듈 -- 복구, JSON 디코딩, 트랜잭션 검증
//!
//! [`LineDecoder`]는 [`RawLine`] 하나를 검증된 [`Transaction`]으로 변환합니다.
//! 실패는 항상 해당 라인에 국한되며, 호출자는 라인을 버리고 오프셋을 계속
//! 전진시킵니다.
//!
//! # 사용 예시
//! ```ignore
//! use auditflow_log_pipeline::parser::LineDecoder;
//!
//! let decoder = LineDecoder::new("OWASP_CRS/4.17.1")?;
//! let decoded = decoder.decode(&line)?;
//! println!("{:?}", decoded.transaction.unique_id);
//! ```

pub mod repair;
pub mod transaction;

pub use repair::{LineRepairer, RepairLevel};
pub use transaction::{AuditLine, Request, Response, RuleDetails, RuleMessage, Transaction};

use serde::Deserialize;
use serde_json::Value;

use crate::collector::RawLine;
use crate::error::LogPipelineError;

/// 디코딩된 라인
#[derive(Debug, Clone)]
pub struct DecodedLine {
    /// 검증된 트랜잭션
    pub transaction: Transaction,
    /// 원본 JSON 문서 (레거시 레코드에 그대로 저장)
    pub raw: Value,
    /// 적용된 복구 단계
    pub repair: RepairLevel,
}

/// 라인 디코더
#[derive(Debug, Clone)]
pub struct LineDecoder {
    repairer: LineRepairer,
}

impl LineDecoder {
    /// 복구 시 사용할 정규 components 값으로 디코더를 생성합니다.
    pub fn new(canonical_component: &str) -> Result<Self, LogPipelineError> {
        Ok(Self {
            repairer: LineRepairer::new(canonical_component)?,
        })
    }

    /// 내부 복구기
    pub fn repairer(&self) -> &LineRepairer {
        &self.repairer
    }

    /// 원시 라인을 디코딩하고 필수 필드를 검증합니다.
    ///
    /// # Errors
    /// - 복구 후에도 JSON이 아니면 `Parse`
    /// - `transaction`, `unique_id`, `request.method`, `request.uri` 중 하나라도
    ///   없거나 비어 있으면 `Validation`
    pub fn decode(&self, line: &RawLine) -> Result<DecodedLine, LogPipelineError> {
        let text = String::from_utf8_lossy(&line.data);
        let (raw, repair) =
            self.repairer
                .decode(&text)
                .map_err(|e| LogPipelineError::Parse {
                    offset: line.end_offset,
                    reason: e.to_string(),
                })?;

        let audit = AuditLine::deserialize(&raw).map_err(|e| LogPipelineError::Parse {
            offset: line.end_offset,
            reason: e.to_string(),
        })?;

        let transaction = audit
            .transaction
            .ok_or_else(|| missing("transaction"))?;
        validate(&transaction)?;

        Ok(DecodedLine {
            transaction,
            raw,
            repair,
        })
    }
}

/// 저장에 필요한 필수 필드를 검증합니다.
fn validate(tx: &Transaction) -> Result<(), LogPipelineError> {
    if is_blank(tx.unique_id.as_deref()) {
        return Err(missing("transaction.unique_id"));
    }
    if is_blank(tx.request.method.as_deref()) {
        return Err(missing("transaction.request.method"));
    }
    if is_blank(tx.request.uri.as_deref()) {
        return Err(missing("transaction.request.uri"));
    }
    Ok(())
}

fn is_blank(value: Option<&str>) -> bool {
    value.is_none_or(|v| v.trim().is_empty())
}

fn missing(field: &str) -> LogPipelineError {
    LogPipelineError::Validation {
        field: field.to_owned(),
        reason: "missing or empty".to_owned(),
    }
}
