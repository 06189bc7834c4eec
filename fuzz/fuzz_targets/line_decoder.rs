#![no_main]

use bytes::Bytes;
use libfuzzer_sys::fuzz_target;
use auditflow_log_pipeline::collector::RawLine;
use auditflow_log_pipeline::detection::{AttackDetectionEngine, DEFAULT_BLOCKING_THRESHOLD};
use auditflow_log_pipeline::LineDecoder;

fuzz_target!(|data: &[u8]| {
    let Ok(decoder) = LineDecoder::new("OWASP_CRS/4.17.1") else {
        return;
    };
    let line = RawLine::new(Bytes::copy_from_slice(data), data.len() as u64);
    if let Ok(decoded) = decoder.decode(&line) {
        if let Ok(engine) = AttackDetectionEngine::new(DEFAULT_BLOCKING_THRESHOLD) {
            let _ = engine.classify(&decoded.transaction);
        }
    }
});
