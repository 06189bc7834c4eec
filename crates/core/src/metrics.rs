//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 구성 요소는 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `auditflow_`
//! - 구성 요소명: `ingest_`, `detection_`, `storage_`, `notifier_`, `daemon_`
//! - 접미어: `_total` (counter), `_seconds` (histogram/latency), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(auditflow_core::metrics::INGEST_LINES_READ_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 심각도 레이블 키 (low, medium, high, critical)
pub const LABEL_SEVERITY: &str = "severity";

/// 배치 모드 레이블 키 (steady, backlog)
pub const LABEL_MODE: &str = "mode";

/// 드롭 사유 레이블 키 (unparsable, invalid, too_long)
pub const LABEL_REASON: &str = "reason";

// ─── Ingest 메트릭 ─────────────────────────────────────────────────

/// Ingest: 읽은 완전한 라인 수 (counter)
pub const INGEST_LINES_READ_TOTAL: &str = "auditflow_ingest_lines_read_total";

/// Ingest: 복구 후 파싱에 성공한 라인 수 (counter)
pub const INGEST_LINES_REPAIRED_TOTAL: &str = "auditflow_ingest_lines_repaired_total";

/// Ingest: 버려진 라인 수 (counter, label: reason)
pub const INGEST_LINES_DROPPED_TOTAL: &str = "auditflow_ingest_lines_dropped_total";

/// Ingest: 커밋된 체크포인트 오프셋 (gauge, 바이트)
pub const INGEST_CHECKPOINT_OFFSET: &str = "auditflow_ingest_checkpoint_offset_bytes";

/// Ingest: 로테이션/절단 감지 횟수 (counter)
pub const INGEST_ROTATIONS_TOTAL: &str = "auditflow_ingest_rotations_total";

/// Ingest: 배치 처리 소요 시간 (histogram, 초, label: mode)
pub const INGEST_BATCH_DURATION_SECONDS: &str = "auditflow_ingest_batch_duration_seconds";

// ─── Detection 메트릭 ───────────────────────────────────────────────

/// Detection: 공격으로 분류된 이벤트 수 (counter, label: severity)
pub const DETECTION_ATTACKS_TOTAL: &str = "auditflow_detection_attacks_total";

/// Detection: 차단된 이벤트 수 (counter, label: severity)
pub const DETECTION_BLOCKED_TOTAL: &str = "auditflow_detection_blocked_total";

// ─── Storage 메트릭 ─────────────────────────────────────────────────

/// Storage: 새로 저장된 이벤트 수 (counter)
pub const STORAGE_EVENTS_STORED_TOTAL: &str = "auditflow_storage_events_stored_total";

/// Storage: 중복으로 건너뛴 이벤트 수 (counter)
pub const STORAGE_DUPLICATES_SKIPPED_TOTAL: &str = "auditflow_storage_duplicates_skipped_total";

/// Storage: 실패 후 롤백된 배치 수 (counter)
pub const STORAGE_BATCH_FAILURES_TOTAL: &str = "auditflow_storage_batch_failures_total";

// ─── Notifier 메트릭 ────────────────────────────────────────────────

/// Notifier: 전송 시도 수 (counter)
pub const NOTIFIER_SENT_TOTAL: &str = "auditflow_notifier_sent_total";

/// Notifier: 실패한 알림 수 (counter)
pub const NOTIFIER_FAILED_TOTAL: &str = "auditflow_notifier_failed_total";

/// Notifier: 동시 요청 한도 초과로 버린 알림 수 (counter)
pub const NOTIFIER_DROPPED_TOTAL: &str = "auditflow_notifier_dropped_total";

// ─── Daemon 메트릭 ──────────────────────────────────────────────────

/// Daemon: 가동 시간 (gauge, 초)
pub const DAEMON_UPTIME_SECONDS: &str = "auditflow_daemon_uptime_seconds";

/// Daemon: 빌드 정보 (gauge, 항상 1, label: version)
pub const DAEMON_BUILD_INFO: &str = "auditflow_daemon_build_info";

// ─── 히스토그램 버킷 정의 ────────────────────────────────────────────

/// 배치 처리 소요 시간 히스토그램 버킷 (초)
///
/// 1ms ~ 60s 범위 (백로그 배치는 수천 건을 한 트랜잭션에 씀)
pub const BATCH_DURATION_BUCKETS: [f64; 10] =
    [0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 60.0];

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 이 함수는 전역 레코더 설치 후 한 번만 호출해야 합니다.
/// 일반적으로 `auditflow-daemon`의 시작 시점에서 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    // Ingest
    describe_counter!(
        INGEST_LINES_READ_TOTAL,
        "Complete lines read from the audit log"
    );
    describe_counter!(
        INGEST_LINES_REPAIRED_TOTAL,
        "Lines that decoded only after malformed-JSON repair"
    );
    describe_counter!(
        INGEST_LINES_DROPPED_TOTAL,
        "Lines dropped as unparsable, invalid, or too long"
    );
    describe_gauge!(
        INGEST_CHECKPOINT_OFFSET,
        "Byte offset of the last committed checkpoint"
    );
    describe_counter!(
        INGEST_ROTATIONS_TOTAL,
        "Detected log truncations or rotations"
    );
    describe_histogram!(
        INGEST_BATCH_DURATION_SECONDS,
        "Time to classify, persist and checkpoint one batch"
    );

    // Detection
    describe_counter!(
        DETECTION_ATTACKS_TOTAL,
        "Stored events classified as attacks, by severity"
    );
    describe_counter!(
        DETECTION_BLOCKED_TOTAL,
        "Stored events classified as blocked, by severity"
    );

    // Storage
    describe_counter!(
        STORAGE_EVENTS_STORED_TOTAL,
        "Security events newly written to the store"
    );
    describe_counter!(
        STORAGE_DUPLICATES_SKIPPED_TOTAL,
        "Events skipped because their transaction id was already stored"
    );
    describe_counter!(
        STORAGE_BATCH_FAILURES_TOTAL,
        "Batches rolled back after a write failure"
    );

    // Notifier
    describe_counter!(NOTIFIER_SENT_TOTAL, "Change notifications attempted");
    describe_counter!(
        NOTIFIER_FAILED_TOTAL,
        "Change notifications that failed or timed out"
    );
    describe_counter!(
        NOTIFIER_DROPPED_TOTAL,
        "Change notifications dropped because too many were in flight"
    );

    // Daemon
    describe_gauge!(DAEMON_UPTIME_SECONDS, "Daemon uptime in seconds");
    describe_gauge!(
        DAEMON_BUILD_INFO,
        "Build information (always 1, with version label)"
    );
}
