//! 저장소 스키마
//!
//! 연결 시 `CREATE ... IF NOT EXISTS`로 적용합니다. JSON 컬럼은 JSON 텍스트,
//! 시각은 sqlx chrono 인코딩(`YYYY-MM-DD HH:MM:SS`)으로 저장됩니다.

/// 레거시 미러 테이블
pub const CREATE_WAF_LOGS: &str = r#"
CREATE TABLE IF NOT EXISTS waf_logs (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    log_unique_id   TEXT    NOT NULL UNIQUE,
    timestamp       TEXT    NOT NULL,
    source_ip       TEXT    NOT NULL,
    source_port     INTEGER,
    dest_ip         TEXT,
    dest_port       INTEGER,
    target_website  TEXT,
    method          TEXT    NOT NULL,
    uri             TEXT    NOT NULL,
    status_code     INTEGER,
    is_blocked      BOOLEAN NOT NULL DEFAULT 0,
    is_attack       BOOLEAN NOT NULL DEFAULT 0,
    attack_types    TEXT    NOT NULL DEFAULT '[]',
    rule_ids        TEXT    NOT NULL DEFAULT '[]',
    rule_files      TEXT    NOT NULL DEFAULT '[]',
    severity_score  INTEGER NOT NULL DEFAULT 0,
    anomaly_score   INTEGER NOT NULL DEFAULT 0,
    raw_log         TEXT    NOT NULL,
    created_at      TEXT    NOT NULL DEFAULT CURRENT_TIMESTAMP
)"#;

/// 보안 이벤트 테이블
pub const CREATE_SECURITY_EVENTS: &str = r#"
CREATE TABLE IF NOT EXISTS security_events (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    event_id          TEXT    NOT NULL UNIQUE,
    log_unique_id     TEXT    NOT NULL,
    timestamp         TEXT    NOT NULL,
    source_ip         TEXT    NOT NULL,
    source_port       INTEGER,
    destination_ip    TEXT,
    destination_port  INTEGER,
    target_website    TEXT,
    uri               TEXT    NOT NULL,
    method            TEXT    NOT NULL,
    status_code       INTEGER,
    user_agent        TEXT    NOT NULL DEFAULT '',
    attack_type       TEXT,
    severity          TEXT    NOT NULL,
    is_attack         BOOLEAN NOT NULL DEFAULT 0,
    is_blocked        BOOLEAN NOT NULL DEFAULT 0,
    risk_score        REAL    NOT NULL DEFAULT 0,
    anomaly_score     INTEGER NOT NULL DEFAULT 0,
    rules_matched     TEXT    NOT NULL DEFAULT '[]',
    rule_files        TEXT    NOT NULL DEFAULT '[]',
    request_headers   TEXT    NOT NULL DEFAULT '{}',
    request_body      TEXT    NOT NULL DEFAULT '',
    response_headers  TEXT    NOT NULL DEFAULT '{}',
    response_body     TEXT    NOT NULL DEFAULT '',
    geo_location      TEXT,
    created_at        TEXT    NOT NULL DEFAULT CURRENT_TIMESTAMP
)"#;

/// 적용 순서대로 나열한 스키마 문장
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_WAF_LOGS,
    CREATE_SECURITY_EVENTS,
    "CREATE INDEX IF NOT EXISTS idx_timestamp_attack ON security_events (timestamp, is_attack)",
    "CREATE INDEX IF NOT EXISTS idx_source_ip_timestamp ON security_events (source_ip, timestamp)",
    "CREATE INDEX IF NOT EXISTS idx_attack_type_severity ON security_events (attack_type, severity)",
    "CREATE INDEX IF NOT EXISTS idx_security_events_log_unique_id ON security_events (log_unique_id)",
];

/// `waf_logs` INSERT 컬럼 (바인딩 순서)
pub const WAF_LOG_COLUMNS: &str = "log_unique_id, timestamp, source_ip, source_port, dest_ip, \
     dest_port, target_website, method, uri, status_code, is_blocked, is_attack, attack_types, \
     rule_ids, rule_files, severity_score, anomaly_score, raw_log";

/// `security_events` INSERT 컬럼 (바인딩 순서)
pub const SECURITY_EVENT_COLUMNS: &str = "event_id, log_unique_id, timestamp, source_ip, \
     source_port, destination_ip, destination_port, target_website, uri, method, status_code, \
     user_agent, attack_type, severity, is_attack, is_blocked, risk_score, anomaly_score, \
     rules_matched, rule_files, request_headers, request_body, response_headers, response_body, \
     geo_location";

/// `waf_logs` 컬럼 수
pub const WAF_LOG_COLUMN_COUNT: usize = 18;
/// `security_events` 컬럼 수
pub const SECURITY_EVENT_COLUMN_COUNT: usize = 25;
