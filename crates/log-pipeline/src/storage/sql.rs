//! SQLite 기반 이벤트 저장소
//!
//! 배치마다 `pool.begin()`으로 트랜잭션을 열고, 성공 시에만 커밋합니다.
//! 에러로 함수를 빠져나가면 트랜잭션이 drop되면서 롤백됩니다.
//!
//! 중복 판정은 `waf_logs.log_unique_id` UNIQUE 제약이 담당합니다.
//! 레거시 행이 새로 들어간 트랜잭션에 대해서만 `security_events` 행을 씁니다.

use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;
use sqlx::query_builder::Separated;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, info};

use auditflow_core::config::StorageConfig;
use auditflow_core::event::{BuiltEvent, LegacyShadowRecord, SecurityEvent};

use super::schema::{SCHEMA_STATEMENTS, SECURITY_EVENT_COLUMNS, WAF_LOG_COLUMNS};
use super::{EventStore, PersistOutcome, WriteStrategy};
use crate::error::LogPipelineError;

/// 다중 행 INSERT 한 문장당 최대 행 수
///
/// `security_events`는 행당 25개를 바인딩하므로 한 문장에 12,500개가 됩니다.
/// SQLite 3.32 이후 기본 한도([`SQLITE_MAX_VARIABLES`]) 안에 들어가야 합니다.
pub const BULK_CHUNK_ROWS: usize = 500;

/// SQLite 3.32+ 기본 `SQLITE_MAX_VARIABLE_NUMBER`
pub const SQLITE_MAX_VARIABLES: usize = 32_766;

/// 잠금 대기 시간
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// 테이블별 행 수
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreCounts {
    pub security_events: i64,
    pub waf_logs: i64,
}

/// SQLite 이벤트 저장소
#[derive(Debug, Clone)]
pub struct SqlEventStore {
    pool: SqlitePool,
}

impl SqlEventStore {
    /// 한 번 연결하고 스키마를 적용합니다. 재시도는 [`super::connect_with_retry`]가 담당합니다.
    pub async fn connect(config: &StorageConfig) -> Result<Self, LogPipelineError> {
        let options = SqliteConnectOptions::from_str(&config.database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);

        let in_memory = config.database_url.contains(":memory:");
        let mut pool_options = SqlitePoolOptions::new();
        if in_memory {
            // 연결마다 별도 DB가 되므로 단일 연결을 유지
            pool_options = pool_options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        } else {
            create_parent_dir(options.get_filename()).await?;
            pool_options = pool_options.max_connections(config.max_connections);
        }

        let pool = pool_options.connect_with(options).await?;
        let store = Self { pool };
        store.apply_schema().await?;

        info!(
            max_connections = config.max_connections,
            in_memory, "event store connected"
        );
        Ok(store)
    }

    /// 내부 커넥션 풀
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// 스키마를 적용합니다 (이미 있으면 무시).
    pub async fn apply_schema(&self) -> Result<(), LogPipelineError> {
        for statement in SCHEMA_STATEMENTS {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        debug!("event store schema applied");
        Ok(())
    }

    /// 테이블별 행 수를 조회합니다.
    pub async fn counts(&self) -> Result<StoreCounts, LogPipelineError> {
        let security_events = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM security_events")
            .fetch_one(&self.pool)
            .await?;
        let waf_logs = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM waf_logs")
            .fetch_one(&self.pool)
            .await?;
        Ok(StoreCounts {
            security_events,
            waf_logs,
        })
    }

    /// 저장된 보안 이벤트의 자연 키를 저장 순서대로 조회합니다.
    pub async fn stored_unique_ids(&self) -> Result<Vec<String>, LogPipelineError> {
        let ids = sqlx::query_scalar::<_, String>(
            "SELECT log_unique_id FROM security_events ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    /// 풀을 닫습니다.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn persist_rows(&self, batch: Vec<BuiltEvent>) -> Result<PersistOutcome, LogPipelineError> {
        let mut outcome = PersistOutcome::default();
        let mut tx = self.pool.begin().await?;

        for built in batch {
            let legacy = LegacyRow::new(&built.legacy)?;
            let mut qb = insert_legacy_query(std::slice::from_ref(&legacy));
            let inserted = qb.build().execute(&mut *tx).await?.rows_affected();

            if inserted == 0 {
                debug!(unique_id = %built.legacy.log_unique_id, "duplicate transaction skipped");
                outcome.duplicates += 1;
                continue;
            }

            let row = EventRow::new(&built.event)?;
            insert_events(&mut tx, std::slice::from_ref(&row)).await?;
            outcome.stored.push(built.event);
        }

        tx.commit().await?;
        Ok(outcome)
    }

    async fn persist_bulk(&self, batch: Vec<BuiltEvent>) -> Result<PersistOutcome, LogPipelineError> {
        let mut outcome = PersistOutcome::default();
        let mut tx = self.pool.begin().await?;

        for chunk in batch.chunks(BULK_CHUNK_ROWS) {
            let legacy_rows = chunk
                .iter()
                .map(|built| LegacyRow::new(&built.legacy))
                .collect::<Result<Vec<_>, _>>()?;

            let mut qb = insert_legacy_query(&legacy_rows);
            qb.push(" RETURNING log_unique_id");
            let returned: Vec<String> = qb.build_query_scalar().fetch_all(&mut *tx).await?;

            // 같은 청크 안의 중복은 첫 번째만 남김
            let mut fresh: HashSet<String> = returned.into_iter().collect();
            let mut selected = Vec::with_capacity(fresh.len());
            for built in chunk {
                if fresh.remove(&built.legacy.log_unique_id) {
                    selected.push(&built.event);
                } else {
                    outcome.duplicates += 1;
                }
            }

            if !selected.is_empty() {
                let event_rows = selected
                    .iter()
                    .copied()
                    .map(EventRow::new)
                    .collect::<Result<Vec<_>, _>>()?;
                insert_events(&mut tx, &event_rows).await?;
                outcome.stored.extend(selected.into_iter().cloned());
            }
        }

        tx.commit().await?;
        Ok(outcome)
    }
}

impl EventStore for SqlEventStore {
    async fn persist(
        &self,
        batch: Vec<BuiltEvent>,
        strategy: WriteStrategy,
    ) -> Result<PersistOutcome, LogPipelineError> {
        if batch.is_empty() {
            return Ok(PersistOutcome::default());
        }
        match strategy {
            WriteStrategy::Row => self.persist_rows(batch).await,
            WriteStrategy::Bulk => self.persist_bulk(batch).await,
        }
    }
}

/// JSON 컬럼 값이 미리 직렬화된 레거시 행
struct LegacyRow<'a> {
    record: &'a LegacyShadowRecord,
    attack_types: String,
    rule_ids: String,
    rule_files: String,
    raw_log: String,
}

impl<'a> LegacyRow<'a> {
    fn new(record: &'a LegacyShadowRecord) -> Result<Self, LogPipelineError> {
        Ok(Self {
            record,
            attack_types: json_text(&record.attack_types)?,
            rule_ids: json_text(&record.rule_ids)?,
            rule_files: json_text(&record.rule_files)?,
            raw_log: json_text(&record.raw_log)?,
        })
    }

    fn bind<'args>(&'args self, mut b: Separated<'_, 'args, Sqlite, &'static str>) {
        let r = self.record;
        b.push_bind(r.log_unique_id.as_str())
            .push_bind(r.timestamp)
            .push_bind(r.source_ip.as_str())
            .push_bind(r.source_port.map(i64::from))
            .push_bind(r.dest_ip.as_deref())
            .push_bind(r.dest_port.map(i64::from))
            .push_bind(r.target_website.as_deref())
            .push_bind(r.method.as_str())
            .push_bind(r.uri.as_str())
            .push_bind(r.status_code.map(i64::from))
            .push_bind(r.is_blocked)
            .push_bind(r.is_attack)
            .push_bind(self.attack_types.as_str())
            .push_bind(self.rule_ids.as_str())
            .push_bind(self.rule_files.as_str())
            .push_bind(i64::from(r.severity_score))
            .push_bind(i64::from(r.anomaly_score))
            .push_bind(self.raw_log.as_str());
    }
}

/// JSON 컬럼 값이 미리 직렬화된 보안 이벤트 행
struct EventRow<'a> {
    event: &'a SecurityEvent,
    rules_matched: String,
    rule_files: String,
    request_headers: String,
    response_headers: String,
    geo_location: Option<String>,
}

impl<'a> EventRow<'a> {
    fn new(event: &'a SecurityEvent) -> Result<Self, LogPipelineError> {
        Ok(Self {
            event,
            rules_matched: json_text(&event.rules_matched)?,
            rule_files: json_text(&event.rule_files)?,
            request_headers: json_text(&event.request_headers)?,
            response_headers: json_text(&event.response_headers)?,
            geo_location: event.geo_location.as_ref().map(json_text).transpose()?,
        })
    }

    fn bind<'args>(&'args self, mut b: Separated<'_, 'args, Sqlite, &'static str>) {
        let e = self.event;
        b.push_bind(e.event_id.as_str())
            .push_bind(e.log_unique_id.as_str())
            .push_bind(e.timestamp)
            .push_bind(e.source_ip.as_str())
            .push_bind(e.source_port.map(i64::from))
            .push_bind(e.destination_ip.as_deref())
            .push_bind(e.destination_port.map(i64::from))
            .push_bind(e.target_website.as_deref())
            .push_bind(e.uri.as_str())
            .push_bind(e.method.as_str())
            .push_bind(e.status_code.map(i64::from))
            .push_bind(e.user_agent.as_str())
            .push_bind(e.attack_type.as_deref())
            .push_bind(e.severity.as_str())
            .push_bind(e.is_attack)
            .push_bind(e.is_blocked)
            .push_bind(e.risk_score)
            .push_bind(i64::from(e.anomaly_score))
            .push_bind(self.rules_matched.as_str())
            .push_bind(self.rule_files.as_str())
            .push_bind(self.request_headers.as_str())
            .push_bind(e.request_body.as_str())
            .push_bind(self.response_headers.as_str())
            .push_bind(e.response_body.as_str())
            .push_bind(self.geo_location.as_deref());
    }
}

/// 충돌 무시 레거시 INSERT를 만듭니다.
fn insert_legacy_query<'args>(rows: &'args [LegacyRow<'_>]) -> QueryBuilder<'args, Sqlite> {
    let mut qb = QueryBuilder::new(format!("INSERT INTO waf_logs ({WAF_LOG_COLUMNS}) "));
    qb.push_values(rows, |b, row| row.bind(b));
    qb.push(" ON CONFLICT(log_unique_id) DO NOTHING");
    qb
}

async fn insert_events(
    conn: &mut SqliteConnection,
    rows: &[EventRow<'_>],
) -> Result<(), LogPipelineError> {
    let mut qb: QueryBuilder<'_, Sqlite> =
        QueryBuilder::new(format!("INSERT INTO security_events ({SECURITY_EVENT_COLUMNS}) "));
    qb.push_values(rows, |b, row| row.bind(b));
    qb.build().execute(conn).await?;
    Ok(())
}

fn json_text<T: Serialize + ?Sized>(value: &T) -> Result<String, LogPipelineError> {
    serde_json::to_string(value).map_err(|e| LogPipelineError::Storage {
        retryable: false,
        reason: format!("json encode: {e}"),
    })
}

async fn create_parent_dir(path: &Path) -> Result<(), LogPipelineError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    Ok(())
}
