//! 파이프라인 오케스트레이션 -- 수집/복구/분류/저장/체크포인트/알림의 전체 흐름
//!
//! [`LogPipeline`]은 core의 [`Pipeline`](auditflow_core::pipeline::Pipeline) trait을 구현하여
//! `auditflow-daemon`에서 start/stop/health_check 생명주기로 관리됩니다.
//!
//! # 내부 흐름
//! ```text
//! FileTailer -> LineDecoder -> AttackDetectionEngine -> EventBuilder
//!     -> BatchBuffer -> EventStore (commit) -> CheckpointStore -> ChangeNotifier
//! ```
//!
//! 한 프로세스에 수집 루프는 하나입니다. 체크포인트는 배치가 커밋된 뒤에만
//! 기록되고, 알림은 체크포인트 기록 후에 보냅니다.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Instant;

use chrono::{Local, NaiveDateTime};
use metrics::{counter, gauge, histogram};
use rayon::prelude::*;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use auditflow_core::error::{AuditflowError, PipelineError};
use auditflow_core::event::BuiltEvent;
use auditflow_core::metrics as m;
use auditflow_core::pipeline::{HealthStatus, Pipeline};

use crate::buffer::BatchBuffer;
use crate::builder::EventBuilder;
use crate::checkpoint::CheckpointStore;
use crate::collector::{FileTailer, RawLine, TailPoll, TailRead};
use crate::config::{IngestMode, PipelineConfig};
use crate::detection::AttackDetectionEngine;
use crate::error::LogPipelineError;
use crate::notifier::{ChangeNotifier, NoopNotifier};
use crate::parser::LineDecoder;
use crate::storage::{EventStore, PersistOutcome, WriteStrategy};

/// 수집 통계 (스레드 간 공유)
#[derive(Debug, Default)]
pub struct WorkerStats {
    lines_read: AtomicU64,
    lines_repaired: AtomicU64,
    lines_dropped: AtomicU64,
    events_stored: AtomicU64,
    duplicates_skipped: AtomicU64,
    batches_committed: AtomicU64,
    batch_failures: AtomicU64,
    consecutive_failures: AtomicU32,
    checkpoint_offset: AtomicU64,
}

impl WorkerStats {
    /// 현재 값의 스냅샷을 만듭니다.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            lines_read: self.lines_read.load(Ordering::Relaxed),
            lines_repaired: self.lines_repaired.load(Ordering::Relaxed),
            lines_dropped: self.lines_dropped.load(Ordering::Relaxed),
            events_stored: self.events_stored.load(Ordering::Relaxed),
            duplicates_skipped: self.duplicates_skipped.load(Ordering::Relaxed),
            batches_committed: self.batches_committed.load(Ordering::Relaxed),
            batch_failures: self.batch_failures.load(Ordering::Relaxed),
            consecutive_failures: self.consecutive_failures.load(Ordering::Relaxed),
            checkpoint_offset: self.checkpoint_offset.load(Ordering::Relaxed),
        }
    }

    fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }
}

/// 통계 스냅샷
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub lines_read: u64,
    pub lines_repaired: u64,
    /// 파싱/검증 실패 또는 길이 초과로 버린 라인
    pub lines_dropped: u64,
    pub events_stored: u64,
    pub duplicates_skipped: u64,
    pub batches_committed: u64,
    pub batch_failures: u64,
    pub consecutive_failures: u32,
    pub checkpoint_offset: u64,
}

/// 한 주기의 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// 처리할 데이터가 더 없음 (폴링 주기만큼 대기)
    Idle,
    /// 읽기 상한에 걸렸거나 로테이션 직후 (즉시 다음 주기)
    MoreData,
}

/// 라인 하나의 처리 결과
enum LineOutcome {
    Event(Box<BuiltEvent>),
    Skipped,
}

/// 라인 디코딩/분류/빌드 (상태 없음, 병렬 실행 가능)
struct LineProcessor {
    decoder: LineDecoder,
    engine: AttackDetectionEngine,
    builder: EventBuilder,
    stats: Arc<WorkerStats>,
}

impl LineProcessor {
    fn process(&self, line: &RawLine, ingested_at: NaiveDateTime) -> LineOutcome {
        if line.is_blank() {
            return LineOutcome::Skipped;
        }

        let decoded = match self.decoder.decode(line) {
            Ok(decoded) => decoded,
            Err(e) => {
                let reason = match e {
                    LogPipelineError::Validation { .. } => "invalid",
                    _ => "unparsable",
                };
                counter!(m::INGEST_LINES_DROPPED_TOTAL, m::LABEL_REASON => reason).increment(1);
                WorkerStats::add(&self.stats.lines_dropped, 1);
                warn!(
                    offset = line.end_offset,
                    error = %e,
                    preview = %line.preview(),
                    "dropping line"
                );
                return LineOutcome::Skipped;
            }
        };

        if decoded.repair.is_repaired() {
            counter!(m::INGEST_LINES_REPAIRED_TOTAL).increment(1);
            WorkerStats::add(&self.stats.lines_repaired, 1);
            debug!(offset = line.end_offset, level = ?decoded.repair, "line repaired");
        }

        let result = self.engine.classify(&decoded.transaction);
        let event = self
            .builder
            .build(&decoded.transaction, result, decoded.raw, ingested_at);
        LineOutcome::Event(Box::new(event))
    }

    /// 청크를 처리합니다. 결과 순서는 입력 순서와 같습니다.
    fn process_chunk(&self, chunk: &[RawLine], mode: IngestMode) -> Vec<LineOutcome> {
        let ingested_at = Local::now().naive_local();
        match mode {
            IngestMode::Backlog => chunk
                .par_iter()
                .map(|line| self.process(line, ingested_at))
                .collect(),
            IngestMode::Steady => chunk
                .iter()
                .map(|line| self.process(line, ingested_at))
                .collect(),
        }
    }
}

/// 수집 루프 본체
///
/// 오프셋(체크포인트)을 소유하고 tail -> 배치 -> 커밋 -> 체크포인트 -> 알림 한
/// 주기를 [`run_cycle`](Self::run_cycle)로 실행합니다.
pub struct IngestWorker<S, N> {
    config: PipelineConfig,
    tailer: FileTailer,
    checkpoint: CheckpointStore,
    processor: LineProcessor,
    store: S,
    notifier: N,
    offset: u64,
    stats: Arc<WorkerStats>,
}

impl<S: EventStore, N: ChangeNotifier> IngestWorker<S, N> {
    /// 설정을 검증하고 체크포인트를 읽어 worker를 생성합니다.
    pub async fn open(
        config: PipelineConfig,
        store: S,
        notifier: N,
    ) -> Result<Self, LogPipelineError> {
        config.validate()?;

        let checkpoint = CheckpointStore::new(&config.state_path);
        let offset = match checkpoint.load().await? {
            Some(offset) => {
                info!(
                    log_path = %config.log_path.display(),
                    offset,
                    "resuming from checkpoint"
                );
                offset
            }
            None => {
                info!(
                    log_path = %config.log_path.display(),
                    "no checkpoint found, starting full backlog load"
                );
                0
            }
        };

        let stats = Arc::new(WorkerStats::default());
        stats.checkpoint_offset.store(offset, Ordering::Relaxed);
        gauge!(m::INGEST_CHECKPOINT_OFFSET).set(offset as f64);

        let processor = LineProcessor {
            decoder: LineDecoder::new(&config.canonical_component)?,
            engine: AttackDetectionEngine::new(config.blocking_threshold)?,
            builder: EventBuilder::new(),
            stats: Arc::clone(&stats),
        };

        Ok(Self {
            tailer: FileTailer::new(&config.log_path, config.max_read_bytes, config.max_line_length),
            checkpoint,
            processor,
            store,
            notifier,
            offset,
            stats,
            config,
        })
    }

    /// 마지막으로 커밋된 오프셋
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// 공유 통계 핸들
    pub fn stats(&self) -> Arc<WorkerStats> {
        Arc::clone(&self.stats)
    }

    /// 저장소 참조
    pub fn store(&self) -> &S {
        &self.store
    }

    /// 한 번 폴링하고 읽은 구간을 모두 처리합니다.
    ///
    /// 저장 실패 시 그 배치는 롤백되고 체크포인트는 그대로이므로, 같은 구간을
    /// 다음 주기에 다시 읽습니다. 이미 커밋된 앞선 배치는 유지됩니다.
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome, LogPipelineError> {
        let read = match self.tailer.poll(self.offset).await? {
            TailPoll::Missing | TailPoll::Unchanged { .. } => return Ok(CycleOutcome::Idle),
            TailPoll::Rotated { .. } => {
                counter!(m::INGEST_ROTATIONS_TOTAL).increment(1);
                self.commit_offset(0).await?;
                return Ok(CycleOutcome::MoreData);
            }
            TailPoll::Data(read) => read,
        };

        self.process_read(&read).await?;

        if read.has_more() {
            Ok(CycleOutcome::MoreData)
        } else {
            Ok(CycleOutcome::Idle)
        }
    }

    async fn process_read(&mut self, read: &TailRead) -> Result<(), LogPipelineError> {
        let mode = self.config.mode_for_pending(read.pending_bytes());
        let batch_size = self.config.batch_size(mode);

        let read_count = read.lines.len() as u64;
        counter!(m::INGEST_LINES_READ_TOTAL).increment(read_count);
        WorkerStats::add(&self.stats.lines_read, read_count);
        if read.oversized > 0 {
            counter!(m::INGEST_LINES_DROPPED_TOTAL, m::LABEL_REASON => "too_long")
                .increment(read.oversized as u64);
            WorkerStats::add(&self.stats.lines_dropped, read.oversized as u64);
        }

        debug!(
            mode = mode.as_str(),
            lines = read.lines.len(),
            start_offset = read.start_offset,
            end_offset = read.end_offset,
            pending_bytes = read.pending_bytes(),
            "processing read"
        );

        let mut buffer = BatchBuffer::new(batch_size);
        for chunk in read.lines.chunks(batch_size) {
            let outcomes = self.processor.process_chunk(chunk, mode);
            for (line, outcome) in chunk.iter().zip(outcomes) {
                match outcome {
                    LineOutcome::Event(event) => {
                        if buffer.push(*event, line.end_offset) {
                            self.flush(&mut buffer, mode).await?;
                        }
                    }
                    LineOutcome::Skipped => buffer.advance(line.end_offset),
                }
            }
        }

        // 버린 긴 라인 구간까지 포함
        buffer.advance(read.end_offset);
        self.flush(&mut buffer, mode).await
    }

    /// 버퍼를 커밋하고 체크포인트를 전진시킨 뒤 알림을 보냅니다.
    async fn flush(
        &mut self,
        buffer: &mut BatchBuffer,
        mode: IngestMode,
    ) -> Result<(), LogPipelineError> {
        let Some(batch) = buffer.take() else {
            return Ok(());
        };
        if batch.is_empty() && batch.end_offset <= self.offset {
            return Ok(());
        }

        let started = Instant::now();
        let submitted = batch.events.len();
        let end_offset = batch.end_offset;

        let outcome = if batch.is_empty() {
            PersistOutcome::default()
        } else {
            let strategy = WriteStrategy::for_batch(submitted, self.config.bulk_insert_threshold);
            match self.store.persist(batch.events, strategy).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    buffer.clear();
                    counter!(m::STORAGE_BATCH_FAILURES_TOTAL).increment(1);
                    WorkerStats::add(&self.stats.batch_failures, 1);
                    self.stats
                        .consecutive_failures
                        .fetch_add(1, Ordering::Relaxed);
                    return Err(e);
                }
            }
        };

        self.commit_offset(end_offset).await?;
        self.stats.consecutive_failures.store(0, Ordering::Relaxed);
        WorkerStats::add(&self.stats.batches_committed, 1);
        self.record_outcome(&outcome);

        self.notifier.notify(&outcome.stored);

        let elapsed = started.elapsed();
        histogram!(m::INGEST_BATCH_DURATION_SECONDS, m::LABEL_MODE => mode.as_str())
            .record(elapsed.as_secs_f64());

        if submitted > 0 {
            info!(
                mode = mode.as_str(),
                events = submitted,
                stored = outcome.stored.len(),
                duplicates = outcome.duplicates,
                offset = end_offset,
                elapsed_ms = elapsed.as_millis() as u64,
                "batch committed"
            );
        } else {
            debug!(offset = end_offset, "checkpoint advanced past dropped lines");
        }
        Ok(())
    }

    async fn commit_offset(&mut self, offset: u64) -> Result<(), LogPipelineError> {
        self.checkpoint.save(offset).await?;
        self.offset = offset;
        self.stats.checkpoint_offset.store(offset, Ordering::Relaxed);
        gauge!(m::INGEST_CHECKPOINT_OFFSET).set(offset as f64);
        Ok(())
    }

    fn record_outcome(&self, outcome: &PersistOutcome) {
        let stored = outcome.stored.len() as u64;
        let duplicates = outcome.duplicates as u64;
        counter!(m::STORAGE_EVENTS_STORED_TOTAL).increment(stored);
        counter!(m::STORAGE_DUPLICATES_SKIPPED_TOTAL).increment(duplicates);
        WorkerStats::add(&self.stats.events_stored, stored);
        WorkerStats::add(&self.stats.duplicates_skipped, duplicates);

        for event in &outcome.stored {
            let severity = event.severity.as_str();
            if event.is_attack {
                counter!(m::DETECTION_ATTACKS_TOTAL, m::LABEL_SEVERITY => severity).increment(1);
            }
            if event.is_blocked {
                counter!(m::DETECTION_BLOCKED_TOTAL, m::LABEL_SEVERITY => severity).increment(1);
            }
        }
    }

    /// 더 읽을 데이터가 없을 때까지 주기를 반복합니다 (`--once`).
    ///
    /// 첫 에러에서 멈춥니다.
    pub async fn drain(&mut self) -> Result<StatsSnapshot, LogPipelineError> {
        while self.run_cycle().await? == CycleOutcome::MoreData {}
        Ok(self.stats.snapshot())
    }

    /// 취소될 때까지 수집 루프를 실행합니다.
    ///
    /// 취소는 주기 사이에서만 확인하므로 진행 중인 배치는 커밋과 체크포인트
    /// 기록을 마친 뒤 종료합니다. 주기 에러는 로그만 남기고 다음 폴링에서
    /// 재시도합니다.
    pub async fn run(&mut self, shutdown: CancellationToken) {
        let interval = self.config.poll_interval();
        info!(
            log_path = %self.config.log_path.display(),
            poll_interval_ms = self.config.poll_interval_ms,
            offset = self.offset,
            "ingest loop started"
        );

        while !shutdown.is_cancelled() {
            let outcome = match self.run_cycle().await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(
                        error = %e,
                        retryable = e.is_retryable(),
                        offset = self.offset,
                        "ingest cycle failed, retrying on next poll"
                    );
                    CycleOutcome::Idle
                }
            };

            if outcome == CycleOutcome::MoreData {
                continue;
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }

        info!(offset = self.offset, "ingest loop stopped");
    }
}

/// 파이프라인 실행 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PipelineState {
    Initialized,
    Running,
    Stopped,
}

/// 로그 파이프라인
///
/// # 사용 예시
/// ```ignore
/// use auditflow_log_pipeline::{LogPipelineBuilder, SqlEventStore};
///
/// let store = SqlEventStore::connect(&storage_config).await?;
/// let mut pipeline = LogPipelineBuilder::new(store)
///     .config(config)
///     .notifier(notifier)
///     .build()
///     .await?;
///
/// pipeline.start().await?;
/// // ...
/// pipeline.stop().await?;
/// ```
pub struct LogPipeline<S, N> {
    state: PipelineState,
    worker: Option<IngestWorker<S, N>>,
    task: Option<JoinHandle<IngestWorker<S, N>>>,
    shutdown: CancellationToken,
    stats: Arc<WorkerStats>,
}

impl<S, N> LogPipeline<S, N>
where
    S: EventStore + 'static,
    N: ChangeNotifier + 'static,
{
    /// 현재 상태 이름
    pub fn state_name(&self) -> &'static str {
        match self.state {
            PipelineState::Initialized => "initialized",
            PipelineState::Running => "running",
            PipelineState::Stopped => "stopped",
        }
    }

    /// 통계 스냅샷
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// 백그라운드 루프 없이 백로그를 모두 처리합니다.
    pub async fn run_once(&mut self) -> Result<StatsSnapshot, LogPipelineError> {
        let worker = self.worker.as_mut().ok_or_else(|| LogPipelineError::Config {
            field: "pipeline".to_owned(),
            reason: "run_once is not available while running".to_owned(),
        })?;
        worker.drain().await
    }
}

impl<S, N> Pipeline for LogPipeline<S, N>
where
    S: EventStore + 'static,
    N: ChangeNotifier + 'static,
{
    async fn start(&mut self) -> Result<(), AuditflowError> {
        if self.state == PipelineState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }
        let Some(mut worker) = self.worker.take() else {
            return Err(PipelineError::InitFailed("ingest worker unavailable".to_owned()).into());
        };

        self.shutdown = CancellationToken::new();
        let token = self.shutdown.clone();
        self.task = Some(tokio::spawn(async move {
            worker.run(token).await;
            worker
        }));

        self.state = PipelineState::Running;
        info!("log pipeline started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), AuditflowError> {
        if self.state != PipelineState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        info!("stopping log pipeline, waiting for in-flight batch");
        self.shutdown.cancel();

        if let Some(task) = self.task.take() {
            match task.await {
                Ok(worker) => self.worker = Some(worker),
                Err(e) => {
                    self.state = PipelineState::Stopped;
                    return Err(PipelineError::InitFailed(format!("ingest task failed: {e}")).into());
                }
            }
        }

        self.state = PipelineState::Stopped;
        info!(offset = self.stats.snapshot().checkpoint_offset, "log pipeline stopped");
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            PipelineState::Running => {
                let failures = self.stats.consecutive_failures.load(Ordering::Relaxed);
                if failures > 0 {
                    HealthStatus::Degraded(format!("{failures} consecutive batch failures"))
                } else {
                    HealthStatus::Healthy
                }
            }
            PipelineState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            PipelineState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

/// 로그 파이프라인 빌더
pub struct LogPipelineBuilder<S, N = NoopNotifier> {
    config: PipelineConfig,
    store: S,
    notifier: N,
}

impl<S: EventStore> LogPipelineBuilder<S, NoopNotifier> {
    /// 저장소로 빌더를 생성합니다. 기본 notifier는 [`NoopNotifier`]입니다.
    pub fn new(store: S) -> Self {
        Self {
            config: PipelineConfig::default(),
            store,
            notifier: NoopNotifier,
        }
    }
}

impl<S: EventStore, N: ChangeNotifier> LogPipelineBuilder<S, N> {
    /// 파이프라인 설정을 지정합니다.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// 변경 notifier를 지정합니다.
    pub fn notifier<M: ChangeNotifier>(self, notifier: M) -> LogPipelineBuilder<S, M> {
        LogPipelineBuilder {
            config: self.config,
            store: self.store,
            notifier,
        }
    }

    /// 설정을 검증하고 체크포인트를 읽어 파이프라인을 만듭니다.
    pub async fn build(self) -> Result<LogPipeline<S, N>, LogPipelineError> {
        let worker = IngestWorker::open(self.config, self.store, self.notifier).await?;
        let stats = worker.stats();
        Ok(LogPipeline {
            state: PipelineState::Initialized,
            worker: Some(worker),
            task: None,
            shutdown: CancellationToken::new(),
            stats,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfigBuilder;
    use crate::storage::SqlEventStore;
    use auditflow_core::config::StorageConfig;
    use std::io::Write;
    use std::path::Path;
    use std::time::Duration;

    fn line(id: &str) -> String {
        format!(
            r#"{{"transaction":{{"unique_id":"{id}","time_stamp":"Tue Mar 04 10:11:12 2025","client_ip":"198.51.100.9","client_port":40000,"host_ip":"10.0.0.2","host_port":80,"request":{{"method":"GET","uri":"/?q={id}","headers":{{"Host":"shop.example","User-Agent":"curl/8"}},"body":""}},"response":{{"http_code":200,"headers":{{}},"body":""}},"messages":[]}}}}"#
        )
    }

    fn append(path: &Path, lines: &[String]) {
        let mut f = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        for l in lines {
            writeln!(f, "{l}").unwrap();
        }
    }

    async fn store() -> SqlEventStore {
        SqlEventStore::connect(&StorageConfig {
            database_url: "sqlite::memory:".to_owned(),
            ..Default::default()
        })
        .await
        .unwrap()
    }

    fn config(dir: &Path) -> PipelineConfig {
        PipelineConfigBuilder::new()
            .log_path(dir.join("audit.log"))
            .state_path(dir.join("state/offset"))
            .poll_interval_ms(10)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn cycle_commits_and_checkpoints() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        append(&cfg.log_path, &[line("a"), line("b")]);
        let file_len = std::fs::metadata(&cfg.log_path).unwrap().len();

        let mut worker = IngestWorker::open(cfg, store().await, NoopNotifier)
            .await
            .unwrap();
        assert_eq!(worker.run_cycle().await.unwrap(), CycleOutcome::Idle);
        assert_eq!(worker.offset(), file_len);

        let stats = worker.stats().snapshot();
        assert_eq!(stats.lines_read, 2);
        assert_eq!(stats.events_stored, 2);
        assert_eq!(stats.checkpoint_offset, file_len);
        assert_eq!(worker.store().counts().await.unwrap().security_events, 2);
    }

    #[tokio::test]
    async fn missing_file_is_idle() {
        let dir = tempfile::tempdir().unwrap();
        let mut worker = IngestWorker::open(config(dir.path()), store().await, NoopNotifier)
            .await
            .unwrap();
        assert_eq!(worker.run_cycle().await.unwrap(), CycleOutcome::Idle);
        assert_eq!(worker.offset(), 0);
    }

    #[tokio::test]
    async fn dropped_lines_only_still_advance_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        append(&cfg.log_path, &["not json".to_owned(), String::new()]);
        let file_len = std::fs::metadata(&cfg.log_path).unwrap().len();

        let mut worker = IngestWorker::open(cfg.clone(), store().await, NoopNotifier)
            .await
            .unwrap();
        worker.run_cycle().await.unwrap();
        assert_eq!(worker.offset(), file_len);
        assert_eq!(worker.stats().snapshot().lines_dropped, 1);

        let saved = CheckpointStore::new(&cfg.state_path).load().await.unwrap();
        assert_eq!(saved, Some(file_len));
    }

    #[tokio::test]
    async fn read_cap_reports_more_data() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path());
        let first = line("a");
        cfg.max_line_length = first.len();
        cfg.max_read_bytes = first.len() + 2;
        append(&cfg.log_path, &[first, line("b")]);

        let mut worker = IngestWorker::open(cfg, store().await, NoopNotifier)
            .await
            .unwrap();
        assert_eq!(worker.run_cycle().await.unwrap(), CycleOutcome::MoreData);
        assert_eq!(worker.run_cycle().await.unwrap(), CycleOutcome::Idle);
        assert_eq!(worker.stats().snapshot().events_stored, 2);
    }

    #[tokio::test]
    async fn rotation_resets_offset() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        append(&cfg.log_path, &[line("a"), line("b")]);

        let mut worker = IngestWorker::open(cfg.clone(), store().await, NoopNotifier)
            .await
            .unwrap();
        worker.drain().await.unwrap();

        std::fs::write(&cfg.log_path, "").unwrap();
        append(&cfg.log_path, &[line("c")]);
        worker.drain().await.unwrap();

        let file_len = std::fs::metadata(&cfg.log_path).unwrap().len();
        assert_eq!(worker.offset(), file_len);
        assert_eq!(worker.store().counts().await.unwrap().security_events, 3);
    }

    #[tokio::test]
    async fn pipeline_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        append(&cfg.log_path, &[line("a")]);

        let mut pipeline = LogPipelineBuilder::new(store().await)
            .config(cfg)
            .build()
            .await
            .unwrap();
        assert_eq!(pipeline.state_name(), "initialized");
        assert!(pipeline.health_check().await.is_unhealthy());
        assert!(pipeline.stop().await.is_err());

        pipeline.start().await.unwrap();
        assert!(pipeline.start().await.is_err());

        let deadline = Instant::now() + Duration::from_secs(5);
        while pipeline.stats().events_stored < 1 && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(pipeline.health_check().await.is_healthy());

        pipeline.stop().await.unwrap();
        assert_eq!(pipeline.state_name(), "stopped");
        assert_eq!(pipeline.stats().events_stored, 1);
        assert!(pipeline.run_once().await.is_ok());
    }

    #[tokio::test]
    async fn builder_rejects_invalid_config() {
        let mut cfg = PipelineConfig::default();
        cfg.poll_interval_ms = 0;
        let result = LogPipelineBuilder::new(store().await).config(cfg).build().await;
        assert!(matches!(result, Err(LogPipelineError::Config { .. })));
    }
}
