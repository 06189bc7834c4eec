//! 변경 알림 -- 새로 저장된 이벤트를 외부 서비스에 best-effort로 전달합니다.
//!
//! 알림은 저장 경로와 분리되어 있습니다. 이벤트마다 별도 태스크로 전송하며
//! 결과를 기다리지 않고, 실패는 debug 로그와 메트릭으로만 남깁니다.
//! 동시에 진행 중인 요청은 `max_in_flight`개로 제한되며, 한도를 넘는 알림은
//! 기다리지 않고 버립니다. 저장소가 항상 원본이며 알림은 전달을 보장하지 않습니다.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::sync::Semaphore;
use tracing::{debug, info};

use auditflow_core::config::NotifierConfig;
use auditflow_core::event::{EventNotification, SecurityEvent};
use auditflow_core::metrics as m;
use auditflow_core::types::Severity;

use crate::error::LogPipelineError;

/// 저장된 이벤트 알림 trait
///
/// 구현은 블로킹하거나 실패를 전파해서는 안 됩니다.
pub trait ChangeNotifier: Send + Sync {
    /// 방금 커밋된 이벤트를 알립니다.
    fn notify(&self, events: &[SecurityEvent]);
}

impl<T: ChangeNotifier + ?Sized> ChangeNotifier for Arc<T> {
    fn notify(&self, events: &[SecurityEvent]) {
        (**self).notify(events);
    }
}

impl<T: ChangeNotifier + ?Sized> ChangeNotifier for Box<T> {
    fn notify(&self, events: &[SecurityEvent]) {
        (**self).notify(events);
    }
}

/// 아무것도 하지 않는 notifier (알림 비활성화)
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl ChangeNotifier for NoopNotifier {
    fn notify(&self, _events: &[SecurityEvent]) {}
}

/// HTTP POST 기반 notifier
///
/// 이벤트마다 [`EventNotification`] JSON을 엔드포인트에 POST합니다.
/// 요청은 `timeout_ms` 후 포기합니다.
#[derive(Debug, Clone)]
pub struct HttpNotifier {
    client: reqwest::Client,
    endpoint: String,
    min_severity: Severity,
    in_flight: Arc<Semaphore>,
    max_in_flight: usize,
}

impl HttpNotifier {
    /// 설정으로 notifier를 생성합니다.
    pub fn new(config: &NotifierConfig) -> Result<Self, LogPipelineError> {
        let min_severity = Severity::from_str_loose(&config.min_severity).ok_or_else(|| {
            LogPipelineError::Config {
                field: "notifier.min_severity".to_owned(),
                reason: format!("unknown severity '{}'", config.min_severity),
            }
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| LogPipelineError::Notify(e.to_string()))?;

        let max_in_flight = config.max_in_flight.max(1);
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            min_severity,
            in_flight: Arc::new(Semaphore::new(max_in_flight)),
            max_in_flight,
        })
    }

    /// 알림 엔드포인트
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// 현재 진행 중인 요청 수
    pub fn in_flight(&self) -> usize {
        self.max_in_flight - self.in_flight.available_permits()
    }

    /// 이벤트가 최소 심각도 이상인지 확인합니다.
    pub fn should_notify(&self, event: &SecurityEvent) -> bool {
        event.severity >= self.min_severity
    }
}

impl ChangeNotifier for HttpNotifier {
    fn notify(&self, events: &[SecurityEvent]) {
        let critical = events.iter().filter(|e| e.is_critical()).count();
        if critical > 0 {
            info!(critical, total = events.len(), "critical security events stored");
        }

        let mut dropped = 0u64;
        for event in events.iter().filter(|e| self.should_notify(e)) {
            let Ok(permit) = Arc::clone(&self.in_flight).try_acquire_owned() else {
                dropped += 1;
                continue;
            };
            let payload = EventNotification::from(event);
            let client = self.client.clone();
            let endpoint = self.endpoint.clone();
            counter!(m::NOTIFIER_SENT_TOTAL).increment(1);

            tokio::spawn(async move {
                let result = client
                    .post(&endpoint)
                    .json(&payload)
                    .send()
                    .await
                    .and_then(|resp| resp.error_for_status());
                drop(permit);
                if let Err(e) = result {
                    counter!(m::NOTIFIER_FAILED_TOTAL).increment(1);
                    debug!(event_id = %payload.id, error = %e, "change notification failed");
                }
            });
        }

        if dropped > 0 {
            counter!(m::NOTIFIER_DROPPED_TOTAL).increment(dropped);
            debug!(
                dropped,
                max_in_flight = self.max_in_flight,
                "change notifications dropped, too many in flight"
            );
        }
    }
}

/// 설정에 맞는 notifier를 만듭니다. 비활성화 시 [`NoopNotifier`]입니다.
pub fn from_config(config: &NotifierConfig) -> Result<Arc<dyn ChangeNotifier>, LogPipelineError> {
    if config.enabled {
        Ok(Arc::new(HttpNotifier::new(config)?))
    } else {
        Ok(Arc::new(NoopNotifier))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use serde_json::Value;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn event(id: &str, severity: Severity, is_blocked: bool) -> SecurityEvent {
        SecurityEvent {
            event_id: id.to_owned(),
            log_unique_id: format!("tx-{id}"),
            timestamp: NaiveDateTime::default(),
            source_ip: "192.0.2.7".to_owned(),
            source_port: None,
            destination_ip: None,
            destination_port: None,
            target_website: None,
            uri: "/".to_owned(),
            method: "GET".to_owned(),
            status_code: Some(403),
            user_agent: String::new(),
            attack_type: Some("SQLI".to_owned()),
            severity,
            is_attack: true,
            is_blocked,
            risk_score: 50.0,
            anomaly_score: 10,
            rules_matched: vec![],
            rule_files: vec![],
            request_headers: Value::Null,
            request_body: String::new(),
            response_headers: Value::Null,
            response_body: String::new(),
            geo_location: None,
        }
    }

    fn config(endpoint: String, min_severity: &str) -> NotifierConfig {
        NotifierConfig {
            enabled: true,
            endpoint,
            timeout_ms: 500,
            min_severity: min_severity.to_owned(),
            max_in_flight: 16,
        }
    }

    #[test]
    fn rejects_unknown_min_severity() {
        let result = HttpNotifier::new(&config("http://localhost/".to_owned(), "extreme"));
        assert!(matches!(result, Err(LogPipelineError::Config { .. })));
    }

    #[test]
    fn min_severity_filters_events() {
        let notifier = HttpNotifier::new(&config("http://localhost/".to_owned(), "high")).unwrap();
        assert!(!notifier.should_notify(&event("a", Severity::Medium, false)));
        assert!(notifier.should_notify(&event("b", Severity::High, false)));
        assert!(notifier.should_notify(&event("c", Severity::Critical, true)));
    }

    #[tokio::test]
    async fn posts_notification_payload() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let notifier =
            HttpNotifier::new(&config(format!("http://{addr}/broadcast"), "low")).unwrap();

        notifier.notify(&[event("evt-42", Severity::Critical, true)]);

        let received = tokio::time::timeout(Duration::from_secs(5), async {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                if String::from_utf8_lossy(&request).contains("\"is_blocked\"") {
                    break;
                }
            }
            socket
                .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\n\r\n")
                .await
                .unwrap();
            String::from_utf8_lossy(&request).into_owned()
        })
        .await
        .unwrap();

        assert!(received.starts_with("POST /broadcast"));
        assert!(received.contains("\"id\":\"evt-42\""));
        assert!(received.contains("\"severity\":\"critical\""));
    }

    #[tokio::test]
    async fn in_flight_requests_are_bounded() {
        // 응답하지 않는 서버: 연결은 받지만 읽거나 응답하지 않음
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let held = tokio::spawn(async move {
            let mut sockets = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                sockets.push(socket);
            }
        });

        let mut cfg = config(format!("http://{addr}/broadcast"), "low");
        cfg.max_in_flight = 4;
        cfg.timeout_ms = 5_000;
        let notifier = HttpNotifier::new(&cfg).unwrap();

        let events: Vec<_> = (0..500)
            .map(|i| event(&format!("evt-{i}"), Severity::Low, false))
            .collect();

        let started = std::time::Instant::now();
        notifier.notify(&events);
        assert!(started.elapsed() < Duration::from_secs(1), "notify must not block");
        assert_eq!(notifier.in_flight(), 4);

        // 한도가 찬 상태에서 추가 알림은 버려짐
        notifier.notify(&events[..10]);
        assert_eq!(notifier.in_flight(), 4);

        held.abort();
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_swallowed() {
        let notifier = HttpNotifier::new(&config("http://127.0.0.1:1/".to_owned(), "low")).unwrap();
        notifier.notify(&[event("a", Severity::Low, false)]);
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[test]
    fn disabled_config_yields_noop() {
        let mut cfg = config("http://localhost/".to_owned(), "low");
        cfg.enabled = false;
        let notifier = from_config(&cfg).unwrap();
        notifier.notify(&[event("a", Severity::Low, false)]);
    }
}
