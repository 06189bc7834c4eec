//! 배치 버퍼 -- 저장 전 이벤트 누적
//!
//! [`BatchBuffer`]는 빌드된 이벤트와 함께 "이 배치가 커밋되면 체크포인트를
//! 어디까지 옮겨도 되는가"를 추적합니다. 버려진 라인은 이벤트를 만들지 않지만
//! 오프셋은 전진시키므로, 이벤트가 없는 배치도 체크포인트를 옮길 수 있습니다.

use auditflow_core::event::BuiltEvent;

/// 저장 대기 중인 배치
#[derive(Debug, Default)]
pub struct PendingBatch {
    /// 저장할 이벤트 (파일 순서)
    pub events: Vec<BuiltEvent>,
    /// 커밋 후 기록할 체크포인트
    pub end_offset: u64,
}

impl PendingBatch {
    /// 저장할 이벤트가 없는지 확인합니다 (체크포인트만 전진).
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// 용량 제한 배치 버퍼
pub struct BatchBuffer {
    events: Vec<BuiltEvent>,
    capacity: usize,
    /// 마지막으로 반영된 라인 끝 오프셋
    end_offset: Option<u64>,
}

impl BatchBuffer {
    /// 새 배치 버퍼를 생성합니다.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: Vec::with_capacity(capacity.min(10_000)),
            capacity,
            end_offset: None,
        }
    }

    /// 최대 이벤트 수
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 현재 이벤트 수
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// 이벤트가 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// 가득 찼는지 확인합니다.
    pub fn is_full(&self) -> bool {
        self.events.len() >= self.capacity
    }

    /// 이벤트와 그 라인의 끝 오프셋을 추가합니다.
    ///
    /// 추가 후 가득 차면 `true`를 반환합니다. 호출자는 다음 추가 전에
    /// [`take`](Self::take)로 배치를 비워야 합니다.
    pub fn push(&mut self, event: BuiltEvent, end_offset: u64) -> bool {
        debug_assert!(!self.is_full(), "push into a full batch buffer");
        self.events.push(event);
        self.advance(end_offset);
        self.is_full()
    }

    /// 이벤트 없이 오프셋만 전진시킵니다 (버려진 라인).
    ///
    /// 오프셋은 뒤로 가지 않습니다.
    pub fn advance(&mut self, end_offset: u64) {
        self.end_offset = Some(self.end_offset.map_or(end_offset, |cur| cur.max(end_offset)));
    }

    /// 누적된 배치를 꺼냅니다.
    ///
    /// 이벤트도 오프셋 전진도 없으면 `None`을 반환합니다.
    pub fn take(&mut self) -> Option<PendingBatch> {
        let end_offset = self.end_offset.take()?;
        Some(PendingBatch {
            events: std::mem::take(&mut self.events),
            end_offset,
        })
    }

    /// 누적 내용을 버립니다 (저장 실패 후 재시도 전).
    pub fn clear(&mut self) {
        self.events.clear();
        self.end_offset = None;
    }
}
