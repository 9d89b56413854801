use std::{fmt, sync::Arc};

use super::{ConnectionRegistry, FanOutHandler, TERMINAL_STAGE_VIOLATION, deliver_all};
use crate::{
    event::ChannelEvent,
    handler::{EventStreamHandler, HandlerRef},
    runtime::WorkerPool,
};

/// 通过工作池投递的扇出阶段。
///
/// # 教案式说明
/// - **逻辑（How）**：
///   1. 读取当前连接快照；快照为空时直接返回，不提交任何工作单元；
///   2. 否则把事件与快照一起移动进单个闭包并提交给工作池；
///   3. 闭包运行时逐个投递，`end_of_batch` 一律为 `true`。
/// - **契约（What）**：
///   - 每次异步投递都是一次独立、完整的交付，跨线程后不再保留调用方的微批语义；
///   - 快照在提交时捕获，之后的订阅变更不影响已提交的投递。
pub struct AsyncFanOutHandler {
    registry: ConnectionRegistry,
    pool: Arc<dyn WorkerPool>,
}

impl AsyncFanOutHandler {
    pub fn new(pool: Arc<dyn WorkerPool>) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            pool,
        }
    }
}

impl EventStreamHandler for AsyncFanOutHandler {
    fn handle(&self, event: ChannelEvent, _end_of_batch: bool) {
        let snapshot = self.registry.snapshot();
        if snapshot.is_empty() {
            return;
        }
        self.pool.execute(Box::new(move || {
            deliver_all(&snapshot, &event, true);
        }));
    }

    fn set_next(&self, _next: HandlerRef) {
        panic!("{TERMINAL_STAGE_VIOLATION}");
    }

    fn next(&self) -> Option<HandlerRef> {
        None
    }
}

impl FanOutHandler for AsyncFanOutHandler {
    fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }
}

impl fmt::Debug for AsyncFanOutHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncFanOutHandler")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
