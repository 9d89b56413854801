use std::fmt;

use super::{ConnectionRegistry, FanOutHandler, TERMINAL_STAGE_VIOLATION, deliver_all};
use crate::{
    event::ChannelEvent,
    handler::{EventStreamHandler, HandlerRef},
};

/// 在调用线程上依次投递的扇出阶段。
///
/// - **契约 (What)**：按快照顺序投递，保留调用方传入的 `end_of_batch`；
///   慢订阅者会阻塞调用线程直至本轮投递结束。
#[derive(Default)]
pub struct SyncFanOutHandler {
    registry: ConnectionRegistry,
}

impl SyncFanOutHandler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventStreamHandler for SyncFanOutHandler {
    fn handle(&self, event: ChannelEvent, end_of_batch: bool) {
        let snapshot = self.registry.snapshot();
        deliver_all(&snapshot, &event, end_of_batch);
    }

    fn set_next(&self, _next: HandlerRef) {
        panic!("{TERMINAL_STAGE_VIOLATION}");
    }

    fn next(&self) -> Option<HandlerRef> {
        None
    }
}

impl FanOutHandler for SyncFanOutHandler {
    fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }
}

impl fmt::Debug for SyncFanOutHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncFanOutHandler")
            .field("registry", &self.registry)
            .finish()
    }
}
