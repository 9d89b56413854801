//! 扇出阶段：通道 Handler 链的终端，把事件交付给每一条订阅连接。
//!
//! # 设计背景（Why）
//! - 扇出阶段持有引用计数的连接集合 [`ConnectionRegistry`]，并按快照逐个投递；
//! - 同步变体在调用线程上投递；异步变体把“一次完整投递”作为单个工作单元提交给 [`WorkerPool`]。
//!
//! # 契约说明（What）
//! - 扇出阶段永远是链路最后一环：`set_next` 直接 panic，`next` 恒为 `None`；
//! - 单个订阅者在投递中 panic 时，错误被隔离并记录，同一轮中剩余订阅者仍会收到事件。
//!
//! [`WorkerPool`]: crate::runtime::WorkerPool

mod asynchronous;
mod registry;
mod synchronous;

use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
};

pub use asynchronous::AsyncFanOutHandler;
pub use registry::ConnectionRegistry;
pub use synchronous::SyncFanOutHandler;

use crate::{connection::ConnectionRef, event::ChannelEvent, handler::EventStreamHandler};

/// 终端阶段拒绝后继时的 panic 信息。
pub const TERMINAL_STAGE_VIOLATION: &str =
    "fan-out stage is terminal: attaching a successor is a programming error";

/// 扇出阶段的能力面：事件处理加订阅管理。
pub trait FanOutHandler: EventStreamHandler {
    /// 连接注册表。
    fn registry(&self) -> &ConnectionRegistry;

    /// 注册一次连接，返回新的注册计数。
    fn add_connection(&self, id: &str, connection: ConnectionRef) -> usize {
        self.registry().add_connection(id, connection)
    }

    /// 注销一次连接，语义见 [`ConnectionRegistry::remove_connection`]。
    fn remove_connection(&self, id: &str) -> Option<ConnectionRef> {
        self.registry().remove_connection(id)
    }
}

/// 按快照顺序把事件投递给每条连接事件流的头部 Handler。
pub(crate) fn deliver_all(snapshot: &[ConnectionRef], event: &ChannelEvent, end_of_batch: bool) {
    for (index, connection) in snapshot.iter().enumerate() {
        let Some(head) = connection.event_stream().head() else {
            tracing::trace!(index, "subscriber event stream is empty; skipped");
            continue;
        };
        let event = event.clone();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| head.handle(event, end_of_batch)));
        if let Err(payload) = outcome {
            tracing::error!(
                index,
                reason = panic_message(payload.as_ref()),
                "subscriber panicked during fan-out; delivery continues"
            );
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}
