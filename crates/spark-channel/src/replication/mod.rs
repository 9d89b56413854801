//! 区域复制：把本地事件镜像到同区域的对等运行时，并把对等方复制来的事件注入本地链路。
//!
//! # 设计背景（Why）
//! - 复制阶段作为普通 Handler 插入通道链路，对本地投递完全透明：无论复制成败，事件都原样交给后继；
//! - 复制到达的事件带有 [`EventOrigin::Replicated`](crate::event::EventOrigin::Replicated) 标记，
//!   发送侧只复制未标记的可移植事件，从而阻断复制环路。
//!
//! # 契约说明（What）
//! - [`ZoneTopology::send_asynchronous`] 对调用线程而言是“投递即返回”的；
//! - 发送失败交给 [`ReplicationMonitor`] 记录后吞掉，永不传播给 `handle` 的调用方；
//! - 入站事件一律以 `end_of_batch = true` 交给后继，且不会再次外发。

mod zone;

use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};

pub use zone::{InMemoryZone, ZoneMember};

use crate::{
    error::TopologyError,
    event::{ChannelEvent, PortableEvent},
    handler::{EventStreamHandler, HandlerRef, NextHandler},
};

/// 在区域内传输的复制信封。
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReplicatedEvent {
    /// 逻辑通道名。
    pub channel: String,
    /// 发送方运行时名称。
    pub source: String,
    pub payload: PortableEvent,
}

/// 接收对等方复制事件的回调。
pub trait ReplicationListener: Send + Sync + 'static {
    fn on_message(&self, envelope: ReplicatedEvent);
}

/// 区域拓扑 / 消息服务。
///
/// # 契约（What）
/// - `runtime_name`：本运行时在区域内的名称，用作复制信封的 `source`；
/// - `send_asynchronous`：把事件发往同区域内注册了同名通道的其他成员，不等待对方处理；
/// - `register` / `unregister`：为逻辑通道挂载或卸载入站监听器，同一通道只允许一个监听器。
pub trait ZoneTopology: Send + Sync + 'static {
    fn runtime_name(&self) -> &str;

    fn send_asynchronous(&self, channel: &str, event: &PortableEvent) -> Result<(), TopologyError>;

    fn register(
        &self,
        channel: &str,
        listener: Arc<dyn ReplicationListener>,
    ) -> Result<(), TopologyError>;

    fn unregister(&self, channel: &str);
}

/// 复制失败的上报出口。
pub trait ReplicationMonitor: Send + Sync + 'static {
    fn send_failed(&self, channel: &str, error: &TopologyError);
}

/// 以 `tracing` 警告记录复制失败的默认监视器。
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingReplicationMonitor;

impl ReplicationMonitor for TracingReplicationMonitor {
    fn send_failed(&self, channel: &str, error: &TopologyError) {
        tracing::warn!(
            channel,
            error = %error,
            "event replication failed; local delivery continues"
        );
    }
}

/// 复制阶段。
///
/// # 教案式说明
/// - **逻辑（How）**：
///   1. `handle`：事件未被标记为已复制且负载可移植时，调用拓扑异步发送；失败交给监视器；
///   2. 无论复制结果如何，原样转发给后继；
///   3. `on_message`：把入站信封还原为带复制标记的事件，以 `end_of_batch = true` 直接交给后继。
/// - **契约（What）**：发送使用构造时给定的逻辑通道名寻址。
pub struct ReplicationHandler {
    channel: String,
    topology: Arc<dyn ZoneTopology>,
    monitor: Arc<dyn ReplicationMonitor>,
    next: NextHandler,
}

impl ReplicationHandler {
    pub fn new(
        channel: impl Into<String>,
        topology: Arc<dyn ZoneTopology>,
        monitor: Arc<dyn ReplicationMonitor>,
    ) -> Self {
        Self {
            channel: channel.into(),
            topology,
            monitor,
            next: NextHandler::new(),
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// 构造阶段并向拓扑注册入站监听。
    pub fn install(
        channel: impl Into<String>,
        topology: Arc<dyn ZoneTopology>,
        monitor: Arc<dyn ReplicationMonitor>,
    ) -> Result<Arc<Self>, TopologyError> {
        let handler = Arc::new(Self::new(channel, Arc::clone(&topology), monitor));
        topology.register(
            &handler.channel,
            Arc::clone(&handler) as Arc<dyn ReplicationListener>,
        )?;
        Ok(handler)
    }
}

impl EventStreamHandler for ReplicationHandler {
    fn handle(&self, event: ChannelEvent, end_of_batch: bool) {
        if !event.is_replicated()
            && let Some(portable) = event.as_portable()
            && let Err(error) = self.topology.send_asynchronous(&self.channel, portable)
        {
            self.monitor.send_failed(&self.channel, &error);
        }
        self.next.forward(event, end_of_batch);
    }

    fn set_next(&self, next: HandlerRef) {
        self.next.set(next);
    }

    fn next(&self) -> Option<HandlerRef> {
        self.next.get()
    }
}

impl ReplicationListener for ReplicationHandler {
    fn on_message(&self, envelope: ReplicatedEvent) {
        tracing::trace!(
            channel = %self.channel,
            source = %envelope.source,
            "replicated event received"
        );
        let event = ChannelEvent::replicated(envelope.payload, envelope.source);
        self.next.forward(event, true);
    }
}

impl fmt::Debug for ReplicationHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplicationHandler")
            .field("channel", &self.channel)
            .field("runtime", &self.topology.runtime_name())
            .field("next", &self.next)
            .finish_non_exhaustive()
    }
}
