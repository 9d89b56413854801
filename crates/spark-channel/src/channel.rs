//! 事件通道：组合 Handler 链与扇出阶段，对外暴露装配与订阅操作。
//!
//! # 设计背景（Why）
//! - 一个通道对应一个逻辑上的发布/订阅端点：生产者把事件送入唯一的入口阶段，
//!   事件穿过部署期安装的 Handler，最终由扇出阶段交付给全部订阅连接；
//! - 分布式部署时同一逻辑通道会在生产侧与消费侧各有一个实例，[`ChannelSide`] 仅供调用方路由使用。
//!
//! # 契约说明（What）
//! - 通道的 URI、所属部署单元与侧别在构造后不可变；
//! - 入口阶段的后继经由链路最终总能到达扇出阶段；
//! - 所有操作均为内存中的图变更，不涉及 I/O。

use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{
    chain::HandlerChain,
    connection::{ChannelConnection, ConnectionRef},
    event::ChannelEvent,
    fanout::{AsyncFanOutHandler, FanOutHandler, SyncFanOutHandler},
    handler::{HandlerRef, PassThroughHandler},
    runtime::WorkerPool,
};

/// 通道实例代表的分布式侧别。
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ChannelSide {
    /// 生产者所在节点的通道实例。
    Producer,
    /// 消费者所在节点的通道实例。
    Consumer,
    /// 生产者与消费者位于同一节点。
    #[default]
    Collocated,
}

/// 进程内的发布/订阅通道。
///
/// # 教案式说明
/// - **逻辑（How）**：构造时创建 [`PassThroughHandler`] 作为入口，并以传入的扇出阶段为终端组装
///   [`HandlerChain`]；订阅操作直接委托给扇出阶段。
/// - **契约（What）**：
///   - `add_handler` 按安装顺序追加处理阶段，同一实例不会重复安装；
///   - `remove_handler` 对不在链中的 Handler 返回 `false`；
///   - 链路变更内部已串行化，可与并发分发同时进行。
pub struct EventChannel {
    uri: String,
    deployable: String,
    side: ChannelSide,
    fan_out: Arc<dyn FanOutHandler>,
    chain: HandlerChain,
}

impl EventChannel {
    /// 以给定扇出阶段构造通道。
    pub fn new(
        uri: impl Into<String>,
        deployable: impl Into<String>,
        side: ChannelSide,
        fan_out: Arc<dyn FanOutHandler>,
    ) -> Self {
        let uri = uri.into();
        let terminal: HandlerRef = fan_out.clone();
        let chain = HandlerChain::new(uri.as_str(), Arc::new(PassThroughHandler::new()), terminal);
        Self {
            uri,
            deployable: deployable.into(),
            side,
            fan_out,
            chain,
        }
    }

    /// 使用同步扇出阶段构造通道。
    pub fn synchronous(
        uri: impl Into<String>,
        deployable: impl Into<String>,
        side: ChannelSide,
    ) -> Self {
        Self::new(uri, deployable, side, Arc::new(SyncFanOutHandler::new()))
    }

    /// 使用异步扇出阶段构造通道。
    pub fn asynchronous(
        uri: impl Into<String>,
        deployable: impl Into<String>,
        side: ChannelSide,
        pool: Arc<dyn WorkerPool>,
    ) -> Self {
        Self::new(uri, deployable, side, Arc::new(AsyncFanOutHandler::new(pool)))
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn deployable(&self) -> &str {
        &self.deployable
    }

    pub fn side(&self) -> ChannelSide {
        self.side
    }

    /// 把外部生产者 Handler 的后继指向通道入口。
    pub fn attach_producer(&self, handler: &HandlerRef) {
        handler.set_next(Arc::clone(self.chain.entry()));
        tracing::debug!(channel = %self.uri, "producer attached");
    }

    /// 把连接事件流的尾部 Handler 指向通道入口；事件流为空时返回 `false`。
    pub fn attach_connection(&self, connection: &dyn ChannelConnection) -> bool {
        match connection.event_stream().tail() {
            Some(tail) => {
                tail.set_next(Arc::clone(self.chain.entry()));
                tracing::debug!(channel = %self.uri, "connection attached");
                true
            }
            None => {
                tracing::warn!(
                    channel = %self.uri,
                    "connection has an empty event stream; not attached"
                );
                false
            }
        }
    }

    /// 在扇出阶段之前追加处理阶段；该实例已在链中时返回 `false`。
    pub fn add_handler(&self, handler: HandlerRef) -> bool {
        self.chain.insert_at_tail(handler).is_some()
    }

    /// 从链中移除处理阶段；不在链中时返回 `false`。
    pub fn remove_handler(&self, handler: &HandlerRef) -> bool {
        self.chain.remove(handler)
    }

    /// 订阅：为 `id` 增加一次连接注册，返回注册计数。
    pub fn subscribe(&self, id: &str, connection: ConnectionRef) -> usize {
        self.fan_out.add_connection(id, connection)
    }

    /// 退订：语义见 [`ConnectionRegistry::remove_connection`](crate::fanout::ConnectionRegistry::remove_connection)。
    pub fn unsubscribe(&self, id: &str) -> Option<ConnectionRef> {
        self.fan_out.remove_connection(id)
    }

    /// 同节点直连时使用的当前首个 Handler，链为空时为扇出阶段。
    pub fn direct_connection(&self) -> HandlerRef {
        self.chain.head()
    }

    /// 从入口注入事件。
    pub fn publish(&self, event: ChannelEvent, end_of_batch: bool) {
        self.chain.entry().handle(event, end_of_batch);
    }

    /// 入口阶段。
    pub fn entry(&self) -> &HandlerRef {
        self.chain.entry()
    }

    pub fn chain(&self) -> &HandlerChain {
        &self.chain
    }

    pub fn fan_out(&self) -> &Arc<dyn FanOutHandler> {
        &self.fan_out
    }

    pub fn subscriber_count(&self) -> usize {
        self.fan_out.registry().len()
    }

    pub fn handler_count(&self) -> usize {
        self.chain.len()
    }
}

impl fmt::Debug for EventChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventChannel")
            .field("uri", &self.uri)
            .field("deployable", &self.deployable)
            .field("side", &self.side)
            .field("chain", &self.chain)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
