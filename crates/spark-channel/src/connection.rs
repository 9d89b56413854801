//! 订阅连接与其事件流。
//!
//! # 设计背景（Why）
//! - 扇出阶段并不直接认识消费者，只认识“连接”：一条从通道指向消费者或传输层的线路，
//!   其事件流的头部 Handler 即投递入口；
//! - 同一连接的事件流可在部署期追加 Handler（例如类型转换），因此也采用“互斥写、快照读”的结构。
//!
//! # 契约说明（What）
//! - [`EventStream::add_handler`] 把新 Handler 链接到原尾部之后，先完成链接再发布快照；
//!   已在事件流中的实例不会重复追加；
//! - [`ChannelConnection::event_stream`] 的返回值在连接生命周期内保持同一实例。

use std::{fmt, sync::Arc};

use arc_swap::ArcSwap;

use crate::{
    handler::{HandlerRef, same_handler},
    sync::Mutex,
};

/// 一条订阅连接的有序 Handler 列表。
pub struct EventStream {
    mutation: Mutex<()>,
    handlers: ArcSwap<Vec<HandlerRef>>,
}

impl EventStream {
    pub fn new() -> Self {
        Self {
            mutation: Mutex::new(()),
            handlers: ArcSwap::from_pointee(Vec::new()),
        }
    }

    /// 依次追加给定 Handler 构造事件流。
    pub fn with_handlers(handlers: impl IntoIterator<Item = HandlerRef>) -> Self {
        let stream = Self::new();
        for handler in handlers {
            stream.add_handler(handler);
        }
        stream
    }

    /// 在尾部追加 Handler，并把原尾部的后继指向它；该实例已在事件流中时返回 `false`。
    pub fn add_handler(&self, handler: HandlerRef) -> bool {
        let _guard = self.mutation.lock();
        let current = self.handlers.load_full();
        if current
            .iter()
            .any(|installed| same_handler(installed, &handler))
        {
            tracing::warn!("handler already in event stream; append rejected");
            return false;
        }
        if let Some(tail) = current.last() {
            tail.set_next(Arc::clone(&handler));
        }
        let mut next: Vec<_> = current.iter().cloned().collect();
        next.push(handler);
        self.handlers.store(Arc::new(next));
        true
    }

    /// 投递入口；空事件流返回 `None`。
    pub fn head(&self) -> Option<HandlerRef> {
        self.handlers.load().first().cloned()
    }

    pub fn tail(&self) -> Option<HandlerRef> {
        self.handlers.load().last().cloned()
    }

    pub fn len(&self) -> usize {
        self.handlers.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EventStream {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("handlers", &self.len())
            .finish()
    }
}

/// 通道与消费者（或传输层）之间的一条连接。
pub trait ChannelConnection: Send + Sync + 'static {
    fn event_stream(&self) -> &EventStream;
}

/// 连接的共享引用。
pub type ConnectionRef = Arc<dyn ChannelConnection>;

/// 只持有事件流的默认连接实现。
#[derive(Debug, Default)]
pub struct DefaultChannelConnection {
    stream: EventStream,
}

impl DefaultChannelConnection {
    pub fn new(stream: EventStream) -> Self {
        Self { stream }
    }

    /// 以单个 Handler 作为事件流构造连接。
    pub fn from_handler(handler: HandlerRef) -> Self {
        Self::new(EventStream::with_handlers([handler]))
    }
}

impl ChannelConnection for DefaultChannelConnection {
    fn event_stream(&self) -> &EventStream {
        &self.stream
    }
}
