//! 事件流 Handler 契约与基础实现。
//!
//! # 设计背景（Why）
//! - 通道的 Handler 链是单向链表：每个 Handler 只认识自己的后继，事件沿 `next` 逐级传递，直至终端扇出阶段；
//! - 链路由部署代码在运行期增删，而分发线程同时在读取 `next`，因此后继槽位必须可原子替换。
//!
//! # 契约说明（What）
//! - [`EventStreamHandler`] 是链中每个节点必须实现的三元组：`handle` / `set_next` / `next`；
//! - 终端阶段必须在 `set_next` 时立即 panic，并在 `next` 返回 `None`；
//! - [`NextHandler`] 为实现者提供现成的后继槽位，基于 `ArcSwapOption` 实现读无锁、写原子替换。

use std::{fmt, sync::Arc};

use arc_swap::ArcSwapOption;

use crate::event::ChannelEvent;

/// 事件流中的一个处理阶段。
///
/// # 教案式说明
/// - **意图（Why）**：生产者 Handler、过滤/转换阶段、复制阶段与扇出阶段共享同一能力面，
///   通道只依赖这一 trait 组织链路。
/// - **契约（What）**：
///   - `handle`：处理事件并（通常）转发给后继；可能被多个线程并发调用；
///   - `set_next`：替换后继；只应由拥有链路结构的一方（通道或事件流）调用；
///   - `next`：返回当前后继，终端阶段恒为 `None`。
pub trait EventStreamHandler: Send + Sync + 'static {
    /// 处理一条事件，`end_of_batch` 标识该事件是否为当前微批的最后一条。
    fn handle(&self, event: ChannelEvent, end_of_batch: bool);

    /// 设置后继阶段。
    fn set_next(&self, next: HandlerRef);

    /// 返回当前后继阶段。
    fn next(&self) -> Option<HandlerRef>;
}

/// Handler 的共享引用。
pub type HandlerRef = Arc<dyn EventStreamHandler>;

/// 判断两个引用是否指向同一 Handler 实例（忽略虚表差异）。
pub fn same_handler(left: &HandlerRef, right: &HandlerRef) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(left), Arc::as_ptr(right))
}

/// 可原子替换的后继槽位。
///
/// # 教案式说明
/// - **逻辑（How）**：`ArcSwapOption` 要求被存储类型为 `Sized`，因此内部多包一层 `Arc<HandlerRef>`；
///   读取时克隆出内层 `HandlerRef`，调用方拿到的引用在本次转发期间保持有效。
/// - **契约（What）**：`set` 之后的 `get`/`forward` 立即可见新后继；并发读者要么看到旧后继，要么看到新后继。
pub struct NextHandler {
    slot: ArcSwapOption<HandlerRef>,
}

impl NextHandler {
    pub fn new() -> Self {
        Self {
            slot: ArcSwapOption::empty(),
        }
    }

    pub fn set(&self, next: HandlerRef) {
        self.slot.store(Some(Arc::new(next)));
    }

    pub fn get(&self) -> Option<HandlerRef> {
        self.slot.load_full().map(|next| HandlerRef::clone(&next))
    }

    /// 将事件交给后继；尚未链接后继时丢弃事件并记录 trace 日志。
    pub fn forward(&self, event: ChannelEvent, end_of_batch: bool) {
        match self.get() {
            Some(next) => next.handle(event, end_of_batch),
            None => tracing::trace!(end_of_batch, "event dropped: handler has no successor"),
        }
    }
}

impl Default for NextHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for NextHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NextHandler")
            .field("linked", &self.slot.load().is_some())
            .finish()
    }
}

/// 原样转发事件的阶段，用作通道入口。
#[derive(Debug, Default)]
pub struct PassThroughHandler {
    next: NextHandler,
}

impl PassThroughHandler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventStreamHandler for PassThroughHandler {
    fn handle(&self, event: ChannelEvent, end_of_batch: bool) {
        self.next.forward(event, end_of_batch);
    }

    fn set_next(&self, next: HandlerRef) {
        self.next.set(next);
    }

    fn next(&self) -> Option<HandlerRef> {
        self.next.get()
    }
}

type EventPredicate = dyn Fn(&ChannelEvent) -> bool + Send + Sync;

/// 按谓词过滤事件的阶段：谓词为 `false` 的事件不再向后传递。
pub struct FilterHandler {
    predicate: Box<EventPredicate>,
    next: NextHandler,
}

impl FilterHandler {
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&ChannelEvent) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Box::new(predicate),
            next: NextHandler::new(),
        }
    }

    /// 仅放行可移植负载类型名等于 `type_name` 的事件。
    pub fn portable_type(type_name: impl Into<String>) -> Self {
        let type_name = type_name.into();
        Self::new(move |event| {
            event
                .as_portable()
                .is_some_and(|portable| portable.type_name() == type_name)
        })
    }
}

impl EventStreamHandler for FilterHandler {
    fn handle(&self, event: ChannelEvent, end_of_batch: bool) {
        if (self.predicate)(&event) {
            self.next.forward(event, end_of_batch);
        }
    }

    fn set_next(&self, next: HandlerRef) {
        self.next.set(next);
    }

    fn next(&self) -> Option<HandlerRef> {
        self.next.get()
    }
}

impl fmt::Debug for FilterHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterHandler")
            .field("next", &self.next)
            .finish_non_exhaustive()
    }
}

type EventCallback = dyn Fn(ChannelEvent, bool) + Send + Sync;

/// 将事件交给消费者回调的阶段，通常位于订阅连接事件流的尾部。
///
/// - **契约 (What)**：先调用回调，若存在后继再转发同一事件；回调可能被并发调用。
pub struct ConsumerHandler {
    callback: Box<EventCallback>,
    next: NextHandler,
}

impl ConsumerHandler {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(ChannelEvent, bool) + Send + Sync + 'static,
    {
        Self {
            callback: Box::new(callback),
            next: NextHandler::new(),
        }
    }
}

impl EventStreamHandler for ConsumerHandler {
    fn handle(&self, event: ChannelEvent, end_of_batch: bool) {
        match self.next.get() {
            Some(next) => {
                (self.callback)(event.clone(), end_of_batch);
                next.handle(event, end_of_batch);
            }
            None => (self.callback)(event, end_of_batch),
        }
    }

    fn set_next(&self, next: HandlerRef) {
        self.next.set(next);
    }

    fn next(&self) -> Option<HandlerRef> {
        self.next.get()
    }
}

impl fmt::Debug for ConsumerHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsumerHandler")
            .field("next", &self.next)
            .finish_non_exhaustive()
    }
}
