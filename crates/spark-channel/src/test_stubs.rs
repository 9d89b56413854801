//! 测试桩集合：可控的工作池、记录型 Handler 与拓扑。
//!
//! # 设计背景（Why）
//! - 异步扇出与复制路径依赖外部协作者，单元测试与集成测试需要能“暂停”工作池、
//!   观察投递顺序并注入发送失败；
//! - 统一维护这些桩对象，避免在各测试文件中重复定义。

use std::{
    collections::{HashMap, VecDeque},
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use parking_lot::Mutex;

use crate::{
    error::TopologyError,
    event::{ChannelEvent, PortableEvent},
    handler::{EventStreamHandler, HandlerRef, NextHandler},
    replication::{ReplicatedEvent, ReplicationListener, ZoneTopology},
    runtime::{Work, WorkerPool},
};

/// 只排队、不执行的工作池；调用 [`run_pending`](Self::run_pending) 时才在当前线程执行。
#[derive(Default)]
pub struct DeferredWorkerPool {
    queue: Mutex<VecDeque<Work>>,
    submissions: AtomicUsize,
}

impl DeferredWorkerPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// 累计提交次数。
    pub fn submissions(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    /// 尚未执行的工作单元数量。
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// 依次执行排队的工作单元（包括执行期间新提交的），返回执行数量。
    pub fn run_pending(&self) -> usize {
        let mut executed = 0;
        loop {
            let Some(work) = self.queue.lock().pop_front() else {
                return executed;
            };
            work();
            executed += 1;
        }
    }
}

impl WorkerPool for DeferredWorkerPool {
    fn execute(&self, work: Work) {
        self.submissions.fetch_add(1, Ordering::SeqCst);
        self.queue.lock().push_back(work);
    }
}

impl fmt::Debug for DeferredWorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredWorkerPool")
            .field("pending", &self.pending())
            .field("submissions", &self.submissions())
            .finish()
    }
}

/// 一次投递记录。
#[derive(Clone, Debug)]
pub struct Delivery {
    pub name: String,
    pub end_of_batch: bool,
    pub event: ChannelEvent,
}

/// 多个记录型 Handler 共享的投递日志。
#[derive(Clone, Debug, Default)]
pub struct Journal {
    deliveries: Arc<Mutex<Vec<Delivery>>>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, name: &str, event: ChannelEvent, end_of_batch: bool) {
        self.deliveries.lock().push(Delivery {
            name: name.to_owned(),
            end_of_batch,
            event,
        });
    }

    /// `(name, end_of_batch)` 形式的记录。
    pub fn entries(&self) -> Vec<(String, bool)> {
        self.deliveries
            .lock()
            .iter()
            .map(|delivery| (delivery.name.clone(), delivery.end_of_batch))
            .collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.deliveries
            .lock()
            .iter()
            .map(|delivery| delivery.name.clone())
            .collect()
    }

    pub fn events(&self) -> Vec<ChannelEvent> {
        self.deliveries
            .lock()
            .iter()
            .map(|delivery| delivery.event.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.deliveries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.deliveries.lock().clear();
    }
}

/// 记录经过的事件并转发给后继的 Handler。
#[derive(Debug)]
pub struct RecordingHandler {
    name: String,
    journal: Journal,
    next: NextHandler,
}

impl RecordingHandler {
    pub fn new(name: impl Into<String>, journal: Journal) -> Self {
        Self {
            name: name.into(),
            journal,
            next: NextHandler::new(),
        }
    }
}

impl EventStreamHandler for RecordingHandler {
    fn handle(&self, event: ChannelEvent, end_of_batch: bool) {
        self.journal.record(&self.name, event.clone(), end_of_batch);
        self.next.forward(event, end_of_batch);
    }

    fn set_next(&self, next: HandlerRef) {
        self.next.set(next);
    }

    fn next(&self) -> Option<HandlerRef> {
        self.next.get()
    }
}

/// 记录全部发送请求的拓扑，可按需模拟发送失败。
pub struct RecordingTopology {
    runtime: String,
    sent: Mutex<Vec<(String, PortableEvent)>>,
    listeners: Mutex<HashMap<String, Arc<dyn ReplicationListener>>>,
    failing: AtomicBool,
}

impl RecordingTopology {
    pub fn new(runtime: impl Into<String>) -> Self {
        Self {
            runtime: runtime.into(),
            sent: Mutex::new(Vec::new()),
            listeners: Mutex::new(HashMap::new()),
            failing: AtomicBool::new(false),
        }
    }

    /// 打开后所有发送都返回 [`TopologyError::SendFailed`]。
    pub fn fail_sends(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<(String, PortableEvent)> {
        self.sent.lock().clone()
    }

    pub fn listener(&self, channel: &str) -> Option<Arc<dyn ReplicationListener>> {
        self.listeners.lock().get(channel).cloned()
    }

    /// 模拟来自 `source` 的入站复制事件；通道未注册监听器时返回 `false`。
    pub fn deliver_inbound(&self, channel: &str, source: &str, payload: PortableEvent) -> bool {
        let Some(listener) = self.listener(channel) else {
            return false;
        };
        listener.on_message(ReplicatedEvent {
            channel: channel.to_owned(),
            source: source.to_owned(),
            payload,
        });
        true
    }
}

impl ZoneTopology for RecordingTopology {
    fn runtime_name(&self) -> &str {
        &self.runtime
    }

    fn send_asynchronous(&self, channel: &str, event: &PortableEvent) -> Result<(), TopologyError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(TopologyError::SendFailed {
                channel: channel.to_owned(),
                detail: "zone partitioned".to_owned(),
            });
        }
        self.sent.lock().push((channel.to_owned(), event.clone()));
        Ok(())
    }

    fn register(
        &self,
        channel: &str,
        listener: Arc<dyn ReplicationListener>,
    ) -> Result<(), TopologyError> {
        let mut listeners = self.listeners.lock();
        if listeners.contains_key(channel) {
            return Err(TopologyError::ListenerExists {
                channel: channel.to_owned(),
            });
        }
        listeners.insert(channel.to_owned(), listener);
        Ok(())
    }

    fn unregister(&self, channel: &str) {
        self.listeners.lock().remove(channel);
    }
}

impl fmt::Debug for RecordingTopology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingTopology")
            .field("runtime", &self.runtime)
            .field("sent", &self.sent.lock().len())
            .finish_non_exhaustive()
    }
}
