//! 通道 Handler 链的结构维护。
//!
//! # 设计背景（Why）
//! - 链路形态固定为 `entry → H1 → … → Hn → fan-out`：入口阶段与扇出阶段由通道创建并独占，
//!   中间的 Handler 由部署代码在运行期增删；
//! - 分发线程沿 `next` 指针无锁前进，结构变更则需串行化，因此本模块内置一把变更锁，
//!   不把“外部串行化”作为调用方义务。
//!
//! # 逻辑解析（How）
//! - `handlers` 以 `ArcSwap<Vec<HandlerRef>>` 保存安装顺序的快照，供查找前驱/后继与自省；
//! - 插入：先把新 Handler 的后继指向扇出阶段，再把原尾部（或入口）指向新 Handler，
//!   保证任何时刻从入口出发都能到达扇出阶段；
//! - 移除：把前驱的后继直接改为被移除者的后继；被移除者自身的 `next` 保持不变，
//!   正在其内部执行的事件仍可继续向后传递；
//! - 每次提交后自增 `epoch` 并输出 `channel.chain mutation applied` 日志。
//!
//! # 契约说明（What）
//! - 事件按安装顺序经过 Handler；
//! - 同一 Handler 实例至多安装一次：重复插入返回 `None`，链路与 `epoch` 不变；
//! - `remove` 对不在链中的 Handler 返回 `false`，链路不变。

use std::{fmt, sync::Arc};

use arc_swap::ArcSwap;

use crate::{
    handler::{HandlerRef, same_handler},
    sync::{AtomicU64, Mutex, Ordering},
};

#[derive(Clone, Copy, Debug)]
enum ChainMutationKind {
    Add,
    Remove,
}

impl ChainMutationKind {
    fn as_label(self) -> &'static str {
        match self {
            ChainMutationKind::Add => "add",
            ChainMutationKind::Remove => "remove",
        }
    }
}

/// 入口与扇出阶段之间的可变 Handler 链。
pub struct HandlerChain {
    label: Arc<str>,
    entry: HandlerRef,
    terminal: HandlerRef,
    handlers: ArcSwap<Vec<HandlerRef>>,
    mutation: Mutex<()>,
    epoch: AtomicU64,
}

impl HandlerChain {
    /// 构造空链并把入口直接链接到终端阶段。
    ///
    /// - **契约 (What)**：`label` 仅用于日志；`terminal` 必须是拒绝后继的终端阶段。
    pub fn new(label: impl Into<Arc<str>>, entry: HandlerRef, terminal: HandlerRef) -> Self {
        entry.set_next(Arc::clone(&terminal));
        Self {
            label: label.into(),
            entry,
            terminal,
            handlers: ArcSwap::from_pointee(Vec::new()),
            mutation: Mutex::new(()),
            epoch: AtomicU64::new(0),
        }
    }

    /// 在扇出阶段之前追加 Handler，返回提交后的 epoch。
    ///
    /// 已在链中的实例不会再次安装：其 `next` 保持原值，返回 `None`。
    pub fn insert_at_tail(&self, handler: HandlerRef) -> Option<u64> {
        let _guard = self.mutation.lock();
        let current = self.handlers.load_full();
        if current
            .iter()
            .any(|installed| same_handler(installed, &handler))
        {
            tracing::warn!(chain = %self.label, "handler already installed; insertion rejected");
            return None;
        }
        handler.set_next(Arc::clone(&self.terminal));
        let predecessor = current.last().unwrap_or(&self.entry);
        predecessor.set_next(Arc::clone(&handler));

        let mut chain: Vec<_> = current.iter().cloned().collect();
        chain.push(handler);
        Some(self.commit(chain, ChainMutationKind::Add))
    }

    /// 从链中摘除 Handler；不在链中时返回 `false`。
    pub fn remove(&self, handler: &HandlerRef) -> bool {
        let _guard = self.mutation.lock();
        let current = self.handlers.load_full();
        let Some(position) = current
            .iter()
            .position(|installed| same_handler(installed, handler))
        else {
            tracing::debug!(chain = %self.label, "handler not installed; removal ignored");
            return false;
        };

        let predecessor = if position == 0 {
            &self.entry
        } else {
            &current[position - 1]
        };
        let successor = current.get(position + 1).unwrap_or(&self.terminal);
        predecessor.set_next(Arc::clone(successor));

        let mut chain: Vec<_> = current.iter().cloned().collect();
        chain.remove(position);
        self.commit(chain, ChainMutationKind::Remove);
        true
    }

    /// 入口阶段。
    pub fn entry(&self) -> &HandlerRef {
        &self.entry
    }

    /// 终端（扇出）阶段。
    pub fn terminal(&self) -> &HandlerRef {
        &self.terminal
    }

    /// 当前首个 Handler；链为空时返回终端阶段。
    pub fn head(&self) -> HandlerRef {
        self.handlers
            .load()
            .first()
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.terminal))
    }

    /// 安装顺序的 Handler 快照。
    pub fn snapshot(&self) -> Arc<Vec<HandlerRef>> {
        self.handlers.load_full()
    }

    pub fn len(&self) -> usize {
        self.handlers.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 结构变更次数。
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    fn commit(&self, chain: Vec<HandlerRef>, mutation: ChainMutationKind) -> u64 {
        let handlers = chain.len();
        self.handlers.store(Arc::new(chain));
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!(
            chain = %self.label,
            op = mutation.as_label(),
            handlers,
            epoch,
            "channel.chain mutation applied"
        );
        epoch
    }
}

impl fmt::Debug for HandlerChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerChain")
            .field("label", &self.label)
            .field("handlers", &self.len())
            .field("epoch", &self.epoch())
            .finish()
    }
}
