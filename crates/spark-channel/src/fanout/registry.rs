//! 订阅连接的引用计数注册表。
//!
//! # 设计背景（Why）
//! - 多个生产者可能共享同一条物理连接，因而同一连接标识会被重复注册；只有注册计数归零时连接才真正移除；
//! - 分发线程在不加锁的情况下遍历连接集合，所以集合以“写时复制”的快照形式对外发布。
//!
//! # 逻辑解析（How）
//! - 写路径：在 `Mutex` 保护下修改注册条目，若集合成员发生变化，则构造新的 `Vec` 并通过
//!   `ArcSwap::store` 一次性替换快照，最后自增 `epoch`；
//! - 读路径：`snapshot` 调用 `ArcSwap::load_full` 返回 `Arc<Vec<_>>`，读者持有的旧快照永远不会被原地修改。
//!
//! # 契约说明（What）
//! - 快照按首次注册顺序排列；
//! - 仅计数变化（非首次注册 / 未归零的注销）不会重建快照，也不会自增 `epoch`。

use std::{fmt, sync::Arc};

use arc_swap::ArcSwap;

use crate::{
    connection::ConnectionRef,
    sync::{AtomicU64, Mutex, Ordering},
};

struct Registration {
    id: String,
    count: usize,
    connection: ConnectionRef,
}

/// 引用计数的连接集合。
pub struct ConnectionRegistry {
    entries: Mutex<Vec<Registration>>,
    snapshot: ArcSwap<Vec<ConnectionRef>>,
    epoch: AtomicU64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            snapshot: ArcSwap::from_pointee(Vec::new()),
            epoch: AtomicU64::new(0),
        }
    }

    /// 为 `id` 增加一次注册，返回新的注册计数。
    ///
    /// # 契约（What）
    /// - 首次注册时保存 `connection` 并重建快照；
    /// - 之后的重复注册只增加计数，传入的 `connection` 被忽略，保留首次注册的实例。
    pub fn add_connection(&self, id: &str, connection: ConnectionRef) -> usize {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.iter_mut().find(|entry| entry.id == id) {
            entry.count += 1;
            tracing::debug!(connection = id, count = entry.count, "connection reference added");
            return entry.count;
        }
        entries.push(Registration {
            id: id.to_owned(),
            count: 1,
            connection,
        });
        self.publish(&entries);
        tracing::debug!(connection = id, subscribers = entries.len(), "connection subscribed");
        1
    }

    /// 为 `id` 减少一次注册。
    ///
    /// # 契约（What）
    /// - 计数归零：移除连接、重建快照，并返回被移除的连接；
    /// - 计数未归零：返回仍然有效的连接，集合不变；
    /// - `id` 从未注册：返回 `None`。
    pub fn remove_connection(&self, id: &str) -> Option<ConnectionRef> {
        let mut entries = self.entries.lock();
        let position = entries.iter().position(|entry| entry.id == id)?;
        let entry = &mut entries[position];
        entry.count -= 1;
        if entry.count > 0 {
            tracing::debug!(connection = id, count = entry.count, "connection reference released");
            return Some(Arc::clone(&entry.connection));
        }
        let removed = entries.remove(position);
        self.publish(&entries);
        tracing::debug!(connection = id, subscribers = entries.len(), "connection unsubscribed");
        Some(removed.connection)
    }

    /// 当前连接快照；调用方可长期持有，后续变更不会影响它。
    #[inline]
    pub fn snapshot(&self) -> Arc<Vec<ConnectionRef>> {
        self.snapshot.load_full()
    }

    /// `id` 当前的注册计数，未注册为 0。
    pub fn count(&self, id: &str) -> usize {
        self.entries
            .lock()
            .iter()
            .find(|entry| entry.id == id)
            .map_or(0, |entry| entry.count)
    }

    /// 不同连接的数量。
    pub fn len(&self) -> usize {
        self.snapshot.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 快照重建次数，每次成员变化自增 1。
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    fn publish(&self, entries: &[Registration]) {
        let snapshot: Vec<_> = entries
            .iter()
            .map(|entry| Arc::clone(&entry.connection))
            .collect();
        self.snapshot.store(Arc::new(snapshot));
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("connections", &self.len())
            .field("epoch", &self.epoch())
            .finish()
    }
}
