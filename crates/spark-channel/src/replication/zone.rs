//! 进程内回环区域，供单进程多运行时部署与集成测试使用。
//!
//! - **契约 (What)**：每个成员以运行时名称加入区域；发送只投递给“其他”成员上同名通道的监听器，
//!   投递经由构造时给定的工作池执行，发送方不等待。
//! - **风险 (Trade-offs)**：成员表基于 `DashMap` 分片加锁；投递前先收集目标再释放分片锁，
//!   避免监听器回调重入区域时发生死锁。

use std::{collections::HashMap, fmt, sync::Arc};

use dashmap::DashMap;

use super::{ReplicatedEvent, ReplicationListener, ZoneTopology};
use crate::{error::TopologyError, event::PortableEvent, runtime::WorkerPool};

type ChannelListeners = HashMap<String, Arc<dyn ReplicationListener>>;

/// 进程内区域。
pub struct InMemoryZone {
    members: DashMap<String, ChannelListeners>,
    pool: Arc<dyn WorkerPool>,
}

impl InMemoryZone {
    pub fn new(pool: Arc<dyn WorkerPool>) -> Arc<Self> {
        Arc::new(Self {
            members: DashMap::new(),
            pool,
        })
    }

    /// 以 `runtime` 名称加入区域；重复加入会保留已注册的监听器。
    pub fn join(self: &Arc<Self>, runtime: impl Into<String>) -> ZoneMember {
        let runtime = runtime.into();
        self.members.entry(runtime.clone()).or_default();
        tracing::debug!(runtime = %runtime, "runtime joined zone");
        ZoneMember {
            zone: Arc::clone(self),
            runtime,
        }
    }

    /// 按名称排序的成员列表。
    pub fn members(&self) -> Vec<String> {
        let mut names: Vec<_> = self.members.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }
}

impl fmt::Debug for InMemoryZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryZone")
            .field("members", &self.members())
            .finish_non_exhaustive()
    }
}

/// 区域中的一个成员，即某个运行时看到的拓扑服务。
pub struct ZoneMember {
    zone: Arc<InMemoryZone>,
    runtime: String,
}

impl ZoneMember {
    /// 离开区域并丢弃本成员注册的全部监听器。
    pub fn leave(&self) {
        self.zone.members.remove(&self.runtime);
        tracing::debug!(runtime = %self.runtime, "runtime left zone");
    }

    fn not_a_member(&self) -> TopologyError {
        TopologyError::NotAMember {
            runtime: self.runtime.clone(),
        }
    }
}

impl ZoneTopology for ZoneMember {
    fn runtime_name(&self) -> &str {
        &self.runtime
    }

    fn send_asynchronous(&self, channel: &str, event: &PortableEvent) -> Result<(), TopologyError> {
        if !self.zone.members.contains_key(&self.runtime) {
            return Err(self.not_a_member());
        }
        let targets: Vec<_> = self
            .zone
            .members
            .iter()
            .filter(|member| member.key() != &self.runtime)
            .filter_map(|member| member.value().get(channel).cloned())
            .collect();

        for listener in targets {
            let envelope = ReplicatedEvent {
                channel: channel.to_owned(),
                source: self.runtime.clone(),
                payload: event.clone(),
            };
            self.zone
                .pool
                .execute(Box::new(move || listener.on_message(envelope)));
        }
        Ok(())
    }

    fn register(
        &self,
        channel: &str,
        listener: Arc<dyn ReplicationListener>,
    ) -> Result<(), TopologyError> {
        let mut listeners = self
            .zone
            .members
            .get_mut(&self.runtime)
            .ok_or_else(|| self.not_a_member())?;
        if listeners.contains_key(channel) {
            return Err(TopologyError::ListenerExists {
                channel: channel.to_owned(),
            });
        }
        listeners.insert(channel.to_owned(), listener);
        Ok(())
    }

    fn unregister(&self, channel: &str) {
        if let Some(mut listeners) = self.zone.members.get_mut(&self.runtime) {
            listeners.remove(channel);
        }
    }
}

impl fmt::Debug for ZoneMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZoneMember")
            .field("runtime", &self.runtime)
            .finish_non_exhaustive()
    }
}
