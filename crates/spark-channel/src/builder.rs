//! 从 [`ChannelConfig`] 装配通道实例。
//!
//! # 设计背景（Why）
//! - 部署期需要把“声明式配置”和“运行时服务（工作池、区域拓扑、复制监视器）”组合成可用通道，
//!   这一步集中在 [`ChannelBuilder`]，管理器与测试共享同一装配路径。
//!
//! # 契约说明（What）
//! - `delivery = async` 使用 [`ChannelServices::worker_pool`] 构造异步扇出阶段；
//! - `replicate = true` 时把 [`ReplicationHandler`] 作为第一个处理阶段安装，并向拓扑注册入站监听；
//!   服务未提供拓扑时返回 [`ChannelError::ReplicationUnavailable`]；
//! - 装配失败不会留下已注册的监听器。

use std::{fmt, sync::Arc};

use crate::{
    channel::EventChannel,
    config::{ChannelConfig, DeliveryMode},
    error::ChannelError,
    handler::HandlerRef,
    replication::{ReplicationHandler, ReplicationMonitor, TracingReplicationMonitor, ZoneTopology},
    runtime::WorkerPool,
};

/// 装配通道所需的运行时服务。
#[derive(Clone)]
pub struct ChannelServices {
    worker_pool: Arc<dyn WorkerPool>,
    topology: Option<Arc<dyn ZoneTopology>>,
    monitor: Arc<dyn ReplicationMonitor>,
}

impl ChannelServices {
    /// 只带工作池的服务集合；复制监视器默认为 [`TracingReplicationMonitor`]。
    pub fn new(worker_pool: Arc<dyn WorkerPool>) -> Self {
        Self {
            worker_pool,
            topology: None,
            monitor: Arc::new(TracingReplicationMonitor),
        }
    }

    pub fn with_topology(mut self, topology: Arc<dyn ZoneTopology>) -> Self {
        self.topology = Some(topology);
        self
    }

    pub fn with_monitor(mut self, monitor: Arc<dyn ReplicationMonitor>) -> Self {
        self.monitor = monitor;
        self
    }

    pub fn worker_pool(&self) -> &Arc<dyn WorkerPool> {
        &self.worker_pool
    }

    pub fn topology(&self) -> Option<&Arc<dyn ZoneTopology>> {
        self.topology.as_ref()
    }

    pub fn monitor(&self) -> &Arc<dyn ReplicationMonitor> {
        &self.monitor
    }
}

impl fmt::Debug for ChannelServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelServices")
            .field(
                "runtime",
                &self.topology.as_ref().map(|topology| topology.runtime_name()),
            )
            .finish_non_exhaustive()
    }
}

/// 装配结果：通道及其复制阶段（若有）。
#[derive(Clone, Debug)]
pub struct BuiltChannel {
    channel: Arc<EventChannel>,
    replication: Option<Arc<ReplicationHandler>>,
}

impl BuiltChannel {
    pub(crate) fn from_channel(channel: Arc<EventChannel>) -> Self {
        Self {
            channel,
            replication: None,
        }
    }

    pub fn channel(&self) -> &Arc<EventChannel> {
        &self.channel
    }

    pub fn replication(&self) -> Option<&Arc<ReplicationHandler>> {
        self.replication.as_ref()
    }

    pub fn into_channel(self) -> Arc<EventChannel> {
        self.channel
    }
}

/// 通道装配器。
#[derive(Clone, Debug)]
pub struct ChannelBuilder {
    services: ChannelServices,
}

impl ChannelBuilder {
    pub fn new(services: ChannelServices) -> Self {
        Self { services }
    }

    pub fn services(&self) -> &ChannelServices {
        &self.services
    }

    /// 校验配置并装配通道。
    pub fn build(&self, config: &ChannelConfig) -> Result<BuiltChannel, ChannelError> {
        config.validate()?;

        let channel = match config.delivery {
            DeliveryMode::Sync => {
                EventChannel::synchronous(&config.uri, &config.deployable, config.side)
            }
            DeliveryMode::Async => EventChannel::asynchronous(
                &config.uri,
                &config.deployable,
                config.side,
                Arc::clone(&self.services.worker_pool),
            ),
        };

        let replication = if config.replicate {
            let topology = self.services.topology.as_ref().ok_or_else(|| {
                ChannelError::ReplicationUnavailable {
                    uri: config.uri.clone(),
                }
            })?;
            let handler = ReplicationHandler::install(
                config.replication_name(),
                Arc::clone(topology),
                Arc::clone(&self.services.monitor),
            )
            .map_err(|source| ChannelError::Replication {
                uri: config.uri.clone(),
                source,
            })?;
            channel.add_handler(Arc::clone(&handler) as HandlerRef);
            Some(handler)
        } else {
            None
        };

        tracing::debug!(
            channel = %config.uri,
            side = ?config.side,
            delivery = ?config.delivery,
            replicate = config.replicate,
            "channel built"
        );
        Ok(BuiltChannel {
            channel: Arc::new(channel),
            replication,
        })
    }

    /// 释放装配期获取的外部资源：注销复制监听器。
    pub fn dispose(&self, built: &BuiltChannel) {
        if let (Some(handler), Some(topology)) = (&built.replication, &self.services.topology) {
            topology.unregister(handler.channel());
            tracing::debug!(channel = %built.channel.uri(), "replication listener unregistered");
        }
    }
}
