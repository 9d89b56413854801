//! 通道管理器：按 `(uri, side)` 登记运行时中的全部通道实例。
//!
//! # 设计背景（Why）
//! - 连接装配、直连与卸载流程都需要按 URI 找到通道；同一逻辑通道在分布式部署中可能同时存在
//!   生产侧与消费侧实例，因此键中包含 [`ChannelSide`]；
//! - 使用计数记录有多少连接仍引用该通道，供上层在卸载前判断通道是否空闲。
//!
//! # 契约说明（What）
//! - `register` / `deploy` 对已存在的键返回 [`ChannelError::DuplicateChannel`]；
//! - `get_and_decrement` 在计数为零时保持为零；
//! - `unregister` / `undeploy` 会注销复制监听器。

use std::{fmt, sync::Arc};

use dashmap::{DashMap, mapref::entry::Entry};

use crate::{
    builder::{BuiltChannel, ChannelBuilder},
    channel::{ChannelSide, EventChannel},
    config::{ChannelConfig, ChannelSetConfig},
    error::ChannelError,
};

type ChannelKey = (String, ChannelSide);

struct ManagedChannel {
    built: BuiltChannel,
    use_count: usize,
}

/// 运行时通道注册表。
pub struct ChannelManager {
    builder: ChannelBuilder,
    channels: DashMap<ChannelKey, ManagedChannel>,
}

impl ChannelManager {
    pub fn new(builder: ChannelBuilder) -> Self {
        Self {
            builder,
            channels: DashMap::new(),
        }
    }

    pub fn builder(&self) -> &ChannelBuilder {
        &self.builder
    }

    /// 按配置装配并登记通道。
    ///
    /// 装配（含拓扑注册）在表锁之外完成；插入时若键已被并发占用，则释放刚装配的通道并返回重复错误。
    pub fn deploy(&self, config: &ChannelConfig) -> Result<Arc<EventChannel>, ChannelError> {
        let key = (config.uri.clone(), config.side);
        if self.channels.contains_key(&key) {
            return Err(duplicate(&config.uri, config.side));
        }

        let built = self.builder.build(config)?;
        match self.channels.entry(key) {
            Entry::Occupied(_) => {
                self.builder.dispose(&built);
                Err(duplicate(&config.uri, config.side))
            }
            Entry::Vacant(slot) => {
                let channel = Arc::clone(built.channel());
                slot.insert(ManagedChannel {
                    built,
                    use_count: 0,
                });
                tracing::info!(
                    channel = %config.uri,
                    side = ?config.side,
                    deployable = %config.deployable,
                    "channel deployed"
                );
                Ok(channel)
            }
        }
    }

    /// 依次部署配置集合中的通道；任一失败时回滚本次已部署的通道。
    pub fn deploy_all(
        &self,
        config: &ChannelSetConfig,
    ) -> Result<Vec<Arc<EventChannel>>, ChannelError> {
        config.validate()?;
        let mut deployed = Vec::with_capacity(config.channels.len());
        for channel in &config.channels {
            match self.deploy(channel) {
                Ok(built) => deployed.push(built),
                Err(error) => {
                    for channel in &deployed {
                        // 回滚：本次部署的通道必然仍在表中。
                        let _ = self.unregister(channel.uri(), channel.side());
                    }
                    return Err(error);
                }
            }
        }
        Ok(deployed)
    }

    /// 登记外部构造的通道。
    pub fn register(&self, channel: Arc<EventChannel>) -> Result<(), ChannelError> {
        match self.channels.entry((channel.uri().to_owned(), channel.side())) {
            Entry::Occupied(_) => Err(duplicate(channel.uri(), channel.side())),
            Entry::Vacant(slot) => {
                tracing::debug!(
                    channel = %channel.uri(),
                    side = ?channel.side(),
                    "channel registered"
                );
                slot.insert(ManagedChannel {
                    built: BuiltChannel::from_channel(channel),
                    use_count: 0,
                });
                Ok(())
            }
        }
    }

    pub fn get(&self, uri: &str, side: ChannelSide) -> Option<Arc<EventChannel>> {
        self.channels
            .get(&(uri.to_owned(), side))
            .map(|entry| Arc::clone(entry.built.channel()))
    }

    /// 查询通道并把使用计数加一。
    pub fn get_and_increment(&self, uri: &str, side: ChannelSide) -> Option<Arc<EventChannel>> {
        self.channels.get_mut(&(uri.to_owned(), side)).map(|mut entry| {
            entry.use_count += 1;
            Arc::clone(entry.built.channel())
        })
    }

    /// 查询通道并把使用计数减一（不低于零）。
    pub fn get_and_decrement(&self, uri: &str, side: ChannelSide) -> Option<Arc<EventChannel>> {
        self.channels.get_mut(&(uri.to_owned(), side)).map(|mut entry| {
            entry.use_count = entry.use_count.saturating_sub(1);
            Arc::clone(entry.built.channel())
        })
    }

    /// 当前使用计数；通道不存在时为 `None`。
    pub fn use_count(&self, uri: &str, side: ChannelSide) -> Option<usize> {
        self.channels
            .get(&(uri.to_owned(), side))
            .map(|entry| entry.use_count)
    }

    /// 注销通道并释放其复制监听器。
    pub fn unregister(
        &self,
        uri: &str,
        side: ChannelSide,
    ) -> Result<Arc<EventChannel>, ChannelError> {
        let (_, managed) = self
            .channels
            .remove(&(uri.to_owned(), side))
            .ok_or_else(|| ChannelError::ChannelNotFound {
                uri: uri.to_owned(),
                side,
            })?;
        self.builder.dispose(&managed.built);
        tracing::info!(channel = %uri, side = ?side, "channel unregistered");
        Ok(managed.built.into_channel())
    }

    /// 注销部署单元拥有的全部通道，返回被移除的通道（按 URI 排序）。
    pub fn undeploy(&self, deployable: &str) -> Vec<Arc<EventChannel>> {
        let keys: Vec<ChannelKey> = self
            .channels
            .iter()
            .filter(|entry| entry.built.channel().deployable() == deployable)
            .map(|entry| entry.key().clone())
            .collect();

        let mut removed: Vec<_> = keys
            .into_iter()
            .filter_map(|(uri, side)| self.unregister(&uri, side).ok())
            .collect();
        removed.sort_by(|a, b| (a.uri(), a.side()).cmp(&(b.uri(), b.side())));
        tracing::info!(deployable, channels = removed.len(), "deployable undeployed");
        removed
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

fn duplicate(uri: &str, side: ChannelSide) -> ChannelError {
    ChannelError::DuplicateChannel {
        uri: uri.to_owned(),
        side,
    }
}

impl fmt::Debug for ChannelManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelManager")
            .field("channels", &self.len())
            .field("builder", &self.builder)
            .finish()
    }
}
