//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 集中定义事件通道核心对外暴露的错误语义：通道注册、复制拓扑、配置解析与事件解码；
//! - 结构性编程错误（例如为终端扇出阶段设置后继）不在此处建模，而是直接 panic。
//!
//! ## 设计要求（What）
//! - 所有错误类型均派生 `thiserror::Error`，可直接交给 `anyhow` 等上层框架处理；
//! - 复制拓扑错误在 [`ReplicationHandler`](crate::replication::ReplicationHandler) 内被吞掉并上报监视器，
//!   绝不会传播到 `handle` 的调用方。

use thiserror::Error;

use crate::channel::ChannelSide;

/// 通道装配与注册阶段的错误域。
///
/// # 契约（What）
/// - 变体携带通道 URI 与侧别，便于运维定位具体部署单元；
/// - 均为可恢复错误：调用方可以修正配置后重试。
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ChannelError {
    /// 同一 `(uri, side)` 已注册通道。
    #[error("channel `{uri}` ({side:?}) is already registered")]
    DuplicateChannel { uri: String, side: ChannelSide },

    /// 查询或注销的通道不存在。
    #[error("channel `{uri}` ({side:?}) is not registered")]
    ChannelNotFound { uri: String, side: ChannelSide },

    /// 配置要求复制，但装配服务未提供拓扑实现。
    #[error("channel `{uri}` requires replication but no zone topology is available")]
    ReplicationUnavailable { uri: String },

    /// 向拓扑注册复制监听器失败。
    #[error("failed to register replication listener for channel `{uri}`: {source}")]
    Replication {
        uri: String,
        #[source]
        source: TopologyError,
    },

    /// 配置校验失败。
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// 区域拓扑（消息服务）返回的错误。
///
/// - **契约 (What)**：`channel` 为逻辑通道名；`detail` 为底层传输给出的可读原因。
/// - **风险 (Trade-offs)**：复制发送失败属于非致命错误，调用方只记录，不重试。
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum TopologyError {
    /// 异步发送未能入队。
    #[error("replication send on channel `{channel}` failed: {detail}")]
    SendFailed { channel: String, detail: String },

    /// 当前节点未加入任何区域。
    #[error("runtime `{runtime}` is not a member of the zone")]
    NotAMember { runtime: String },

    /// 同一通道重复注册监听器。
    #[error("a replication listener is already registered for channel `{channel}`")]
    ListenerExists { channel: String },
}

/// 通道配置解析与校验错误。
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// TOML 文本无法解析为配置结构。
    #[error("invalid channel configuration: {detail}")]
    Parse { detail: String },

    /// 必填字段为空。
    #[error("channel configuration field `{field}` must not be empty")]
    MissingField { field: &'static str },

    /// 同一配置集合内出现重复的 `(uri, side)`。
    #[error("channel `{uri}` is declared more than once for the same side")]
    DuplicateEntry { uri: String },
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        ConfigError::Parse {
            detail: value.message().to_owned(),
        }
    }
}

/// 事件负载解码错误。
#[derive(Debug, Error)]
pub enum EventError {
    /// 事件负载为本地不透明对象，不具备可移植表示。
    #[error("event payload is opaque and cannot be decoded")]
    NotPortable,

    /// 可移植负载与目标类型不匹配。
    #[error("portable payload `{type_name}` could not be decoded: {source}")]
    Decode {
        type_name: String,
        #[source]
        source: serde_json::Error,
    },

    /// 目标类型无法编码为可移植负载。
    #[error("value of type `{type_name}` could not be encoded: {source}")]
    Encode {
        type_name: &'static str,
        #[source]
        source: serde_json::Error,
    },
}
