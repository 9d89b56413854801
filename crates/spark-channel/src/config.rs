//! 通道部署配置。
//!
//! # 设计背景（Why）
//! - 部署子系统以声明式配置描述“部署单元内有哪些通道、以何种方式投递、是否跨节点复制”，
//!   再交给 [`ChannelManager`](crate::manager::ChannelManager) 装配；
//! - 配置以 TOML 承载，与运行时其他配置文件保持同一格式。
//!
//! # 契约说明（What）
//! - `uri` 与 `deployable` 必填；`side` 默认 `collocated`，`delivery` 默认 `sync`；
//! - `replicate = true` 时使用 `replication_name`（缺省为 `uri`）作为区域内的逻辑通道名；
//! - 同一配置集合内 `(uri, side)` 不得重复。
//!
//! ```toml
//! [telemetry]
//! filter = "spark_channel=debug"
//!
//! [[channel]]
//! uri = "channel://quotes"
//! deployable = "trading.composite"
//! delivery = "async"
//! replicate = true
//! ```

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{channel::ChannelSide, error::ConfigError};

/// 扇出投递方式。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    /// 在发布线程上同步投递。
    #[default]
    Sync,
    /// 通过工作池异步投递，批次结束标志恒为 `true`。
    Async,
}

/// 单个通道的配置。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelConfig {
    pub uri: String,
    pub deployable: String,
    #[serde(default)]
    pub side: ChannelSide,
    #[serde(default)]
    pub delivery: DeliveryMode,
    #[serde(default)]
    pub replicate: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_name: Option<String>,
}

impl ChannelConfig {
    pub fn new(uri: impl Into<String>, deployable: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            deployable: deployable.into(),
            side: ChannelSide::default(),
            delivery: DeliveryMode::default(),
            replicate: false,
            replication_name: None,
        }
    }

    pub fn with_side(mut self, side: ChannelSide) -> Self {
        self.side = side;
        self
    }

    pub fn with_delivery(mut self, delivery: DeliveryMode) -> Self {
        self.delivery = delivery;
        self
    }

    /// 开启复制；`name` 为 `None` 时以 `uri` 作为逻辑通道名。
    pub fn replicated(mut self, name: Option<String>) -> Self {
        self.replicate = true;
        self.replication_name = name;
        self
    }

    /// 区域内使用的逻辑通道名。
    pub fn replication_name(&self) -> &str {
        self.replication_name.as_deref().unwrap_or(&self.uri)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.uri.trim().is_empty() {
            return Err(ConfigError::MissingField { field: "uri" });
        }
        if self.deployable.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "deployable",
            });
        }
        if self
            .replication_name
            .as_deref()
            .is_some_and(|name| name.trim().is_empty())
        {
            return Err(ConfigError::MissingField {
                field: "replication_name",
            });
        }
        Ok(())
    }
}

/// 日志配置。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TelemetryConfig {
    /// `EnvFilter` 指令。
    #[serde(default = "TelemetryConfig::default_filter")]
    pub filter: String,
}

impl TelemetryConfig {
    fn default_filter() -> String {
        "info".to_owned()
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            filter: Self::default_filter(),
        }
    }
}

/// 一组通道配置及其日志设置。
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelSetConfig {
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default, rename = "channel")]
    pub channels: Vec<ChannelConfig>,
}

impl ChannelSetConfig {
    /// 解析并校验 TOML 文本。
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for channel in &self.channels {
            channel.validate()?;
            if !seen.insert((channel.uri.as_str(), channel.side)) {
                return Err(ConfigError::DuplicateEntry {
                    uri: channel.uri.clone(),
                });
            }
        }
        Ok(())
    }
}
