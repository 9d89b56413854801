//! 日志安装入口。
//!
//! # 教案式说明
//! - **意图（Why）**：宿主进程只需调用一次 [`install`]，即可把通道核心的结构化日志（订阅变更、链路变更、
//!   复制失败、订阅者 panic）输出到标准输出；
//! - **逻辑（How）**：使用 `tracing-subscriber` 组装 `registry + EnvFilter + fmt` 并设置为全局 Subscriber；
//! - **契约（What）**：重复调用返回 [`TelemetryError::AlreadyInstalled`]；外部已设置 Subscriber 时返回
//!   [`TelemetryError::SubscriberAlreadySet`]。

use std::sync::OnceLock;

use thiserror::Error;
use tracing::dispatcher;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt};

use crate::config::TelemetryConfig;

/// 安装完成后记录生效的过滤指令。
static INSTALLED_FILTER: OnceLock<String> = OnceLock::new();

/// 日志安装阶段的错误。
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// `install` 被重复调用。
    #[error("channel telemetry is already installed")]
    AlreadyInstalled,

    /// 外部提前设置了全局 `tracing` Subscriber。
    #[error("a global tracing subscriber is already set")]
    SubscriberAlreadySet,

    /// 过滤指令无法解析。
    #[error("invalid log filter `{filter}`: {detail}")]
    InvalidFilter { filter: String, detail: String },

    /// 设置全局 Subscriber 失败的底层错误。
    #[error("failed to set global tracing subscriber: {0}")]
    SetGlobalSubscriber(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// 按配置中的过滤指令安装全局 Subscriber。
pub fn install(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let filter =
        EnvFilter::try_new(&config.filter).map_err(|error| TelemetryError::InvalidFilter {
            filter: config.filter.clone(),
            detail: error.to_string(),
        })?;
    install_filter(filter, &config.filter)
}

/// 以 `RUST_LOG` 为准安装，未设置时回退到 `info`。
pub fn install_from_env() -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let directives = filter.to_string();
    install_filter(filter, &directives)
}

/// 已安装时返回生效的过滤指令。
pub fn installed_filter() -> Option<&'static str> {
    INSTALLED_FILTER.get().map(String::as_str)
}

fn install_filter(filter: EnvFilter, directives: &str) -> Result<(), TelemetryError> {
    if INSTALLED_FILTER.get().is_some() {
        return Err(TelemetryError::AlreadyInstalled);
    }
    if dispatcher::has_been_set() {
        return Err(TelemetryError::SubscriberAlreadySet);
    }

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer());
    tracing::subscriber::set_global_default(subscriber)?;

    INSTALLED_FILTER
        .set(directives.to_owned())
        .map_err(|_| TelemetryError::AlreadyInstalled)?;
    tracing::info!(filter = directives, "channel telemetry installed");
    Ok(())
}
