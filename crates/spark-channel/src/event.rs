//! 通道事件模型。
//!
//! # 设计背景（Why）
//! - 通道在进程内传递任意应用负载，但只有可序列化的负载才允许被复制到同区域的对等节点；
//! - 复制到达的事件必须与本地事件可区分，否则接收端会再次复制，形成环路。
//!
//! # 契约说明（What）
//! - [`ChannelEvent`] 克隆成本为常数（内部仅含 `Arc` 与小型枚举）；
//! - [`EventPayload::Opaque`] 永不复制；[`EventPayload::Portable`] 以 JSON 值作为线上表示；
//! - [`EventOrigin::Replicated`] 即“已复制”标记，复制阶段据此跳过发送。
//! - 批次结束标志不属于事件本身，而是随每次 `handle` 调用一起传递。

use std::{any::Any, fmt, sync::Arc};

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::error::EventError;

/// 可移植（可序列化）事件负载。
///
/// # 契约（What）
/// - `type_name`：负载的逻辑类型名，默认取 Rust 类型路径，接收方据此选择解码目标；
/// - `body`：JSON 值形式的负载本体。
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PortableEvent {
    type_name: String,
    body: serde_json::Value,
}

impl PortableEvent {
    /// 以显式类型名与 JSON 本体构造负载。
    pub fn new(type_name: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            type_name: type_name.into(),
            body,
        }
    }

    /// 将任意 `Serialize` 值编码为可移植负载，类型名取 [`std::any::type_name`]。
    pub fn encode<T: Serialize>(value: &T) -> Result<Self, EventError> {
        let type_name = std::any::type_name::<T>();
        let body = serde_json::to_value(value)
            .map_err(|source| EventError::Encode { type_name, source })?;
        Ok(Self::new(type_name, body))
    }

    /// 将负载解码为目标类型。
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, EventError> {
        serde_json::from_value(self.body.clone()).map_err(|source| EventError::Decode {
            type_name: self.type_name.clone(),
            source,
        })
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn body(&self) -> &serde_json::Value {
        &self.body
    }
}

/// 事件负载。
#[derive(Clone)]
pub enum EventPayload {
    /// 仅在进程内流转的不透明对象。
    Opaque(Arc<dyn Any + Send + Sync>),
    /// 可跨节点传输的序列化负载。
    Portable(PortableEvent),
}

impl fmt::Debug for EventPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventPayload::Opaque(_) => f.debug_tuple("Opaque").finish_non_exhaustive(),
            EventPayload::Portable(event) => f.debug_tuple("Portable").field(event).finish(),
        }
    }
}

/// 事件来源。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventOrigin {
    /// 本节点产生。
    Local,
    /// 经由区域复制到达；`source` 为发送方运行时名称。
    Replicated { source: String },
}

/// 在通道 Handler 链中流转的事件。
///
/// # 教案式说明
/// - **意图（Why）**：为 Handler 链提供统一、可廉价克隆的事件载体，扇出阶段需要把同一事件交付给
///   多个订阅者。
/// - **契约（What）**：构造后不可变；`origin` 只能在构造时指定，复制阶段据此判断是否需要外发。
#[derive(Clone, Debug)]
pub struct ChannelEvent {
    payload: EventPayload,
    origin: EventOrigin,
}

impl ChannelEvent {
    /// 以本地不透明对象构造事件。
    pub fn opaque<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            payload: EventPayload::Opaque(Arc::new(value)),
            origin: EventOrigin::Local,
        }
    }

    /// 以可移植负载构造本地事件。
    pub fn portable(event: PortableEvent) -> Self {
        Self {
            payload: EventPayload::Portable(event),
            origin: EventOrigin::Local,
        }
    }

    /// 将可序列化值编码后构造本地事件。
    pub fn encode<T: Serialize>(value: &T) -> Result<Self, EventError> {
        PortableEvent::encode(value).map(Self::portable)
    }

    /// 构造携带“已复制”标记的事件，仅供复制接收路径使用。
    pub fn replicated(event: PortableEvent, source: impl Into<String>) -> Self {
        Self {
            payload: EventPayload::Portable(event),
            origin: EventOrigin::Replicated {
                source: source.into(),
            },
        }
    }

    pub fn payload(&self) -> &EventPayload {
        &self.payload
    }

    pub fn origin(&self) -> &EventOrigin {
        &self.origin
    }

    /// 事件是否经由复制到达。
    pub fn is_replicated(&self) -> bool {
        matches!(self.origin, EventOrigin::Replicated { .. })
    }

    /// 返回可移植负载；不透明负载返回 `None`。
    pub fn as_portable(&self) -> Option<&PortableEvent> {
        match &self.payload {
            EventPayload::Portable(event) => Some(event),
            EventPayload::Opaque(_) => None,
        }
    }

    /// 按具体类型借用不透明负载。
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match &self.payload {
            EventPayload::Opaque(value) => value.downcast_ref::<T>(),
            EventPayload::Portable(_) => None,
        }
    }

    /// 将可移植负载解码为目标类型。
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, EventError> {
        self.as_portable()
            .ok_or(EventError::NotPortable)
            .and_then(|event| event.decode::<T>())
    }
}
