#![deny(unsafe_code)]
#![doc = "spark-channel: 进程内事件通道核心。"]
#![doc = ""]
#![doc = "通道由三部分组成：唯一的入口阶段、部署期安装的有序 Handler 链、以及把事件交付给全部订阅连接的扇出阶段。"]
#![doc = "扇出阶段分为同步与异步两种；订阅集合采用写时复制快照，分发路径无锁。"]
#![doc = "可选的复制阶段把本地可移植事件镜像到同区域的对等运行时，并把对等方复制来的事件注入本地链路。"]
#![doc = ""]
#![doc = "== 并发模型 =="]
#![doc = "订阅与链路变更各自由一把互斥锁串行化；分发只读取 `ArcSwap` 快照，永远不会观察到半更新的状态。"]

pub mod builder;
pub mod chain;
pub mod channel;
pub mod config;
pub mod connection;
pub mod error;
pub mod event;
pub mod fanout;
pub mod handler;
pub mod manager;
pub mod replication;
pub mod runtime;
mod sync;
pub mod telemetry;
/// 测试桩命名空间：可控工作池、记录型 Handler 与拓扑，供单元测试与集成测试复用。
pub mod test_stubs;

pub use builder::{BuiltChannel, ChannelBuilder, ChannelServices};
pub use chain::HandlerChain;
pub use channel::{ChannelSide, EventChannel};
pub use config::{ChannelConfig, ChannelSetConfig, DeliveryMode, TelemetryConfig};
pub use connection::{ChannelConnection, ConnectionRef, DefaultChannelConnection, EventStream};
pub use error::{ChannelError, ConfigError, EventError, TopologyError};
pub use event::{ChannelEvent, EventOrigin, EventPayload, PortableEvent};
pub use fanout::{AsyncFanOutHandler, ConnectionRegistry, FanOutHandler, SyncFanOutHandler};
pub use handler::{
    ConsumerHandler, EventStreamHandler, FilterHandler, HandlerRef, NextHandler,
    PassThroughHandler,
};
pub use manager::ChannelManager;
pub use replication::{
    InMemoryZone, ReplicatedEvent, ReplicationHandler, ReplicationListener, ReplicationMonitor,
    TracingReplicationMonitor, ZoneMember, ZoneTopology,
};
#[cfg(feature = "runtime-tokio")]
pub use runtime::TokioWorkerPool;
pub use runtime::{InlineWorkerPool, Work, WorkerPool};
