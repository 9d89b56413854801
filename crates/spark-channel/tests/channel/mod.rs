//! 通道集成测试套件。
//!
//! - `ordering`：Handler 安装顺序与扇出的相对位置；
//! - `splicing`：运行期增删 Handler 后的链路形态；
//! - `async_fanout`：Tokio 工作池上的异步投递；
//! - `replication`：进程内区域中两节点之间的复制与环路阻断；
//! - `concurrency`：订阅变更与分发并发进行；
//! - `deployment`：从 TOML 配置部署与卸载通道。

mod async_fanout;
mod concurrency;
mod deployment;
mod ordering;
mod replication;
mod splicing;
