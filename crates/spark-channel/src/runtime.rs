//! 工作池契约：异步扇出阶段借此把投递工作交给其他线程执行。
//!
//! ## 契约声明
//! * **提交语义：** `execute` 接收一个完整的工作单元（闭包），在未指定线程、未指定时刻执行；
//!   不同调用线程提交的工作单元之间不承诺顺序。
//! * **不可取消：** 一旦提交，工作单元会运行至结束；本模块不提供取消或超时。
//! * **实现位置：** 核心只依赖 [`WorkerPool`] trait；Tokio 实现受 `runtime-tokio` 特性控制。

#[cfg(feature = "runtime-tokio")]
use std::fmt;

/// 一个待执行的工作单元。
pub type Work = Box<dyn FnOnce() + Send + 'static>;

/// 执行工作单元的线程池。
pub trait WorkerPool: Send + Sync + 'static {
    fn execute(&self, work: Work);
}

/// 在调用线程上立即执行工作单元。
///
/// - **契约 (What)**：`execute` 返回时工作单元已经完成；适合确定性宿主或单线程嵌入场景。
#[derive(Clone, Copy, Debug, Default)]
pub struct InlineWorkerPool;

impl WorkerPool for InlineWorkerPool {
    fn execute(&self, work: Work) {
        work();
    }
}

/// 基于 Tokio 阻塞线程池的实现。
///
/// # 教案式说明
/// - **逻辑（How）**：订阅者 Handler 为同步调用，可能阻塞，因此使用 `spawn_blocking` 而非 `spawn`，
///   避免占用异步工作线程；返回的 `JoinHandle` 直接丢弃，任务以分离方式运行。
/// - **契约（What）**：构造时持有的 `Handle` 必须在工作池生命周期内保持有效。
#[cfg(feature = "runtime-tokio")]
#[derive(Clone)]
pub struct TokioWorkerPool {
    handle: tokio::runtime::Handle,
}

#[cfg(feature = "runtime-tokio")]
impl TokioWorkerPool {
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// 绑定到当前线程所在的 Tokio 运行时；不在运行时上下文中时返回 `None`。
    pub fn current() -> Option<Self> {
        tokio::runtime::Handle::try_current().ok().map(Self::new)
    }
}

#[cfg(feature = "runtime-tokio")]
impl WorkerPool for TokioWorkerPool {
    fn execute(&self, work: Work) {
        drop(self.handle.spawn_blocking(work));
    }
}

#[cfg(feature = "runtime-tokio")]
impl fmt::Debug for TokioWorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokioWorkerPool").finish_non_exhaustive()
    }
}
