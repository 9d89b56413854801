//! 同步原语切换层。
//!
//! 常规构建使用 `parking_lot::Mutex` 与标准库原子类型；以 `--cfg loom`（或 `--cfg spark_loom`）且开启 `loom-model`
//! 特性构建时改用 `loom` 提供的实现，使模型检查能够接管锁与原子操作的调度交错。
//! `ArcSwap` 快照不在切换范围内。

#[cfg(not(all(feature = "loom-model", any(loom, spark_loom))))]
pub(crate) use parking_lot::Mutex;
#[cfg(not(all(feature = "loom-model", any(loom, spark_loom))))]
pub(crate) use std::sync::atomic::{AtomicU64, Ordering};

#[cfg(all(feature = "loom-model", any(loom, spark_loom)))]
pub(crate) use loom::sync::atomic::{AtomicU64, Ordering};

/// 与 `parking_lot::Mutex` 同形的 `loom` 互斥锁：`lock` 直接返回守卫。
#[cfg(all(feature = "loom-model", any(loom, spark_loom)))]
pub(crate) struct Mutex<T>(loom::sync::Mutex<T>);

#[cfg(all(feature = "loom-model", any(loom, spark_loom)))]
impl<T> Mutex<T> {
    pub(crate) fn new(value: T) -> Self {
        Self(loom::sync::Mutex::new(value))
    }

    pub(crate) fn lock(&self) -> loom::sync::MutexGuard<'_, T> {
        self.0
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
