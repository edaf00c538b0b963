//! 操作系统配置存储边界（trait 抽象）。
//!
//! 目标：
//! - 监视器/执行器/服务宿主的逻辑与平台无关，Win32 细节由 `lockguard-windows` 实现
//! - 测试与控制台演练使用 [`crate::memory::MemoryRegistry`]
//!
//! 监视器消费的三个原语：打开键（用于通知）、请求变更通知、关闭键（`WatchedKey` 的 `Drop`）。
//! 执行器消费的三个原语：读值、写值、删值。
//!
//! 作者：锁屏策略守护项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use crate::error::{StoreError, WatchError};
use crate::filter::NotifyFilter;
use crate::target::WatchTarget;

/// 一次等待的唤醒原因。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// 子树发生变更（多次变更可能合并为一次）。
    Changed,
    /// 停止信号已触发。
    Stopped,
}

/// 手动复位的停止信号。
///
/// 约束：一旦 `raise`，后续所有 `wait` 都必须立即返回 [`Wake::Stopped`]。
pub trait StopSignal: Send + Sync + 'static {
    fn raise(&self) -> Result<(), WatchError>;
}

/// 已打开、可请求变更通知的键。
///
/// 释放：实现方必须在 `Drop` 中关闭底层句柄。
pub trait WatchedKey: Send + 'static {
    type Signal: StopSignal;

    /// 请求一次（一次性）变更通知，非阻塞立即返回。
    fn request_notification(&mut self, filter: NotifyFilter, watch_subtree: bool) -> Result<(), WatchError>;

    /// 阻塞直到 {变更, 停止} 任一发生。
    fn wait(&mut self, stop: &Self::Signal) -> Result<Wake, WatchError>;
}

/// 变更通知后端。
pub trait NotifyBackend: Send + Sync + 'static {
    type Signal: StopSignal;
    type Key: WatchedKey<Signal = Self::Signal>;

    /// 为一个监视周期创建新的停止信号（初始未触发）。
    fn stop_signal(&self) -> Result<Self::Signal, WatchError>;

    /// 以“读取 + 通知”权限打开目标键。
    fn open_key(&self, target: &WatchTarget) -> Result<Self::Key, WatchError>;
}

/// 策略值存储（DWORD）。
///
/// 约定：键或值不存在时 `read_dword` 返回 `Ok(None)`，`delete_value` 返回 `Ok(())`。
pub trait PolicyStore: Send + Sync + 'static {
    fn read_dword(&self, key: &WatchTarget, name: &str) -> Result<Option<u32>, StoreError>;
    fn write_dword(&self, key: &WatchTarget, name: &str, value: u32) -> Result<(), StoreError>;
    fn delete_value(&self, key: &WatchTarget, name: &str) -> Result<(), StoreError>;
}

impl<B: NotifyBackend> NotifyBackend for std::sync::Arc<B> {
    type Signal = B::Signal;
    type Key = B::Key;

    fn stop_signal(&self) -> Result<Self::Signal, WatchError> {
        (**self).stop_signal()
    }

    fn open_key(&self, target: &WatchTarget) -> Result<Self::Key, WatchError> {
        (**self).open_key(target)
    }
}

impl<S: PolicyStore> PolicyStore for std::sync::Arc<S> {
    fn read_dword(&self, key: &WatchTarget, name: &str) -> Result<Option<u32>, StoreError> {
        (**self).read_dword(key, name)
    }

    fn write_dword(&self, key: &WatchTarget, name: &str, value: u32) -> Result<(), StoreError> {
        (**self).write_dword(key, name, value)
    }

    fn delete_value(&self, key: &WatchTarget, name: &str) -> Result<(), StoreError> {
        (**self).delete_value(key, name)
    }
}
