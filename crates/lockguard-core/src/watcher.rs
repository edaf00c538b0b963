//! 注册表变更监视器（后台线程 + 可重复布防的阻塞等待）。
//!
//! 生命周期：
//! - `Idle --start--> Monitoring --stop--> Idle`
//! - 任意状态 `--dispose--> Disposed`（终态，之后的 start/stop/set_filter 均返回错误）
//!
//! 监视循环（每个 start 周期一个专用线程）：
//! 1) 以“读取 + 通知”权限打开目标键；失败则通过错误回调上报并结束本周期（不自动重试）
//! 2) 未收到停止信号时循环：布防一次变更通知（非阻塞、递归子树）→ 同时等待 {变更, 停止}
//!    → 变更则在本线程同步调用变更回调并重新布防；停止则退出
//! 3) 退出时（正常/错误/panic）键句柄随 `WatchedKey` 析构释放
//! 4) 最后一步把监视器标记回 `Idle`（即使第 1 步失败）
//!
//! 并发：
//! - `lifecycle` 锁串行化 start/stop/dispose，保证并发 start 只会创建一个线程，
//!   且 stop 在 join 期间不持有 `slot` 锁（后台线程退出时需要它）
//! - 布防与等待之间发生的多次变更可能被合并为一次回调，这是预期行为
//!
//! 作者：锁屏策略守护项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::backend::{NotifyBackend, StopSignal, Wake, WatchedKey};
use crate::error::WatchError;
use crate::filter::NotifyFilter;
use crate::target::WatchTarget;

/// 监视线程名。
pub const WORKER_THREAD_NAME: &str = "lockguard-watcher";

/// 监视器状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    Idle,
    Monitoring,
    Disposed,
}

impl fmt::Display for WatcherState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WatcherState::Idle => "idle",
            WatcherState::Monitoring => "monitoring",
            WatcherState::Disposed => "disposed",
        };
        f.write_str(s)
    }
}

type ChangedFn = Arc<dyn Fn() + Send + Sync>;
type ErrorFn = Arc<dyn Fn(&WatchError) + Send + Sync>;

#[derive(Default)]
struct Observers {
    changed: RwLock<Vec<ChangedFn>>,
    errors: RwLock<Vec<ErrorFn>>,
}

impl Observers {
    fn notify_changed(&self) {
        // 先取快照再调用：回调内可以继续注册观察者。
        let snapshot = self.changed.read().clone();
        for f in snapshot {
            f();
        }
    }

    fn notify_error(&self, err: &WatchError) {
        let snapshot = self.errors.read().clone();
        for f in snapshot {
            f(err);
        }
    }
}

struct Worker<S> {
    handle: JoinHandle<()>,
    stop: Arc<S>,
    thread: ThreadId,
}

struct Slot<S> {
    state: WatcherState,
    filter: NotifyFilter,
    generation: u64,
    worker: Option<Worker<S>>,
}

struct Shared<S> {
    slot: Mutex<Slot<S>>,
    observers: Observers,
}

/// 注册表子树变更监视器。
///
/// 用法：
/// - 通过 [`KeyWatcher::on_changed`] / [`KeyWatcher::on_error`] 注册观察者
/// - [`KeyWatcher::start`] 启动后台线程；[`KeyWatcher::stop`] 阻塞直到线程退出
/// - 析构时自动 [`KeyWatcher::dispose`]
pub struct KeyWatcher<B: NotifyBackend> {
    backend: Arc<B>,
    target: WatchTarget,
    lifecycle: Mutex<()>,
    shared: Arc<Shared<B::Signal>>,
}

impl<B: NotifyBackend> KeyWatcher<B> {
    /// 由已解析的监视目标构造（不分配任何系统资源）。
    pub fn new(backend: B, target: WatchTarget) -> Self {
        Self {
            backend: Arc::new(backend),
            target,
            lifecycle: Mutex::new(()),
            shared: Arc::new(Shared {
                slot: Mutex::new(Slot {
                    state: WatcherState::Idle,
                    filter: NotifyFilter::default(),
                    generation: 0,
                    worker: None,
                }),
                observers: Observers::default(),
            }),
        }
    }

    /// 由完整路径构造（例如 `HKLM\SOFTWARE\Policies`）。
    ///
    /// 异常处理：
    /// - 路径为空或根键别名无法识别时返回 [`WatchError::InvalidArgument`]
    pub fn from_path(backend: B, full_path: &str) -> Result<Self, WatchError> {
        let target = WatchTarget::parse(full_path)?;
        Ok(Self::new(backend, target))
    }

    pub fn target(&self) -> &WatchTarget {
        &self.target
    }

    pub fn state(&self) -> WatcherState {
        self.shared.slot.lock().state
    }

    pub fn is_monitoring(&self) -> bool {
        self.state() == WatcherState::Monitoring
    }

    pub fn filter(&self) -> NotifyFilter {
        self.shared.slot.lock().filter
    }

    /// 设置通知过滤器。
    ///
    /// 异常处理：
    /// - 监视进行中：[`WatchError::InvalidOperation`]，过滤器保持不变
    /// - 已释放：[`WatchError::Disposed`]
    pub fn set_filter(&self, filter: NotifyFilter) -> Result<(), WatchError> {
        let mut slot = self.shared.slot.lock();
        match slot.state {
            WatcherState::Disposed => Err(WatchError::Disposed),
            WatcherState::Monitoring => Err(WatchError::InvalidOperation("监视进行中，不允许修改过滤器")),
            WatcherState::Idle => {
                slot.filter = filter;
                Ok(())
            }
        }
    }

    /// 注册变更观察者（在监视线程上同步调用，无负载）。
    pub fn on_changed<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.shared.observers.changed.write().push(Arc::new(f));
    }

    /// 注册错误观察者（监视循环内系统调用失败时调用）。
    pub fn on_error<F>(&self, f: F)
    where
        F: Fn(&WatchError) + Send + Sync + 'static,
    {
        self.shared.observers.errors.write().push(Arc::new(f));
    }

    /// 启动监视。
    ///
    /// 行为：
    /// - 已在监视：直接返回 `Ok(())`（并发调用也只会创建一个线程）
    /// - 空闲：创建停止信号与后台线程，状态转为 `Monitoring`
    ///
    /// 异常处理：
    /// - 已释放：[`WatchError::Disposed`]
    /// - 创建停止信号/线程失败：返回对应错误，状态保持 `Idle`
    pub fn start(&self) -> Result<(), WatchError> {
        let _life = self.lifecycle.lock();
        let mut slot = self.shared.slot.lock();
        match slot.state {
            WatcherState::Disposed => return Err(WatchError::Disposed),
            WatcherState::Monitoring => return Ok(()),
            WatcherState::Idle => {}
        }

        let stop = Arc::new(self.backend.stop_signal()?);
        let generation = slot.generation + 1;
        let filter = slot.filter;
        let backend = Arc::clone(&self.backend);
        let target = self.target.clone();
        let shared = Arc::clone(&self.shared);
        let worker_stop = Arc::clone(&stop);

        let handle = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || run_worker(&*backend, &target, filter, &worker_stop, &shared, generation))
            .map_err(WatchError::Spawn)?;

        let thread = handle.thread().id();
        slot.generation = generation;
        slot.worker = Some(Worker { handle, stop, thread });
        slot.state = WatcherState::Monitoring;
        info!(key = %self.target, filter = ?filter, "注册表监视已启动");
        Ok(())
    }

    /// 停止监视并等待后台线程完全退出。
    ///
    /// 行为：
    /// - 未在监视：空操作
    /// - 在变更回调内（监视线程上）调用：只触发停止信号，不等待自身退出
    ///
    /// 异常处理：
    /// - 已释放：[`WatchError::Disposed`]
    /// - 触发停止信号失败：返回错误，后台线程保持运行
    pub fn stop(&self) -> Result<(), WatchError> {
        if self.state() == WatcherState::Disposed {
            return Err(WatchError::Disposed);
        }
        if self.raise_if_on_worker()? {
            return Ok(());
        }
        let _life = self.lifecycle.lock();
        self.stop_locked()
    }

    /// 停止并释放监视器（幂等）。
    pub fn dispose(&self) -> Result<(), WatchError> {
        if self.raise_if_on_worker()? {
            self.shared.slot.lock().state = WatcherState::Disposed;
            return Ok(());
        }
        let _life = self.lifecycle.lock();
        if self.state() == WatcherState::Disposed {
            return Ok(());
        }
        self.stop_locked()?;
        self.shared.slot.lock().state = WatcherState::Disposed;
        debug!(key = %self.target, "注册表监视器已释放");
        Ok(())
    }

    /// 若当前线程就是监视线程，则只触发停止信号并返回 `true`。
    fn raise_if_on_worker(&self) -> Result<bool, WatchError> {
        let stop = {
            let slot = self.shared.slot.lock();
            let current = thread::current().id();
            match slot.worker.as_ref() {
                Some(w) if w.thread == current => Arc::clone(&w.stop),
                _ => return Ok(false),
            }
        };
        stop.raise()?;
        Ok(true)
    }

    fn stop_locked(&self) -> Result<(), WatchError> {
        let worker = {
            let mut slot = self.shared.slot.lock();
            if slot.state == WatcherState::Disposed {
                return Err(WatchError::Disposed);
            }
            match slot.worker.take() {
                Some(w) => w,
                None => return Ok(()),
            }
        };

        if let Err(err) = worker.stop.raise() {
            self.shared.slot.lock().worker = Some(worker);
            return Err(err);
        }
        if worker.handle.join().is_err() {
            error!(key = %self.target, "监视线程异常退出");
        }

        let mut slot = self.shared.slot.lock();
        if slot.state == WatcherState::Monitoring {
            slot.state = WatcherState::Idle;
        }
        info!(key = %self.target, "注册表监视已停止");
        Ok(())
    }
}

impl<B: NotifyBackend> Drop for KeyWatcher<B> {
    fn drop(&mut self) {
        if let Err(err) = self.dispose() {
            warn!(key = %self.target, error = %err, "释放注册表监视器失败");
        }
    }
}

/// 线程退出时把监视器标记回 `Idle`（仅限本周期，panic 路径同样生效）。
struct IdleOnExit<'a, S> {
    shared: &'a Shared<S>,
    generation: u64,
}

impl<S> Drop for IdleOnExit<'_, S> {
    fn drop(&mut self) {
        let mut slot = self.shared.slot.lock();
        if slot.generation != self.generation {
            return;
        }
        if slot.state == WatcherState::Monitoring {
            slot.state = WatcherState::Idle;
        }
        slot.worker = None;
    }
}

fn run_worker<B: NotifyBackend>(
    backend: &B,
    target: &WatchTarget,
    filter: NotifyFilter,
    stop: &B::Signal,
    shared: &Shared<B::Signal>,
    generation: u64,
) {
    let _idle = IdleOnExit { shared, generation };
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| monitor(backend, target, filter, stop, &shared.observers)));
    match outcome {
        Ok(Ok(())) => debug!(key = %target, "监视循环正常退出"),
        Ok(Err(err)) => {
            warn!(key = %target, error = %err, "监视循环因系统调用失败退出");
            shared.observers.notify_error(&err);
        }
        Err(_) => error!(key = %target, "变更回调 panic，本次监视周期终止"),
    }
}

fn monitor<B: NotifyBackend>(
    backend: &B,
    target: &WatchTarget,
    filter: NotifyFilter,
    stop: &B::Signal,
    observers: &Observers,
) -> Result<(), WatchError> {
    let mut key = backend.open_key(target)?;
    loop {
        // 通知是一次性的：每次等待前都要重新布防。
        key.request_notification(filter, true)?;
        match key.wait(stop)? {
            Wake::Changed => {
                debug!(key = %target, "检测到注册表变更");
                observers.notify_changed();
            }
            Wake::Stopped => return Ok(()),
        }
    }
}
