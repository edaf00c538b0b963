//! 服务宿主：启动/停止注册表监视器与定时修正。
//!
//! 启动：
//! - 注册表监视器的变更回调接到 [`PolicyEnforcer::enforce`]
//! - 定时器（tokio `interval`，第一次 tick 立即触发）每个周期执行一次修正
//! - 监视器因系统调用失败回到 `Idle` 后，可在下个周期重新启动（宿主即监督者）
//!
//! 停止（顺序固定）：先停定时器，再停止并释放监视器；两者已停止时均可容忍。
//!
//! 作者：锁屏策略守护项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Runtime;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::backend::{NotifyBackend, PolicyStore};
use crate::enforcer::PolicyEnforcer;
use crate::error::{HostError, WatchError};
use crate::failure_log::FailureLog;
use crate::watcher::{KeyWatcher, WatcherState};

/// 定时器运行时停止的最长等待时间。
const TIMER_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

struct Timer {
    runtime: Runtime,
    shutdown: watch::Sender<bool>,
}

/// 服务宿主。
pub struct ServiceHost<B: NotifyBackend, S: PolicyStore> {
    watcher: Arc<KeyWatcher<B>>,
    enforcer: Arc<PolicyEnforcer<S>>,
    interval: Duration,
    restart_watcher: bool,
    failure_log: Option<Arc<FailureLog>>,
    timer: Option<Timer>,
    wired: bool,
}

impl<B: NotifyBackend, S: PolicyStore> ServiceHost<B, S> {
    pub fn new(watcher: KeyWatcher<B>, enforcer: PolicyEnforcer<S>, interval: Duration) -> Self {
        Self {
            watcher: Arc::new(watcher),
            enforcer: Arc::new(enforcer),
            interval,
            restart_watcher: true,
            failure_log: None,
            timer: None,
            wired: false,
        }
    }

    /// 监视器失败回到空闲后，是否在下个定时周期重新启动。
    pub fn restart_watcher_on_tick(mut self, restart: bool) -> Self {
        self.restart_watcher = restart;
        self
    }

    /// 监视器报告的错误同时追加到失败日志。
    pub fn with_failure_log(mut self, log: Arc<FailureLog>) -> Self {
        self.failure_log = Some(log);
        self
    }

    pub fn watcher(&self) -> &KeyWatcher<B> {
        &self.watcher
    }

    pub fn enforcer(&self) -> &PolicyEnforcer<S> {
        &self.enforcer
    }

    pub fn is_running(&self) -> bool {
        self.timer.is_some()
    }

    /// 启动监视器与定时器（重复调用为空操作）。
    ///
    /// 异常处理：
    /// - 监视器启动失败（例如已释放）：返回错误，定时器不会启动
    /// - 定时器运行时创建失败：停止监视器后返回错误
    pub fn start(&mut self) -> Result<(), HostError> {
        if self.timer.is_some() {
            return Ok(());
        }
        self.wire_observers();
        self.watcher.start()?;

        let runtime = match tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("lockguard-timer")
            .enable_time()
            .build()
        {
            Ok(rt) => rt,
            Err(e) => {
                let _ = self.watcher.stop();
                return Err(HostError::Runtime(e));
            }
        };
        let (shutdown, shutdown_rx) = watch::channel(false);
        runtime.spawn(tick_loop(
            Arc::clone(&self.enforcer),
            Arc::clone(&self.watcher),
            self.interval,
            self.restart_watcher,
            shutdown_rx,
        ));
        self.timer = Some(Timer { runtime, shutdown });
        info!(
            "服务宿主已启动: 监视 {}，修正周期 {}s",
            self.watcher.target(),
            self.interval.as_secs()
        );
        Ok(())
    }

    /// 停止定时器，再停止并释放监视器（幂等）。
    pub fn stop(&mut self) {
        if let Some(timer) = self.timer.take() {
            let _ = timer.shutdown.send(true);
            timer.runtime.shutdown_timeout(TIMER_SHUTDOWN_TIMEOUT);
            debug!("定时器已停止");
        }
        match self.watcher.stop() {
            Ok(()) | Err(WatchError::Disposed) => {}
            Err(e) => warn!("停止注册表监视失败: {e}"),
        }
        if let Err(e) = self.watcher.dispose() {
            warn!("释放注册表监视器失败: {e}");
        }
    }

    /// 启动后阻塞等待停止通知（收到消息或发送端全部断开），然后停止。
    pub fn run_until(&mut self, shutdown: mpsc::Receiver<()>) -> Result<(), HostError> {
        self.start()?;
        let _ = shutdown.recv();
        info!("收到停止请求");
        self.stop();
        Ok(())
    }

    fn wire_observers(&mut self) {
        if self.wired {
            return;
        }
        let enforcer = Arc::clone(&self.enforcer);
        self.watcher.on_changed(move || {
            let outcome = enforcer.enforce();
            debug!("变更触发修正: {outcome:?}");
        });
        let failure_log = self.failure_log.clone();
        self.watcher.on_error(move |err| {
            warn!("注册表监视失败，等待重新启动: {err}");
            if let Some(log) = &failure_log {
                log.record(&format!("注册表监视失败: {err}"));
            }
        });
        self.wired = true;
    }
}

impl<B: NotifyBackend, S: PolicyStore> Drop for ServiceHost<B, S> {
    fn drop(&mut self) {
        if self.timer.is_some() {
            self.stop();
        }
    }
}

async fn tick_loop<B: NotifyBackend, S: PolicyStore>(
    enforcer: Arc<PolicyEnforcer<S>>,
    watcher: Arc<KeyWatcher<B>>,
    period: Duration,
    restart_watcher: bool,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
        }

        if restart_watcher && watcher.state() == WatcherState::Idle {
            match watcher.start() {
                Ok(()) => info!("注册表监视已重新启动"),
                Err(e) => warn!("重新启动注册表监视失败: {e}"),
            }
        }

        let enforcer = Arc::clone(&enforcer);
        match tokio::task::spawn_blocking(move || enforcer.enforce()).await {
            Ok(outcome) => debug!("定时修正完成: {outcome:?}"),
            Err(e) => warn!("定时修正任务异常: {e}"),
        }
    }
    debug!("定时修正循环退出");
}
