//! 内存版配置存储（同时实现 [`NotifyBackend`] 与 [`PolicyStore`]）。
//!
//! 用途：
//! - 单元/集成测试：在任意平台上复现监视循环、并发修正等场景
//! - 控制台演练（`--dry-run`）：不触碰真实注册表
//!
//! 语义说明：
//! - 键路径与值名均不区分大小写
//! - 变更在未布防期间不会丢失，而是合并为一次待处理通知（下一次等待立即返回）
//! - 可注入打开/布防/读写失败，用于验证错误路径
//!
//! 作者：锁屏策略守护项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::backend::{NotifyBackend, PolicyStore, StopSignal, Wake, WatchedKey};
use crate::error::{StoreError, WatchError};
use crate::filter::NotifyFilter;
use crate::target::{RootScope, WatchTarget};

/// 调用计数（用于断言句柄释放、写入次数等）。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStats {
    pub opens: u64,
    pub closes: u64,
    pub arms: u64,
    pub writes: u64,
    pub deletes: u64,
}

type KeyId = (RootScope, String);

struct WatchSlot {
    target: WatchTarget,
    filter: NotifyFilter,
    pending: bool,
}

#[derive(Default)]
struct State {
    keys: HashMap<KeyId, HashMap<String, u32>>,
    watches: HashMap<u64, WatchSlot>,
    next_watch: u64,
    stats: MemoryStats,
    fail_opens: u32,
    fail_arm: bool,
    fail_store: bool,
}

impl State {
    fn signal(&mut self, changed: &WatchTarget, kind: NotifyFilter) {
        for slot in self.watches.values_mut() {
            if slot.target.contains(changed) && slot.filter.intersects(kind) {
                slot.pending = true;
            }
        }
    }
}

#[derive(Default)]
struct Shared {
    state: Mutex<State>,
    cond: Condvar,
}

/// 内存版注册表（克隆后共享同一份数据）。
#[derive(Clone, Default)]
pub struct MemoryRegistry {
    shared: Arc<Shared>,
}

fn key_id(target: &WatchTarget) -> KeyId {
    (target.scope(), target.sub_path().to_ascii_lowercase())
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.shared.state.lock()
    }

    fn changed(&self, mut state: MutexGuard<'_, State>, target: &WatchTarget, kind: NotifyFilter) {
        state.signal(target, kind);
        drop(state);
        self.shared.cond.notify_all();
    }

    /// 创建键（已存在则忽略）。
    pub fn create_key(&self, target: &WatchTarget) {
        let mut state = self.lock();
        if state.keys.contains_key(&key_id(target)) {
            return;
        }
        state.keys.insert(key_id(target), HashMap::new());
        self.changed(state, target, NotifyFilter::NAME);
    }

    /// 直接读取值（不受失败注入影响）。
    pub fn get(&self, target: &WatchTarget, name: &str) -> Option<u32> {
        self.lock()
            .keys
            .get(&key_id(target))
            .and_then(|values| values.get(&name.to_ascii_lowercase()).copied())
    }

    /// 直接写入值（模拟外部策略刷新），自动创建键并触发变更。
    pub fn set(&self, target: &WatchTarget, name: &str, value: u32) {
        let mut state = self.lock();
        state
            .keys
            .entry(key_id(target))
            .or_default()
            .insert(name.to_ascii_lowercase(), value);
        self.changed(state, target, NotifyFilter::LAST_SET);
    }

    /// 仅触发一次变更通知（不修改数据）。
    pub fn touch(&self, target: &WatchTarget) {
        let state = self.lock();
        self.changed(state, target, NotifyFilter::all());
    }

    /// 接下来的 `count` 次打开键失败。
    pub fn fail_next_opens(&self, count: u32) {
        self.lock().fail_opens = count;
    }

    /// 布防（请求通知）是否失败。
    pub fn set_arm_failure(&self, fail: bool) {
        self.lock().fail_arm = fail;
    }

    /// 策略值读写是否失败。
    pub fn set_store_failure(&self, fail: bool) {
        self.lock().fail_store = fail;
    }

    pub fn stats(&self) -> MemoryStats {
        self.lock().stats
    }

    /// 当前仍打开的监视句柄数。
    pub fn open_watches(&self) -> usize {
        self.lock().watches.len()
    }

    /// 等待累计布防次数达到 `arms`。
    ///
    /// 返回值：
    /// - `true`：在超时前达到
    /// - `false`：超时
    pub fn wait_for_arms(&self, arms: u64, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        while state.stats.arms < arms {
            if self.shared.cond.wait_until(&mut state, deadline).timed_out() {
                return state.stats.arms >= arms;
            }
        }
        true
    }

    fn store_failure(op: &'static str, key: &WatchTarget, name: &str) -> StoreError {
        StoreError::Os {
            op,
            path: key.to_string(),
            name: name.to_string(),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "注入的存储失败"),
        }
    }
}

impl PolicyStore for MemoryRegistry {
    fn read_dword(&self, key: &WatchTarget, name: &str) -> Result<Option<u32>, StoreError> {
        let state = self.lock();
        if state.fail_store {
            return Err(Self::store_failure("读取值", key, name));
        }
        Ok(state
            .keys
            .get(&key_id(key))
            .and_then(|values| values.get(&name.to_ascii_lowercase()).copied()))
    }

    fn write_dword(&self, key: &WatchTarget, name: &str, value: u32) -> Result<(), StoreError> {
        let mut state = self.lock();
        if state.fail_store {
            return Err(Self::store_failure("写入值", key, name));
        }
        state
            .keys
            .entry(key_id(key))
            .or_default()
            .insert(name.to_ascii_lowercase(), value);
        state.stats.writes += 1;
        self.changed(state, key, NotifyFilter::LAST_SET);
        Ok(())
    }

    fn delete_value(&self, key: &WatchTarget, name: &str) -> Result<(), StoreError> {
        let mut state = self.lock();
        if state.fail_store {
            return Err(Self::store_failure("删除值", key, name));
        }
        let removed = state
            .keys
            .get_mut(&key_id(key))
            .and_then(|values| values.remove(&name.to_ascii_lowercase()))
            .is_some();
        if removed {
            state.stats.deletes += 1;
            self.changed(state, key, NotifyFilter::LAST_SET);
        }
        Ok(())
    }
}

/// 内存版停止信号（手动复位）。
pub struct MemoryStopSignal {
    shared: Arc<Shared>,
    raised: AtomicBool,
}

impl StopSignal for MemoryStopSignal {
    fn raise(&self) -> Result<(), WatchError> {
        // 持锁设置，避免等待方在检查与休眠之间错过唤醒。
        let state = self.shared.state.lock();
        self.raised.store(true, Ordering::SeqCst);
        drop(state);
        self.shared.cond.notify_all();
        Ok(())
    }
}

/// 内存版监视句柄（析构即“关闭键”）。
pub struct MemoryWatchedKey {
    shared: Arc<Shared>,
    id: u64,
}

impl WatchedKey for MemoryWatchedKey {
    type Signal = MemoryStopSignal;

    fn request_notification(&mut self, filter: NotifyFilter, _watch_subtree: bool) -> Result<(), WatchError> {
        let mut state = self.shared.state.lock();
        if state.fail_arm {
            return Err(WatchError::os(
                "RegNotifyChangeKeyValue",
                io::Error::other("注入的布防失败"),
            ));
        }
        if let Some(slot) = state.watches.get_mut(&self.id) {
            slot.filter = filter;
        }
        state.stats.arms += 1;
        drop(state);
        self.shared.cond.notify_all();
        Ok(())
    }

    fn wait(&mut self, stop: &MemoryStopSignal) -> Result<Wake, WatchError> {
        let mut state = self.shared.state.lock();
        loop {
            if stop.raised.load(Ordering::SeqCst) {
                return Ok(Wake::Stopped);
            }
            if let Some(slot) = state.watches.get_mut(&self.id) {
                if slot.pending {
                    slot.pending = false;
                    return Ok(Wake::Changed);
                }
            }
            self.shared.cond.wait(&mut state);
        }
    }
}

impl Drop for MemoryWatchedKey {
    fn drop(&mut self) {
        let mut state = self.shared.state.lock();
        state.watches.remove(&self.id);
        state.stats.closes += 1;
    }
}

impl NotifyBackend for MemoryRegistry {
    type Signal = MemoryStopSignal;
    type Key = MemoryWatchedKey;

    fn stop_signal(&self) -> Result<MemoryStopSignal, WatchError> {
        Ok(MemoryStopSignal {
            shared: Arc::clone(&self.shared),
            raised: AtomicBool::new(false),
        })
    }

    fn open_key(&self, target: &WatchTarget) -> Result<MemoryWatchedKey, WatchError> {
        let mut state = self.lock();
        if state.fail_opens > 0 {
            state.fail_opens -= 1;
            return Err(WatchError::os(
                "RegOpenKeyEx",
                io::Error::new(io::ErrorKind::PermissionDenied, "注入的打开失败"),
            ));
        }
        if !state.keys.contains_key(&key_id(target)) {
            return Err(WatchError::os(
                "RegOpenKeyEx",
                io::Error::new(io::ErrorKind::NotFound, format!("键不存在: {target}")),
            ));
        }
        let id = state.next_watch;
        state.next_watch += 1;
        state.watches.insert(
            id,
            WatchSlot {
                target: target.clone(),
                filter: NotifyFilter::default(),
                pending: false,
            },
        );
        state.stats.opens += 1;
        Ok(MemoryWatchedKey {
            shared: Arc::clone(&self.shared),
            id,
        })
    }
}
