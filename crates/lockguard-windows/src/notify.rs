//! 注册表变更通知后端（`RegNotifyChangeKeyValue` + 事件对象）。
//!
//! 实现要点：
//! - 监视键以 `KEY_READ | KEY_NOTIFY` 打开，句柄由 winreg 的 `RegKey` 持有，析构时 `RegCloseKey`
//! - 每次布防使用异步模式（立即返回），变更时系统置位自动复位的“变更事件”
//! - 停止信号是手动复位事件，与变更事件一起传给 `WaitForMultipleObjects`，
//!   因此 stop 不依赖注册表是否真的发生变化
//!
//! 注意：
//! - 异步通知与发起布防的线程绑定，线程退出会使通知失效；布防与等待都在同一监视线程上进行
//!
//! 作者：锁屏策略守护项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use std::ffi::c_void;
use std::io;

use lockguard_core::backend::{NotifyBackend, StopSignal, Wake, WatchedKey};
use lockguard_core::error::WatchError;
use lockguard_core::filter::NotifyFilter;
use lockguard_core::target::WatchTarget;
use windows::core::PCWSTR;
use windows::Win32::Foundation::{CloseHandle, BOOL, ERROR_SUCCESS, HANDLE, WAIT_FAILED, WAIT_OBJECT_0};
use windows::Win32::System::Registry::{RegNotifyChangeKeyValue, HKEY, REG_NOTIFY_FILTER};
use windows::Win32::System::Threading::{CreateEventW, SetEvent, WaitForMultipleObjects, INFINITE};
use winreg::enums::{KEY_NOTIFY, KEY_READ};
use winreg::RegKey;

use crate::store::hive;

/// 自有事件句柄（析构时 `CloseHandle`）。
pub struct EventHandle(HANDLE);

// 事件句柄是内核对象引用，可跨线程使用。
unsafe impl Send for EventHandle {}
unsafe impl Sync for EventHandle {}

impl EventHandle {
    /// 创建未命名、初始未置位的事件。
    fn new(manual_reset: bool) -> Result<Self, WatchError> {
        let handle = unsafe { CreateEventW(None, BOOL::from(manual_reset), BOOL::from(false), PCWSTR::null()) }
            .map_err(|e| WatchError::os("CreateEventW", io::Error::from(e)))?;
        Ok(Self(handle))
    }

    fn raw(&self) -> HANDLE {
        self.0
    }
}

impl Drop for EventHandle {
    fn drop(&mut self) {
        unsafe {
            let _ = CloseHandle(self.0);
        }
    }
}

impl StopSignal for EventHandle {
    fn raise(&self) -> Result<(), WatchError> {
        unsafe { SetEvent(self.0) }.map_err(|e| WatchError::os("SetEvent", io::Error::from(e)))
    }
}

/// 已打开的监视键。
pub struct RegistryWatchedKey {
    key: RegKey,
    changed: EventHandle,
}

impl RegistryWatchedKey {
    fn hkey(&self) -> HKEY {
        HKEY(self.key.raw_handle() as *mut c_void)
    }
}

impl WatchedKey for RegistryWatchedKey {
    type Signal = EventHandle;

    fn request_notification(&mut self, filter: NotifyFilter, watch_subtree: bool) -> Result<(), WatchError> {
        let status = unsafe {
            RegNotifyChangeKeyValue(
                self.hkey(),
                BOOL::from(watch_subtree),
                REG_NOTIFY_FILTER(filter.bits()),
                self.changed.raw(),
                BOOL::from(true),
            )
        };
        if status != ERROR_SUCCESS {
            return Err(WatchError::os(
                "RegNotifyChangeKeyValue",
                io::Error::from_raw_os_error(status.0 as i32),
            ));
        }
        Ok(())
    }

    fn wait(&mut self, stop: &EventHandle) -> Result<Wake, WatchError> {
        // 停止信号放在下标 0：两者同时置位时优先退出。
        let handles = [stop.raw(), self.changed.raw()];
        let result = unsafe { WaitForMultipleObjects(&handles, BOOL::from(false), INFINITE) };
        if result == WAIT_OBJECT_0 {
            Ok(Wake::Stopped)
        } else if result.0 == WAIT_OBJECT_0.0 + 1 {
            Ok(Wake::Changed)
        } else if result == WAIT_FAILED {
            Err(WatchError::os("WaitForMultipleObjects", io::Error::last_os_error()))
        } else {
            Err(WatchError::os(
                "WaitForMultipleObjects",
                io::Error::other(format!("意外的等待结果: {:#x}", result.0)),
            ))
        }
    }
}

/// 基于 Win32 注册表的变更通知后端。
#[derive(Debug, Clone, Copy, Default)]
pub struct RegistryNotifyBackend;

impl NotifyBackend for RegistryNotifyBackend {
    type Signal = EventHandle;
    type Key = RegistryWatchedKey;

    fn stop_signal(&self) -> Result<EventHandle, WatchError> {
        EventHandle::new(true)
    }

    fn open_key(&self, target: &WatchTarget) -> Result<RegistryWatchedKey, WatchError> {
        let key = hive(target.scope())
            .open_subkey_with_flags(target.sub_path(), KEY_READ | KEY_NOTIFY)
            .map_err(|e| WatchError::os("RegOpenKeyEx", e))?;
        let changed = EventHandle::new(false)?;
        Ok(RegistryWatchedKey { key, changed })
    }
}
