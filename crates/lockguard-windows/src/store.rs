//! 注册表策略值读写（基于 winreg）。
//!
//! 约定：
//! - 键或值不存在：读取返回 `Ok(None)`，删除视为成功
//! - 写入时键不存在则创建
//!
//! 权限要求：
//! - 读取策略键通常不需要管理员
//! - 写入/删除 HKLM 策略值需要管理员权限（服务以 LocalSystem 运行时满足）
//!
//! 作者：锁屏策略守护项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use std::io;

use lockguard_core::backend::PolicyStore;
use lockguard_core::error::StoreError;
use lockguard_core::target::{RootScope, WatchTarget};
use winreg::enums::{
    HKEY_CLASSES_ROOT, HKEY_CURRENT_CONFIG, HKEY_CURRENT_USER, HKEY_DYN_DATA, HKEY_LOCAL_MACHINE,
    HKEY_PERFORMANCE_DATA, HKEY_USERS, KEY_READ, KEY_SET_VALUE,
};
use winreg::RegKey;

/// 根键范围对应的预定义键。
pub(crate) fn hive(scope: RootScope) -> RegKey {
    RegKey::predef(match scope {
        RootScope::LocalMachine => HKEY_LOCAL_MACHINE,
        RootScope::CurrentUser => HKEY_CURRENT_USER,
        RootScope::Users => HKEY_USERS,
        RootScope::ClassesRoot => HKEY_CLASSES_ROOT,
        RootScope::CurrentConfig => HKEY_CURRENT_CONFIG,
        RootScope::DynData => HKEY_DYN_DATA,
        RootScope::PerformanceData => HKEY_PERFORMANCE_DATA,
    })
}

fn store_error(op: &'static str, key: &WatchTarget, name: &str, source: io::Error) -> StoreError {
    StoreError::Os {
        op,
        path: key.to_string(),
        name: name.to_string(),
        source,
    }
}

/// 真实注册表上的策略值存储。
#[derive(Debug, Clone, Copy, Default)]
pub struct RegistryPolicyStore;

impl PolicyStore for RegistryPolicyStore {
    fn read_dword(&self, key: &WatchTarget, name: &str) -> Result<Option<u32>, StoreError> {
        let opened = match hive(key.scope()).open_subkey_with_flags(key.sub_path(), KEY_READ) {
            Ok(k) => k,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(store_error("打开注册表键", key, name, e)),
        };
        match opened.get_value::<u32, _>(name) {
            Ok(v) => Ok(Some(v)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(store_error("读取 DWORD", key, name, e)),
        }
    }

    fn write_dword(&self, key: &WatchTarget, name: &str, value: u32) -> Result<(), StoreError> {
        let (opened, _disp) = hive(key.scope())
            .create_subkey_with_flags(key.sub_path(), KEY_SET_VALUE)
            .map_err(|e| store_error("打开/创建注册表键", key, name, e))?;
        opened
            .set_value(name, &value)
            .map_err(|e| store_error("写入 DWORD", key, name, e))
    }

    fn delete_value(&self, key: &WatchTarget, name: &str) -> Result<(), StoreError> {
        let opened = match hive(key.scope()).open_subkey_with_flags(key.sub_path(), KEY_SET_VALUE) {
            Ok(k) => k,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(store_error("打开注册表键", key, name, e)),
        };
        match opened.delete_value(name) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(store_error("删除值", key, name, e)),
        }
    }
}
