//! 服务配置（可选 JSON 文件，缺省字段取内置默认值）。
//!
//! 示例：
//! ```json
//! {
//!   "watch_path": "HKLM\\SOFTWARE\\Policies\\Microsoft\\Windows\\Personalization",
//!   "value_name": "NoChangingLockScreen",
//!   "interval_secs": 300
//! }
//! ```
//!
//! 作者：锁屏策略守护项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::enforcer::{EnforceMode, PolicyRule};
use crate::error::ConfigError;
use crate::filter::NotifyFilter;
use crate::target::{RootScope, WatchTarget};

/// 默认服务名（安装/卸载/服务调度共用）。
pub const DEFAULT_SERVICE_NAME: &str = "LockscreenPolicyGuard";
/// 默认监视路径（HKLM 下的个性化策略区）。
pub const DEFAULT_WATCH_SUBKEY: &str = "SOFTWARE\\Policies\\Microsoft\\Windows\\Personalization";
/// 默认守护的值名（非 0 表示“禁止更改锁屏”）。
pub const DEFAULT_VALUE_NAME: &str = "NoChangingLockScreen";
/// 默认定时修正周期（秒）。
pub const DEFAULT_INTERVAL_SECS: u64 = 300;
/// 默认失败日志文件名（相对于当前工作目录）。
pub const DEFAULT_FAILURE_LOG: &str = "lockguard-failures.log";

/// 服务配置。
///
/// 字段说明：
/// - `service_name`/`display_name`/`description`：Windows 服务注册信息
/// - `watch_path`：监视的键（同时也是策略值所在的键）
/// - `filter`：变更通知过滤器
/// - `value_name`/`baseline`/`mode`：需要守护的策略值
/// - `interval_secs`：定时修正周期
/// - `failure_log`：未处理失败的追加日志
/// - `restart_watcher_on_tick`：监视器因系统调用失败回到空闲后，是否在下个定时周期重新启动
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub service_name: String,
    pub display_name: String,
    pub description: String,
    pub watch_path: WatchTarget,
    pub filter: NotifyFilter,
    pub value_name: String,
    pub baseline: u32,
    pub mode: EnforceMode,
    pub interval_secs: u64,
    pub failure_log: PathBuf,
    pub restart_watcher_on_tick: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            display_name: "Lockscreen Policy Guard".to_string(),
            description: "监视个性化策略并恢复“允许更改锁屏”设置".to_string(),
            watch_path: default_watch_target(),
            filter: NotifyFilter::default(),
            value_name: DEFAULT_VALUE_NAME.to_string(),
            baseline: 0,
            mode: EnforceMode::default(),
            interval_secs: DEFAULT_INTERVAL_SECS,
            failure_log: PathBuf::from(DEFAULT_FAILURE_LOG),
            restart_watcher_on_tick: true,
        }
    }
}

fn default_watch_target() -> WatchTarget {
    WatchTarget::builtin(RootScope::LocalMachine, DEFAULT_WATCH_SUBKEY)
}

impl ServiceConfig {
    /// 从 JSON 文件加载配置并校验。
    ///
    /// 异常处理：
    /// - 文件读取失败 / JSON 解析失败 / 校验失败均返回 [`ConfigError`]
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let bytes = std::fs::read(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&bytes)
    }

    /// 从 JSON 字节解析配置并校验。
    pub fn from_json(bytes: &[u8]) -> Result<Self, ConfigError> {
        let config: ServiceConfig = serde_json::from_slice(bytes)?;
        config.validate()?;
        Ok(config)
    }

    /// 校验配置项。
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.trim().is_empty() {
            return Err(ConfigError::Invalid("service_name 不能为空".to_string()));
        }
        if self.value_name.trim().is_empty() {
            return Err(ConfigError::Invalid("value_name 不能为空".to_string()));
        }
        if self.interval_secs == 0 {
            return Err(ConfigError::Invalid("interval_secs 必须大于 0".to_string()));
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// 由配置生成策略规则（值位于监视路径下）。
    pub fn policy_rule(&self) -> PolicyRule {
        PolicyRule {
            key: self.watch_path.clone(),
            value_name: self.value_name.clone(),
            baseline: self.baseline,
            mode: self.mode,
        }
    }

    /// 失败日志的绝对路径（相对路径按当前工作目录解析）。
    pub fn failure_log_path(&self) -> PathBuf {
        if self.failure_log.is_absolute() {
            return self.failure_log.clone();
        }
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(&self.failure_log),
            Err(_) => self.failure_log.clone(),
        }
    }
}
