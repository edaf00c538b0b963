//! 错误类型定义。
//!
//! 分类：
//! - [`WatchError`]：监视器构造/状态转换错误，以及监视循环内的系统调用失败
//! - [`StoreError`]：策略值读写失败（由执行器在本地吞掉，仅记录日志）
//! - [`ConfigError`]：服务配置文件读取/校验失败
//!
//! 作者：锁屏策略守护项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use std::io;

use thiserror::Error;

/// 注册表监视器错误。
///
/// 说明：
/// - `InvalidArgument`/`InvalidOperation`/`Disposed` 由调用方同步收到，仅影响本次调用
/// - `Os`/`Spawn` 出现在启动或监视循环中；循环内的失败通过错误回调上报，不会直接 panic
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("无效参数: {0}")]
    InvalidArgument(String),
    #[error("无效操作: {0}")]
    InvalidOperation(&'static str),
    #[error("监视器已释放，不允许继续操作")]
    Disposed,
    #[error("{op} 失败: {source}")]
    Os {
        op: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("创建监视线程失败: {0}")]
    Spawn(#[source] io::Error),
}

impl WatchError {
    /// 以系统调用名包装底层 IO 错误。
    pub fn os(op: &'static str, source: io::Error) -> Self {
        Self::Os { op, source }
    }
}

/// 策略值存储错误。
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{op} 失败: {path}\\{name}: {source}")]
    Os {
        op: &'static str,
        path: String,
        name: String,
        #[source]
        source: io::Error,
    },
}

/// 服务配置错误。
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件失败: {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("解析配置 JSON 失败: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("配置项无效: {0}")]
    Invalid(String),
}

/// 服务宿主错误。
#[derive(Debug, Error)]
pub enum HostError {
    #[error("创建定时器运行时失败: {0}")]
    Runtime(#[source] io::Error),
    #[error(transparent)]
    Watch(#[from] WatchError),
}
