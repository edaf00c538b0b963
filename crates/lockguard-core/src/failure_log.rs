//! 未处理失败的追加日志（兜底，不替代结构化错误处理）。
//!
//! 格式：每条一行 `<RFC3339 UTC 时间> <消息>`，多行消息中的换行被替换为 ` | `。
//!
//! 作者：锁屏策略守护项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// 追加写入的失败日志。
#[derive(Debug)]
pub struct FailureLog {
    path: PathBuf,
    // 串行化多线程追加，避免行交错。
    write_lock: Mutex<()>,
}

impl FailureLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 追加一条失败记录。
    ///
    /// 异常处理：
    /// - 打开/写入失败返回 IO 错误（调用方通常只能忽略）
    pub fn append(&self, message: &str) -> io::Result<()> {
        let _guard = self.write_lock.lock();
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let stamp = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| "-".to_string());
        let line = message.trim_end().replace(['\r', '\n'], " | ");
        writeln!(file, "{stamp} {line}")?;
        file.flush()
    }

    /// 追加失败记录，写日志本身失败时只输出 tracing 警告。
    pub fn record(&self, message: &str) {
        if let Err(e) = self.append(message) {
            tracing::warn!("写入失败日志失败: {}: {e}", self.path.display());
        }
    }
}
