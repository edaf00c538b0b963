//! tracing 初始化。
//!
//! 控制台模式输出到 stderr；服务模式没有控制台，输出追加到日志文件。
//!
//! 作者：锁屏策略守护项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

/// 服务模式日志文件名（与失败日志同目录）。
pub const SERVICE_LOG_FILE: &str = "lockguard.log";

/// 初始化全局 subscriber。
///
/// 参数：
/// - `file`：`Some` 时追加写入该文件（不带 ANSI 颜色），否则写 stderr
///
/// 异常处理：
/// - 默认过滤指令解析失败或日志文件打开失败时返回错误
pub fn init(file: Option<&Path>) -> Result<()> {
    let default_level: Directive = "info".parse().context("解析默认日志级别失败")?;
    let filter = EnvFilter::from_default_env().add_directive(default_level);
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_timer(UtcTime::rfc_3339());

    match file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("打开日志文件失败: {}", path.display()))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.with_writer(std::io::stderr).init(),
    }
    Ok(())
}
