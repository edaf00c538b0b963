//! 顶层监督边界：把逃逸到最外层的失败写入失败日志后再允许进程退出。
//!
//! 覆盖范围：
//! - [`run_supervised`]：主流程返回的 `Err` 与主线程 panic
//! - [`install_panic_hook`]：任意线程（监视线程、定时器线程）的 panic
//!
//! 作者：锁屏策略守护项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use tracing::error;

use crate::failure_log::FailureLog;

/// 安装 panic hook：记录 panic 信息后继续调用原 hook。
pub fn install_panic_hook(log: Arc<FailureLog>) {
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        let current = thread::current();
        let name = current.name().unwrap_or("<unnamed>");
        log.record(&format!("线程 {name} panic: {info}"));
        previous(info);
    }));
}

/// 在监督边界内运行主流程。
///
/// 返回值：
/// - `Some(value)`：主流程成功
/// - `None`：主流程返回错误或 panic；失败已写入日志
pub fn run_supervised<T, E, F>(log: &FailureLog, f: F) -> Option<T>
where
    F: FnOnce() -> Result<T, E>,
    E: fmt::Display,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Some(value),
        Ok(Err(err)) => {
            let message = format!("{err:#}");
            error!("未处理的失败: {message}");
            log.record(&message);
            None
        }
        Err(payload) => {
            let message = format!("主流程 panic: {}", panic_message(payload.as_ref()));
            error!("{message}");
            log.record(&message);
            None
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<非字符串 panic 负载>"
    }
}
