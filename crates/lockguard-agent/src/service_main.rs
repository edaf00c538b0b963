//! Windows 服务入口：注册控制处理器、上报状态、运行宿主。
//!
//! 状态流转：StartPending → Running → StopPending → Stopped。
//! 宿主启动失败时直接上报 Stopped（退出码 1），错误由监督边界写入失败日志。
//!
//! 作者：锁屏策略守护项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use std::ffi::OsString;
use std::sync::{mpsc, Arc};
use std::time::Duration;

use anyhow::{Context, Result};
use lockguard_core::config::ServiceConfig;
use lockguard_core::failure_log::FailureLog;
use lockguard_core::supervise;
use lockguard_windows::notify::RegistryNotifyBackend;
use lockguard_windows::store::RegistryPolicyStore;
use once_cell::sync::OnceCell;
use tracing::info;
use windows_service::service::{
    ServiceControl, ServiceControlAccept, ServiceExitCode, ServiceState, ServiceStatus, ServiceType,
};
use windows_service::service_control_handler::{self, ServiceControlHandlerResult, ServiceStatusHandle};
use windows_service::{define_windows_service, service_dispatcher};

use crate::runner;

/// ERROR_FAILED_SERVICE_CONTROLLER_CONNECT：进程不是由服务控制管理器启动的。
const ERROR_FAILED_SERVICE_CONTROLLER_CONNECT: i32 = 1063;

const START_WAIT_HINT: Duration = Duration::from_secs(10);
const STOP_WAIT_HINT: Duration = Duration::from_secs(10);

/// 服务配置（由 `main` 注入，供 `service_dispatcher` 回调使用）。
static CONFIG: OnceCell<ServiceConfig> = OnceCell::new();

/// 失败日志（同上）。
static FAILURE_LOG: OnceCell<Arc<FailureLog>> = OnceCell::new();

/// 调度结果。
pub enum Dispatch {
    /// 服务已运行并退出。
    Completed,
    /// 交互式启动，不在服务控制管理器下。
    Interactive,
}

/// 把进程交给服务调度器（阻塞到服务停止）。
pub fn dispatch(config: ServiceConfig, failure_log: Arc<FailureLog>) -> Result<Dispatch> {
    let _ = CONFIG.set(config);
    let _ = FAILURE_LOG.set(failure_log);
    let service_name = CONFIG.get().map(|c| c.service_name.as_str()).context("服务配置未初始化")?;

    match service_dispatcher::start(service_name, ffi_service_main) {
        Ok(()) => Ok(Dispatch::Completed),
        Err(windows_service::Error::Winapi(e)) if e.raw_os_error() == Some(ERROR_FAILED_SERVICE_CONTROLLER_CONNECT) => {
            Ok(Dispatch::Interactive)
        }
        Err(e) => Err(e).context("启动服务调度器失败"),
    }
}

define_windows_service!(ffi_service_main, service_main);

/// 该函数签名由宏固定；真实逻辑在 [`run_service`]。
fn service_main(_arguments: Vec<OsString>) {
    match FAILURE_LOG.get() {
        Some(log) => {
            let _ = supervise::run_supervised(log, run_service);
        }
        None => {
            let _ = run_service();
        }
    }
}

fn run_service() -> Result<()> {
    let config = CONFIG.get().context("服务配置未初始化")?;
    let failure_log = FAILURE_LOG.get().cloned().context("失败日志未初始化")?;

    let (stop_tx, stop_rx) = mpsc::channel();
    let status_handle = service_control_handler::register(&config.service_name, move |control_event| {
        match control_event {
            ServiceControl::Stop | ServiceControl::Shutdown => {
                let _ = stop_tx.send(());
                ServiceControlHandlerResult::NoError
            }
            ServiceControl::Interrogate => ServiceControlHandlerResult::NoError,
            _ => ServiceControlHandlerResult::NotImplemented,
        }
    })
    .context("注册服务控制处理器失败")?;

    report(&status_handle, ServiceState::StartPending, 0, START_WAIT_HINT)?;

    let started = runner::build_host(RegistryNotifyBackend, RegistryPolicyStore, config, failure_log)
        .and_then(|mut host| {
            host.start()?;
            Ok(host)
        });
    let mut host = match started {
        Ok(host) => host,
        Err(e) => {
            report(&status_handle, ServiceState::Stopped, 1, Duration::default())?;
            return Err(e.context("启动服务宿主失败"));
        }
    };

    report(&status_handle, ServiceState::Running, 0, Duration::default())?;
    info!("服务已运行: {}", config.service_name);

    let _ = stop_rx.recv();
    report(&status_handle, ServiceState::StopPending, 0, STOP_WAIT_HINT)?;
    host.stop();

    report(&status_handle, ServiceState::Stopped, 0, Duration::default())?;
    info!("服务已停止: {}", config.service_name);
    Ok(())
}

fn report(handle: &ServiceStatusHandle, state: ServiceState, exit_code: u32, wait_hint: Duration) -> Result<()> {
    let controls_accepted = if state == ServiceState::Running {
        ServiceControlAccept::STOP | ServiceControlAccept::SHUTDOWN
    } else {
        ServiceControlAccept::empty()
    };
    handle
        .set_service_status(ServiceStatus {
            service_type: ServiceType::OWN_PROCESS,
            current_state: state,
            controls_accepted,
            exit_code: ServiceExitCode::Win32(exit_code),
            checkpoint: 0,
            wait_hint,
            process_id: None,
        })
        .with_context(|| format!("上报服务状态失败: {state:?}"))
}
