//! Windows 服务安装/卸载封装（基于 `windows-service` crate）。
//!
//! 用途：
//! - 把守护进程注册为自动启动的 LocalSystem 服务
//! - 卸载时先停止正在运行的服务，再删除
//!
//! 权限要求：
//! - 创建/停止/删除服务需要管理员权限（调用前可用 [`crate::elevation::require_admin`] 检查）
//!
//! 作者：锁屏策略守护项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use std::ffi::OsString;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{info, warn};
use windows_service::service::{
    ServiceAccess, ServiceErrorControl, ServiceInfo, ServiceStartType, ServiceState, ServiceType,
};
use windows_service::service_manager::{ServiceManager, ServiceManagerAccess};

/// ERROR_SERVICE_EXISTS
const ERROR_SERVICE_EXISTS: i32 = 1073;
/// ERROR_SERVICE_DOES_NOT_EXIST
const ERROR_SERVICE_DOES_NOT_EXIST: i32 = 1060;

/// 卸载时等待服务停止的最长时间。
const STOP_WAIT: Duration = Duration::from_secs(15);
const STOP_POLL: Duration = Duration::from_millis(250);

/// 安装参数。
#[derive(Debug, Clone)]
pub struct ServiceDefinition<'a> {
    /// 服务名（唯一标识）。
    pub name: &'a str,
    pub display_name: &'a str,
    /// 描述（为空则不设置）。
    pub description: &'a str,
    /// 服务可执行文件路径。
    pub executable: &'a Path,
    /// 服务启动参数。
    pub args: &'a [String],
}

/// 安装或更新 Windows 服务（自动启动，LocalSystem）。
///
/// 异常处理：
/// - 打开服务管理器失败：返回错误
/// - 创建失败：返回错误；若错误码为 1073（服务已存在），则改为“打开并更新配置与描述”
pub fn install_service(def: &ServiceDefinition<'_>) -> Result<()> {
    let manager_access = ServiceManagerAccess::CONNECT | ServiceManagerAccess::CREATE_SERVICE;
    let service_manager =
        ServiceManager::local_computer(None::<&str>, manager_access).context("打开 ServiceManager 失败")?;

    let service_info = ServiceInfo {
        name: OsString::from(def.name),
        display_name: OsString::from(def.display_name),
        service_type: ServiceType::OWN_PROCESS,
        start_type: ServiceStartType::AutoStart,
        error_control: ServiceErrorControl::Normal,
        executable_path: def.executable.to_path_buf(),
        launch_arguments: def.args.iter().map(OsString::from).collect(),
        dependencies: vec![],
        account_name: None,
        account_password: None,
    };

    let service = match service_manager.create_service(&service_info, ServiceAccess::CHANGE_CONFIG) {
        Ok(s) => s,
        Err(windows_service::Error::Winapi(e)) if e.raw_os_error() == Some(ERROR_SERVICE_EXISTS) => {
            // 重复安装：更新可执行路径与参数。
            let s = service_manager
                .open_service(def.name, ServiceAccess::CHANGE_CONFIG)
                .with_context(|| format!("打开已存在的服务失败: {}", def.name))?;
            s.change_config(&service_info).context("更新服务配置失败")?;
            info!("服务已存在，已更新配置: {}", def.name);
            s
        }
        Err(e) => return Err(e).context("创建服务失败"),
    };

    if !def.description.is_empty() {
        service.set_description(def.description).context("设置服务描述失败")?;
    }
    info!("服务已安装: {} -> {}", def.name, def.executable.display());
    Ok(())
}

/// 卸载 Windows 服务。
///
/// 行为：
/// - 服务不存在：记录后返回成功
/// - 服务正在运行：先发送停止请求并等待其停止（超时只告警，仍尝试删除）
///
/// 异常处理：
/// - 打开服务或删除服务失败时返回错误（通常是权限不足或服务被占用）。
pub fn uninstall_service(service_name: &str) -> Result<()> {
    let service_manager = ServiceManager::local_computer(None::<&str>, ServiceManagerAccess::CONNECT)
        .context("打开 ServiceManager 失败")?;
    let access = ServiceAccess::QUERY_STATUS | ServiceAccess::STOP | ServiceAccess::DELETE;
    let service = match service_manager.open_service(service_name, access) {
        Ok(s) => s,
        Err(windows_service::Error::Winapi(e)) if e.raw_os_error() == Some(ERROR_SERVICE_DOES_NOT_EXIST) => {
            info!("服务未安装，跳过卸载: {service_name}");
            return Ok(());
        }
        Err(e) => return Err(e).with_context(|| format!("打开服务失败: {service_name}")),
    };

    let status = service
        .query_status()
        .with_context(|| format!("查询服务状态失败: {service_name}"))?;
    if status.current_state != ServiceState::Stopped {
        service.stop().with_context(|| format!("停止服务失败: {service_name}"))?;
        let deadline = Instant::now() + STOP_WAIT;
        loop {
            let state = service.query_status()?.current_state;
            if state == ServiceState::Stopped {
                break;
            }
            if Instant::now() >= deadline {
                warn!("等待服务停止超时（当前状态 {state:?}），继续删除: {service_name}");
                break;
            }
            thread::sleep(STOP_POLL);
        }
    }

    service.delete().with_context(|| format!("删除服务失败: {service_name}"))?;
    info!("服务已卸载: {service_name}");
    Ok(())
}
