//! 锁屏策略守护代理（Windows Service 形态）。
//!
//! 职责：
//! - 监视个性化策略键，变更后立即把 `NoChangingLockScreen` 恢复为基线
//! - 每个周期（默认 5 分钟）再修正一次，兜底错过的通知
//! - 逃逸到顶层的失败写入失败日志
//!
//! 权限要求：
//! - 安装/卸载服务、修改 HKLM 策略值需要管理员权限
//!
//! 作者：锁屏策略守护项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

mod cli;
mod logging;
mod runner;
#[cfg(windows)]
mod service_main;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use lockguard_core::config::ServiceConfig;
use lockguard_core::failure_log::FailureLog;
use lockguard_core::supervise;
use tracing::info;

use crate::cli::{Args, Directive, USAGE_HINT};

/// 程序入口：加载配置、初始化日志与监督边界后分发指令。
///
/// 退出码：
/// - 0：成功（包括交互式启动时仅输出提示）
/// - 1：配置错误、主流程返回错误或 panic（已写入失败日志）
fn main() -> ExitCode {
    let args = Args::parse();

    let config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e:#}");
            FailureLog::new(ServiceConfig::default().failure_log_path()).record(&format!("{e:#}"));
            return ExitCode::FAILURE;
        }
    };

    let directive = args.directive();
    let failure_log = Arc::new(FailureLog::new(config.failure_log_path()));
    let log_file = (directive == Directive::Service).then(|| {
        failure_log
            .path()
            .with_file_name(logging::SERVICE_LOG_FILE)
    });
    if let Err(e) = logging::init(log_file.as_deref()) {
        eprintln!("{e:#}");
        failure_log.record(&format!("{e:#}"));
        return ExitCode::FAILURE;
    }
    supervise::install_panic_hook(Arc::clone(&failure_log));

    match supervise::run_supervised(&failure_log, || run(&args, directive, config, Arc::clone(&failure_log))) {
        Some(()) => ExitCode::SUCCESS,
        None => ExitCode::FAILURE,
    }
}

/// 读取配置；未指定文件时使用内置默认值。
fn load_config(path: Option<&Path>) -> Result<ServiceConfig> {
    match path {
        Some(path) => ServiceConfig::load(path).with_context(|| format!("加载配置失败: {}", path.display())),
        None => Ok(ServiceConfig::default()),
    }
}

fn run(args: &Args, directive: Directive, config: ServiceConfig, failure_log: Arc<FailureLog>) -> Result<()> {
    match directive {
        Directive::Install => system::install(args, &config),
        Directive::Uninstall => system::uninstall(&config),
        Directive::EnforceOnce if args.dry_run => {
            runner::enforce_once(runner::dry_run_registry(&config), &config).map(|_| ())
        }
        Directive::EnforceOnce => system::enforce_once(&config),
        Directive::RunConsole if args.dry_run => {
            let registry = runner::dry_run_registry(&config);
            let host = runner::build_host(registry.clone(), registry, &config, failure_log)?;
            runner::run_console(host)
        }
        Directive::RunConsole => system::run_console(&config, failure_log),
        Directive::Service => {
            if system::dispatch(config, failure_log)? {
                info!("服务调度结束");
            } else {
                println!("{USAGE_HINT}");
            }
            Ok(())
        }
    }
}

#[cfg(windows)]
mod system {
    use std::sync::Arc;

    use anyhow::{Context, Result};
    use lockguard_core::config::ServiceConfig;
    use lockguard_core::failure_log::FailureLog;
    use lockguard_windows::elevation::require_admin;
    use lockguard_windows::notify::RegistryNotifyBackend;
    use lockguard_windows::service::{install_service, uninstall_service, ServiceDefinition};
    use lockguard_windows::store::RegistryPolicyStore;

    use crate::cli::Args;
    use crate::runner;
    use crate::service_main::{self, Dispatch};

    pub fn install(args: &Args, config: &ServiceConfig) -> Result<()> {
        require_admin("安装服务")?;
        let exe = std::env::current_exe().context("获取当前可执行文件路径失败")?;
        let mut launch_args = Vec::new();
        if let Some(path) = &args.config {
            // 服务的工作目录是 System32，配置路径必须是绝对路径。
            let absolute = if path.is_absolute() {
                path.clone()
            } else {
                std::env::current_dir().context("获取当前目录失败")?.join(path)
            };
            launch_args.push("--config".to_string());
            launch_args.push(absolute.to_string_lossy().into_owned());
        }
        install_service(&ServiceDefinition {
            name: &config.service_name,
            display_name: &config.display_name,
            description: &config.description,
            executable: &exe,
            args: &launch_args,
        })
    }

    pub fn uninstall(config: &ServiceConfig) -> Result<()> {
        require_admin("卸载服务")?;
        uninstall_service(&config.service_name)
    }

    pub fn enforce_once(config: &ServiceConfig) -> Result<()> {
        runner::enforce_once(RegistryPolicyStore, config).map(|_| ())
    }

    pub fn run_console(config: &ServiceConfig, failure_log: Arc<FailureLog>) -> Result<()> {
        let host = runner::build_host(RegistryNotifyBackend, RegistryPolicyStore, config, failure_log)?;
        runner::run_console(host)
    }

    /// 返回 `false` 表示交互式启动（不在服务控制管理器下）。
    pub fn dispatch(config: ServiceConfig, failure_log: Arc<FailureLog>) -> Result<bool> {
        match service_main::dispatch(config, failure_log)? {
            Dispatch::Completed => Ok(true),
            Dispatch::Interactive => Ok(false),
        }
    }
}

/// 非 Windows 平台只支持 `--dry-run`。
#[cfg(not(windows))]
mod system {
    use std::sync::Arc;

    use anyhow::{bail, Result};
    use lockguard_core::config::ServiceConfig;
    use lockguard_core::failure_log::FailureLog;

    use crate::cli::Args;

    const UNSUPPORTED: &str = "当前平台不支持该操作，仅可使用 --dry-run";

    pub fn install(_args: &Args, _config: &ServiceConfig) -> Result<()> {
        bail!(UNSUPPORTED)
    }

    pub fn uninstall(_config: &ServiceConfig) -> Result<()> {
        bail!(UNSUPPORTED)
    }

    pub fn enforce_once(_config: &ServiceConfig) -> Result<()> {
        bail!(UNSUPPORTED)
    }

    pub fn run_console(_config: &ServiceConfig, _failure_log: Arc<FailureLog>) -> Result<()> {
        bail!(UNSUPPORTED)
    }

    pub fn dispatch(_config: ServiceConfig, _failure_log: Arc<FailureLog>) -> Result<bool> {
        Ok(false)
    }
}
