//! 组装宿主并以控制台/单次修正方式运行（与平台无关的部分）。
//!
//! 作者：锁屏策略守护项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use std::io::BufRead;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use anyhow::{bail, Context, Result};
use lockguard_core::backend::{NotifyBackend, PolicyStore};
use lockguard_core::config::ServiceConfig;
use lockguard_core::enforcer::{EnforceOutcome, PolicyEnforcer};
use lockguard_core::failure_log::FailureLog;
use lockguard_core::host::ServiceHost;
use lockguard_core::memory::MemoryRegistry;
use lockguard_core::watcher::KeyWatcher;
use tracing::info;

/// 按配置组装宿主：监视器（含过滤器）+ 修正器 + 定时周期。
pub fn build_host<B, S>(
    backend: B,
    store: S,
    config: &ServiceConfig,
    failure_log: Arc<FailureLog>,
) -> Result<ServiceHost<B, S>>
where
    B: NotifyBackend,
    S: PolicyStore,
{
    let watcher = KeyWatcher::new(backend, config.watch_path.clone());
    watcher.set_filter(config.filter).context("设置变更过滤器失败")?;
    let enforcer = PolicyEnforcer::new(store, config.policy_rule());
    Ok(ServiceHost::new(watcher, enforcer, config.interval())
        .restart_watcher_on_tick(config.restart_watcher_on_tick)
        .with_failure_log(failure_log))
}

/// 前台运行宿主，标准输入收到回车（或被关闭）后停止。
pub fn run_console<B, S>(mut host: ServiceHost<B, S>) -> Result<()>
where
    B: NotifyBackend,
    S: PolicyStore,
{
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("lockguard-console".to_string())
        .spawn(move || {
            let mut line = String::new();
            let _ = std::io::stdin().lock().read_line(&mut line);
            let _ = tx.send(());
        })
        .context("创建控制台输入线程失败")?;
    println!("正在守护 {}，按回车停止", host.watcher().target());
    host.run_until(rx)?;
    info!("控制台运行结束");
    Ok(())
}

/// 执行一次修正并输出结果；修正失败时返回错误。
pub fn enforce_once<S: PolicyStore>(store: S, config: &ServiceConfig) -> Result<EnforceOutcome> {
    let enforcer = PolicyEnforcer::new(store, config.policy_rule());
    let outcome = enforcer.enforce();
    println!("{}\\{} => {outcome:?}", config.watch_path, config.value_name);
    if outcome == EnforceOutcome::Failed {
        bail!("修正失败: {}\\{}", config.watch_path, config.value_name);
    }
    Ok(outcome)
}

/// dry-run 使用的内存注册表：策略键存在，且值偏离基线。
pub fn dry_run_registry(config: &ServiceConfig) -> MemoryRegistry {
    let registry = MemoryRegistry::new();
    registry.create_key(&config.watch_path);
    let deviated = config.baseline.wrapping_add(1);
    registry.set(&config.watch_path, &config.value_name, deviated);
    info!("dry-run：内存注册表 {}\\{} = {deviated}", config.watch_path, config.value_name);
    registry
}
