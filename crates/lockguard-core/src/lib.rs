//! 锁屏策略守护核心库（跨平台）。
//!
//! 功能：
//! - 注册表路径模型（根键别名解析）与变更通知过滤器
//! - 注册表变更监视器：专用后台线程、可重复布防的阻塞等待、观察者回调
//! - 策略值执行器：把单个 DWORD 值恢复到基线（写 0 后删除）
//! - 服务宿主：监视器 + 定时修正的生命周期管理
//! - 服务配置、失败日志与顶层监督边界
//!
//! 平台相关的系统调用通过 [`backend`] 中的 trait 注入，Windows 实现位于 `lockguard-windows`，
//! [`memory`] 提供内存实现用于测试与演练。
//!
//! 作者：锁屏策略守护项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

pub mod backend;
pub mod config;
pub mod enforcer;
pub mod error;
pub mod failure_log;
pub mod filter;
pub mod host;
pub mod memory;
pub mod supervise;
pub mod target;
pub mod watcher;
