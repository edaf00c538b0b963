//! Windows 平台能力封装（注册表变更通知、策略值读写、服务安装/卸载）。
//!
//! 目标：
//! - 为 `lockguard-core` 的 trait 提供 Win32 实现，上层逻辑不直接依赖 Win32 细节
//! - 统一错误处理风格：实现 core trait 的部分返回 core 错误类型，其余以 `anyhow::Result` 返回
//!
//! 安全注意：
//! - 写入 HKLM 策略键、创建/删除服务通常需要管理员权限
//!
//! 非 Windows 平台上本 crate 为空。
//!
//! 作者：锁屏策略守护项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

#![cfg(windows)]

pub mod elevation;
pub mod notify;
pub mod service;
pub mod store;
