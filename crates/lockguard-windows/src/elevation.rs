//! 管理员权限检测。
//!
//! 作者：锁屏策略守护项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use anyhow::{bail, Result};
use windows::Win32::UI::Shell::IsUserAnAdmin;

/// 判断当前进程是否以管理员权限运行。
///
/// 安全注意：
/// - 该检查仅用于提前给出可读的错误，不能作为完整的安全边界。
pub fn is_running_as_admin() -> bool {
    unsafe { IsUserAnAdmin().as_bool() }
}

/// 需要管理员权限的操作（安装/卸载服务、写 HKLM）之前调用。
pub fn require_admin(action: &str) -> Result<()> {
    if !is_running_as_admin() {
        bail!("{action} 需要管理员权限，请以管理员身份运行");
    }
    Ok(())
}
