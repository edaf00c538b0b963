//! 变更通知过滤器（对应 `REG_NOTIFY_CHANGE_*` 位）。
//!
//! 作者：锁屏策略守护项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use serde::{Deserialize, Serialize};

bitflags::bitflags! {
    /// 需要观察的变更类别。
    ///
    /// 位值与 Win32 `REG_NOTIFY_CHANGE_*` 常量一致，可直接传给系统调用。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct NotifyFilter: u32 {
        /// 子键新增/删除。
        const NAME = 0x0000_0001;
        /// 键属性变化。
        const ATTRIBUTES = 0x0000_0002;
        /// 值新增/删除/修改。
        const LAST_SET = 0x0000_0004;
        /// 安全描述符变化。
        const SECURITY = 0x0000_0008;
    }
}

impl Default for NotifyFilter {
    /// 默认观察全部类别。
    fn default() -> Self {
        Self::all()
    }
}
