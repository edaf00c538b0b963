//! 监视目标：根键范围 + 子键路径。
//!
//! 支持的根键别名（不区分大小写）：
//! - `HKLM` / `HKEY_LOCAL_MACHINE`
//! - `HKCU` / `HKEY_CURRENT_USER`
//! - `HKU` / `HKEY_USERS`
//! - `HKCR` / `HKEY_CLASSES_ROOT`
//! - `HKCC` / `HKEY_CURRENT_CONFIG`
//! - `HKDD` / `HKEY_DYN_DATA`
//! - `HKPD` / `HKEY_PERFORMANCE_DATA`
//!
//! 作者：锁屏策略守护项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::WatchError;

/// 注册表根键范围（封闭枚举）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RootScope {
    LocalMachine,
    CurrentUser,
    Users,
    ClassesRoot,
    CurrentConfig,
    DynData,
    PerformanceData,
}

/// 别名表：(短名, 长名, 根键)。
const ALIASES: &[(&str, &str, RootScope)] = &[
    ("HKLM", "HKEY_LOCAL_MACHINE", RootScope::LocalMachine),
    ("HKCU", "HKEY_CURRENT_USER", RootScope::CurrentUser),
    ("HKU", "HKEY_USERS", RootScope::Users),
    ("HKCR", "HKEY_CLASSES_ROOT", RootScope::ClassesRoot),
    ("HKCC", "HKEY_CURRENT_CONFIG", RootScope::CurrentConfig),
    ("HKDD", "HKEY_DYN_DATA", RootScope::DynData),
    ("HKPD", "HKEY_PERFORMANCE_DATA", RootScope::PerformanceData),
];

impl RootScope {
    /// 全部根键（与别名表顺序一致）。
    pub const ALL: [RootScope; 7] = [
        RootScope::LocalMachine,
        RootScope::CurrentUser,
        RootScope::Users,
        RootScope::ClassesRoot,
        RootScope::CurrentConfig,
        RootScope::DynData,
        RootScope::PerformanceData,
    ];

    /// 按别名解析根键。
    ///
    /// 返回值：
    /// - 识别的短名/长名（ASCII 不区分大小写）：`Some(scope)`
    /// - 其他：`None`
    pub fn from_alias(alias: &str) -> Option<Self> {
        ALIASES
            .iter()
            .find(|(short, long, _)| alias.eq_ignore_ascii_case(short) || alias.eq_ignore_ascii_case(long))
            .map(|(_, _, scope)| *scope)
    }

    /// 规范名（长名，例如 `HKEY_LOCAL_MACHINE`）。
    pub fn canonical_name(self) -> &'static str {
        self.names().1
    }

    /// 短名（例如 `HKLM`）。
    pub fn short_name(self) -> &'static str {
        self.names().0
    }

    fn names(self) -> (&'static str, &'static str) {
        ALIASES
            .iter()
            .find(|(_, _, scope)| *scope == self)
            .map(|(short, long, _)| (*short, *long))
            .unwrap_or(("?", "?"))
    }
}

impl fmt::Display for RootScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_name())
    }
}

/// 监视目标（构造后不可变）。
///
/// 字段说明：
/// - `scope`：根键范围
/// - `sub_path`：根键下的子键路径（不含首尾 `\`，非空）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WatchTarget {
    scope: RootScope,
    sub_path: String,
}

impl WatchTarget {
    /// 由根键与子键路径构造。
    ///
    /// 异常处理：
    /// - 子键路径为空（或仅包含 `\`/空白）时返回 [`WatchError::InvalidArgument`]
    pub fn new(scope: RootScope, sub_path: impl AsRef<str>) -> Result<Self, WatchError> {
        let trimmed = sub_path.as_ref().trim().trim_matches('\\');
        if trimmed.is_empty() {
            return Err(WatchError::InvalidArgument("子键路径不能为空".to_string()));
        }
        Ok(Self {
            scope,
            sub_path: trimmed.to_string(),
        })
    }

    /// 内置常量路径（调用方保证非空且不含首尾 `\`）。
    pub(crate) fn builtin(scope: RootScope, sub_path: &'static str) -> Self {
        Self {
            scope,
            sub_path: sub_path.to_string(),
        }
    }

    /// 解析完整路径（例如 `HKLM\SOFTWARE\Policies`）。
    ///
    /// 异常处理：
    /// - 路径为空、缺少 `\` 分隔符、根键别名无法识别、子键路径为空时返回
    ///   [`WatchError::InvalidArgument`]
    pub fn parse(full: &str) -> Result<Self, WatchError> {
        let full = full.trim();
        if full.is_empty() {
            return Err(WatchError::InvalidArgument("注册表路径不能为空".to_string()));
        }
        let (alias, rest) = full
            .split_once('\\')
            .ok_or_else(|| WatchError::InvalidArgument(format!("注册表路径缺少子键: {full}")))?;
        let scope = RootScope::from_alias(alias)
            .ok_or_else(|| WatchError::InvalidArgument(format!("无法识别的根键: {alias}")))?;
        Self::new(scope, rest)
    }

    pub fn scope(&self) -> RootScope {
        self.scope
    }

    pub fn sub_path(&self) -> &str {
        &self.sub_path
    }

    /// 判断 `other` 是否位于本目标子树内（含自身，不区分大小写）。
    pub fn contains(&self, other: &WatchTarget) -> bool {
        if self.scope != other.scope {
            return false;
        }
        let own = self.sub_path.to_ascii_lowercase();
        let theirs = other.sub_path.to_ascii_lowercase();
        theirs == own || theirs.starts_with(&format!("{own}\\"))
    }
}

impl fmt::Display for WatchTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\\{}", self.scope.canonical_name(), self.sub_path)
    }
}

impl FromStr for WatchTarget {
    type Err = WatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for WatchTarget {
    type Error = WatchError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<WatchTarget> for String {
    fn from(value: WatchTarget) -> Self {
        value.to_string()
    }
}
