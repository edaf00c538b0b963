//! 策略值修正（把单个 DWORD 值恢复到管理员期望的基线）。
//!
//! 两种修正方式：
//! - [`EnforceMode::SetThenDelete`]（默认）：写入基线后删除该值，不留覆盖项（值不存在 = 系统默认）
//! - [`EnforceMode::SetOnly`]：只写入基线，值保持存在
//!
//! 并发：
//! - 定时器与变更回调可能同时调用 [`PolicyEnforcer::enforce`]；各注册表操作本身是原子的，
//!   且结果幂等，多次修正收敛到同一终态，因此不加锁
//!
//! 作者：锁屏策略守护项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::backend::PolicyStore;
use crate::error::StoreError;
use crate::target::WatchTarget;

/// 修正方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnforceMode {
    #[default]
    SetThenDelete,
    SetOnly,
}

/// 需要守护的策略值。
///
/// 字段说明：
/// - `key`：值所在的键
/// - `value_name`：DWORD 值名
/// - `baseline`：期望值
/// - `mode`：偏离时的修正方式
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyRule {
    pub key: WatchTarget,
    pub value_name: String,
    pub baseline: u32,
    pub mode: EnforceMode,
}

/// 一次修正的结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnforceOutcome {
    /// 值不存在或已等于基线，未写入。
    Compliant,
    /// 值偏离基线，已修正。
    Reset { previous: u32 },
    /// 读写失败，已记录日志，等待下一次触发重试。
    Failed,
}

/// 策略值执行器。
pub struct PolicyEnforcer<S: PolicyStore> {
    store: S,
    rule: PolicyRule,
}

impl<S: PolicyStore> PolicyEnforcer<S> {
    pub fn new(store: S, rule: PolicyRule) -> Self {
        Self { store, rule }
    }

    pub fn rule(&self) -> &PolicyRule {
        &self.rule
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// 检查并修正策略值（尽力而为，从不向上返回错误）。
    ///
    /// 返回值：
    /// - [`EnforceOutcome::Compliant`]：无需写入
    /// - [`EnforceOutcome::Reset`]：已修正（附带修正前的值）
    /// - [`EnforceOutcome::Failed`]：读写失败；失败已被吞掉并记录
    pub fn enforce(&self) -> EnforceOutcome {
        match self.try_enforce() {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(error = %err, "策略值修正失败，等待下次触发重试");
                EnforceOutcome::Failed
            }
        }
    }

    fn try_enforce(&self) -> Result<EnforceOutcome, StoreError> {
        let rule = &self.rule;
        let current = self.store.read_dword(&rule.key, &rule.value_name)?;
        let previous = match current {
            None => {
                debug!("策略值不存在，视为合规: {}", rule.value_name);
                return Ok(EnforceOutcome::Compliant);
            }
            Some(v) if v == rule.baseline => {
                debug!("策略值已等于基线: {} = {v}", rule.value_name);
                return Ok(EnforceOutcome::Compliant);
            }
            Some(v) => v,
        };

        self.store.write_dword(&rule.key, &rule.value_name, rule.baseline)?;
        if rule.mode == EnforceMode::SetThenDelete {
            self.store.delete_value(&rule.key, &rule.value_name)?;
        }
        info!(
            "已修正策略值: {}\\{} {} -> {} ({:?})",
            rule.key, rule.value_name, previous, rule.baseline, rule.mode
        );
        Ok(EnforceOutcome::Reset { previous })
    }
}
