//! 命令行参数。
//!
//! 作者：锁屏策略守护项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use std::path::PathBuf;

use clap::Parser;

/// 运行参数。
///
/// 说明：
/// - 不带任何指令：作为 Windows 服务由服务控制管理器启动
/// - `--install` / `--uninstall`：安装/卸载服务（需要管理员权限，二者互斥）
/// - `--run-console`：以控制台模式前台运行，回车后停止（用于开发调试）
/// - `--enforce-once`：只执行一次修正后退出
/// - `--dry-run`：使用内存注册表（不触碰系统注册表，任意平台可用）
/// - `--config`：服务配置 JSON 文件
#[derive(Debug, Parser)]
#[command(name = "lockguard-agent", version)]
pub struct Args {
    #[arg(long, default_value_t = false, conflicts_with_all = ["uninstall", "run_console", "enforce_once", "dry_run"])]
    pub install: bool,

    #[arg(long, default_value_t = false, conflicts_with_all = ["run_console", "enforce_once", "dry_run"])]
    pub uninstall: bool,

    #[arg(long, default_value_t = false, conflicts_with = "enforce_once")]
    pub run_console: bool,

    #[arg(long, default_value_t = false)]
    pub enforce_once: bool,

    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// 解析后的运行指令。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    Install,
    Uninstall,
    RunConsole,
    EnforceOnce,
    /// 交给服务调度器。
    Service,
}

impl Args {
    pub fn directive(&self) -> Directive {
        if self.install {
            Directive::Install
        } else if self.uninstall {
            Directive::Uninstall
        } else if self.enforce_once {
            Directive::EnforceOnce
        } else if self.run_console || self.dry_run {
            Directive::RunConsole
        } else {
            Directive::Service
        }
    }
}

/// 交互式启动且未给出指令时输出的提示。
pub const USAGE_HINT: &str =
    "lockguard-agent 需由服务控制管理器启动；手动运行请使用 --install | --uninstall | --run-console | --enforce-once [--dry-run] [--config <file>]";

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args, clap::Error> {
        Args::try_parse_from(std::iter::once("lockguard-agent").chain(args.iter().copied()))
    }

    #[test]
    /// 不带参数时进入服务模式。
    fn no_arguments_means_service() {
        let args = parse(&[]).unwrap();
        assert_eq!(args.directive(), Directive::Service);
        assert!(args.config.is_none());
    }

    #[test]
    /// 安装与卸载互斥。
    fn install_and_uninstall_conflict() {
        let err = parse(&["--install", "--uninstall"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    /// 安装不能与 dry-run 组合。
    fn install_rejects_dry_run() {
        assert!(parse(&["--install", "--dry-run"]).is_err());
    }

    #[test]
    /// 控制台与单次修正互斥。
    fn run_console_conflicts_with_enforce_once() {
        assert!(parse(&["--run-console", "--enforce-once"]).is_err());
    }

    #[test]
    /// 单独的 dry-run 等价于控制台模式。
    fn dry_run_alone_runs_console() {
        let args = parse(&["--dry-run"]).unwrap();
        assert_eq!(args.directive(), Directive::RunConsole);
    }

    #[test]
    /// dry-run 可与单次修正组合，配置路径被保留。
    fn enforce_once_with_dry_run_and_config() {
        let args = parse(&["--enforce-once", "--dry-run", "--config", "guard.json"]).unwrap();
        assert_eq!(args.directive(), Directive::EnforceOnce);
        assert!(args.dry_run);
        assert_eq!(args.config.as_deref(), Some(std::path::Path::new("guard.json")));
    }

    #[test]
    fn install_forwards_config() {
        let args = parse(&["--install", "--config", "C:\\guard.json"]).unwrap();
        assert_eq!(args.directive(), Directive::Install);
        assert!(args.config.is_some());
    }
}
