use std::path::Path;

use tokio::process::Command;
use tracing::debug;

/// 外部命令执行结果
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// stdout 与 stderr 合并 (按此顺序)
    pub fn combined(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

/// 外部命令执行接口
///
/// 所有与宿主机交互的阶段都通过它调用 systemctl / sysctl / 包管理器等,
/// 测试中替换为脚本化实现。
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// 执行命令并等待结束
    async fn run(&self, program: &str, args: &[&str]) -> std::io::Result<CommandOutput>;

    /// 命令是否存在于 PATH 中
    fn exists(&self, program: &str) -> bool;
}

/// 真实宿主机上的命令执行
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    async fn run(&self, program: &str, args: &[&str]) -> std::io::Result<CommandOutput> {
        debug!("执行: {} {}", program, args.join(" "));

        let output = Command::new(program).args(args).output().await?;

        Ok(CommandOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn exists(&self, program: &str) -> bool {
        if program.contains('/') {
            return Path::new(program).is_file();
        }
        std::env::var_os("PATH")
            .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(program).is_file()))
            .unwrap_or(false)
    }
}
