use std::path::{Path, PathBuf};

use tracing::info;

use crate::settings::Defaults;
use crate::utils::command::CommandRunner;
use crate::utils::error::{InstallError, Result};

/// 支持的包管理器
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    Apt,
    Dnf,
    Yum,
}

impl PackageManager {
    /// 按 apt-get / dnf / yum 的顺序探测
    pub fn detect<R: CommandRunner>(runner: &R) -> Option<Self> {
        [
            ("apt-get", Self::Apt),
            ("dnf", Self::Dnf),
            ("yum", Self::Yum),
        ]
        .into_iter()
        .find(|(program, _)| runner.exists(program))
        .map(|(_, pm)| pm)
    }

    /// 安装所需的命令序列, 每项为 (program, args)
    pub fn commands(self, packages: &[String]) -> Vec<(String, Vec<String>)> {
        let with = |program: &str, prefix: &[&str]| {
            let mut args: Vec<String> = prefix.iter().map(|s| s.to_string()).collect();
            args.extend(packages.iter().cloned());
            (program.to_string(), args)
        };

        match self {
            Self::Apt => vec![
                (
                    "env".to_string(),
                    ["DEBIAN_FRONTEND=noninteractive", "apt-get", "update", "-y"]
                        .iter()
                        .map(|s| s.to_string())
                        .collect(),
                ),
                with("env", &["DEBIAN_FRONTEND=noninteractive", "apt-get", "install", "-y"]),
            ],
            Self::Dnf => vec![with("dnf", &["install", "-y"])],
            Self::Yum => vec![with("yum", &["install", "-y"])],
        }
    }
}

/// 系统包与 Xray 二进制安装
pub struct DependencyInstaller<'a> {
    defaults: &'a Defaults,
    binary: PathBuf,
}

impl<'a> DependencyInstaller<'a> {
    pub fn new<P: AsRef<Path>>(defaults: &'a Defaults, binary: P) -> Self {
        Self {
            defaults,
            binary: binary.as_ref().to_path_buf(),
        }
    }

    pub async fn install<R: CommandRunner>(&self, runner: &R) -> Result<()> {
        self.install_packages(runner).await?;
        self.install_binary(runner).await
    }

    /// 安装系统包
    pub async fn install_packages<R: CommandRunner>(&self, runner: &R) -> Result<()> {
        let pm = PackageManager::detect(runner).ok_or_else(|| {
            InstallError::DependencyInstall("未找到支持的包管理器 (apt-get/dnf/yum)".to_string())
        })?;
        info!("📦 使用 {:?} 安装: {}", pm, self.defaults.packages.join(" "));

        for (program, args) in pm.commands(&self.defaults.packages) {
            let args: Vec<&str> = args.iter().map(String::as_str).collect();
            let out = runner
                .run(&program, &args)
                .await
                .map_err(|e| InstallError::DependencyInstall(format!("{}: {}", program, e)))?;

            if !out.success {
                return Err(InstallError::DependencyInstall(format!(
                    "{} {} 退出码 {:?}: {}",
                    program,
                    args.join(" "),
                    out.code,
                    out.stderr.trim()
                )));
            }
        }
        Ok(())
    }

    /// 运行上游安装脚本, 并确认二进制已就位
    pub async fn install_binary<R: CommandRunner>(&self, runner: &R) -> Result<()> {
        info!("⬇️  安装 Xray-core: {}", self.defaults.install_script_url);
        let script = format!(
            "bash -c \"$(curl -fsSL {})\" @ install",
            self.defaults.install_script_url
        );

        let out = runner
            .run("bash", &["-c", script.as_str()])
            .await
            .map_err(|e| InstallError::BinaryInstall(format!("无法运行安装脚本: {}", e)))?;

        if !out.success {
            return Err(InstallError::BinaryInstall(format!(
                "安装脚本失败 (退出码 {:?}): {}",
                out.code,
                out.stderr.trim()
            )));
        }

        Self::ensure_binary(&self.binary)
    }

    /// 二进制必须存在
    pub fn ensure_binary(binary: &Path) -> Result<()> {
        if !binary.is_file() {
            return Err(InstallError::BinaryInstall(format!(
                "安装后未找到 {}",
                binary.display()
            )));
        }
        info!("✅ Xray 已安装: {}", binary.display());
        Ok(())
    }
}
