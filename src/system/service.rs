use std::fs;
use std::path::Path;
use std::time::Duration;

use tracing::{info, warn};

use crate::settings::ServiceSettings;
use crate::utils::command::CommandRunner;
use crate::utils::error::{InstallError, Result};

/// 生成 systemd unit
pub fn render_unit(binary: &Path, config: &Path, settings: &ServiceSettings) -> String {
    let nice = settings
        .nice
        .map(|n| format!("Nice={}\n", n))
        .unwrap_or_default();

    format!(
        "[Unit]
Description=Xray Service (VLESS+Reality)
Documentation=https://github.com/xtls
After=network-online.target nss-lookup.target
Wants=network-online.target

[Service]
Type=simple
User=root
CapabilityBoundingSet=CAP_NET_ADMIN CAP_NET_BIND_SERVICE
AmbientCapabilities=CAP_NET_ADMIN CAP_NET_BIND_SERVICE
NoNewPrivileges=true
ExecStart={binary} run -config {config}
Restart=on-failure
RestartSec={restart}s
LimitNOFILE={nofile}
LimitNPROC={nproc}
{nice}
[Install]
WantedBy=multi-user.target
",
        binary = binary.display(),
        config = config.display(),
        restart = settings.restart_sec,
        nofile = settings.limit_nofile,
        nproc = settings.limit_nproc,
        nice = nice,
    )
}

/// systemd 服务安装与启动
pub struct ServiceInstaller<'a> {
    settings: &'a ServiceSettings,
    unit_path: &'a Path,
}

impl<'a> ServiceInstaller<'a> {
    pub fn new(settings: &'a ServiceSettings, unit_path: &'a Path) -> Self {
        Self {
            settings,
            unit_path,
        }
    }

    fn unit(&self) -> String {
        format!("{}.service", self.settings.unit_name)
    }

    /// 写入 unit 并 reload / enable / restart, 等待后确认 active
    pub async fn install<R: CommandRunner>(
        &self,
        runner: &R,
        binary: &Path,
        config: &Path,
    ) -> Result<()> {
        if let Some(parent) = self.unit_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(self.unit_path, render_unit(binary, config, self.settings))?;
        info!("📝 systemd unit 已写入 {}", self.unit_path.display());

        let unit = self.unit();
        for args in [
            vec!["daemon-reload"],
            vec!["enable", unit.as_str()],
            vec!["restart", unit.as_str()],
        ] {
            match runner.run("systemctl", &args).await {
                Ok(out) if out.success => {}
                Ok(out) => warn!("systemctl {} 失败: {}", args.join(" "), out.stderr.trim()),
                Err(e) => warn!("无法执行 systemctl: {}", e),
            }
        }

        tokio::time::sleep(Duration::from_secs(self.settings.settle_secs)).await;
        self.ensure_active(runner).await
    }

    /// 服务未处于 active 时返回 ServiceStart 错误, 附带最近的 journal
    pub async fn ensure_active<R: CommandRunner>(&self, runner: &R) -> Result<()> {
        let unit = self.unit();
        let active = runner
            .run("systemctl", &["is-active", unit.as_str()])
            .await
            .map(|out| out.success && out.stdout.trim() == "active")
            .unwrap_or(false);

        if active {
            info!("✅ {} 运行中", unit);
            return Ok(());
        }

        let lines = self.settings.journal_lines.to_string();
        let journal = runner
            .run("journalctl", &["-u", unit.as_str(), "-n", lines.as_str(), "--no-pager"])
            .await
            .map(|out| out.combined().trim().to_string())
            .unwrap_or_else(|e| format!("(无法读取 journal: {})", e));

        Err(InstallError::ServiceStart { unit, journal })
    }
}
