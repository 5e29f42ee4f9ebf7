//! 安装流水线
//!
//! 各阶段按顺序执行, 任何阶段失败立即返回, 不做自动重试。

use std::time::Duration;

use tracing::{info, warn};

use crate::collector::{Answers, ParameterCollector, Prompter};
use crate::config::Config;
use crate::keygen::KeyGenerator;
use crate::profile::ProxyProfile;
use crate::report;
use crate::settings::Settings;
use crate::system::{
    check_privilege, firewall, DependencyInstaller, HostResources, ServiceInstaller, SysctlProfile,
};
use crate::utils::command::CommandRunner;
use crate::utils::error::Result;

/// 阶段开关
#[derive(Debug, Clone)]
pub struct Options {
    pub check_privilege: bool,
    pub skip_sysctl: bool,
    pub skip_deps: bool,
    pub skip_firewall: bool,
    pub answers: Answers,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            check_privilege: true,
            skip_sysctl: false,
            skip_deps: false,
            skip_firewall: false,
            answers: Answers::default(),
        }
    }
}

/// 安装结果
#[derive(Debug, Clone)]
pub struct InstallReport {
    pub profile: ProxyProfile,
    pub host: String,
    pub share_uri: String,
    pub summary: String,
}

pub struct Installer {
    settings: Settings,
    options: Options,
}

impl Installer {
    pub fn new(settings: Settings, options: Options) -> Self {
        Self { settings, options }
    }

    /// 运行完整流程
    pub async fn run<R: CommandRunner, P: Prompter>(
        &self,
        runner: &R,
        prompter: &mut P,
    ) -> Result<InstallReport> {
        let settings = &self.settings;
        let paths = &settings.paths;

        // 1. 预检
        if self.options.check_privilege {
            check_privilege()?;
        }
        settings.defaults.validate()?;
        let resources = HostResources::detect();

        // 2. 依赖
        if self.options.skip_deps {
            DependencyInstaller::ensure_binary(&paths.xray_binary)?;
        } else {
            DependencyInstaller::new(&settings.defaults, &paths.xray_binary)
                .install(runner)
                .await?;
        }

        // 3. 密钥
        let key_pair = KeyGenerator::new(&paths.xray_binary)
            .generate(runner)
            .await?;

        // 4. 参数
        let profile = ParameterCollector::new(&settings.defaults, settings.tuning.short_id_count)
            .collect(prompter, &self.options.answers, key_pair)?;
        info!(
            "📋 端口 {}, SNI {}, 优化等级 {}",
            profile.listen_port, profile.sni_domain, profile.optimization_level
        );

        // 5. 内核调优 (等级决定缓冲倍数, 因此放在参数收集之后)
        if !self.options.skip_sysctl {
            SysctlProfile::for_host(&resources, profile.optimization_level)
                .apply(runner, &paths.sysctl)
                .await?;
        }

        // 6. 配置
        Config::from_profile(&profile, &settings.tuning).save(&paths.config)?;
        info!("📄 配置已写入 {}", paths.config.display());

        // 7. 防火墙
        if !self.options.skip_firewall {
            firewall::open_port(runner, profile.listen_port).await;
        }

        // 8. 服务
        ServiceInstaller::new(&settings.service, &paths.unit)
            .install(runner, &paths.xray_binary, &paths.config)
            .await?;

        // 9. 汇总
        let host = report::lookup_public_ip(
            &settings.report.ip_providers,
            Duration::from_secs(settings.report.lookup_timeout_secs),
        )
        .await
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| {
            warn!("无法获取公网 IP, 分享链接中使用占位符");
            report::UNKNOWN_HOST.to_string()
        });

        let label = settings
            .report
            .label
            .clone()
            .unwrap_or_else(|| report::default_label(&host));
        let share_uri = report::share_uri(&profile, &host, &label);
        let summary = report::render_summary(&profile, &host, &share_uri);
        report::save_summary(&paths.summary, &summary)?;
        info!("💾 连接信息已保存到 {}", paths.summary.display());

        Ok(InstallReport {
            profile,
            host,
            share_uri,
            summary,
        })
    }
}
