use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::collector::{parse_domain, parse_port};
use crate::profile::OptimizationLevel;
use crate::utils::error::{InstallError, Result};

/// 安装器设置
///
/// 所有路径与数值调优参数都可以通过 TOML 文件覆盖, 缺省字段使用下面的默认值。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub paths: Paths,
    pub service: ServiceSettings,
    pub defaults: Defaults,
    pub tuning: Tuning,
    pub report: ReportSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Paths {
    /// Xray 二进制安装位置
    pub xray_binary: PathBuf,
    /// 渲染出的 config.json
    pub config: PathBuf,
    /// systemd unit 文件
    pub unit: PathBuf,
    /// sysctl 调优文件
    pub sysctl: PathBuf,
    /// 连接信息摘要
    pub summary: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            xray_binary: PathBuf::from("/usr/local/bin/xray"),
            config: PathBuf::from("/usr/local/etc/xray/config.json"),
            unit: PathBuf::from("/etc/systemd/system/xray.service"),
            sysctl: PathBuf::from("/etc/sysctl.d/99-xray-reality.conf"),
            summary: PathBuf::from("/usr/local/etc/xray/client-info.txt"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// systemd 服务名 (不含 .service)
    pub unit_name: String,
    /// 启动后等待多少秒再检查状态
    pub settle_secs: u64,
    /// 启动失败时展示的日志行数
    pub journal_lines: u32,
    /// 失败重启间隔 (秒)
    pub restart_sec: u32,
    pub limit_nofile: u64,
    pub limit_nproc: u64,
    /// 调度优先级, None 表示不设置
    pub nice: Option<i32>,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            unit_name: "xray".to_string(),
            settle_secs: 3,
            journal_lines: 20,
            restart_sec: 3,
            limit_nofile: 1_048_576,
            limit_nproc: 512_000,
            nice: Some(-10),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    pub port: u16,
    pub sni: String,
    pub level: u8,
    /// 上游 Xray 安装脚本
    pub install_script_url: String,
    /// 需要安装的系统包
    pub packages: Vec<String>,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            port: 443,
            sni: "www.microsoft.com".to_string(),
            level: 1,
            install_script_url:
                "https://github.com/XTLS/Xray-install/raw/main/install-release.sh".to_string(),
            packages: ["curl", "unzip", "ca-certificates", "openssl"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl Defaults {
    /// 默认值必须能通过与交互输入相同的校验
    pub fn validate(&self) -> Result<()> {
        let invalid = |e: InstallError| InstallError::Settings(format!("[defaults] {}", e));

        parse_port(&self.port.to_string()).map_err(invalid)?;
        parse_domain(&self.sni).map_err(invalid)?;
        self.level
            .to_string()
            .parse::<OptimizationLevel>()
            .map_err(invalid)?;
        Ok(())
    }
}

/// 配置渲染使用的数值参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    pub log_level: String,
    pub enable_stats: bool,
    pub short_id_count: usize,
    pub handshake: u32,
    pub conn_idle: u32,
    pub uplink_only: u32,
    pub downlink_only: u32,
    /// 按优化等级 1/2/3 选择的 bufferSize (KB)
    pub buffer_size_kb: Vec<u32>,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            log_level: "warning".to_string(),
            enable_stats: false,
            short_id_count: 2,
            handshake: 4,
            conn_idle: 300,
            uplink_only: 2,
            downlink_only: 5,
            buffer_size_kb: vec![512, 1024, 2048],
        }
    }
}

impl Tuning {
    /// 取对应等级的 bufferSize, 列表不足时使用最后一项
    pub fn buffer_size_for(&self, level: u8) -> u32 {
        let idx = usize::from(level.saturating_sub(1));
        self.buffer_size_kb
            .get(idx)
            .or_else(|| self.buffer_size_kb.last())
            .copied()
            .unwrap_or(512)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportSettings {
    /// 公网 IP 查询地址, 按顺序尝试
    pub ip_providers: Vec<String>,
    pub lookup_timeout_secs: u64,
    /// 分享链接的标签, None 时为 `Reality-<host>`
    pub label: Option<String>,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            ip_providers: vec![
                "http://api.ipify.org".to_string(),
                "http://ifconfig.me/ip".to_string(),
            ],
            lookup_timeout_secs: 5,
            label: None,
        }
    }
}

impl Settings {
    /// 从 TOML 文件加载, 未指定路径时使用默认设置
    pub fn load<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let content = fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let settings: Self =
            toml::from_str(content).map_err(|e| InstallError::Settings(e.to_string()))?;
        settings.defaults.validate()?;
        Ok(settings)
    }
}
