use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::profile::ProxyProfile;
use crate::settings::Tuning;
use crate::utils::error::{InstallError, Result};

mod validator;
pub use validator::Validator;

/// API 入站监听地址
const API_LISTEN: &str = "127.0.0.1";
const API_PORT: u16 = 10085;

/// Xray 服务端配置
///
/// 字段顺序即输出顺序, 相同输入总是得到逐字节相同的 JSON。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub log: LogConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api: Option<ApiConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<StatsConfig>,
    pub policy: PolicyConfig,
    pub inbounds: Vec<Inbound>,
    pub outbounds: Vec<Outbound>,
    #[serde(default)]
    pub routing: RoutingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    pub loglevel: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    pub tag: String,
    pub services: Vec<String>,
}

/// Xray 中 `"stats": {}` 没有字段
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StatsConfig {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    pub levels: BTreeMap<String, LevelPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<SystemPolicy>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelPolicy {
    /// 握手超时 (秒)
    pub handshake: u32,
    /// 空闲超时 (秒)
    pub conn_idle: u32,
    pub uplink_only: u32,
    pub downlink_only: u32,
    /// 每连接缓冲 (KB)
    pub buffer_size: u32,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub stats_user_uplink: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub stats_user_downlink: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemPolicy {
    pub stats_inbound_uplink: bool,
    pub stats_inbound_downlink: bool,
    pub stats_outbound_uplink: bool,
    pub stats_outbound_downlink: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inbound {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    pub listen: String,
    pub port: u16,
    pub protocol: Protocol,
    pub settings: InboundSettings,
    #[serde(rename = "streamSettings", skip_serializing_if = "Option::is_none")]
    pub stream_settings: Option<StreamSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sniffing: Option<SniffingConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Protocol {
    Vless,
    DokodemoDoor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundSettings {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clients: Vec<Client>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decryption: Option<String>,
    /// dokodemo-door 转发目标
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: String, // UUID
    #[serde(default)]
    pub flow: String,
}

/// 流量嗅探配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SniffingConfig {
    pub enabled: bool,
    #[serde(rename = "destOverride")]
    pub dest_override: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamSettings {
    pub network: Network,
    pub security: Security,
    #[serde(rename = "realitySettings", skip_serializing_if = "Option::is_none")]
    pub reality_settings: Option<RealitySettings>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Tcp,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Security {
    None,
    Reality,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealitySettings {
    #[serde(default)]
    pub show: bool,
    pub dest: String,
    #[serde(default)]
    pub xver: u8,
    #[serde(rename = "serverNames")]
    pub server_names: Vec<String>,
    #[serde(rename = "privateKey")]
    pub private_key: String,
    #[serde(rename = "shortIds")]
    pub short_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outbound {
    pub protocol: String,
    pub tag: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingConfig {
    #[serde(rename = "domainStrategy")]
    pub domain_strategy: String,
    #[serde(default)]
    pub rules: Vec<RoutingRule>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            domain_strategy: "IPIfNonMatch".to_string(),
            rules: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingRule {
    #[serde(rename = "type")]
    pub rule_type: String,
    #[serde(rename = "inboundTag", skip_serializing_if = "Option::is_none")]
    pub inbound_tag: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<Vec<String>>,
    #[serde(rename = "outboundTag")]
    pub outbound_tag: String,
}

impl RoutingRule {
    fn field(outbound_tag: &str) -> Self {
        Self {
            rule_type: "field".to_string(),
            inbound_tag: None,
            protocol: None,
            ip: None,
            outbound_tag: outbound_tag.to_string(),
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Config {
    /// 由安装参数构造配置
    pub fn from_profile(profile: &ProxyProfile, tuning: &Tuning) -> Self {
        let stats = tuning.enable_stats;

        let mut levels = BTreeMap::new();
        levels.insert(
            "0".to_string(),
            LevelPolicy {
                handshake: tuning.handshake,
                conn_idle: tuning.conn_idle,
                uplink_only: tuning.uplink_only,
                downlink_only: tuning.downlink_only,
                buffer_size: tuning.buffer_size_for(profile.optimization_level.as_u8()),
                stats_user_uplink: stats,
                stats_user_downlink: stats,
            },
        );

        let mut inbounds = vec![Inbound {
            tag: Some("vless-reality".to_string()),
            listen: "0.0.0.0".to_string(),
            port: profile.listen_port,
            protocol: Protocol::Vless,
            settings: InboundSettings {
                clients: vec![Client {
                    id: profile.client_id.clone(),
                    flow: profile.flow().to_string(),
                }],
                decryption: Some("none".to_string()),
                address: None,
            },
            stream_settings: Some(StreamSettings {
                network: Network::Tcp,
                security: Security::Reality,
                reality_settings: Some(RealitySettings {
                    show: false,
                    dest: profile.dest(),
                    xver: 0,
                    server_names: vec![profile.sni_domain.clone()],
                    private_key: profile.key_pair.private_key.clone(),
                    short_ids: profile.short_ids.clone(),
                }),
            }),
            sniffing: Some(SniffingConfig {
                enabled: true,
                dest_override: strings(&["http", "tls", "quic"]),
            }),
        }];

        let mut rules = Vec::new();

        if stats {
            inbounds.push(Inbound {
                tag: Some("api".to_string()),
                listen: API_LISTEN.to_string(),
                port: API_PORT,
                protocol: Protocol::DokodemoDoor,
                settings: InboundSettings {
                    clients: Vec::new(),
                    decryption: None,
                    address: Some(API_LISTEN.to_string()),
                },
                stream_settings: None,
                sniffing: None,
            });
            rules.push(RoutingRule {
                inbound_tag: Some(strings(&["api"])),
                ..RoutingRule::field("api")
            });
        }

        rules.push(RoutingRule {
            protocol: Some(strings(&["bittorrent"])),
            ..RoutingRule::field("block")
        });
        rules.push(RoutingRule {
            ip: Some(strings(&["geoip:private"])),
            ..RoutingRule::field("block")
        });

        Config {
            log: LogConfig {
                loglevel: tuning.log_level.clone(),
            },
            api: stats.then(|| ApiConfig {
                tag: "api".to_string(),
                services: strings(&["StatsService"]),
            }),
            stats: stats.then(StatsConfig::default),
            policy: PolicyConfig {
                levels,
                system: stats.then_some(SystemPolicy {
                    stats_inbound_uplink: true,
                    stats_inbound_downlink: true,
                    stats_outbound_uplink: true,
                    stats_outbound_downlink: true,
                }),
            },
            inbounds,
            outbounds: vec![
                Outbound {
                    protocol: "freedom".to_string(),
                    tag: "direct".to_string(),
                    settings: None,
                },
                Outbound {
                    protocol: "blackhole".to_string(),
                    tag: "block".to_string(),
                    settings: None,
                },
            ],
            routing: RoutingConfig {
                rules,
                ..RoutingConfig::default()
            },
        }
    }

    /// 序列化为带缩进的 JSON (末尾带换行)
    pub fn render(&self) -> Result<String> {
        let mut content = serde_json::to_string_pretty(self)?;
        content.push('\n');
        Ok(content)
    }

    /// 从文件加载配置
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;

        // 验证配置
        Validator::validate(&config)?;

        Ok(config)
    }

    /// 校验后保存到文件
    ///
    /// 先写同目录临时文件再 rename, 目标文件要么是旧内容要么是完整的新内容。
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        Validator::validate(self)?;
        let content = self.render()?;

        let write_err =
            |e: std::io::Error| InstallError::ConfigWrite(format!("{}: {}", path.display(), e));

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content).map_err(write_err)?;
        fs::rename(&tmp, path).map_err(write_err)?;

        if !path.is_file() {
            return Err(InstallError::ConfigWrite(format!(
                "写入后未找到配置文件: {}",
                path.display()
            )));
        }
        Ok(())
    }
}
