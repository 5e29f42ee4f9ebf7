use std::fmt;
use std::str::FromStr;

use crate::utils::crypto::KeyPair;
use crate::utils::error::InstallError;

/// XTLS Vision 流控标识
pub const VISION_FLOW: &str = "xtls-rprx-vision";

/// 优化等级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OptimizationLevel {
    /// 均衡 (vision 流控)
    #[default]
    Balanced = 1,
    /// 性能 (vision 流控, 更大缓冲)
    Performance = 2,
    /// 吞吐 (无流控, 纯 TCP)
    Throughput = 3,
}

impl OptimizationLevel {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Balanced),
            2 => Some(Self::Performance),
            3 => Some(Self::Throughput),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// 等级 1/2 使用 vision, 等级 3 不使用流控
    pub fn flow(self) -> &'static str {
        match self {
            Self::Balanced | Self::Performance => VISION_FLOW,
            Self::Throughput => "",
        }
    }
}

impl FromStr for OptimizationLevel {
    type Err = InstallError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u8>()
            .ok()
            .and_then(Self::from_u8)
            .ok_or_else(|| InstallError::InvalidParameter(format!("优化等级必须为 1/2/3: {}", s)))
    }
}

impl fmt::Display for OptimizationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Balanced => "均衡",
            Self::Performance => "性能",
            Self::Throughput => "吞吐",
        };
        write!(f, "{} ({})", self.as_u8(), name)
    }
}

/// 一次安装所需的全部参数
///
/// 由参数收集阶段构造一次, 之后只读地传递给各阶段。
/// 随机字段 (UUID / short ID) 在构造时生成并固定。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyProfile {
    pub client_id: String,
    pub listen_port: u16,
    pub sni_domain: String,
    pub optimization_level: OptimizationLevel,
    pub short_ids: Vec<String>,
    pub key_pair: KeyPair,
}

impl ProxyProfile {
    pub fn flow(&self) -> &'static str {
        self.optimization_level.flow()
    }

    /// Reality 回落目标, 固定使用 443
    pub fn dest(&self) -> String {
        format!("{}:443", self.sni_domain)
    }

    /// 分享链接使用的 short ID: 第一个非空项
    pub fn share_short_id(&self) -> &str {
        self.short_ids
            .iter()
            .find(|id| !id.is_empty())
            .map(String::as_str)
            .unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_flow_mapping() {
        assert_eq!(OptimizationLevel::Balanced.flow(), VISION_FLOW);
        assert_eq!(OptimizationLevel::Performance.flow(), VISION_FLOW);
        assert_eq!(OptimizationLevel::Throughput.flow(), "");
    }

    #[test]
    fn test_level_parse() {
        assert_eq!("2".parse::<OptimizationLevel>().unwrap(), OptimizationLevel::Performance);
        assert_eq!(" 3 ".parse::<OptimizationLevel>().unwrap(), OptimizationLevel::Throughput);
        assert!("4".parse::<OptimizationLevel>().is_err());
        assert!("x".parse::<OptimizationLevel>().is_err());
        assert_eq!(OptimizationLevel::default(), OptimizationLevel::Balanced);
    }

    #[test]
    fn test_share_short_id_skips_empty() {
        let profile = ProxyProfile {
            client_id: "id".to_string(),
            listen_port: 443,
            sni_domain: "example.com".to_string(),
            optimization_level: OptimizationLevel::Balanced,
            short_ids: vec!["".to_string(), "ab12".to_string()],
            key_pair: KeyPair {
                private_key: "priv".to_string(),
                public_key: "pub".to_string(),
            },
        };
        assert_eq!(profile.share_short_id(), "ab12");
        assert_eq!(profile.dest(), "example.com:443");
    }
}
