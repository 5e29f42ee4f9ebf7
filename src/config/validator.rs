use uuid::Uuid;

use super::{Config, Inbound, Protocol, RealitySettings};
use crate::utils::crypto::is_valid_short_id;
use crate::utils::error::{InstallError, Result};

/// Reality 最多接受的 short ID 个数
const MAX_SHORT_IDS: usize = 3;

fn invalid(msg: String) -> InstallError {
    InstallError::ConfigWrite(msg)
}

pub struct Validator;

impl Validator {
    /// 验证配置的有效性
    pub fn validate(config: &Config) -> Result<()> {
        // 验证入站配置
        let vless_count = config
            .inbounds
            .iter()
            .filter(|i| i.protocol == Protocol::Vless)
            .count();
        if vless_count == 0 {
            return Err(invalid("至少需要一个 VLESS 入站配置".to_string()));
        }

        for (idx, inbound) in config.inbounds.iter().enumerate() {
            Self::validate_inbound(inbound, idx)?;
        }

        // 验证出站配置
        if config.outbounds.is_empty() {
            return Err(invalid("至少需要一个出站配置".to_string()));
        }

        // 路由规则引用的出站必须存在
        for rule in &config.routing.rules {
            let known = config.outbounds.iter().any(|o| o.tag == rule.outbound_tag)
                || config.api.as_ref().is_some_and(|api| api.tag == rule.outbound_tag);
            if !known {
                return Err(invalid(format!(
                    "路由规则引用了不存在的出站: {}",
                    rule.outbound_tag
                )));
            }
        }

        Ok(())
    }

    fn validate_inbound(inbound: &Inbound, idx: usize) -> Result<()> {
        // 验证端口
        if inbound.port == 0 {
            return Err(invalid(format!("入站 {} 的端口不能为 0", idx)));
        }

        if inbound.protocol != Protocol::Vless {
            return Ok(());
        }

        if inbound.settings.clients.is_empty() {
            return Err(invalid(format!("入站 {} 没有客户端", idx)));
        }

        // 验证客户端 UUID
        for (client_idx, client) in inbound.settings.clients.iter().enumerate() {
            if Uuid::parse_str(&client.id).is_err() {
                return Err(invalid(format!(
                    "入站 {} 的客户端 {} UUID 格式无效: {}",
                    idx, client_idx, client.id
                )));
            }
        }

        // 验证 Reality 设置
        match inbound
            .stream_settings
            .as_ref()
            .and_then(|s| s.reality_settings.as_ref())
        {
            Some(reality) => Self::validate_reality_settings(reality, idx),
            None => Err(invalid(format!("入站 {} 缺少 Reality 设置", idx))),
        }
    }

    fn validate_reality_settings(reality: &RealitySettings, inbound_idx: usize) -> Result<()> {
        // 验证目标地址
        if reality.dest.is_empty() {
            return Err(invalid(format!("入站 {} 的 Reality dest 不能为空", inbound_idx)));
        }

        // 验证服务器名称
        if reality.server_names.is_empty() || reality.server_names.iter().any(|n| n.is_empty()) {
            return Err(invalid(format!(
                "入站 {} 的 Reality serverNames 不能为空",
                inbound_idx
            )));
        }

        // 验证私钥
        if reality.private_key.is_empty() {
            return Err(invalid(format!(
                "入站 {} 的 Reality privateKey 不能为空",
                inbound_idx
            )));
        }

        // 验证 short ID
        if reality.short_ids.is_empty() || reality.short_ids.len() > MAX_SHORT_IDS {
            return Err(invalid(format!(
                "入站 {} 的 Reality shortIds 数量应为 1-{}",
                inbound_idx, MAX_SHORT_IDS
            )));
        }
        if let Some(bad) = reality.short_ids.iter().find(|id| !is_valid_short_id(id)) {
            return Err(invalid(format!(
                "入站 {} 的 Reality shortId 无效: {:?}",
                inbound_idx, bad
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{OptimizationLevel, ProxyProfile};
    use crate::settings::Tuning;
    use crate::utils::crypto::KeyPair;

    fn config() -> Config {
        let profile = ProxyProfile {
            client_id: "b831381d-6324-4d53-ad4f-8cda48b30811".to_string(),
            listen_port: 443,
            sni_domain: "www.apple.com".to_string(),
            optimization_level: OptimizationLevel::Balanced,
            short_ids: vec!["0123456789abcdef".to_string()],
            key_pair: KeyPair {
                private_key: "test_key".to_string(),
                public_key: "test_pub".to_string(),
            },
        };
        Config::from_profile(&profile, &Tuning::default())
    }

    #[test]
    fn test_valid_config() {
        assert!(Validator::validate(&config()).is_ok());
    }

    #[test]
    fn test_invalid_uuid() {
        let mut config = config();
        config.inbounds[0].settings.clients[0].id = "invalid-uuid".to_string();
        assert!(Validator::validate(&config).is_err());
    }

    #[test]
    fn test_empty_private_key() {
        let mut config = config();
        if let Some(reality) = config.inbounds[0]
            .stream_settings
            .as_mut()
            .and_then(|s| s.reality_settings.as_mut())
        {
            reality.private_key.clear();
        }
        assert!(Validator::validate(&config).is_err());
    }

    #[test]
    fn test_bad_short_ids() {
        let mut config = config();
        let reality = config.inbounds[0]
            .stream_settings
            .as_mut()
            .and_then(|s| s.reality_settings.as_mut())
            .unwrap();
        reality.short_ids = vec!["abc".to_string()];
        assert!(Validator::validate(&config).is_err());

        let mut config = self::config();
        let reality = config.inbounds[0]
            .stream_settings
            .as_mut()
            .and_then(|s| s.reality_settings.as_mut())
            .unwrap();
        reality.short_ids = vec!["".to_string(); 4];
        assert!(Validator::validate(&config).is_err());
    }

    #[test]
    fn test_unknown_outbound_tag() {
        let mut config = config();
        config.routing.rules[0].outbound_tag = "nowhere".to_string();
        assert!(Validator::validate(&config).is_err());
    }
}
