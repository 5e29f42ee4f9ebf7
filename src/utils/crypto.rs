use base64::{engine::general_purpose, Engine as _};
use rand::rngs::OsRng;
use rand::RngCore;
use x25519_dalek::{PublicKey, StaticSecret};

use super::error::{InstallError, Result};

/// 每个 short ID 的字节数 (hex 编码后为 8 / 16 / 4 个字符)
const SHORT_ID_BYTES: [usize; 3] = [4, 8, 2];

/// Reality 允许的 short ID 最大 hex 长度
pub const SHORT_ID_MAX_HEX: usize = 16;

/// X25519 密钥对 (Xray 格式: Base64 URL-safe, 无填充)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPair {
    pub private_key: String,
    pub public_key: String,
}

/// 本地生成 X25519 密钥对
pub fn generate_x25519_keypair() -> KeyPair {
    let secret = StaticSecret::random_from_rng(OsRng);
    let public_key = PublicKey::from(&secret);

    KeyPair {
        private_key: general_purpose::URL_SAFE_NO_PAD.encode(secret.to_bytes()),
        public_key: general_purpose::URL_SAFE_NO_PAD.encode(public_key.as_bytes()),
    }
}

/// 解码 Xray 格式的 32 字节密钥 (容忍尾部 `=` 填充)
pub fn decode_key(s: &str) -> Result<[u8; 32]> {
    let bytes = general_purpose::URL_SAFE_NO_PAD
        .decode(s.trim_end_matches('='))
        .map_err(|e| InstallError::KeyGeneration(format!("密钥不是合法的 base64url: {}", e)))?;

    bytes
        .try_into()
        .map_err(|v: Vec<u8>| InstallError::KeyGeneration(format!("密钥长度应为 32 字节, 实际 {}", v.len())))
}

/// 由私钥推导公钥
pub fn derive_public_key(private_key: &str) -> Result<String> {
    let secret = StaticSecret::from(decode_key(private_key)?);
    let public_key = PublicKey::from(&secret);
    Ok(general_purpose::URL_SAFE_NO_PAD.encode(public_key.as_bytes()))
}

/// 校验公钥确实由私钥推导而来
pub fn verify_keypair(pair: &KeyPair) -> Result<()> {
    let expected = decode_key(&pair.public_key)?;
    let derived = derive_public_key(&pair.private_key)?;

    if general_purpose::URL_SAFE_NO_PAD.encode(expected) != derived {
        return Err(InstallError::KeyGeneration(
            "公钥与私钥不匹配".to_string(),
        ));
    }
    Ok(())
}

/// 生成 `count` 个随机 short ID (1..=3)
pub fn generate_short_ids(count: usize) -> Vec<String> {
    let count = count.clamp(1, SHORT_ID_BYTES.len());
    SHORT_ID_BYTES[..count]
        .iter()
        .map(|&len| {
            let mut buf = vec![0u8; len];
            OsRng.fill_bytes(&mut buf);
            hex::encode(buf)
        })
        .collect()
}

/// short ID 形状检查: 小写或大写 hex, 长度为 4 的倍数且不超过 16
pub fn is_valid_short_id(id: &str) -> bool {
    id.len() <= SHORT_ID_MAX_HEX
        && id.len() % 4 == 0
        && id.chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_keypair_verifies() {
        let pair = generate_x25519_keypair();
        assert_eq!(pair.private_key.len(), 43);
        assert_eq!(pair.public_key.len(), 43);
        assert!(verify_keypair(&pair).is_ok());
    }

    #[test]
    fn test_mismatched_keypair() {
        let a = generate_x25519_keypair();
        let b = generate_x25519_keypair();
        let mixed = KeyPair {
            private_key: a.private_key,
            public_key: b.public_key,
        };
        assert!(verify_keypair(&mixed).is_err());
    }

    #[test]
    fn test_decode_key_rejects_short_input() {
        assert!(decode_key("abcd").is_err());
        assert!(decode_key("not base64 !!").is_err());
    }

    #[test]
    fn test_short_ids_shape() {
        for count in 1..=3 {
            let ids = generate_short_ids(count);
            assert_eq!(ids.len(), count);
            assert!(ids.iter().all(|id| is_valid_short_id(id)));
        }
        assert_eq!(generate_short_ids(0).len(), 1);
        assert_eq!(generate_short_ids(9).len(), 3);
    }

    #[test]
    fn test_short_id_validation() {
        assert!(is_valid_short_id(""));
        assert!(is_valid_short_id("ab12"));
        assert!(is_valid_short_id("0123456789abcdef"));
        assert!(!is_valid_short_id("abc"));
        assert!(!is_valid_short_id("zz12"));
        assert!(!is_valid_short_id("0123456789abcdef0123"));
    }
}
