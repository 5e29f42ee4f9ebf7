//! Reality 密钥对生成
//!
//! 调用 `xray x25519` 并从其输出中解析私钥 / 公钥。不同版本的 Xray 输出格式不同,
//! 因此按顺序尝试三种解析策略, 第一个得到完整密钥对的策略胜出。

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::utils::command::CommandRunner;
use crate::utils::crypto::{verify_keypair, KeyPair};
use crate::utils::error::{InstallError, Result};

/// 策略 (c) 中视为密钥的最短 token 长度
pub const MIN_KEY_TOKEN_LEN: usize = 40;

type Strategy = fn(&str) -> Option<KeyPair>;

/// 按顺序尝试的解析策略
const STRATEGIES: [(&str, Strategy); 3] = [
    ("labelled-lines", parse_labelled_lines),
    ("label-pattern", parse_label_pattern),
    ("long-tokens", parse_long_tokens),
];

fn is_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn pair(private_key: String, public_key: String) -> Option<KeyPair> {
    if private_key.is_empty() || public_key.is_empty() {
        return None;
    }
    Some(KeyPair {
        private_key,
        public_key,
    })
}

/// 行尾 token, 以 `:` 结尾 (只有标签没有值) 时视为缺失
fn last_token(line: &str) -> Option<String> {
    line.split_whitespace()
        .last()
        .filter(|t| !t.ends_with(':'))
        .map(str::to_string)
}

/// 策略 (a): 含 "private" 的行与含 "public" (或新版的 "password") 的行, 各取最后一个 token
pub fn parse_labelled_lines(output: &str) -> Option<KeyPair> {
    let mut private_key = None;
    let mut public_key = None;

    for line in output.lines() {
        let lower = line.to_ascii_lowercase();
        if lower.contains("private") {
            if private_key.is_none() {
                private_key = last_token(line);
            }
        } else if (lower.contains("public") || lower.contains("password")) && public_key.is_none() {
            public_key = last_token(line);
        }
    }

    pair(private_key?, public_key?)
}

/// 在 `line` 中找到 `label` (及随后的 `key`, 如需要) 之后的第一个 base64url token
fn token_after_label(line: &str, label: &str, needs_key: bool) -> Option<String> {
    let lower = line.to_ascii_lowercase();
    let mut pos = lower.find(label)? + label.len();
    if needs_key {
        pos += lower[pos..].find("key")? + "key".len();
    }

    let rest = line[pos..].trim_start_matches(|c: char| !is_key_char(c));
    let end = rest.find(|c: char| !is_key_char(c)).unwrap_or(rest.len());
    let token = &rest[..end];
    let padding = rest[end..].chars().take_while(|&c| c == '=').count();

    if token.is_empty() {
        None
    } else {
        Some(format!("{}{}", token, "=".repeat(padding)))
    }
}

/// 策略 (b): `private…key` / `public…key` 标签后紧跟的 base64url token
pub fn parse_label_pattern(output: &str) -> Option<KeyPair> {
    let mut private_key = None;
    let mut public_key = None;

    for line in output.lines() {
        if private_key.is_none() {
            private_key = token_after_label(line, "private", true);
        }
        if public_key.is_none() {
            public_key = token_after_label(line, "public", true)
                .or_else(|| token_after_label(line, "password", false));
        }
    }

    pair(private_key?, public_key?)
}

/// 策略 (c): 输出中所有长度 >= 40 的 base64url token, 前两个依次为私钥 / 公钥
///
/// token 是 `[A-Za-z0-9_-]` 的最长连续片段, `=` 填充与 `k=` / `k:` 之类的标签都在边界之外。
pub fn parse_long_tokens(output: &str) -> Option<KeyPair> {
    let mut tokens = output
        .split(|c: char| !is_key_char(c))
        .filter(|t| t.len() >= MIN_KEY_TOKEN_LEN);

    let private_key = tokens.next()?.to_string();
    let public_key = tokens.next()?.to_string();
    pair(private_key, public_key)
}

/// 依次尝试所有策略
pub fn parse_keypair(output: &str) -> Option<KeyPair> {
    STRATEGIES.iter().find_map(|(name, strategy)| {
        let parsed = strategy(output);
        if parsed.is_some() {
            debug!("密钥解析策略命中: {}", name);
        }
        parsed
    })
}

/// 通过外部 Xray 二进制生成密钥对
pub struct KeyGenerator {
    binary: PathBuf,
}

impl KeyGenerator {
    pub fn new<P: AsRef<Path>>(binary: P) -> Self {
        Self {
            binary: binary.as_ref().to_path_buf(),
        }
    }

    /// 执行 `<binary> x25519` 并解析, 结果经 X25519 重新推导校验
    pub async fn generate<R: CommandRunner>(&self, runner: &R) -> Result<KeyPair> {
        let binary = self.binary.to_string_lossy();
        info!("🔑 生成 Reality 密钥对: {} x25519", binary);

        let output = runner
            .run(&binary, &["x25519"])
            .await
            .map_err(|e| InstallError::KeyGeneration(format!("无法执行 {}: {}", binary, e)))?;

        Self::from_output(&output.combined())
    }

    /// 从命令输出中提取并校验密钥对
    pub fn from_output(output: &str) -> Result<KeyPair> {
        let pair = parse_keypair(output).ok_or_else(|| {
            InstallError::KeyGeneration(format!(
                "无法从 x25519 输出中解析密钥对 ({} 行输出)",
                output.lines().count()
            ))
        })?;

        verify_keypair(&pair)?;
        info!("✅ 密钥对已生成, 公钥: {}", pair.public_key);
        Ok(pair)
    }
}
