use std::io::{BufRead, Write};

use tracing::warn;
use uuid::Uuid;

use crate::profile::{OptimizationLevel, ProxyProfile};
use crate::settings::Defaults;
use crate::utils::crypto::{generate_short_ids, KeyPair};
use crate::utils::error::{InstallError, Result};

/// 交互式输入的最大尝试次数
pub const MAX_ATTEMPTS: usize = 3;

/// 向操作者提问
pub trait Prompter {
    /// 返回原始输入 (可能为空)
    fn ask(&mut self, question: &str, default: &str) -> std::io::Result<String>;
}

/// 基于标准输入输出的提问
pub struct StdioPrompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> StdioPrompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> Prompter for StdioPrompter<R, W> {
    fn ask(&mut self, question: &str, default: &str) -> std::io::Result<String> {
        write!(self.output, "{} [默认: {}]: ", question, default)?;
        self.output.flush()?;

        let mut line = String::new();
        // EOF 视为空输入
        self.input.read_line(&mut line)?;
        Ok(line.trim().to_string())
    }
}

/// 始终接受默认值 (`--yes`)
pub struct AcceptDefaults;

impl Prompter for AcceptDefaults {
    fn ask(&mut self, _question: &str, _default: &str) -> std::io::Result<String> {
        Ok(String::new())
    }
}

/// 命令行预先给出的参数, 给出的字段不再提问
#[derive(Debug, Clone, Default)]
pub struct Answers {
    pub uuid: Option<String>,
    pub port: Option<String>,
    pub sni: Option<String>,
    pub level: Option<String>,
}

/// UUID: 必须能被解析, 统一为小写连字符格式
pub fn parse_uuid(s: &str) -> Result<String> {
    Uuid::parse_str(s)
        .map(|u| u.hyphenated().to_string())
        .map_err(|e| InstallError::InvalidParameter(format!("UUID 格式无效 ({}): {}", e, s)))
}

/// 端口: 1-65535
pub fn parse_port(s: &str) -> Result<u16> {
    match s.parse::<u16>() {
        Ok(port) if port != 0 => Ok(port),
        _ => Err(InstallError::InvalidParameter(format!(
            "端口必须为 1-65535 的整数: {}",
            s
        ))),
    }
}

/// SNI 域名: 至少两段, 每段 1-63 个字母数字或 `-`, 不以 `-` 开头或结尾
pub fn parse_domain(s: &str) -> Result<String> {
    let valid_label = |label: &str| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    };

    let labels: Vec<&str> = s.split('.').collect();
    if s.len() > 253 || labels.len() < 2 || !labels.iter().all(|l| valid_label(l)) {
        return Err(InstallError::InvalidParameter(format!(
            "SNI 域名格式无效: {:?}",
            s
        )));
    }
    Ok(s.to_ascii_lowercase())
}

/// 参数收集阶段
pub struct ParameterCollector<'a> {
    defaults: &'a Defaults,
    short_id_count: usize,
}

impl<'a> ParameterCollector<'a> {
    pub fn new(defaults: &'a Defaults, short_id_count: usize) -> Self {
        Self {
            defaults,
            short_id_count,
        }
    }

    /// 收集参数并构造 ProxyProfile
    pub fn collect<P: Prompter>(
        &self,
        prompter: &mut P,
        answers: &Answers,
        key_pair: KeyPair,
    ) -> Result<ProxyProfile> {
        let client_id = Self::field(
            prompter,
            answers.uuid.as_deref(),
            "客户端 UUID",
            "随机生成",
            || Ok(Uuid::new_v4().to_string()),
            parse_uuid,
        )?;

        let default_port = self.defaults.port.to_string();
        let listen_port = Self::field(
            prompter,
            answers.port.as_deref(),
            "监听端口",
            &default_port,
            || parse_port(&default_port),
            parse_port,
        )?;

        let sni_domain = Self::field(
            prompter,
            answers.sni.as_deref(),
            "SNI 伪装域名",
            &self.defaults.sni,
            || parse_domain(&self.defaults.sni),
            parse_domain,
        )?;

        let default_level = self.defaults.level.to_string();
        let optimization_level = Self::field(
            prompter,
            answers.level.as_deref(),
            "优化等级 (1=均衡 2=性能 3=吞吐/无流控)",
            &default_level,
            || default_level.parse::<OptimizationLevel>(),
            |s| s.parse::<OptimizationLevel>(),
        )?;

        Ok(ProxyProfile {
            client_id,
            listen_port,
            sni_domain,
            optimization_level,
            short_ids: generate_short_ids(self.short_id_count),
            key_pair,
        })
    }

    /// 单个字段: 命令行给出则直接校验, 否则提问; 空输入取默认值
    fn field<P, T>(
        prompter: &mut P,
        preset: Option<&str>,
        question: &str,
        default_hint: &str,
        default: impl Fn() -> Result<T>,
        parse: impl Fn(&str) -> Result<T>,
    ) -> Result<T>
    where
        P: Prompter,
    {
        let resolve = |raw: &str| {
            let raw = raw.trim();
            if raw.is_empty() {
                default()
            } else {
                parse(raw)
            }
        };

        if let Some(value) = preset {
            return resolve(value);
        }

        let mut last_err = None;
        for _ in 0..MAX_ATTEMPTS {
            let raw = prompter.ask(question, default_hint)?;
            match resolve(&raw) {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!("{}", e);
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| InstallError::InvalidParameter(question.to_string())))
    }
}
