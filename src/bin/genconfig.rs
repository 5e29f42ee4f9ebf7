use anyhow::{bail, Result};
use clap::Parser;

use reality_installer::collector::{AcceptDefaults, Answers, ParameterCollector};
use reality_installer::config::Validator;
use reality_installer::report;
use reality_installer::utils::crypto::{generate_x25519_keypair, is_valid_short_id, verify_keypair};
use reality_installer::utils::KeyPair;
use reality_installer::{Config, Settings};

/// 只生成配置与分享链接, 不修改宿主机
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(long)]
    uuid: Option<String>,

    #[arg(long)]
    port: Option<String>,

    #[arg(long)]
    sni: Option<String>,

    #[arg(long)]
    level: Option<String>,

    /// Reality 私钥, 与 --public-key 同时给出; 否则本地生成
    #[arg(long, requires = "public_key")]
    private_key: Option<String>,

    #[arg(long, requires = "private_key")]
    public_key: Option<String>,

    /// 逗号分隔的 short ID
    #[arg(long, value_delimiter = ',')]
    short_ids: Vec<String>,

    /// 分享链接中的服务器地址
    #[arg(long, default_value = report::UNKNOWN_HOST)]
    host: String,

    #[arg(long)]
    label: Option<String>,

    /// 启用 stats / api
    #[arg(long)]
    stats: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let mut settings = Settings::default();
    settings.tuning.enable_stats = args.stats;

    let key_pair = match (args.private_key, args.public_key) {
        (Some(private_key), Some(public_key)) => {
            let pair = KeyPair {
                private_key,
                public_key,
            };
            verify_keypair(&pair)?;
            pair
        }
        _ => generate_x25519_keypair(),
    };

    let answers = Answers {
        uuid: args.uuid,
        port: args.port,
        sni: args.sni,
        level: args.level,
    };
    let mut profile = ParameterCollector::new(&settings.defaults, settings.tuning.short_id_count)
        .collect(&mut AcceptDefaults, &answers, key_pair)?;

    if !args.short_ids.is_empty() {
        if let Some(bad) = args.short_ids.iter().find(|id| !is_valid_short_id(id)) {
            bail!("short ID 无效: {:?}", bad);
        }
        profile.short_ids = args.short_ids;
    }

    let config = Config::from_profile(&profile, &settings.tuning);
    Validator::validate(&config)?;

    let label = args
        .label
        .unwrap_or_else(|| report::default_label(&args.host));
    let uri = report::share_uri(&profile, &args.host, &label);

    println!("{}", config.render()?);
    eprintln!("{}", report::render_summary(&profile, &args.host, &uri));
    eprintln!("私钥 (仅写入服务端配置): {}", profile.key_pair.private_key);

    Ok(())
}
