use std::io;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info, Level};

use reality_installer::collector::{AcceptDefaults, Answers, StdioPrompter};
use reality_installer::utils::SystemRunner;
use reality_installer::{Installer, Options, Settings};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// 安装器设置文件 (TOML)
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// 日志级别
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// 客户端 UUID (留空则提问)
    #[arg(long)]
    uuid: Option<String>,

    /// 监听端口
    #[arg(long)]
    port: Option<String>,

    /// SNI 伪装域名
    #[arg(long)]
    sni: Option<String>,

    /// 优化等级 1/2/3
    #[arg(long)]
    level: Option<String>,

    /// 不提问, 未给出的参数全部使用默认值
    #[arg(short, long)]
    yes: bool,

    /// 跳过内核参数调优
    #[arg(long)]
    skip_sysctl: bool,

    /// 跳过系统包与 Xray 安装 (要求二进制已存在)
    #[arg(long)]
    skip_deps: bool,

    /// 跳过防火墙放行
    #[arg(long)]
    skip_firewall: bool,
}

fn init_logging(level: &str) {
    // 优先使用环境变量 RUST_LOG，否则使用命令行参数
    let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| level.to_string());

    let log_level = match log_level_str.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    info!("🚀 VLESS+Reality 一键安装");

    let settings = Settings::load(args.settings.as_ref())?;
    let options = Options {
        check_privilege: true,
        skip_sysctl: args.skip_sysctl,
        skip_deps: args.skip_deps,
        skip_firewall: args.skip_firewall,
        answers: Answers {
            uuid: args.uuid,
            port: args.port,
            sni: args.sni,
            level: args.level,
        },
    };

    let installer = Installer::new(settings, options);
    let runner = SystemRunner;

    let result = if args.yes {
        installer.run(&runner, &mut AcceptDefaults).await
    } else {
        let stdin = io::stdin();
        let mut prompter = StdioPrompter::new(stdin.lock(), io::stdout());
        installer.run(&runner, &mut prompter).await
    };

    match result {
        Ok(report) => {
            println!();
            println!("{}", report.summary);
            info!("🎉 安装完成");
            Ok(())
        }
        Err(e) => {
            error!("❌ 安装失败: {}", e);
            std::process::exit(1);
        }
    }
}
