use std::io::Read;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use reality_installer::keygen::KeyGenerator;
use reality_installer::utils::{generate_x25519_keypair, SystemRunner};

/// 生成 / 解析 Reality X25519 密钥对
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Xray 二进制路径
    #[arg(short, long, default_value = "/usr/local/bin/xray")]
    binary: PathBuf,

    /// 从标准输入读取 `xray x25519` 的输出并解析
    #[arg(long, conflicts_with = "local")]
    stdin: bool,

    /// 不调用 Xray, 直接在本地生成
    #[arg(long)]
    local: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_target(false).init();
    let args = Args::parse();

    let pair = if args.local {
        generate_x25519_keypair()
    } else if args.stdin {
        let mut output = String::new();
        std::io::stdin().read_to_string(&mut output)?;
        KeyGenerator::from_output(&output)?
    } else {
        KeyGenerator::new(&args.binary).generate(&SystemRunner).await?
    };

    // Output
    println!("Private key: {}", pair.private_key);
    println!("Public key:  {}", pair.public_key);
    println!();
    println!("Note: Keep the private key secure and do not share it!");

    Ok(())
}
