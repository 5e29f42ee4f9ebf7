use std::fmt::Write as _;
use std::fs;
use std::net::{IpAddr, Ipv6Addr};
use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Context};
use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use hyper::header::{HOST, USER_AGENT};
use hyper::{Request, Uri};
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::profile::ProxyProfile;
use crate::utils::error::Result;

/// 无法获取公网 IP 时的占位符
pub const UNKNOWN_HOST: &str = "YOUR_SERVER_IP";

/// 客户端指纹 (仅出现在摘要中)
const FINGERPRINT: &str = "chrome";

/// 通过 HTTP GET 获取响应体中的 IP 地址
async fn fetch_ip(url: &str) -> anyhow::Result<IpAddr> {
    let uri: Uri = url.parse().with_context(|| format!("无效的地址: {}", url))?;
    let host = uri.host().ok_or_else(|| anyhow!("地址缺少 host: {}", url))?.to_string();
    let port = uri.port_u16().unwrap_or(80);
    // Host 头需要保留非默认端口
    let authority = uri
        .authority()
        .map(|a| a.as_str().to_string())
        .unwrap_or_else(|| host.clone());

    let stream = TcpStream::connect((host.as_str(), port)).await?;
    let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream)).await?;
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            debug!("IP 查询连接结束: {}", e);
        }
    });

    let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
    let request = Request::builder()
        .uri(path)
        .header(HOST, authority.as_str())
        .header(USER_AGENT, "curl/8.5.0")
        .body(Empty::<Bytes>::new())?;

    let response = sender.send_request(request).await?;
    if !response.status().is_success() {
        return Err(anyhow!("{} 返回 {}", url, response.status()));
    }

    let body = response.into_body().collect().await?.to_bytes();
    let text = String::from_utf8_lossy(&body);
    text.trim()
        .parse::<IpAddr>()
        .with_context(|| format!("{} 返回的不是 IP 地址: {:?}", url, text.trim()))
}

/// 依次查询各个地址, 第一个成功的结果胜出
pub async fn lookup_public_ip(providers: &[String], timeout: Duration) -> Option<IpAddr> {
    for provider in providers {
        match tokio::time::timeout(timeout, fetch_ip(provider)).await {
            Ok(Ok(ip)) => {
                info!("🌍 公网 IP: {} (来自 {})", ip, provider);
                return Some(ip);
            }
            Ok(Err(e)) => warn!("公网 IP 查询失败 ({}): {:#}", provider, e),
            Err(_) => warn!("公网 IP 查询超时 ({})", provider),
        }
    }
    None
}

/// URI 中的主机部分, IPv6 加方括号
pub fn uri_host(host: &str) -> String {
    if host.parse::<Ipv6Addr>().is_ok() {
        format!("[{}]", host)
    } else {
        host.to_string()
    }
}

/// 分享链接标签, 百分号编码
pub fn encode_label(label: &str) -> String {
    url::form_urlencoded::byte_serialize(label.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

/// 生成 VLESS 分享链接
///
/// 字段顺序与客户端约定一致, 不能调整。
pub fn share_uri(profile: &ProxyProfile, host: &str, label: &str) -> String {
    format!(
        "vless://{}@{}:{}?security=reality&sni={}&flow={}&pbk={}&sid={}&type=tcp&headerType=none#{}",
        profile.client_id,
        uri_host(host),
        profile.listen_port,
        profile.sni_domain,
        profile.flow(),
        profile.key_pair.public_key,
        profile.share_short_id(),
        encode_label(label),
    )
}

/// 默认标签
pub fn default_label(host: &str) -> String {
    format!("Reality-{}", host)
}

/// 连接信息摘要 (不含私钥)
pub fn render_summary(profile: &ProxyProfile, host: &str, uri: &str) -> String {
    let flow = match profile.flow() {
        "" => "(无)",
        flow => flow,
    };

    let mut out = String::new();
    let _ = writeln!(out, "========================================");
    let _ = writeln!(out, "VLESS + Reality 连接信息");
    let _ = writeln!(out, "========================================");
    let _ = writeln!(out, "地址 (address):    {}", host);
    let _ = writeln!(out, "端口 (port):       {}", profile.listen_port);
    let _ = writeln!(out, "用户 ID (uuid):    {}", profile.client_id);
    let _ = writeln!(out, "流控 (flow):       {}", flow);
    let _ = writeln!(out, "传输 (network):    tcp");
    let _ = writeln!(out, "安全 (security):   reality");
    let _ = writeln!(out, "SNI:               {}", profile.sni_domain);
    let _ = writeln!(out, "指纹 (fp):         {}", FINGERPRINT);
    let _ = writeln!(out, "公钥 (pbk):        {}", profile.key_pair.public_key);
    let _ = writeln!(out, "Short IDs:         {}", profile.short_ids.join(", "));
    let _ = writeln!(out, "优化等级:          {}", profile.optimization_level);
    let _ = writeln!(out);
    let _ = writeln!(out, "分享链接:");
    let _ = writeln!(out, "{}", uri);
    out
}

/// 保存摘要, 仅 root 可读
pub fn save_summary(path: &Path, summary: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, summary)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}
