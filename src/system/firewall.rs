use tracing::{info, warn};

use crate::utils::command::CommandRunner;

/// 放行 TCP 端口
///
/// 依次尝试 ufw / firewalld / iptables, 返回使用的后端。失败只记录警告。
pub async fn open_port<R: CommandRunner>(runner: &R, port: u16) -> Option<&'static str> {
    let rule = format!("{}/tcp", port);
    let port = port.to_string();

    let (backend, commands): (&'static str, Vec<Vec<String>>) = if runner.exists("ufw") {
        ("ufw", vec![args(&["ufw", "allow", rule.as_str()])])
    } else if runner.exists("firewall-cmd") {
        let add = format!("--add-port={}", rule);
        (
            "firewalld",
            vec![
                args(&["firewall-cmd", "--permanent", add.as_str()]),
                args(&["firewall-cmd", "--reload"]),
            ],
        )
    } else if runner.exists("iptables") {
        (
            "iptables",
            vec![args(&[
                "iptables", "-I", "INPUT", "-p", "tcp", "--dport", port.as_str(), "-j", "ACCEPT",
            ])],
        )
    } else {
        warn!("未检测到防火墙工具, 请手动放行 {}", rule);
        return None;
    };

    for cmd in commands {
        let rest: Vec<&str> = cmd[1..].iter().map(String::as_str).collect();
        match runner.run(&cmd[0], &rest).await {
            Ok(out) if out.success => {}
            Ok(out) => {
                warn!("{} 执行失败: {}", cmd.join(" "), out.stderr.trim());
                return None;
            }
            Err(e) => {
                warn!("{} 无法执行: {}", cmd[0], e);
                return None;
            }
        }
    }

    info!("🧱 已通过 {} 放行 {}", backend, rule);
    Some(backend)
}

fn args(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
