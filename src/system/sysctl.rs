use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use tracing::{info, warn};

use super::preflight::HostResources;
use crate::profile::OptimizationLevel;
use crate::utils::command::CommandRunner;
use crate::utils::error::Result;

const MB: u64 = 1024 * 1024;

/// 内核网络参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SysctlProfile {
    /// socket 缓冲上限 (字节)
    pub buffer_max: u64,
    /// 监听队列 / SYN 队列 / 网卡队列
    pub backlog: u32,
    pub file_max: u64,
}

impl SysctlProfile {
    /// 按内存选择缓冲上限, 按 CPU 数选择队列长度; 等级 2/3 缓冲翻倍
    pub fn for_host(resources: &HostResources, level: OptimizationLevel) -> Self {
        let base = match resources.total_memory_mb {
            0..=1023 => 16 * MB,
            1024..=4095 => 32 * MB,
            _ => 64 * MB,
        };
        let buffer_max = match level {
            OptimizationLevel::Balanced => base,
            _ => (base * 2).min(128 * MB),
        };
        let backlog = (4096 * resources.cpus as u64).clamp(4096, 65535) as u32;

        Self {
            buffer_max,
            backlog,
            file_max: 1_048_576,
        }
    }

    /// 有序的 key = value 列表
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        let max = self.buffer_max;
        vec![
            ("net.core.default_qdisc", "fq".to_string()),
            ("net.ipv4.tcp_congestion_control", "bbr".to_string()),
            ("net.core.rmem_max", max.to_string()),
            ("net.core.wmem_max", max.to_string()),
            ("net.ipv4.tcp_rmem", format!("4096 87380 {}", max)),
            ("net.ipv4.tcp_wmem", format!("4096 65536 {}", max)),
            ("net.core.somaxconn", self.backlog.to_string()),
            ("net.core.netdev_max_backlog", self.backlog.to_string()),
            ("net.ipv4.tcp_max_syn_backlog", self.backlog.to_string()),
            ("net.ipv4.tcp_fastopen", "3".to_string()),
            ("net.ipv4.tcp_slow_start_after_idle", "0".to_string()),
            ("net.ipv4.tcp_mtu_probing", "1".to_string()),
            ("net.ipv4.tcp_fin_timeout", "15".to_string()),
            ("net.ipv4.tcp_tw_reuse", "1".to_string()),
            ("net.ipv4.ip_local_port_range", "1024 65535".to_string()),
            ("fs.file-max", self.file_max.to_string()),
        ]
    }

    pub fn render(&self) -> String {
        let mut out = String::from("# VLESS+Reality 网络调优, 由 reality-install 生成\n");
        for (key, value) in self.entries() {
            let _ = writeln!(out, "{} = {}", key, value);
        }
        out
    }

    /// 写入文件并通过 `sysctl -p` 应用
    ///
    /// 应用失败 (例如内核不支持 bbr) 只记录警告。
    pub async fn apply<R: CommandRunner>(&self, runner: &R, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.render())?;
        info!("⚙️  内核参数已写入 {}", path.display());

        let path_str = path.to_string_lossy();
        match runner.run("sysctl", &["-p", &*path_str]).await {
            Ok(out) if out.success => info!("✅ 内核参数已生效"),
            Ok(out) => warn!("sysctl 应用部分失败: {}", out.stderr.trim()),
            Err(e) => warn!("无法执行 sysctl: {}", e),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::command::fake::ScriptedRunner;

    #[test]
    fn test_profile_scales_with_host() {
        let small = HostResources {
            cpus: 1,
            total_memory_mb: 512,
        };
        let big = HostResources {
            cpus: 32,
            total_memory_mb: 16384,
        };

        let p = SysctlProfile::for_host(&small, OptimizationLevel::Balanced);
        assert_eq!(p.buffer_max, 16 * MB);
        assert_eq!(p.backlog, 4096);

        let p = SysctlProfile::for_host(&big, OptimizationLevel::Throughput);
        assert_eq!(p.buffer_max, 128 * MB);
        assert_eq!(p.backlog, 65535);
    }

    #[test]
    fn test_render() {
        let p = SysctlProfile::for_host(
            &HostResources {
                cpus: 2,
                total_memory_mb: 2048,
            },
            OptimizationLevel::Balanced,
        );
        let text = p.render();
        assert!(text.contains("net.ipv4.tcp_congestion_control = bbr\n"));
        assert!(text.contains("net.core.rmem_max = 33554432\n"));
        assert!(text.contains("net.core.somaxconn = 8192\n"));
    }

    #[tokio::test]
    async fn test_apply_writes_file() {
        let dir = std::env::temp_dir().join(format!("reality-sysctl-{}", uuid::Uuid::new_v4()));
        let path = dir.join("99-test.conf");
        let runner = ScriptedRunner::default().respond("sysctl -p", false, "");
        let p = SysctlProfile::for_host(
            &HostResources {
                cpus: 1,
                total_memory_mb: 1024,
            },
            OptimizationLevel::Balanced,
        );

        p.apply(&runner, &path).await.unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), p.render());
        assert!(runner.called("sysctl -p"));

        fs::remove_dir_all(dir).unwrap();
    }
}
