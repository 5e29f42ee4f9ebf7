use sysinfo::System;
use tracing::info;

use crate::utils::error::{InstallError, Result};

/// 检查是否以 root 身份运行
pub fn check_privilege() -> Result<()> {
    // SAFETY: geteuid 没有前置条件, 也不会失败
    let euid = unsafe { libc::geteuid() };
    if euid != 0 {
        return Err(InstallError::Privilege(format!(
            "需要 root 权限运行 (当前 euid = {})",
            euid
        )));
    }
    Ok(())
}

/// 宿主机资源, 用于选择调优参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostResources {
    pub cpus: usize,
    pub total_memory_mb: u64,
}

impl HostResources {
    /// 读取 CPU 数量与物理内存
    pub fn detect() -> Self {
        let mut sys = System::new();
        sys.refresh_cpu_all();
        sys.refresh_memory();
        let resources = Self {
            cpus: sys.cpus().len().max(1),
            total_memory_mb: sys.total_memory() / 1024 / 1024,
        };
        info!(
            "🖥️  检测到 {} 个 CPU, {} MB 内存",
            resources.cpus, resources.total_memory_mb
        );
        resources
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_resources() {
        let resources = HostResources::detect();
        assert!(resources.cpus >= 1);
    }
}
