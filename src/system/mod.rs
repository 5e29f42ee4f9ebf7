//! 与宿主机交互的安装阶段

pub mod deps;
pub mod firewall;
pub mod preflight;
pub mod service;
pub mod sysctl;

pub use deps::{DependencyInstaller, PackageManager};
pub use preflight::{check_privilege, HostResources};
pub use service::ServiceInstaller;
pub use sysctl::SysctlProfile;
