use thiserror::Error;

/// 安装流程错误类型
///
/// 每个变体对应流水线中一个致命阶段, 出现即终止本次运行。
#[derive(Error, Debug)]
pub enum InstallError {
    #[error("权限不足: {0}")]
    Privilege(String),

    #[error("依赖安装失败: {0}")]
    DependencyInstall(String),

    #[error("Xray 二进制安装失败: {0}")]
    BinaryInstall(String),

    #[error("密钥生成失败: {0}")]
    KeyGeneration(String),

    #[error("参数无效: {0}")]
    InvalidParameter(String),

    #[error("配置写入失败: {0}")]
    ConfigWrite(String),

    #[error("服务 {unit} 未处于 active 状态\n最近日志:\n{journal}")]
    ServiceStart { unit: String, journal: String },

    #[error("安装器设置错误: {0}")]
    Settings(String),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON 错误: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, InstallError>;
