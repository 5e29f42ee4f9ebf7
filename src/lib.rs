pub mod collector;
pub mod config;
pub mod keygen;
pub mod pipeline;
pub mod profile;
pub mod report;
pub mod settings;
pub mod system;
pub mod utils;

pub use config::Config;
pub use pipeline::{Installer, Options};
pub use profile::{OptimizationLevel, ProxyProfile};
pub use settings::Settings;
pub use utils::error::InstallError;
