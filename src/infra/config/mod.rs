mod app_config;
mod file_config;
mod loader;

pub use app_config::{AppConfig, HeartbeatConfig, LogConfig, NetworkConfig};
pub use loader::load;
