use serde::Deserialize;

use crate::infra::config::{AppConfig, HeartbeatConfig, LogConfig, NetworkConfig};

#[derive(Debug, Deserialize, Default)]
pub struct FileConfig {
    pub logging: Option<FileLogConfig>,
    pub network: Option<FileNetworkConfig>,
    pub heartbeat: Option<FileHeartbeatConfig>,
}

impl FileConfig {
    pub fn merge_into(self, config: &mut AppConfig) {
        if let Some(logging) = self.logging {
            logging.merge_into(&mut config.logging);
        }

        if let Some(network) = self.network {
            network.merge_into(&mut config.network);
        }

        if let Some(heartbeat) = self.heartbeat {
            heartbeat.merge_into(&mut config.heartbeat);
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileLogConfig {
    pub level: Option<String>,
}

impl FileLogConfig {
    fn merge_into(self, config: &mut LogConfig) {
        if let Some(level) = self.level {
            config.level = level;
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileNetworkConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub connect_timeout_ms: Option<u64>,
    pub reconnect_backoff_ms: Option<u64>,
}

impl FileNetworkConfig {
    fn merge_into(self, config: &mut NetworkConfig) {
        if let Some(host) = self.host {
            config.host = host;
        }

        if let Some(port) = self.port {
            config.port = port;
        }

        if let Some(timeout_ms) = self.connect_timeout_ms {
            config.connect_timeout_ms = timeout_ms;
        }

        if let Some(backoff_ms) = self.reconnect_backoff_ms {
            config.reconnect_backoff_ms = backoff_ms;
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileHeartbeatConfig {
    pub interval_ms: Option<u64>,
}

impl FileHeartbeatConfig {
    fn merge_into(self, config: &mut HeartbeatConfig) {
        if let Some(interval_ms) = self.interval_ms {
            config.interval_ms = interval_ms;
        }
    }
}
