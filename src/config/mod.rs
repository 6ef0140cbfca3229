use config::{Config, ConfigError, Environment};
use serde::Deserialize;

use crate::sync::DEFAULT_SYNC_SUBJECT;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncBackend {
    /// In-process bus only; nothing leaves this process.
    Local,
    /// NATS pub/sub, falling back to the local bus when the server is unreachable.
    #[default]
    Nats,
}

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_database_max_connections")]
    pub database_max_connections: u32,
    #[serde(default)]
    pub sync_backend: SyncBackend,
    #[serde(default = "default_nats_url")]
    pub nats_url: String,
    #[serde(default = "default_sync_subject")]
    pub sync_subject: String,
    #[serde(default)]
    pub metrics_enabled: bool,
    #[serde(default = "default_metrics_listen_addr")]
    pub metrics_listen_addr: String,
    #[serde(default)]
    pub telemetry_enabled: bool,
    #[serde(default = "default_telemetry_service_name")]
    pub telemetry_service_name: String,
    #[serde(default = "default_telemetry_service_version")]
    pub telemetry_service_version: String,
    #[serde(default = "default_telemetry_environment")]
    pub telemetry_environment: String,
    #[serde(default = "default_telemetry_otlp_endpoint")]
    pub telemetry_otlp_endpoint: String,
}

fn default_database_url() -> String {
    "sqlite://comments.db?mode=rwc".to_string()
}

fn default_database_max_connections() -> u32 {
    5
}

fn default_nats_url() -> String {
    "nats://localhost:4222".to_string()
}

fn default_sync_subject() -> String {
    DEFAULT_SYNC_SUBJECT.to_string()
}

fn default_metrics_listen_addr() -> String {
    "127.0.0.1:9000".to_string()
}

fn default_telemetry_service_name() -> String {
    "comment-thread".to_string()
}

fn default_telemetry_service_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_telemetry_environment() -> String {
    "development".to_string()
}

fn default_telemetry_otlp_endpoint() -> String {
    "http://localhost:4317".to_string()
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_config(Config::builder().add_source(Environment::default()).build()?)
    }

    pub fn from_config(config: Config) -> Result<Self, ConfigError> {
        config.try_deserialize()
    }
}
