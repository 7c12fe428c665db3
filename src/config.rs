use anyhow::{Context, Result};
use serde::Deserialize;
use std::{fs, path::Path};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkerCfg {
    /// Классический 5-польный cron, локальное время `timezone`
    pub check_cron: String,
    pub timezone: String,
    pub max_parallel: usize,
    pub host_min_delay_ms: u64,
    pub host_jitter_ms: u64,
}

impl Default for WorkerCfg {
    fn default() -> Self {
        Self {
            check_cron: "0 8,20 * * *".to_string(),
            timezone: "Europe/Vilnius".to_string(),
            max_parallel: 5,
            host_min_delay_ms: 2000,
            host_jitter_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotificationsCfg {
    /// Пустой токен выключает отправку уведомлений
    pub bot_token: String,
    pub chat_id: i64,
    pub error_cooldown_hours: i64,
}

impl Default for NotificationsCfg {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            chat_id: 0,
            error_cooldown_hours: 6,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetentionCfg {
    pub retention_days: i64,
    pub cleanup_interval_hours: u64,
}

impl Default for RetentionCfg {
    fn default() -> Self {
        Self {
            retention_days: 180,
            cleanup_interval_hours: 24,
        }
    }
}

/// Наблюдаемый товар из конфига
#[derive(Debug, Clone, Deserialize)]
pub struct ItemCfg {
    pub url: String,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub worker: WorkerCfg,
    pub notifications: NotificationsCfg,
    pub retention: RetentionCfg,
    pub items: Vec<ItemCfg>,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = fs::read_to_string(path.as_ref())
            .with_context(|| format!("read config {}", path.as_ref().display()))?;
        let cfg: Self = toml::from_str(&s).context("parse Config.toml")?;
        Ok(cfg)
    }
}
