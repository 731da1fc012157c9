use std::{fs, net::Ipv4Addr, path::Path, path::PathBuf};

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::gpio::Polarity;
use crate::registry::ChannelState;

/// Snapshot is a single byte, one bit per channel.
pub const MAX_CHANNELS: usize = 8;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum OutputDrive {
    PushPull,
    /// Low sinks current, high floats; lets a 3.3V pin drive 5V relay boards.
    #[default]
    OpenDrain,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Addressing {
    #[default]
    Dhcp,
    Static,
}

/// Network join parameters. Joining is done by the platform, these are only
/// recognized and checked so a bad static setup fails at boot.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct NetworkConfig {
    pub ssid: String,
    pub password: String,
    pub addressing: Addressing,
    pub static_ip: Option<String>,
    pub gateway: Option<String>,
    pub subnet: Option<String>,
    pub dns: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct KeepAliveConfig {
    pub enabled: bool,
    pub idle: u64,
    pub interval: u64,
    pub count: u32,
}

impl Default for KeepAliveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            idle: 5,
            interval: 5,
            count: 3,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub unix_socket: Option<String>,
    pub host: Option<String>,
    pub timeout: u64,
    pub max_connections: usize,
    pub workers: usize,
    pub worker_priority: u8,
    pub worker_stack_size: usize,
    pub keep_alive: KeepAliveConfig,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            unix_socket: None,
            host: None,
            timeout: 30,
            max_connections: 4,
            workers: 2,
            worker_priority: 5,
            worker_stack_size: 8192,
            keep_alive: KeepAliveConfig::default(),
        }
    }
}

impl HttpConfig {
    /// Share of `max_connections` each worker may hold, so the total across
    /// all workers never exceeds `max_connections`.
    pub fn connections_per_worker(&self) -> usize {
        self.max_connections / self.workers.max(1)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ChannelConfig {
    pub name: String,
    pub pin: u32,
    #[serde(default)]
    pub polarity: Option<Polarity>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct PersistenceConfig {
    pub enabled: bool,
    pub namespace: String,
    pub key: String,
    pub path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            namespace: "relay_ctrl".into(),
            key: "relay_state".into(),
            path: PathBuf::from("/var/lib/relayd"),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IndicatorConfig {
    pub pin: u32,
    #[serde(default = "default_blink_ms")]
    pub blink_ms: u64,
    #[serde(default = "default_blink_count")]
    pub blink_count: u32,
}

fn default_blink_ms() -> u64 {
    50
}

fn default_blink_count() -> u32 {
    1
}

fn default_gpio_chip() -> String {
    "/dev/gpiochip0".into()
}

fn default_active_low() -> bool {
    true
}

fn default_debounce_ms() -> u64 {
    50
}

fn default_status_log_interval() -> u64 {
    10
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub http: HttpConfig,
    pub channels: Vec<ChannelConfig>,
    #[serde(default = "default_gpio_chip")]
    pub gpio_chip: String,
    #[serde(default)]
    pub gpio_drive: OutputDrive,
    #[serde(default = "default_active_low")]
    pub active_low: bool,
    #[serde(default)]
    pub default_state: ChannelState,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub indicator: Option<IndicatorConfig>,
    #[serde(default = "default_status_log_interval")]
    pub status_log_interval_secs: u64,
}

impl AppConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, AppError> {
        let contents = fs::read_to_string(&path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;
        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Self, AppError> {
        let config: AppConfig = serde_json::from_str(contents)
            .map_err(|e| AppError::Config(format!("Invalid config json: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.channels.is_empty() || self.channels.len() > MAX_CHANNELS {
            return Err(AppError::Config(format!(
                "channel count must be between 1 and {MAX_CHANNELS}, got {}",
                self.channels.len()
            )));
        }

        let mut pins = FxHashSet::default();
        for channel in &self.channels {
            if !pins.insert(channel.pin) {
                return Err(AppError::Config(format!(
                    "pin {} is assigned to more than one channel",
                    channel.pin
                )));
            }
        }
        if let Some(indicator) = &self.indicator
            && pins.contains(&indicator.pin)
        {
            return Err(AppError::Config(format!(
                "indicator pin {} is also a channel pin",
                indicator.pin
            )));
        }

        if self.http.workers == 0 || self.http.max_connections == 0 {
            return Err(AppError::Config(
                "http workers and max_connections must be non-zero".into(),
            ));
        }
        if self.http.max_connections < self.http.workers {
            return Err(AppError::Config(format!(
                "http max_connections ({}) is below workers ({})",
                self.http.max_connections, self.http.workers
            )));
        }

        if self.persistence.enabled
            && (self.persistence.namespace.is_empty() || self.persistence.key.is_empty())
        {
            return Err(AppError::Config(
                "persistence namespace and key must not be empty".into(),
            ));
        }

        if self.network.addressing == Addressing::Static {
            let net = &self.network;
            for (field, value) in [
                ("static_ip", &net.static_ip),
                ("gateway", &net.gateway),
                ("subnet", &net.subnet),
                ("dns", &net.dns),
            ] {
                let value = value.as_deref().ok_or_else(|| {
                    AppError::Config(format!("static addressing requires network.{field}"))
                })?;
                value.parse::<Ipv4Addr>().map_err(|e| {
                    AppError::Config(format!("network.{field} '{value}' is not an IPv4 address: {e}"))
                })?;
            }
        }

        Ok(())
    }

    /// Polarity of a channel, falling back to the global `active_low` flag.
    pub fn polarity_of(&self, channel: &ChannelConfig) -> Polarity {
        channel.polarity.unwrap_or(if self.active_low {
            Polarity::ActiveLow
        } else {
            Polarity::ActiveHigh
        })
    }

    /// Address shown on the home page.
    pub fn advertised_address(&self) -> String {
        match (&self.network.addressing, &self.network.static_ip, &self.http.host) {
            (Addressing::Static, Some(ip), _) => ip.clone(),
            (_, _, Some(host)) => host.clone(),
            _ => self.http.unix_socket.clone().unwrap_or_default(),
        }
    }
}
