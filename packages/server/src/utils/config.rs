use once_cell::sync::Lazy;
use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

pub static CONFIG: Lazy<ServerConfig> = Lazy::new(|| {
    ServerConfig::from_env().unwrap_or_else(|e| {
        log::warn!("{}; falling back to default server settings", e);
        ServerConfig::default()
    })
});

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} has an invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub tick_interval: Duration,
    pub reap_interval: Duration,
    pub idle_timeout: Duration,
    pub allowed_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            tick_interval: Duration::from_millis(1000),
            reap_interval: Duration::from_secs(60),
            idle_timeout: Duration::from_secs(2 * 60 * 60),
            allowed_origin: "http://localhost:3000".to_string(),
        }
    }
}

fn parsed<T: FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(None),
    }
}

impl ServerConfig {
    /// Reads `WEREWOLF_*` variables; anything unset keeps its default.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let bind_addr = parsed::<SocketAddr>("WEREWOLF_BIND_ADDR")?.unwrap_or(defaults.bind_addr);
        let tick_interval = parsed::<u64>("WEREWOLF_TICK_INTERVAL_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.tick_interval);
        let reap_interval = parsed::<u64>("WEREWOLF_REAP_INTERVAL_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.reap_interval);
        let idle_timeout = parsed::<u64>("WEREWOLF_IDLE_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.idle_timeout);
        let allowed_origin = env::var("WEREWOLF_ALLOWED_ORIGIN").unwrap_or(defaults.allowed_origin);

        if tick_interval.is_zero() {
            return Err(ConfigError::Invalid {
                name: "WEREWOLF_TICK_INTERVAL_MS",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            bind_addr,
            tick_interval,
            reap_interval,
            idle_timeout,
            allowed_origin,
        })
    }
}
