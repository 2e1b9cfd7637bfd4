//! Gateway Configuration Settings
//!
//! Configuration types for the gateway engine, loaded from environment
//! variables once at process start and passed to each component.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::application::ports::ContainerSpec;

/// Trading mode of the gateway login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TradingMode {
    /// Paper trading account.
    #[default]
    Paper,
    /// Live trading account.
    Live,
}

impl TradingMode {
    /// Parse trading mode from string.
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "live" => Self::Live,
            _ => Self::Paper,
        }
    }

    /// Check if this is the live mode.
    #[must_use]
    pub const fn is_live(&self) -> bool {
        matches!(self, Self::Live)
    }

    /// Get the mode name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Paper => "paper",
            Self::Live => "live",
        }
    }
}

/// Broker login credentials.
#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    /// Create new credentials.
    #[must_use]
    pub const fn new(username: String, password: String) -> Self {
        Self { username, password }
    }

    /// Get the username.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Get the password.
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &"[REDACTED]")
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Gateway container settings.
#[derive(Debug, Clone)]
pub struct ContainerSettings {
    /// Well-known container name.
    pub name: String,
    /// Gateway image reference.
    pub image: String,
    /// Host the gateway ports are reachable on.
    pub host: String,
    /// Trading-API port.
    pub api_port: u16,
    /// Command server port.
    pub command_port: u16,
    /// Remote desktop (VNC) port.
    pub vnc_port: u16,
    /// Grace period before the runtime kills a stopping container.
    pub stop_timeout: Duration,
}

impl Default for ContainerSettings {
    fn default() -> Self {
        Self {
            name: "ibkr-gateway".to_string(),
            image: "ghcr.io/extrange/ibkr:stable".to_string(),
            host: "127.0.0.1".to_string(),
            api_port: 8888,
            command_port: 7462,
            vnc_port: 6080,
            stop_timeout: Duration::from_secs(30),
        }
    }
}

/// Health probe settings.
#[derive(Debug, Clone)]
pub struct HealthSettings {
    /// Minimum spacing between two probes.
    pub interval: Duration,
    /// Spacing between readiness probes after start.
    pub ready_poll_interval: Duration,
    /// How long start waits for the gateway to answer.
    pub ready_timeout: Duration,
    /// Throwaway client id used by probes.
    pub probe_client_id: i32,
    /// Probe connection timeout.
    pub probe_timeout: Duration,
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            ready_poll_interval: Duration::from_secs(2),
            ready_timeout: Duration::from_secs(30),
            probe_client_id: 1111,
            probe_timeout: Duration::from_secs(4),
        }
    }
}

/// Trading-API session settings.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Connection timeout for the long-lived session.
    pub connect_timeout: Duration,
    /// Timeout applied to each request on the session.
    pub request_timeout: Duration,
    /// Pause between disconnect and connect on an explicit reconnect.
    pub reconnect_pause: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(20),
            request_timeout: Duration::from_secs(20),
            reconnect_pause: Duration::from_secs(1),
        }
    }
}

/// Market data acquisition settings.
#[derive(Debug, Clone)]
pub struct MarketDataSettings {
    /// Wait after a restart command before reconnecting.
    pub restart_cooldown: Duration,
    /// Restart-and-retry rounds when option greeks are missing.
    pub max_self_heal_attempts: u32,
    /// Wait per update event in the snapshot stabilization loop.
    pub stabilization_interval: Duration,
    /// Overall deadline of the snapshot stabilization loop.
    pub snapshot_timeout: Duration,
    /// Calendar consulted for multi-symbol requests.
    pub calendar_exchange: String,
}

impl Default for MarketDataSettings {
    fn default() -> Self {
        Self {
            restart_cooldown: Duration::from_secs(30),
            max_self_heal_attempts: 1,
            stabilization_interval: Duration::from_secs(1),
            snapshot_timeout: Duration::from_secs(20),
            calendar_exchange: "NYSE".to_string(),
        }
    }
}

/// Complete gateway engine configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Broker login.
    pub credentials: Credentials,
    /// Trading mode.
    pub trading_mode: TradingMode,
    /// Leave the container running when the process stops.
    pub persist: bool,
    /// Container settings.
    pub container: ContainerSettings,
    /// Health probe settings.
    pub health: HealthSettings,
    /// Session settings.
    pub session: SessionSettings,
    /// Market data settings.
    pub market_data: MarketDataSettings,
}

impl GatewayConfig {
    /// Configuration with default settings for the given login.
    #[must_use]
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            trading_mode: TradingMode::default(),
            persist: false,
            container: ContainerSettings::default(),
            health: HealthSettings::default(),
            session: SessionSettings::default(),
            market_data: MarketDataSettings::default(),
        }
    }

    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing.
    pub fn from_env() -> Result<Self, ConfigError> {
        let username = required_env("IB_GATEWAY_USERNAME")?;
        let password = required_env("IB_GATEWAY_PASSWORD")?;

        let trading_mode = std::env::var("IB_GATEWAY_TRADINGMODE")
            .map(|s| TradingMode::from_str_case_insensitive(&s))
            .unwrap_or_default();

        let persist = parse_env_bool("IB_GATEWAY_PERSIST", false);

        let defaults = ContainerSettings::default();
        let container = ContainerSettings {
            name: std::env::var("IB_GATEWAY_CONTAINER_NAME").unwrap_or(defaults.name),
            image: std::env::var("IB_GATEWAY_IMAGE").unwrap_or(defaults.image),
            host: std::env::var("IB_GATEWAY_HOST").unwrap_or(defaults.host),
            api_port: parse_env_u16("IB_GATEWAY_PORT", defaults.api_port),
            command_port: parse_env_u16("IB_COMMAND_SERVER_PORT", defaults.command_port),
            vnc_port: parse_env_u16("IB_GATEWAY_VNC_PORT", defaults.vnc_port),
            stop_timeout: defaults.stop_timeout,
        };

        let defaults = HealthSettings::default();
        let health = HealthSettings {
            interval: parse_env_duration_secs("IB_GATEWAY_HEALTH_INTERVAL_SECS", defaults.interval),
            ready_timeout: parse_env_duration_secs(
                "IB_GATEWAY_READY_TIMEOUT_SECS",
                defaults.ready_timeout,
            ),
            ..defaults
        };

        let defaults = SessionSettings::default();
        let session = SessionSettings {
            connect_timeout: parse_env_duration_secs(
                "IB_GATEWAY_CONNECT_TIMEOUT_SECS",
                defaults.connect_timeout,
            ),
            request_timeout: parse_env_duration_secs(
                "IB_GATEWAY_REQUEST_TIMEOUT_SECS",
                defaults.request_timeout,
            ),
            ..defaults
        };

        let defaults = MarketDataSettings::default();
        let market_data = MarketDataSettings {
            restart_cooldown: parse_env_duration_secs(
                "IB_GATEWAY_RESTART_COOLDOWN_SECS",
                defaults.restart_cooldown,
            ),
            max_self_heal_attempts: parse_env_u32(
                "IB_GATEWAY_SELF_HEAL_ATTEMPTS",
                defaults.max_self_heal_attempts,
            ),
            ..defaults
        };

        Ok(Self {
            credentials: Credentials::new(username, password),
            trading_mode,
            persist,
            container,
            health,
            session,
            market_data,
        })
    }

    /// Container environment block: credentials and operating-mode flags.
    #[must_use]
    pub fn container_env(&self) -> BTreeMap<String, String> {
        [
            ("USERNAME", self.credentials.username().to_string()),
            ("PASSWORD", self.credentials.password().to_string()),
            ("TWOFA_TIMEOUT_ACTION", "restart".to_string()),
            ("GATEWAY_OR_TWS", "gateway".to_string()),
            ("IBC_TradingMode", self.trading_mode.as_str().to_string()),
            ("IBC_ReadOnlyApi", "no".to_string()),
            (
                "IBC_ReloginAfterSecondFactorAuthenticationTimeout",
                "yes".to_string(),
            ),
            ("IBC_AutoRestartTime", "08:35 AM".to_string()),
            (
                "IBC_CommandServerPort",
                self.container.command_port.to_string(),
            ),
            ("IBC_ControlFrom", "127.0.0.1".to_string()),
            ("IBC_BindAddress", "127.0.0.1".to_string()),
            ("IBC_AcceptIncomingConnectionAction", "accept".to_string()),
            ("IBC_AcceptNonBrokerageAccountWarning", "yes".to_string()),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
    }

    /// Full creation spec for the gateway container.
    #[must_use]
    pub fn container_spec(&self) -> ContainerSpec {
        ContainerSpec {
            name: self.container.name.clone(),
            image: self.container.image.clone(),
            env: self.container_env(),
            ports: vec![
                self.container.vnc_port,
                self.container.api_port,
                self.container.command_port,
            ],
            restart_unless_stopped: true,
        }
    }

    /// Command server address.
    #[must_use]
    pub fn command_address(&self) -> String {
        format!("{}:{}", self.container.host, self.container.command_port)
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
}

/// Load a `.env` file from the current directory or any ancestor.
pub fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

fn required_env(key: &str) -> Result<String, ConfigError> {
    let value = std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))?;
    if value.is_empty() {
        return Err(ConfigError::EmptyValue(key.to_string()));
    }
    Ok(value)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .and_then(|v| parse_bool(&v))
        .unwrap_or(default)
}

fn parse_env_u16(key: &str, default: u16) -> u16 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_duration_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> GatewayConfig {
        GatewayConfig::new(Credentials::new("trader".to_string(), "hunter2".to_string()))
    }

    #[test]
    fn trading_mode_parsing() {
        assert_eq!(
            TradingMode::from_str_case_insensitive("LIVE"),
            TradingMode::Live
        );
        assert_eq!(
            TradingMode::from_str_case_insensitive("paper"),
            TradingMode::Paper
        );
        assert_eq!(
            TradingMode::from_str_case_insensitive("unknown"),
            TradingMode::Paper
        );
        assert!(TradingMode::Live.is_live());
    }

    #[test]
    fn credentials_redacted_debug() {
        let debug = format!("{:?}", config());
        assert!(!debug.contains("trader"));
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn bool_parsing() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool(" yes "), Some(true));
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn default_timings() {
        let config = config();
        assert_eq!(config.health.interval, Duration::from_secs(2));
        assert_eq!(config.health.ready_timeout, Duration::from_secs(30));
        assert_eq!(config.health.probe_client_id, 1111);
        assert_eq!(config.session.connect_timeout, Duration::from_secs(20));
        assert_eq!(config.market_data.restart_cooldown, Duration::from_secs(30));
        assert_eq!(config.market_data.max_self_heal_attempts, 1);
        assert_eq!(config.market_data.snapshot_timeout, Duration::from_secs(20));
        assert!(!config.persist);
    }

    #[test]
    fn container_spec_binds_well_known_ports() {
        let spec = config().container_spec();
        assert_eq!(spec.name, "ibkr-gateway");
        assert_eq!(spec.image, "ghcr.io/extrange/ibkr:stable");
        assert_eq!(spec.ports, vec![6080, 8888, 7462]);
        assert!(spec.restart_unless_stopped);
    }

    #[test]
    fn container_env_carries_credentials_and_mode() {
        let mut config = config();
        config.trading_mode = TradingMode::Live;
        let env = config.container_env();
        assert_eq!(env.get("USERNAME").map(String::as_str), Some("trader"));
        assert_eq!(env.get("PASSWORD").map(String::as_str), Some("hunter2"));
        assert_eq!(env.get("IBC_TradingMode").map(String::as_str), Some("live"));
        assert_eq!(
            env.get("IBC_CommandServerPort").map(String::as_str),
            Some("7462")
        );
        assert_eq!(
            env.get("TWOFA_TIMEOUT_ACTION").map(String::as_str),
            Some("restart")
        );
    }

    #[test]
    fn container_spec_debug_hides_env_values() {
        let debug = format!("{:?}", config().container_spec());
        assert!(debug.contains("USERNAME"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn command_address() {
        assert_eq!(config().command_address(), "127.0.0.1:7462");
    }
}
