//! Configuration Module
//!
//! Configuration loading for the gateway engine.

mod settings;

pub use settings::{
    ConfigError, ContainerSettings, Credentials, GatewayConfig, HealthSettings,
    MarketDataSettings, SessionSettings, TradingMode, load_dotenv,
};
