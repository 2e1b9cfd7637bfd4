#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::default_trait_access,
        clippy::items_after_statements
    )
)]

//! Gateway Engine - Broker Gateway Lifecycle and Market Data
//!
//! Keeps a containerized broker gateway alive and observable, and acquires
//! market data over its trading API: multi-symbol ticker snapshots with
//! self-healing for missing option greeks, single-symbol snapshots with a
//! bounded stabilization wait, and historical bars.
//!
//! # Layers (inside -> outside)
//!
//! - **Domain**: Pure types and rules
//!   - `gateway`: Process state machine, container status and logs
//!   - `market_data`: Contracts, tickers, snapshots, bars, data type rules
//!   - `naming`: camelCase to snake_case boundary for vendor records
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Container runtime, trading API, calendar, command channel, probe
//!   - `services`: Lifecycle, health gate, session manager, market data engine
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `docker`: Docker Engine container runtime
//!   - `ibc`: TCP command server client
//!   - `calendar`: NYSE trading calendar
//!   - `config`: Environment configuration
//!   - `memory`: In-memory adapters for tests
//!
//! # Control Flow
//!
//! ```text
//!                       ┌──────────────────┐
//!  caller ─────────────►│  GatewayService  │
//!                       └────────┬─────────┘
//!            ┌───────────────────┼────────────────────┐
//!            ▼                   ▼                    ▼
//!   ┌─────────────────┐ ┌─────────────────┐ ┌──────────────────┐
//!   │ GatewayLifecycle│ │ SessionManager  │ │ MarketDataEngine │
//!   └───┬─────────┬───┘ └────────┬────────┘ └───┬──────────┬───┘
//!       ▼         ▼              ▼              ▼          ▼
//!   container  probe ──────► trading API ◄── calendar   command
//!   runtime   (id 1111)      (gateway)                  server
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Gateway and market data types with no I/O.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

/// Caller-facing error taxonomy.
pub mod error;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::gateway::{ContainerStatus, GatewayLogs, GatewayProcessState, HealthState};
pub use domain::market_data::{
    BarData, Contract, DeltaCriteria, Greeks, HistoricalDataRequest, MarketDataType,
    SecurityType, SnapshotRequest, SubscriptionClass, TickData, TickerSnapshot,
};

// Services
pub use application::ports::GatewayCommand;
pub use application::services::{
    ConnectionStatus, GatewayService, MarketDataEngine, ReconnectOutcome,
};

// Errors
pub use error::GatewayError;

// Infrastructure config
pub use infrastructure::config::{
    ConfigError, Credentials, GatewayConfig, TradingMode, load_dotenv,
};

// Adapters
pub use infrastructure::calendar::NyseCalendar;
pub use infrastructure::docker::DockerRuntime;
pub use infrastructure::ibc::TcpCommandChannel;

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
