//! Application Services
//!
//! Gateway container lifecycle, the shared trading-API session and market
//! data acquisition, composed by [`GatewayService`].

mod gateway_service;
mod health_gate;
mod lifecycle;
mod market_data;
mod probe;
mod session;
mod stabilization;

pub use gateway_service::{GatewayService, ServiceLifecycle};
pub use health_gate::HealthCheckGate;
pub use lifecycle::GatewayLifecycle;
pub use market_data::MarketDataEngine;
pub use probe::SessionProbe;
pub use session::{
    ConnectionStatus, GatewaySession, GatewaySessionManager, ReconnectOutcome, client_id_for,
};
pub use stabilization::{StabilizationPolicy, stabilize};
