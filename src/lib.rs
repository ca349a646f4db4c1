//! # D3Net Gateway - DIII-Net Indoor-Bus Adapter Bridge
//!
//! A gateway library bridging a host control plane to a fleet of HVAC indoor
//! units behind a DIII-Net/Modbus adapter. The adapter exposes the indoor bus
//! as fixed register tables over Modbus RTU; this crate discovers the units,
//! keeps a cached view of their live state and serialises operator commands
//! through the adapter's read/write coherence rules.
//!
//! ## Features
//!
//! - **🔧 Full register map**: system status, unit capability/status/holding/
//!   error regions with typed, bit-precise accessors
//! - **🚀 Async throughout**: Tokio-based transport, polling and locking
//! - **🛡️ Coherent writes**: prepare → modify → commit discipline over a
//!   per-unit holding shadow, with precise dirty tracking
//! - **⏱️ Bus-friendly pacing**: per-operation throttle and post-write poll
//!   suppression, tuned for the adapter's half-duplex link
//! - **📊 Structured events**: discovery, poll and write lifecycle events via
//!   a host callback
//! - **🧪 Hardware-free testing**: in-memory register bank implementing the
//!   same I/O boundary as the serial transport
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use d3net_gateway::{Gateway, GatewayConfig, RegisterBank, SharedGateway};
//!
//! #[tokio::main]
//! async fn main() -> d3net_gateway::GatewayResult<()> {
//!     // An in-memory adapter; use RtuTransport::open for the real bus.
//!     let bank = RegisterBank::new();
//!     let gateway = Gateway::new(Box::new(bank), GatewayConfig::default());
//!     let shared = SharedGateway::new(gateway);
//!
//!     shared.spawn_poll_task();
//!
//!     let mut gateway = shared.lock_write().await?;
//!     gateway.discover_units().await?;
//!     for unit in gateway.unit_summaries() {
//!         println!("{}: {:?}", unit.id, unit.power);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────┐      ┌─────────────────────┐
//! │    Host surface   │─────▶│    SharedGateway    │  exclusive lock,
//! └───────────────────┘      │      + Gateway      │  throttle, caches,
//! ┌───────────────────┐      │                     │  prepare/commit
//! │     Poll task     │─────▶└─────────────────────┘
//! └───────────────────┘                 │ RegisterIo
//!                      ┌────────────────┴───────────────┐
//!                      ▼                                ▼
//!            ┌───────────────────┐           ┌───────────────────┐
//!            │   RtuTransport    │           │   RegisterBank    │
//!            │ (RS-485, DE/RE)   │           │   (in-memory)     │
//!            └───────────────────┘           └───────────────────┘
//! ```

/// Bit-addressed field codec over 16-bit word arrays.
pub mod codec;

/// Serial line settings, gateway tuning and persisted snapshots.
pub mod config;

/// Error types and result handling.
pub mod error;

/// Discovery, polling and the prepare/commit write protocol.
pub mod gateway;

/// Structured gateway events.
pub mod logging;

/// Modbus-RTU wire protocol: function codes, CRC, frame codec.
pub mod protocol;

/// In-memory register tables for tests and demos.
pub mod register_bank;

/// Typed views over the adapter's register map.
pub mod registers;

/// Shared gateway handle and the poll task.
pub mod service;

/// Register I/O boundary and the RTU serial transport.
pub mod transport;

// Re-export the main types for convenience.
pub use config::{GatewayConfig, ParityMode, RegisteredUnits, RtuConfig};
pub use error::{GatewayError, GatewayResult};
pub use gateway::{unit_id, Gateway, Unit, UnitSummary};
pub use logging::{EventCallback, EventLogger, GatewayEvent};
pub use protocol::{FunctionCode, RegisterKind};
pub use register_bank::RegisterBank;
pub use registers::{
    FanDirection, FanSpeed, OperatingMode, SystemStatus, UnitCapability, UnitError, UnitHolding,
    UnitStatus, MAX_UNITS,
};
pub use service::SharedGateway;
pub use transport::{AutoDirection, LineDirection, RegisterIo, RtuTransport, TransportStats};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
