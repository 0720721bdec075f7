pub mod connection;
pub mod rest;
pub mod telemetry;

pub use connection::{Connection, ConnectionConfig, LinkStatus, RECONNECT_DELAY};
pub use rest::{ApiClient, ApiError};
pub use telemetry::{spawn_poller, TELEMETRY_INTERVAL};
