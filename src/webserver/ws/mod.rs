/// Observer websockets
///
/// Each socket attaches one observer to the relay hub and forwards every
/// relay event as a JSON text frame.
///
/// - `connection`: upgrade handler and per-socket loop
/// - `health`: heartbeat and idle tracking
/// - `metrics`: per-socket counters
pub mod connection;
pub mod health;
pub mod metrics;

pub use connection::ws_upgrade;
