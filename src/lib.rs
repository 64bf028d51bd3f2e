pub mod client;
pub mod config;
pub mod crypto;
pub mod dsig;
pub mod telemetry;
pub mod xml;
