/*!
 * Bluetooth broker
 * BlueZ adapters and devices exposed over a token-gated HTTP API
 */

pub mod api;
pub mod bluetooth;
pub mod config;
pub mod tokens;
