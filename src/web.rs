#![cfg(not(tarpaulin_include))]

use stemdash::app::{self, Config};

/// Main entry point for the dashboard web server
///
/// Reads configuration from the environment, restores the last persisted
/// dataset and serves the dashboard.
///
/// # Environment
/// * `STEMDASH_ADDR` - Address to bind (default `127.0.0.1:3000`)
/// * `STEMDASH_DATA` - Dataset snapshot path (default `database/dataset.bin.gz`)
/// * `ADMIN_EMAILS` - Comma separated emails enrolled as administrators
/// * `SMTP_HOST` / `SMTP_PORT` / `SMTP_USER` / `SMTP_PASS` / `SMTP_FROM` -
///   Mail relay used for OTP and password reset codes
///
/// # Returns
/// * `Result<(), Box<dyn std::error::Error>>` - Success or error object
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    app::run(Config::from_env()).await
}
