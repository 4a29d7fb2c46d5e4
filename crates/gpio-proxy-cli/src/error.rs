//! CLI error type.

use std::io;
use std::path::PathBuf;

use gpio_proxy_client::{ClientError, ConfigError};
use gpio_proxy_drivers::DriverError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("invalid configuration")]
    Config(#[from] ConfigError),

    #[error("pin operation failed")]
    Client(#[from] ClientError),

    #[error("device driver failed")]
    Driver(#[from] DriverError),

    #[error("failed to read pin layout {path}")]
    ReadLayout {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid pin layout")]
    ParseLayout(#[from] serde_yaml::Error),

    #[error("invalid pin range {first}..={last}")]
    PinRange { first: u32, last: u32 },

    #[error("simulated daemon failed")]
    Io(#[from] io::Error),

    #[error("failed to install Ctrl-C handler")]
    Signal(#[from] ctrlc::Error),

    #[error("failed to encode output")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "prometheus")]
    #[error("failed to start metrics exporter: {0}")]
    Metrics(String),
}

pub type CliResult<T> = Result<T, CliError>;
