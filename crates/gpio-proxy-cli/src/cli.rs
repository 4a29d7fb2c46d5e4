//! Command-line arguments.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};
use gpio_proxy_client::{ConfigError, ProxyConfig};

/// Timeout used when neither the flags nor the config file set one.
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;

/// Owner label the CLI claims pins under.
pub const OWNER: &str = "gpio-proxy";

#[derive(Debug, Parser)]
#[command(name = "gpio-proxy", version, about = "Drive GPIO pins on a remote GPIO Proxy daemon")]
pub struct Cli {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Print results as JSON.
    #[arg(long, global = true)]
    pub json: bool,

    /// Serve Prometheus metrics on this address.
    #[cfg(feature = "prometheus")]
    #[arg(long, global = true)]
    pub metrics_addr: Option<SocketAddr>,

    #[command(subcommand)]
    pub command: Command,
}

/// Where the daemon is. Flags override the config file.
#[derive(Debug, Clone, Default, Args)]
pub struct ConnectionArgs {
    /// Daemon host name or address.
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Daemon UDP port.
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// Local UDP port to bind instead of an ephemeral one.
    #[arg(long, global = true)]
    pub local_port: Option<u16>,

    /// Reply timeout in milliseconds. 0 waits forever.
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    /// YAML file with host, port, local_port and timeout_ms.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

impl ConnectionArgs {
    /// Load the config file if one was given, then apply the flags.
    pub fn resolve(&self) -> Result<ProxyConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => ProxyConfig::load(path)?,
            None => ProxyConfig::default(),
        };
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if self.local_port.is_some() {
            config.local_port = self.local_port;
        }
        if self.timeout_ms.is_some() {
            config.timeout_ms = self.timeout_ms;
        }
        if config.timeout_ms.is_none() {
            config.timeout_ms = Some(DEFAULT_TIMEOUT_MS);
        }
        Ok(config)
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Read a pin. Its direction is left as it is unless --input is given.
    Get {
        pin: u32,
        /// Configure the pin as an input before reading it.
        #[arg(long)]
        input: bool,
    },

    /// Drive a pin.
    Set {
        pin: u32,
        value: u8,
    },

    /// List the pins in a range that can be claimed.
    Probe {
        #[arg(long, default_value_t = 0)]
        first: u32,
        #[arg(long, default_value_t = 49)]
        last: u32,
    },

    /// Flash an LED. With --cycles 0, flash until interrupted.
    Blink {
        pin: u32,
        #[arg(long, default_value_t = 10)]
        cycles: u32,
        #[arg(long, default_value_t = 100)]
        interval_ms: u64,
    },

    /// Show text on an HD44780 display. A newline moves to the second row.
    Lcd {
        text: String,
        /// YAML file with the display's pin assignment.
        #[arg(long)]
        pins: Option<PathBuf>,
    },

    /// Run a simulated daemon.
    Sim {
        #[arg(long, default_value = "0.0.0.0:5122")]
        bind: SocketAddr,
        #[arg(long, default_value_t = 50)]
        pins: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_get_with_globals() {
        let cli = Cli::try_parse_from([
            "gpio-proxy", "--host", "10.0.0.2", "get", "12", "--timeout-ms", "250", "-vv",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.connection.host.as_deref(), Some("10.0.0.2"));
        assert_eq!(cli.connection.timeout_ms, Some(250));
        assert!(matches!(cli.command, Command::Get { pin: 12, input: false }));

        let cli = Cli::try_parse_from(["gpio-proxy", "get", "3", "--input"]).unwrap();
        assert!(matches!(cli.command, Command::Get { pin: 3, input: true }));
    }

    #[test]
    fn test_parse_defaults() {
        let cli = Cli::try_parse_from(["gpio-proxy", "probe"]).unwrap();
        assert!(matches!(cli.command, Command::Probe { first: 0, last: 49 }));
        assert!(!cli.json);

        let cli = Cli::try_parse_from(["gpio-proxy", "blink", "3"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Blink { pin: 3, cycles: 10, interval_ms: 100 }
        ));

        let cli = Cli::try_parse_from(["gpio-proxy", "sim"]).unwrap();
        match cli.command {
            Command::Sim { bind, pins } => {
                assert_eq!(bind.port(), 5122);
                assert_eq!(pins, 50);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_rejects_bad_value() {
        assert!(Cli::try_parse_from(["gpio-proxy", "set", "4", "256"]).is_err());
        assert!(Cli::try_parse_from(["gpio-proxy", "get"]).is_err());
    }

    #[test]
    fn test_resolve_defaults() {
        let config = ConnectionArgs::default().resolve().unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 5122);
        assert_eq!(config.timeout_ms, Some(DEFAULT_TIMEOUT_MS));
    }

    #[test]
    fn test_flags_override_file() {
        let path = std::env::temp_dir().join(format!("gpio-proxy-cli-{}.yaml", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "host: router.lan\nport: 6000\ntimeout_ms: 500").unwrap();
        drop(file);

        let args = ConnectionArgs {
            port: Some(7000),
            config: Some(path.clone()),
            ..ConnectionArgs::default()
        };
        let config = args.resolve().unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.host, "router.lan");
        assert_eq!(config.port, 7000);
        assert_eq!(config.timeout_ms, Some(500));
    }
}
