use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::{fs, path::Path, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Environment variable naming an optional JSON config file.
pub const CONFIG_ENV: &str = "GPIOLIGHT_CONFIG";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct GpioConfig {
    pub sysfs_root: PathBuf,
    pub input_pin: u32,
    pub output_pin: u32,
}

impl Default for GpioConfig {
    fn default() -> Self {
        Self {
            sysfs_root: PathBuf::from("/sys/class/gpio"),
            input_pin: 20,
            output_pin: 21,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ListenConfig {
    pub host: IpAddr,
    /// Only ever taken from the command line.
    #[serde(skip)]
    pub port: u16,
    pub backlog: u32,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 0,
            backlog: 5,
        }
    }
}

impl ListenConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    pub gpio: GpioConfig,
    pub listen: ListenConfig,
}

impl AppConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, AppError> {
        let contents = fs::read_to_string(&path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;
        serde_json::from_str(&contents)
            .map_err(|e| AppError::Config(format!("Invalid config json: {e}")))
    }

    /// Loads the file named by [`CONFIG_ENV`], falling back to defaults when unset.
    pub fn load_from_env() -> Result<Self, AppError> {
        match std::env::var(CONFIG_ENV) {
            Ok(path) => Self::load_from_file(path),
            Err(_) => Ok(Self::default()),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.listen.port = port;
        self
    }
}

/// Extracts the listening port from the full argument vector, program name included.
pub fn parse_port_arg(args: &[String]) -> Result<u16, AppError> {
    let program = args.first().map(String::as_str).unwrap_or(env!("CARGO_PKG_NAME"));
    match args {
        [_, port] => port
            .parse()
            .map_err(|e| AppError::Config(format!("Invalid port '{port}': {e}"))),
        _ => Err(AppError::Config(format!("Usage : {program} <port>"))),
    }
}
