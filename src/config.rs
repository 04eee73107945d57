//! Configuration management for the chunk relay

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::upload::{ChunkPolicy, MAX_CHUNK_SIZE, MIN_CHUNK_SIZE, UPLOAD_EXPIRY_HOURS};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} has an invalid value: {value}")]
    InvalidValue { name: &'static str, value: String },

    #[error("MIN_CHUNK_SIZE ({min}) is larger than MAX_CHUNK_SIZE ({max})")]
    ChunkBounds { min: u64, max: u64 },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub upload: UploadConfig,
    pub client: ClientConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Where chunks wait for reassembly
    pub chunk_dir: PathBuf,
    /// Where reassembled files are written
    pub output_dir: PathBuf,
    /// Completion ledger file
    pub ledger_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub min_chunk_size: u64,
    pub max_chunk_size: u64,
    /// Overrides the random policy when set
    pub fixed_chunk_size: Option<u64>,
    pub expiry_hours: i64,
    pub reaper_interval_secs: u64,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub timeout_secs: u64,
    pub chunk_retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                request_timeout_secs: 120,
            },
            storage: StorageConfig {
                chunk_dir: PathBuf::from("./chunks"),
                output_dir: PathBuf::from("."),
                ledger_path: PathBuf::from("./fileInfoDB.json"),
            },
            upload: UploadConfig {
                min_chunk_size: MIN_CHUNK_SIZE,
                max_chunk_size: MAX_CHUNK_SIZE,
                fixed_chunk_size: None,
                expiry_hours: UPLOAD_EXPIRY_HOURS,
                reaper_interval_secs: 300,
            },
            client: ClientConfig::default(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            timeout_secs: 60,
            chunk_retries: 0,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Config::default();

        let config = Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or(defaults.server.host),
                port: parse_var("SERVER_PORT", defaults.server.port)?,
                request_timeout_secs: parse_var(
                    "REQUEST_TIMEOUT_SECS",
                    defaults.server.request_timeout_secs,
                )?,
            },
            storage: StorageConfig {
                chunk_dir: env::var("CHUNK_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.storage.chunk_dir),
                output_dir: env::var("OUTPUT_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.storage.output_dir),
                ledger_path: env::var("LEDGER_PATH")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.storage.ledger_path),
            },
            upload: UploadConfig {
                min_chunk_size: parse_var("MIN_CHUNK_SIZE", defaults.upload.min_chunk_size)?,
                max_chunk_size: parse_var("MAX_CHUNK_SIZE", defaults.upload.max_chunk_size)?,
                fixed_chunk_size: parse_optional_var("FIXED_CHUNK_SIZE")?,
                expiry_hours: parse_var("UPLOAD_EXPIRY_HOURS", defaults.upload.expiry_hours)?,
                reaper_interval_secs: parse_var(
                    "REAPER_INTERVAL_SECS",
                    defaults.upload.reaper_interval_secs,
                )?,
            },
            client: ClientConfig::from_env()?,
        };

        config.upload.validate()?;
        Ok(config)
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl UploadConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.min_chunk_size > self.max_chunk_size {
            return Err(ConfigError::ChunkBounds {
                min: self.min_chunk_size,
                max: self.max_chunk_size,
            });
        }
        Ok(())
    }

    /// Chunk size policy for new registrations
    pub fn chunk_policy(&self) -> ChunkPolicy {
        match self.fixed_chunk_size {
            Some(size) => ChunkPolicy::Fixed(size),
            None => ChunkPolicy::Random {
                min: self.min_chunk_size,
                max: self.max_chunk_size,
            },
        }
    }

    pub fn reaper_interval(&self) -> Duration {
        Duration::from_secs(self.reaper_interval_secs.max(1))
    }
}

impl ClientConfig {
    /// Sender settings only; the sender does not need the server variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = ClientConfig::default();
        Ok(ClientConfig {
            timeout_secs: parse_var("SEND_TIMEOUT_SECS", defaults.timeout_secs)?,
            chunk_retries: parse_var("SEND_CHUNK_RETRIES", defaults.chunk_retries)?,
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    Ok(parse_optional_var(name)?.unwrap_or(default))
}

fn parse_optional_var<T: FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { name, value }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_is_random_within_bounds() {
        let config = Config::default();
        assert_eq!(
            config.upload.chunk_policy(),
            ChunkPolicy::Random {
                min: MIN_CHUNK_SIZE,
                max: MAX_CHUNK_SIZE
            }
        );
        assert_eq!(config.client.chunk_retries, 0);
    }

    #[test]
    fn test_fixed_chunk_size_overrides_policy() {
        let mut config = Config::default();
        config.upload.fixed_chunk_size = Some(4);
        assert_eq!(config.upload.chunk_policy(), ChunkPolicy::Fixed(4));
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let mut config = Config::default();
        config.upload.min_chunk_size = 10;
        config.upload.max_chunk_size = 5;
        assert!(matches!(
            config.upload.validate(),
            Err(ConfigError::ChunkBounds { min: 10, max: 5 })
        ));
    }

    #[test]
    fn test_unparsable_variable_reported() {
        env::set_var("CHUNK_RELAY_TEST_NUMBER", "twelve");
        let result: Result<u64, _> = parse_var("CHUNK_RELAY_TEST_NUMBER", 1);
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { name: "CHUNK_RELAY_TEST_NUMBER", .. })
        ));
        env::remove_var("CHUNK_RELAY_TEST_NUMBER");
        assert_eq!(parse_var("CHUNK_RELAY_TEST_NUMBER", 1u64).unwrap(), 1);
    }
}
