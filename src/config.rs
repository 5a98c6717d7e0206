//! The config module defines the application configuration. It is based on [config], a layered
//! configuration system for Rust applications (with strong support for 12-factor applications).
//!
//! # Layers
//!
//! The configuration consists of up to three layers. Upper layers overwrite lower layer
//! configurations (e.g., environment variables overwrite the default configuration).
//!
//! 1. Environment variables in the format `[ENV_PREFIX]_[field]_[sub_field]`, where `ENV_PREFIX`
//!    defaults to `DERMA`. E.g. `DERMA_MOJANG_TEXTURES_ENABLED` overwrites
//!    `mojang_textures.enabled`.
//! 2. An optional configuration file located by the `CONFIG_FILE` environment variable,
//!    defaulting to `config/config`. It can be of any file type supported by [config].
//! 3. The default configuration, loaded from `config/default.toml` at compile time.
//!
//! # Usage
//!
//! ```rs
//! let config: Config = Config::new()?;
//! ```

use config::{ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use serde::Deserializer;
use serde::de::{Error, Unexpected, Visitor};
use std::env;
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// [MojangTextures] selects and parameterises the textures pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct MojangTextures {
    /// Whether the pipeline is enabled. If false, the orchestrator is replaced by a null
    /// provider that resolves every username to nothing.
    pub enabled: bool,

    /// The username to uuid resolver configuration.
    pub uuids_provider: UuidsProvider,
}

/// [UuidsProvider] selects the driver that resolves usernames to uuids.
#[derive(Debug, Clone, Deserialize)]
pub struct UuidsProvider {
    /// The selected driver.
    pub driver: UuidsProviderDriver,

    /// The URL prefix of the remote resolver. Only used by the `remote` driver.
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UuidsProviderDriver {
    /// Coalesce and batch lookups into grouped upstream calls (the default).
    Batch,

    /// Resolve each lookup with a single-shot call to a configured endpoint.
    Remote,
}

/// [Queue] parameterises the dispatch loop of the batch uuids provider.
#[derive(Debug, Clone, Deserialize)]
pub struct Queue {
    /// The minimum time between the starts of two dispatch rounds.
    #[serde(deserialize_with = "parse_duration")]
    pub loop_delay: Duration,

    /// The maximum number of distinct usernames per upstream call.
    pub batch_size: usize,
}

/// [CacheSettings] holds the configuration of both pipeline caches.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    /// The username to uuid store.
    pub uuids: CacheEntry,

    /// The uuid to signed textures store.
    pub textures: CacheEntry,
}

/// [CacheEntry] holds the configuration for a single cache store.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheEntry {
    /// The maximum number of entries held by the store.
    pub cap: u64,

    /// The expiry for filled entries. If elapsed, the entry is treated as absent.
    #[serde(deserialize_with = "parse_duration")]
    pub exp: Duration,

    /// The expiry for negative entries (e.g., username not found). If elapsed, the
    /// entry is treated as absent.
    #[serde(deserialize_with = "parse_duration")]
    pub exp_empty: Duration,
}

/// [Healthcheck] parameterises the probes observing the batch uuids provider.
#[derive(Debug, Clone, Deserialize)]
pub struct Healthcheck {
    /// How long a failed upstream call keeps the response probe unhealthy.
    #[serde(deserialize_with = "parse_duration")]
    pub cool_down: Duration,

    /// The queue length above which the queue probe reports unhealthy.
    pub queue_length_limit: usize,
}

/// [RestServer] holds the rest server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RestServer {
    /// The address of the rest server. E.g. `0.0.0.0:8080` for running with an exposed port.
    pub address: SocketAddr,
}

/// [Metrics] holds the metrics service configuration. If enabled, the metrics are exposed
/// at the rest server at `/metrics`.
#[derive(Debug, Clone, Deserialize)]
pub struct Metrics {
    /// Whether the metrics service should be enabled.
    pub enabled: bool,
}

/// [Textures] holds the extra signed-textures property appended to every signed response.
#[derive(Debug, Clone, Deserialize)]
pub struct Textures {
    pub extra_param_name: String,
    pub extra_param_value: String,
}

/// [Config] holds all configuration for the application. I.g. one immutable instance is
/// created on startup and then shared among the application components.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// The textures pipeline configuration.
    pub mojang_textures: MojangTextures,

    /// The batch dispatch loop configuration.
    pub queue: Queue,

    /// The pipeline cache configuration.
    pub cache: CacheSettings,

    /// The health probe configuration.
    pub healthcheck: Healthcheck,

    /// The rest server configuration.
    pub rest_server: RestServer,

    /// The metrics configuration. The metrics service is part of the [RestServer].
    pub metrics: Metrics,

    /// The signed-textures extra property configuration.
    pub textures: Textures,
}

impl Config {
    /// Creates a new application configuration as described in the [module documentation](crate::config).
    pub fn new() -> Result<Self, ConfigError> {
        // the environment prefix for all `Config` fields
        let env_prefix = env::var("ENV_PREFIX").unwrap_or("derma".into());
        // the path of the custom configuration file
        let config_file = env::var("CONFIG_FILE").unwrap_or("config/config".into());

        let s = config::Config::builder()
            // load default configuration (embedded at compile time)
            .add_source(File::from_str(
                include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config/default.toml")),
                FileFormat::Toml,
            ))
            // load custom configuration from file (at runtime)
            .add_source(File::with_name(&config_file).required(false))
            // add in config from the environment, e.g. `DERMA_QUEUE_BATCH_SIZE=5`
            .add_source(Environment::with_prefix(&env_prefix).separator("_"))
            .build()?;

        s.try_deserialize()
    }
}

impl Default for Config {
    fn default() -> Self {
        let s = config::Config::builder()
            // load default configuration (embedded at compile time)
            .add_source(File::from_str(
                include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config/default.toml")),
                FileFormat::Toml,
            ))
            .build()
            .expect("expected default configuration to be available");

        s.try_deserialize()
            .expect("expected default configuration to be deserializable")
    }
}

/// Deserializer that parses an [iso8601] duration string or a number of seconds to a
/// [Duration]. E.g. `PT1M`, `60` or `2.5` are accepted.
pub fn parse_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    struct DurationVisitor;

    impl Visitor<'_> for DurationVisitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            write!(formatter, "an iso duration or number of seconds")
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: Error,
        {
            match u64::try_from(v) {
                Ok(u) => self.visit_u64(u),
                Err(_) => Err(Error::invalid_type(
                    Unexpected::Signed(v),
                    &"a positive number of seconds",
                )),
            }
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: Error,
        {
            Ok(Duration::from_secs(v))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: Error,
        {
            if v < 0.0 {
                return Err(Error::invalid_value(
                    Unexpected::Float(v),
                    &"a positive number of seconds",
                ));
            }
            Ok(Duration::from_secs_f64(v))
        }

        fn visit_str<E>(self, value: &str) -> Result<Duration, E>
        where
            E: Error,
        {
            match iso8601::Duration::from_str(value) {
                Ok(iso) => Ok(Duration::from(iso)),
                Err(_) => Err(Error::invalid_value(
                    Unexpected::Str(value),
                    &"an iso duration",
                )),
            }
        }
    }

    deserializer.deserialize_any(DurationVisitor)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_config_loads() {
        // given / when
        let config = Config::default();

        // then
        assert!(config.mojang_textures.enabled);
        assert_eq!(
            UuidsProviderDriver::Batch,
            config.mojang_textures.uuids_provider.driver
        );
        assert_eq!(Duration::from_millis(2500), config.queue.loop_delay);
        assert_eq!(10, config.queue.batch_size);
        assert_eq!(Duration::from_secs(60), config.cache.uuids.exp_empty);
        assert_eq!(Duration::from_secs(30 * 24 * 3600), config.cache.uuids.exp);
        assert_eq!(Duration::from_secs(60), config.cache.textures.exp);
        assert_eq!(Duration::from_secs(60), config.healthcheck.cool_down);
        assert_eq!(50, config.healthcheck.queue_length_limit);
    }

    #[test]
    fn durations_parse_from_iso_and_seconds() {
        #[derive(Deserialize)]
        struct Wrapper {
            #[serde(deserialize_with = "parse_duration")]
            duration: Duration,
        }

        let iso: Wrapper = serde_json::from_str(r#"{"duration": "PT2.5S"}"#).unwrap();
        assert_eq!(Duration::from_millis(2500), iso.duration);

        let secs: Wrapper = serde_json::from_str(r#"{"duration": 60}"#).unwrap();
        assert_eq!(Duration::from_secs(60), secs.duration);

        let fract: Wrapper = serde_json::from_str(r#"{"duration": 0.5}"#).unwrap();
        assert_eq!(Duration::from_millis(500), fract.duration);
    }
}
