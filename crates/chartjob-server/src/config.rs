use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be a valid {expected}, got {value:?}")]
    Invalid {
        name: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("{name} must be at least {min}, got {value}")]
    TooSmall {
        name: &'static str,
        value: u64,
        min: u64,
    },

    #[error("{name} ({value}) must be greater than {other} ({other_value})")]
    NotGreater {
        name: &'static str,
        value: u64,
        other: &'static str,
        other_value: u64,
    },
}

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory holding rendered charts until they are fetched.
    pub data_dir: PathBuf,
    pub workers: usize,
    /// Simulated upstream latency per chart job.
    pub render_delay_ms: u64,
    /// Attempts per job before it is marked failed.
    pub max_attempts: u32,
    pub artifact_ttl_secs: u64,
    /// How long fetched or expired results are remembered past their TTL.
    pub tombstone_grace_secs: u64,
    pub gc_interval_secs: u64,
    /// How long `/result.png` waits for a job to finish.
    pub result_wait_timeout_secs: u64,
    pub request_timeout_secs: u64,
    /// Polls the job page makes before giving up.
    pub poll_max_attempts: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            data_dir: PathBuf::from("./artifacts"),
            workers: 2,
            render_delay_ms: 2000,
            max_attempts: 1,
            artifact_ttl_secs: 600,
            tombstone_grace_secs: 600,
            gc_interval_secs: 30,
            result_wait_timeout_secs: 60,
            request_timeout_secs: 90,
            poll_max_attempts: 120,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default       |
    /// |----------------------------|---------------|
    /// | `HOST`                     | `127.0.0.1`   |
    /// | `PORT`                     | `5000`        |
    /// | `DATA_DIR`                 | `./artifacts` |
    /// | `WORKERS`                  | `2`           |
    /// | `RENDER_DELAY_MS`          | `2000`        |
    /// | `MAX_ATTEMPTS`             | `1`           |
    /// | `ARTIFACT_TTL_SECS`        | `600`         |
    /// | `TOMBSTONE_GRACE_SECS`     | `600`         |
    /// | `GC_INTERVAL_SECS`         | `30`          |
    /// | `RESULT_WAIT_TIMEOUT_SECS` | `60`          |
    /// | `REQUEST_TIMEOUT_SECS`     | `90`          |
    /// | `POLL_MAX_ATTEMPTS`        | `120`         |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, reading values through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let host = lookup("HOST").unwrap_or(defaults.host);
        host.parse::<IpAddr>().map_err(|_| ConfigError::Invalid {
            name: "HOST",
            value: host.clone(),
            expected: "IP address",
        })?;

        let config = Self {
            host,
            port: parse(&lookup, "PORT", defaults.port, "u16")?,
            data_dir: lookup("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            workers: parse(&lookup, "WORKERS", defaults.workers, "usize")?,
            render_delay_ms: parse(&lookup, "RENDER_DELAY_MS", defaults.render_delay_ms, "u64")?,
            max_attempts: parse(&lookup, "MAX_ATTEMPTS", defaults.max_attempts, "u32")?,
            artifact_ttl_secs: parse(
                &lookup,
                "ARTIFACT_TTL_SECS",
                defaults.artifact_ttl_secs,
                "u64",
            )?,
            tombstone_grace_secs: parse(
                &lookup,
                "TOMBSTONE_GRACE_SECS",
                defaults.tombstone_grace_secs,
                "u64",
            )?,
            gc_interval_secs: parse(&lookup, "GC_INTERVAL_SECS", defaults.gc_interval_secs, "u64")?,
            result_wait_timeout_secs: parse(
                &lookup,
                "RESULT_WAIT_TIMEOUT_SECS",
                defaults.result_wait_timeout_secs,
                "u64",
            )?,
            request_timeout_secs: parse(
                &lookup,
                "REQUEST_TIMEOUT_SECS",
                defaults.request_timeout_secs,
                "u64",
            )?,
            poll_max_attempts: parse(
                &lookup,
                "POLL_MAX_ATTEMPTS",
                defaults.poll_max_attempts,
                "u32",
            )?,
        };

        at_least("WORKERS", config.workers as u64, 1)?;
        at_least("MAX_ATTEMPTS", u64::from(config.max_attempts), 1)?;
        at_least("ARTIFACT_TTL_SECS", config.artifact_ttl_secs, 1)?;
        at_least("GC_INTERVAL_SECS", config.gc_interval_secs, 1)?;
        at_least("RESULT_WAIT_TIMEOUT_SECS", config.result_wait_timeout_secs, 1)?;
        at_least("REQUEST_TIMEOUT_SECS", config.request_timeout_secs, 1)?;
        at_least("POLL_MAX_ATTEMPTS", u64::from(config.poll_max_attempts), 1)?;

        // A slow job must surface as 504 from /result.png, not a bare 408.
        if config.request_timeout_secs <= config.result_wait_timeout_secs {
            return Err(ConfigError::NotGreater {
                name: "REQUEST_TIMEOUT_SECS",
                value: config.request_timeout_secs,
                other: "RESULT_WAIT_TIMEOUT_SECS",
                other_value: config.result_wait_timeout_secs,
            });
        }

        Ok(config)
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip = self.host.parse::<IpAddr>().map_err(|_| ConfigError::Invalid {
            name: "HOST",
            value: self.host.clone(),
            expected: "IP address",
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }

    pub fn render_delay(&self) -> Duration {
        Duration::from_millis(self.render_delay_ms)
    }

    pub fn artifact_ttl(&self) -> Duration {
        Duration::from_secs(self.artifact_ttl_secs)
    }

    pub fn tombstone_grace(&self) -> Duration {
        Duration::from_secs(self.tombstone_grace_secs)
    }

    /// Terminal jobs outlive their artifact's tombstone.
    pub fn job_retention(&self) -> Duration {
        self.artifact_ttl() + self.tombstone_grace()
    }

    pub fn gc_interval(&self) -> Duration {
        Duration::from_secs(self.gc_interval_secs)
    }

    pub fn result_wait_timeout(&self) -> Duration {
        Duration::from_secs(self.result_wait_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn parse<T, F>(lookup: &F, name: &'static str, default: T, expected: &'static str) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            name,
            value: raw,
            expected,
        }),
    }
}

fn at_least(name: &'static str, value: u64, min: u64) -> Result<(), ConfigError> {
    if value < min {
        return Err(ConfigError::TooSmall { name, value, min });
    }
    Ok(())
}
