use anyhow::{anyhow, Context};
use simplelog::LevelFilter;
use std::{env, net::SocketAddr, str::FromStr, time::Duration};

const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3000";
const DEFAULT_CLEANUP_DELAY_SECS: u64 = 600;
const DEFAULT_PROBE_TIMEOUT_MS: u64 = 500;
const DEFAULT_SESSION_IDLE_SECS: u64 = 600;

// Settings read once at startup from the environment
#[derive(Clone, Debug)]
pub struct Config {
    pub jwt_secret: String,
    pub internal_secret: String,
    pub database_url: Option<String>,
    pub bind_address: SocketAddr,
    pub public_address: String,
    pub cleanup_delay: Duration,
    pub probe_timeout: Duration,
    // how long a quiet identity keeps its last-activity entry
    pub session_idle: Duration,
    pub log_level: LevelFilter,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Config> {
        Config::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Config>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| lookup(key).ok_or_else(|| anyhow!("${} is not set", key));

        let bind_address: SocketAddr = lookup("BIND_ADDRESS")
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string())
            .parse()
            .context("$BIND_ADDRESS is not a socket address")?;

        let cleanup_delay = match lookup("CLEANUP_DELAY_SECS") {
            Some(secs) => secs.parse::<u64>().context("$CLEANUP_DELAY_SECS is not numeric")?,
            None => DEFAULT_CLEANUP_DELAY_SECS,
        };

        let probe_timeout = match lookup("PROBE_TIMEOUT_MS") {
            Some(ms) => ms.parse::<u64>().context("$PROBE_TIMEOUT_MS is not numeric")?,
            None => DEFAULT_PROBE_TIMEOUT_MS,
        };

        let session_idle = match lookup("SESSION_IDLE_SECS") {
            Some(secs) => secs.parse::<u64>().context("$SESSION_IDLE_SECS is not numeric")?,
            None => DEFAULT_SESSION_IDLE_SECS,
        };
        if session_idle == 0 {
            return Err(anyhow!("$SESSION_IDLE_SECS must be positive"));
        }

        let log_level = match lookup("LOG_LEVEL") {
            Some(level) => LevelFilter::from_str(&level).map_err(|_| anyhow!("$LOG_LEVEL {} is not a log level", level))?,
            None => LevelFilter::Debug,
        };

        Ok(Config {
            jwt_secret: required("JWT_SECRET")?,
            internal_secret: required("INTERNAL_SECRET")?,
            database_url: lookup("DATABASE_URL"),
            public_address: lookup("PUBLIC_ADDRESS").unwrap_or_else(|| bind_address.to_string()),
            bind_address,
            cleanup_delay: Duration::from_secs(cleanup_delay),
            probe_timeout: Duration::from_millis(probe_timeout),
            session_idle: Duration::from_secs(session_idle),
            log_level,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_fill_optional_settings() {
        let config = Config::from_lookup(lookup(&[("JWT_SECRET", "jwt"), ("INTERNAL_SECRET", "peer")])).unwrap();
        assert_eq!(config.bind_address.to_string(), "0.0.0.0:3000");
        assert_eq!(config.public_address, "0.0.0.0:3000");
        assert_eq!(config.cleanup_delay, Duration::from_secs(600));
        assert_eq!(config.probe_timeout, Duration::from_millis(500));
        assert_eq!(config.session_idle, Duration::from_secs(600));
        assert_eq!(config.log_level, LevelFilter::Debug);
        assert!(config.database_url.is_none());
    }

    #[test]
    fn overrides_are_parsed() {
        let config = Config::from_lookup(lookup(&[
            ("JWT_SECRET", "jwt"),
            ("INTERNAL_SECRET", "peer"),
            ("BIND_ADDRESS", "127.0.0.1:8080"),
            ("PUBLIC_ADDRESS", "game-2.internal:8080"),
            ("CLEANUP_DELAY_SECS", "30"),
            ("LOG_LEVEL", "warn"),
        ]))
        .unwrap();
        assert_eq!(config.public_address, "game-2.internal:8080");
        assert_eq!(config.cleanup_delay, Duration::from_secs(30));
        assert_eq!(config.log_level, LevelFilter::Warn);
    }

    #[test]
    fn missing_secret_and_bad_numbers_fail() {
        assert!(Config::from_lookup(lookup(&[("INTERNAL_SECRET", "peer")])).is_err());
        assert!(Config::from_lookup(lookup(&[
            ("JWT_SECRET", "jwt"),
            ("INTERNAL_SECRET", "peer"),
            ("CLEANUP_DELAY_SECS", "soon"),
        ]))
        .is_err());
        assert!(Config::from_lookup(lookup(&[
            ("JWT_SECRET", "jwt"),
            ("INTERNAL_SECRET", "peer"),
            ("SESSION_IDLE_SECS", "0"),
        ]))
        .is_err());
    }
}
