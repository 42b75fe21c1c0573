//! Process configuration, read from the environment and an optional `.env`.

use agora_common::{
    snowflake::{ProcessId, WorkerId},
    util::PositiveDuration,
};
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use thiserror::Error;
use time::Duration;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Error parsing .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("Error parsing environment: {0}")]
    Envy(#[from] envy::Error),
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
pub struct Env {
    pub server_address: IpAddr,
    pub server_port: u16,
    /// e.g. `sqlite://agora.db`. The file is created if missing.
    pub database_url: String,
    pub worker_id: WorkerId,
    #[serde(default)]
    pub process_id: ProcessId,
    /// Unset or `0` issues tokens that never expire.
    #[serde(default)]
    pub token_lifetime_seconds: Option<u32>,
}

impl Env {
    #[must_use]
    pub fn socket_address(&self) -> SocketAddr {
        SocketAddr::new(self.server_address, self.server_port)
    }

    #[must_use]
    pub fn token_lifetime(&self) -> Option<PositiveDuration> {
        self.token_lifetime_seconds
            .and_then(|seconds| PositiveDuration::new(Duration::seconds(i64::from(seconds))))
    }
}

pub fn get_env() -> Result<Env, ConfigError> {
    if let Err(e) = dotenvy::dotenv() {
        if e.not_found() {
            debug!("No .env file found");
        } else {
            return Err(e.into());
        }
    }

    Ok(envy::from_env()?)
}

#[cfg(test)]
mod tests {
    use crate::config::Env;
    use agora_common::snowflake::{ProcessId, WorkerId};
    use time::Duration;

    fn env(vars: &[(&str, &str)]) -> Result<Env, envy::Error> {
        envy::from_iter(
            vars.iter()
                .map(|(key, value)| ((*key).to_owned(), (*value).to_owned())),
        )
    }

    const REQUIRED: [(&str, &str); 4] = [
        ("SERVER_ADDRESS", "127.0.0.1"),
        ("SERVER_PORT", "8080"),
        ("DATABASE_URL", "sqlite://agora.db"),
        ("WORKER_ID", "3"),
    ];

    #[test]
    fn optional_values_have_defaults() {
        let env = env(&REQUIRED).unwrap();

        assert_eq!(env.socket_address().to_string(), "127.0.0.1:8080");
        assert_eq!(env.worker_id, WorkerId::new_unchecked(3));
        assert_eq!(env.process_id, ProcessId::default());
        assert_eq!(env.token_lifetime(), None);
    }

    #[test]
    fn token_lifetime_is_read_in_seconds() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("TOKEN_LIFETIME_SECONDS", "3600"));

        let lifetime = env(&vars).unwrap().token_lifetime().unwrap();

        assert_eq!(lifetime.get(), Duration::hours(1));
    }

    #[test]
    fn zero_token_lifetime_means_no_expiry() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("TOKEN_LIFETIME_SECONDS", "0"));

        assert_eq!(env(&vars).unwrap().token_lifetime(), None);
    }

    #[test]
    fn out_of_range_worker_id_is_rejected() {
        let mut vars = REQUIRED.to_vec();
        vars[3] = ("WORKER_ID", "255");

        assert!(env(&vars).is_err());
    }
}
