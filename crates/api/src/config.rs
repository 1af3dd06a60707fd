//! Process configuration read from the environment.
//!
//! | Variable                 | Default        |
//! |--------------------------|----------------|
//! | `HOTELBOOK_BIND_ADDR`    | `0.0.0.0:8080` |
//! | `HOTELBOOK_DEFAULT_TAKE` | `100`          |
//! | `HOTELBOOK_MAX_TAKE`     | `1000`         |
//! | `DATABASE_URL`           | unset          |

use std::net::SocketAddr;

use thiserror::Error;

use hotelbook_core::PageLimits;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got `{value}`")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },

    #[error("invalid page limits: {0}")]
    Limits(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub limits: PageLimits,
    /// Selects the Postgres store when the `postgres` feature is enabled.
    pub database_url: Option<String>,
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = PageLimits::default();

        let bind_addr = match lookup("HOTELBOOK_BIND_ADDR") {
            Some(raw) => parse(&raw, "HOTELBOOK_BIND_ADDR", "a socket address")?,
            None => parse(DEFAULT_BIND_ADDR, "HOTELBOOK_BIND_ADDR", "a socket address")?,
        };
        let default_take = match lookup("HOTELBOOK_DEFAULT_TAKE") {
            Some(raw) => parse(&raw, "HOTELBOOK_DEFAULT_TAKE", "a non-negative integer")?,
            None => defaults.default_take,
        };
        let max_take = match lookup("HOTELBOOK_MAX_TAKE") {
            Some(raw) => parse(&raw, "HOTELBOOK_MAX_TAKE", "a positive integer")?,
            None => defaults.max_take,
        };
        let limits =
            PageLimits::new(default_take, max_take).map_err(|e| ConfigError::Limits(e.to_string()))?;

        let database_url = lookup("DATABASE_URL").filter(|v| !v.trim().is_empty());

        Ok(Self { bind_addr, limits, database_url })
    }
}

fn parse<T: std::str::FromStr>(
    raw: &str,
    var: &'static str,
    expected: &'static str,
) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        var,
        expected,
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<ApiConfig, ConfigError> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        ApiConfig::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.bind_addr, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(cfg.limits, PageLimits::default());
        assert_eq!(cfg.database_url, None);
    }

    #[test]
    fn overrides_are_read() {
        let cfg = config(&[
            ("HOTELBOOK_BIND_ADDR", "127.0.0.1:9000"),
            ("HOTELBOOK_DEFAULT_TAKE", "25"),
            ("HOTELBOOK_MAX_TAKE", "50"),
            ("DATABASE_URL", "postgres://localhost/hotelbook"),
        ])
        .unwrap();
        assert_eq!(cfg.bind_addr.port(), 9000);
        assert_eq!(cfg.limits, PageLimits { default_take: 25, max_take: 50 });
        assert_eq!(cfg.database_url.as_deref(), Some("postgres://localhost/hotelbook"));
    }

    #[test]
    fn invalid_numbers_are_startup_errors() {
        let err = config(&[("HOTELBOOK_MAX_TAKE", "lots")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "HOTELBOOK_MAX_TAKE", .. }));

        let err = config(&[("HOTELBOOK_DEFAULT_TAKE", "500"), ("HOTELBOOK_MAX_TAKE", "100")])
            .unwrap_err();
        assert!(matches!(err, ConfigError::Limits(_)));
    }
}
