use crate::agreement::ListingsAgreement;
use anyhow::{Context, Result};
use std::{net::SocketAddr, str::FromStr, time::Duration};

pub const DEFAULT_GROUP: &str = "DEFAULT_GROUP";
pub const DEFAULT_DISPATCH_TIMEOUT: Duration = Duration::from_millis(1000);

/// Settings shared by the coordinator and the replicas
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Which group of replicas to join
    pub group: String,
    /// How long a broadcast waits for answers
    pub dispatch_timeout: Duration,
    pub listings_agreement: ListingsAgreement,
    pub bind_addr: SocketAddr,
    /// Replicas started next to the coordinator by the binary
    pub replicas: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            group: DEFAULT_GROUP.to_owned(),
            dispatch_timeout: DEFAULT_DISPATCH_TIMEOUT,
            listings_agreement: ListingsAgreement::default(),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            replicas: 3,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key/value source, falling back to defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let group = lookup("GROUP").unwrap_or(defaults.group);

        let dispatch_timeout = parse_var::<u64>(&lookup, "DISPATCH_TIMEOUT_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.dispatch_timeout);

        let listings_agreement = parse_var(&lookup, "STRICT_LISTINGS")?
            .unwrap_or(defaults.listings_agreement);

        let bind_addr = parse_var(&lookup, "BIND_ADDR")?.unwrap_or(defaults.bind_addr);

        let replicas = parse_var(&lookup, "REPLICAS")?.unwrap_or(defaults.replicas);

        Ok(Self {
            group,
            dispatch_timeout,
            listings_agreement,
            bind_addr,
            replicas,
        })
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(key)
        .map(|value| {
            value
                .trim()
                .parse::<T>()
                .with_context(|| format!("invalid {key}: {value:?}"))
        })
        .transpose()
}
