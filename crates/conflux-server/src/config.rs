//! Environment configuration for the server binary.
//!
//! Backend connection settings (store, cache, auth introspection) are
//! read here so deployments carry one configuration surface; the bundled
//! binary runs on the in-memory implementations and only reports them.

use std::{env, net::SocketAddr};

#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Listen address. Defaults to port 3003 on all interfaces.
    pub addr: SocketAddr,
    /// Durable document store URI.
    pub store_uri: Option<String>,
    /// Shared KV cache URI.
    pub cache_uri: Option<String>,
    /// Base URL for self-references in generated documents.
    pub base_url: Option<String>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self {
            addr: parse_addr("CONFLUX_ADDR", "0.0.0.0:3003")?,
            store_uri: optional_env("CONFLUX_STORE_URI"),
            cache_uri: optional_env("CONFLUX_CACHE_URI"),
            base_url: optional_env("CONFLUX_BASE_URL"),
        })
    }
}

fn parse_addr(key: &str, default: &str) -> Result<SocketAddr, Box<dyn std::error::Error>> {
    let value = env::var(key).unwrap_or_else(|_| default.to_string());
    Ok(value.parse()?)
}

fn optional_env(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_port_3003() {
        // Environment is process-global; only assert the fallback path.
        let addr = parse_addr("CONFLUX_TEST_UNSET_ADDR", "0.0.0.0:3003").unwrap();
        assert_eq!(addr.port(), 3003);
    }

    #[test]
    fn blank_env_values_are_none() {
        assert!(optional_env("CONFLUX_TEST_UNSET_URI").is_none());
    }
}
